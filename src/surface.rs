//! The surface seam: everything the engine needs from a renderable
//! document context.
//!
//! A surface is either a top-level page or an embedded frame; both are
//! host-supplied implementations of the same [`Surface`] trait, so the
//! resolution and workflow logic never narrows to a concrete rendering
//! engine. Script evaluation is the single escape hatch into the live
//! document; nothing else in the engine depends on a scripting model.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::descriptor::Descriptor;
use crate::errors::EngineError;

/// Opaque handle to an element on a surface, minted by the host.
///
/// The engine never inspects the token; it only hands it back to the
/// surface that produced it. A handle may go stale if the document
/// mutates, in which case interactions fail and callers re-resolve.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementRef(pub String);

impl ElementRef {
    pub fn new(token: impl Into<String>) -> Self {
        ElementRef(token.into())
    }
}

/// Target state for [`Surface::wait_for`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitState {
    /// Present in the document and rendered
    Visible,
    /// Present in the document, rendered or not
    Attached,
    /// Absent or not rendered
    Hidden,
}

/// An embedded frame discovered on a surface.
pub struct FrameHandle {
    /// The frame's registered name, if any
    pub name: Option<String>,
    /// The frame's document URL, if known
    pub url: Option<String>,
    /// The frame itself, usable exactly like the parent surface
    pub surface: Arc<dyn Surface>,
}

/// The common trait that all surface implementations must provide.
///
/// Mirrors the capability set the engine actually consumes: element
/// lookup, visibility probing, interaction, timed waiting, script
/// evaluation, frame enumeration, and screenshotting. Every operation
/// that can block carries an explicit bound; there is no unbounded
/// wait anywhere behind this trait.
#[async_trait::async_trait]
pub trait Surface: Send + Sync {
    /// Short label for diagnostics ("page", a frame name, ...).
    fn label(&self) -> &str;

    /// Load a document into this surface.
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), EngineError>;

    /// Find a single element. `Ok(None)` means no match right now;
    /// errors are reserved for a broken surface.
    async fn locate(&self, descriptor: &Descriptor) -> Result<Option<ElementRef>, EngineError>;

    /// Probe whether an element is currently rendered, bounded by
    /// `timeout`. A stale handle reports not-visible rather than
    /// erroring.
    async fn is_visible(&self, element: &ElementRef, timeout: Duration)
        -> Result<bool, EngineError>;

    /// Click an element.
    async fn click(&self, element: &ElementRef, timeout: Duration) -> Result<(), EngineError>;

    /// Replace an input's content with `text`.
    async fn fill(
        &self,
        element: &ElementRef,
        text: &str,
        timeout: Duration,
    ) -> Result<(), EngineError>;

    /// Press a key (or combo like "Control+Enter") on an element.
    async fn press_key(
        &self,
        element: &ElementRef,
        key: &str,
        timeout: Duration,
    ) -> Result<(), EngineError>;

    /// Send a key or combo to the document itself, without a target
    /// element. Used for Escape, Enter-to-join, and chat shortcuts.
    async fn send_keys(&self, combo: &str) -> Result<(), EngineError>;

    /// Wait for a descriptor to reach `state`, up to `timeout`.
    async fn wait_for(
        &self,
        descriptor: &Descriptor,
        timeout: Duration,
        state: WaitState,
    ) -> Result<ElementRef, EngineError>;

    /// Evaluate a script expression in the document and return its
    /// JSON-serialized result.
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, EngineError>;

    /// Enumerate embedded frames currently attached to this surface.
    async fn frames(&self) -> Result<Vec<FrameHandle>, EngineError>;

    /// Write a screenshot of this surface to `path`.
    async fn screenshot(&self, path: &Path) -> Result<(), EngineError>;
}
