//! Web-meeting automation through a Playwright-style surface seam
//!
//! This crate joins a live web meeting, posts a one-time message once
//! admitted, runs an unattended auto-reply loop against incoming chat,
//! and leaves cleanly. The UI it drives has no stable automation
//! contract, so every interaction goes through multi-candidate element
//! resolution with explicit fallback chains; the engine guarantees a
//! bounded, ordered, logged attempt, then fails with a named condition.
//!
//! The host supplies the browsing session as an implementation of the
//! [`Surface`] trait (one impl per renderable context: page or frame)
//! and, optionally, a [`DiagnosticsSink`] for structured events.
//!
//! ```ignore
//! use attendant::{MeetingSession, SessionConfig};
//!
//! let config = SessionConfig {
//!     meeting_url: "https://example.zoom.us/j/123".into(),
//!     display_name: "Friday BOT".into(),
//!     message: Some("I'm in.".into()),
//!     ..Default::default()
//! };
//! let session = MeetingSession::new(page, config);
//! let report = session.run().await?;
//! ```

use std::sync::Arc;

pub mod chat;
pub mod config;
pub mod descriptor;
pub mod diagnostics;
pub mod errors;
pub mod monitor;
pub mod overlay;
pub mod resolver;
pub mod surface;
pub mod workflow;

#[cfg(test)]
mod tests;

pub use chat::{ChatInput, ChatPanel};
pub use config::{SessionConfig, Timeouts};
pub use descriptor::Descriptor;
pub use diagnostics::{init_tracing, DiagnosticsSink, Level, TracingSink};
pub use errors::EngineError;
pub use monitor::{ChatMessage, ChatMonitor, ExitReason, MonitorOutcome, SeenMessageSet};
pub use resolver::{CandidateResolver, Resolved};
pub use surface::{ElementRef, FrameHandle, Surface, WaitState};
pub use workflow::{JoinWorkflow, MeetingState, SessionReport, Stage};

/// The main entry point: one meeting session over a host-supplied
/// surface.
pub struct MeetingSession {
    surface: Arc<dyn Surface>,
    sink: Arc<dyn DiagnosticsSink>,
    config: SessionConfig,
}

impl MeetingSession {
    /// Create a session with the default `tracing`-backed sink.
    pub fn new(surface: Arc<dyn Surface>, config: SessionConfig) -> Self {
        Self::with_sink(surface, config, Arc::new(TracingSink))
    }

    /// Create a session that reports through a custom sink.
    pub fn with_sink(
        surface: Arc<dyn Surface>,
        config: SessionConfig,
        sink: Arc<dyn DiagnosticsSink>,
    ) -> Self {
        Self {
            surface,
            sink,
            config,
        }
    }

    /// Drive the full join → message → monitor → leave workflow.
    pub async fn run(self) -> Result<SessionReport, EngineError> {
        JoinWorkflow::new(self.surface, self.config, self.sink)
            .run()
            .await
    }
}
