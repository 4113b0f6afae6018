//! Chat panel interaction: opening the panel, resolving its input
//! across surfaces, and sending messages.
//!
//! The input box is the single most drift-prone element in the whole
//! UI: across sessions it renders as a textbox, a content-editable
//! div, or a plain textarea, sometimes inside a separate frame. The
//! resolver covers the known shapes; when none is visible, a ladder of
//! activation strategies runs in strict order, each one cheap and
//! non-destructive, stopping at the first that makes an input appear.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::Timeouts;
use crate::descriptor::Descriptor;
use crate::diagnostics::{self, DiagnosticsSink, Level};
use crate::errors::EngineError;
use crate::overlay;
use crate::resolver::CandidateResolver;
use crate::surface::{ElementRef, Surface, WaitState};

/// Keyboard shortcut that toggles the chat panel in the web client.
const CHAT_SHORTCUT: &str = "Alt+H";
/// Alternate binding some client builds use instead.
const CHAT_SHORTCUT_ALT: &str = "Control+Shift+H";

/// Tags the element picked by a scripted scan so it can be handed back
/// through the normal locate path.
const PICK_TEXTAREA_JS: &str = r#"
    (() => {
        const unrelated = /search|caption|note|feedback|poll|rename/i;
        const areas = Array.from(document.querySelectorAll('textarea'));
        const pick = areas.find(t =>
            t.offsetParent !== null &&
            !unrelated.test(t.id + ' ' + t.className + ' ' + (t.getAttribute('aria-label') || ''))
        );
        if (!pick) return false;
        pick.setAttribute('data-attendant-pick', 'true');
        return true;
    })()
"#;

/// Controls that open the chat panel, best first.
fn chat_open_candidates() -> Vec<Descriptor> {
    vec![
        Descriptor::role("button", "Chat"),
        Descriptor::role("button", "open the chat panel"),
        Descriptor::attr("aria-label", "chat"),
        Descriptor::css("button[class*=\"chat\"]"),
    ]
}

/// Input descriptors, role-based matches first, structural ones after.
fn chat_input_candidates() -> Vec<Descriptor> {
    vec![
        Descriptor::role("textbox", "Type message here"),
        Descriptor::role("textbox", "Send a message to everyone"),
        Descriptor::any_role("textbox"),
        Descriptor::css("[class*=\"chat\"] [contenteditable=\"true\"]"),
        Descriptor::css("[class*=\"chat\"] textarea"),
        Descriptor::Placeholder("Type message here...".to_string()),
    ]
}

/// A resolved chat input: the surface it lives on plus its handle.
pub struct ChatInput {
    pub surface: Arc<dyn Surface>,
    pub element: ElementRef,
}

/// Chat interaction bound to one session's surface and timing knobs.
pub struct ChatPanel {
    surface: Arc<dyn Surface>,
    sink: Arc<dyn DiagnosticsSink>,
    resolver: CandidateResolver,
    timeouts: Timeouts,
}

impl ChatPanel {
    pub fn new(
        surface: Arc<dyn Surface>,
        sink: Arc<dyn DiagnosticsSink>,
        resolver: CandidateResolver,
        timeouts: Timeouts,
    ) -> Self {
        Self {
            surface,
            sink,
            resolver,
            timeouts,
        }
    }

    /// Open the chat panel: dismiss anything blocking, click a chat
    /// control if one resolves, otherwise fall back to the keyboard
    /// shortcut. Either way the panel gets a render-settle delay.
    pub async fn open(&self) {
        overlay::dismiss_modals(&self.surface, &self.sink, "chat-open", self.timeouts.chat())
            .await;

        let candidates = chat_open_candidates();
        match self.resolver.resolve(self.surface.as_ref(), &candidates).await {
            Some(resolved) => {
                debug!(index = resolved.index, "chat control resolved");
                if let Err(e) = self
                    .surface
                    .click(&resolved.element, self.timeouts.chat())
                    .await
                {
                    warn!(error = %e, "chat control click failed, sending shortcut");
                    let _ = self.surface.send_keys(CHAT_SHORTCUT).await;
                }
            }
            None => {
                debug!("no chat control resolved, sending shortcut");
                let _ = self.surface.send_keys(CHAT_SHORTCUT).await;
            }
        }
        tokio::time::sleep(self.timeouts.settle()).await;
    }

    /// Send one message through the chat input, resolving (and if
    /// necessary activating) the input first.
    pub async fn send(&self, text: &str) -> Result<(), EngineError> {
        self.open().await;

        let input = match self.resolve_input().await {
            Some(input) => input,
            None => {
                diagnostics::capture_dom_snapshot(&self.surface, &self.sink, "chat-input-missing")
                    .await;
                return Err(EngineError::ChatInputUnresolved(
                    "no chat input visible on any surface after activation ladder".to_string(),
                ));
            }
        };

        input
            .surface
            .fill(&input.element, text, self.timeouts.chat())
            .await?;
        input
            .surface
            .press_key(&input.element, "Enter", self.timeouts.chat())
            .await?;
        info!(chars = text.len(), "chat message sent");
        Ok(())
    }

    /// Resolve the chat input on the primary surface, then on every
    /// other frame, then via the activation ladder.
    pub async fn resolve_input(&self) -> Option<ChatInput> {
        if let Some(input) = self.resolve_input_anywhere().await {
            return Some(input);
        }
        self.activation_ladder().await
    }

    async fn resolve_input_anywhere(&self) -> Option<ChatInput> {
        let candidates = chat_input_candidates();

        if let Some(resolved) = self.resolver.resolve(self.surface.as_ref(), &candidates).await {
            return Some(ChatInput {
                surface: self.surface.clone(),
                element: resolved.element,
            });
        }

        // Chat may render in a separate embedded context.
        let frames = self.surface.frames().await.unwrap_or_default();
        for frame in frames {
            if let Some(resolved) = self
                .resolver
                .resolve(frame.surface.as_ref(), &candidates)
                .await
            {
                debug!(frame = ?frame.name, "chat input found in embedded frame");
                return Some(ChatInput {
                    surface: frame.surface,
                    element: resolved.element,
                });
            }
        }
        None
    }

    /// Activation strategies in strict order, stopping at the first
    /// that yields an input. Failure of one never aborts the ladder.
    async fn activation_ladder(&self) -> Option<ChatInput> {
        self.sink.emit(
            Level::Info,
            "chat input not visible, running activation ladder",
            serde_json::json!({}),
        );

        // 1. Click inside a chat-panel-like container to force focus.
        let panel = Descriptor::css("[class*=\"chat-container\"], [class*=\"chat-panel\"]");
        if let Ok(Some(element)) = self.surface.locate(&panel).await {
            let _ = self.surface.click(&element, self.timeouts.chat()).await;
            if let Some(input) = self.resolve_input_anywhere().await {
                return Some(input);
            }
        }

        // 2. Cycle focus into the panel.
        for _ in 0..3 {
            let _ = self.surface.send_keys("Tab").await;
        }
        if let Some(input) = self.resolve_input_anywhere().await {
            return Some(input);
        }

        // 3. Toggle the chat panel off and back on.
        let _ = self.surface.send_keys(CHAT_SHORTCUT).await;
        tokio::time::sleep(self.timeouts.settle()).await;
        let _ = self.surface.send_keys(CHAT_SHORTCUT).await;
        tokio::time::sleep(self.timeouts.settle()).await;
        if let Some(input) = self.resolve_input_anywhere().await {
            return Some(input);
        }

        // 4. Wait longer for lazy-loaded content.
        let any_textbox = Descriptor::any_role("textbox");
        if let Ok(element) = self
            .surface
            .wait_for(&any_textbox, self.timeouts.chat(), WaitState::Visible)
            .await
        {
            return Some(ChatInput {
                surface: self.surface.clone(),
                element,
            });
        }

        // 5. Accept any visible content-editable element.
        let editable = Descriptor::css("[contenteditable=\"true\"]");
        if let Some(resolved) = self
            .resolver
            .resolve(self.surface.as_ref(), &[editable])
            .await
        {
            return Some(ChatInput {
                surface: self.surface.clone(),
                element: resolved.element,
            });
        }

        // 6. Scan textareas, skipping those that belong to another
        //    feature, and accept the first survivor.
        if let Ok(serde_json::Value::Bool(true)) = self.surface.evaluate(PICK_TEXTAREA_JS).await {
            let picked = Descriptor::css("[data-attendant-pick=\"true\"]");
            if let Ok(Some(element)) = self.surface.locate(&picked).await {
                return Some(ChatInput {
                    surface: self.surface.clone(),
                    element,
                });
            }
        }

        // 7. Alternate keyboard shortcut.
        let _ = self.surface.send_keys(CHAT_SHORTCUT_ALT).await;
        tokio::time::sleep(self.timeouts.settle()).await;
        self.resolve_input_anywhere().await
    }
}
