//! The unattended chat-monitoring loop.
//!
//! Polls the chat surface for rendered messages, deduplicates them,
//! filters out the bot's own traffic, watches for a quit command and
//! for mentions, and dispatches replies. Poll iterations are strictly
//! sequential; message processing within one iteration is sequential
//! in discovery order.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::chat::ChatPanel;
use crate::config::Timeouts;
use crate::diagnostics::{DiagnosticsSink, Level};
use crate::errors::EngineError;
use crate::surface::Surface;

/// Reply sent to ordinary messages.
pub const DEFAULT_REPLY: &str = "Acknowledged.";
/// Reply sent when a message mentions the bot by name.
pub const MENTION_REPLY: &str = "You rang? I'm an automated attendant.";
/// Normalized chat text that ends the monitoring session.
pub const QUIT_COMMAND: &str = "quit";
/// Consecutive polling failures tolerated before the loop aborts.
pub const MAX_CONSECUTIVE_ERRORS: u32 = 5;

/// Structural matchers for rendered chat messages, tried in order; the
/// first tier that yields any element wins for that poll.
const MESSAGE_TIERS: &[&str] = &[
    "div[class*=\"chat-message\"]",
    "[class*=\"chat-item\"]",
    "[aria-label*=\"chat\" i] li",
];

/// Scrapes sender/text per rendered message. `__SELECTOR__` is
/// substituted with one tier before evaluation.
const SCRAPE_JS: &str = r#"
    (() => {
        const nodes = Array.from(document.querySelectorAll('__SELECTOR__'));
        return nodes.map(n => {
            const senderNode = n.querySelector('[class*="sender"], [class*="name"]');
            const textNode = n.querySelector('[class*="text"], [class*="content"]');
            return {
                sender: (senderNode ? senderNode.textContent : '').trim(),
                text: (textNode ? textNode.textContent : n.textContent || '').trim(),
                raw: (n.textContent || '').trim(),
            };
        });
    })()
"#;

/// One chat message as scraped from the surface. Transient; only the
/// dedup key outlives the poll that produced it.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub text: String,
    #[serde(default, rename = "raw")]
    pub raw_text: String,
}

impl ChatMessage {
    /// Composite identity used to avoid reprocessing.
    fn dedup_key(&self) -> (String, String) {
        (self.sender.clone(), self.text.clone())
    }
}

/// Set of dedup keys accumulated over one monitoring session.
///
/// Append-only in spirit; a capacity cap bounds memory over
/// pathological multi-day sessions by evicting the oldest keys first.
pub struct SeenMessageSet {
    keys: HashSet<(String, String)>,
    order: VecDeque<(String, String)>,
    capacity: usize,
}

impl SeenMessageSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            keys: HashSet::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    pub fn contains(&self, key: &(String, String)) -> bool {
        self.keys.contains(key)
    }

    /// Record a key; returns false if it was already present.
    pub fn insert(&mut self, key: (String, String)) -> bool {
        if !self.keys.insert(key.clone()) {
            return false;
        }
        self.order.push_back(key);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.keys.remove(&oldest);
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Why the monitoring loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// A participant sent the quit command.
    QuitCommand,
}

/// Summary of one monitoring session.
#[derive(Debug)]
pub struct MonitorOutcome {
    pub exit: ExitReason,
    pub replies_sent: usize,
    pub polls: usize,
}

/// The monitoring loop itself. Created when the workflow reaches its
/// monitoring stage and discarded when the session ends.
pub struct ChatMonitor {
    surface: Arc<dyn Surface>,
    sink: Arc<dyn DiagnosticsSink>,
    timeouts: Timeouts,
    /// The bot's own display name, for self-filtering and mentions
    bot_name: String,
    /// The one-time message sent at admission, if any; also treated
    /// as self-originated
    initial_message: Option<String>,
    seen: SeenMessageSet,
    replies_sent: usize,
}

impl ChatMonitor {
    pub fn new(
        surface: Arc<dyn Surface>,
        sink: Arc<dyn DiagnosticsSink>,
        timeouts: Timeouts,
        bot_name: String,
        initial_message: Option<String>,
    ) -> Self {
        Self {
            surface,
            sink,
            timeouts,
            bot_name,
            initial_message,
            seen: SeenMessageSet::new(4096),
            replies_sent: 0,
        }
    }

    /// Run until a quit command arrives or the consecutive-error
    /// ceiling is reached. Reply dispatch failures are logged, never
    /// fatal, and never touch the error counter.
    pub async fn run(mut self, chat: &ChatPanel) -> Result<MonitorOutcome, EngineError> {
        info!(bot = %self.bot_name, "chat monitoring started");
        let mut consecutive_errors: u32 = 0;
        let mut polls: usize = 0;

        loop {
            match self.poll_messages().await {
                Ok(batch) => {
                    polls += 1;
                    consecutive_errors = 0;
                    if self.process_batch(&batch, chat).await {
                        info!(polls, replies = self.replies_sent, "quit command received");
                        return Ok(MonitorOutcome {
                            exit: ExitReason::QuitCommand,
                            replies_sent: self.replies_sent,
                            polls,
                        });
                    }
                    tokio::time::sleep(self.timeouts.monitor_poll()).await;
                }
                Err(e) => {
                    consecutive_errors += 1;
                    warn!(
                        error = %e,
                        consecutive_errors,
                        "chat poll failed"
                    );
                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        self.sink.emit(
                            Level::Error,
                            "monitoring aborted after repeated poll failures",
                            serde_json::json!({ "consecutive_errors": consecutive_errors }),
                        );
                        return Err(EngineError::MonitoringExhausted(format!(
                            "{consecutive_errors} consecutive polling failures"
                        )));
                    }
                    tokio::time::sleep(self.timeouts.monitor_backoff()).await;
                }
            }
        }
    }

    /// Scrape all currently rendered messages, trying each structural
    /// tier in order and stopping at the first that yields anything.
    async fn poll_messages(&self) -> Result<Vec<ChatMessage>, EngineError> {
        let mut last_error: Option<EngineError> = None;
        let mut any_success = false;
        for tier in MESSAGE_TIERS {
            let script = SCRAPE_JS.replace("__SELECTOR__", tier);
            match self.surface.evaluate(&script).await {
                Ok(value) => {
                    any_success = true;
                    let messages: Vec<ChatMessage> =
                        serde_json::from_value(value).unwrap_or_default();
                    if !messages.is_empty() {
                        return Ok(messages);
                    }
                }
                Err(e) => last_error = Some(e),
            }
        }
        // Any tier that evaluated cleanly makes this a successful poll
        // of an empty chat; only a full sweep of evaluation failures
        // counts as a poll error.
        match last_error {
            Some(e) if !any_success => Err(e),
            _ => Ok(Vec::new()),
        }
    }

    /// Process one poll batch in discovery order. Returns true if a
    /// quit command ended the session; the remainder of the batch is
    /// skipped in that case.
    async fn process_batch(&mut self, batch: &[ChatMessage], chat: &ChatPanel) -> bool {
        for message in batch {
            let key = message.dedup_key();
            if self.seen.contains(&key) {
                continue;
            }
            // Mark before self-filtering so an own message is never
            // reprocessed even if detection logic changes.
            self.seen.insert(key);

            if self.is_self_message(message) {
                debug!(sender = %message.sender, "skipping self message");
                continue;
            }

            let normalized = message.text.trim().to_lowercase();
            if normalized == QUIT_COMMAND {
                return true;
            }

            let reply = if message
                .text
                .to_lowercase()
                .contains(&self.bot_name.to_lowercase())
            {
                MENTION_REPLY
            } else {
                DEFAULT_REPLY
            };

            debug!(sender = %message.sender, "dispatching reply");
            match chat.send(reply).await {
                Ok(()) => self.replies_sent += 1,
                Err(e) => {
                    // Best effort: a failed reply is not a poll error.
                    self.sink.emit(
                        Level::Warn,
                        "reply dispatch failed",
                        serde_json::json!({
                            "sender": message.sender,
                            "error": e.to_string(),
                        }),
                    );
                }
            }
        }
        false
    }

    /// A message attributable to the bot itself: sent under its own
    /// display name, or carrying one of its own reply tokens or the
    /// initial message text.
    fn is_self_message(&self, message: &ChatMessage) -> bool {
        if message.sender == self.bot_name {
            return true;
        }
        if message.text == DEFAULT_REPLY || message.text == MENTION_REPLY {
            return true;
        }
        if let Some(initial) = &self.initial_message {
            if message.text == *initial {
                return true;
            }
        }
        false
    }
}
