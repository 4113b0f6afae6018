//! The join/admission/leave workflow, expressed as an explicit state
//! progression with one handler per stage.
//!
//! Stages are strictly sequential; no stage begins before the previous
//! one's success criterion is met, and illegal transitions (leaving
//! before admission) are unrepresentable in the driver loop. Any fatal
//! error routes out through a best-effort screenshot capture.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::chat::ChatPanel;
use crate::config::SessionConfig;
use crate::descriptor::Descriptor;
use crate::diagnostics::{self, DiagnosticsSink, Level};
use crate::errors::EngineError;
use crate::monitor::{ChatMonitor, ExitReason};
use crate::overlay;
use crate::resolver::CandidateResolver;
use crate::surface::{ElementRef, Surface, WaitState};

/// Bound on the optional cookie-consent click; absence is normal.
const COOKIE_TIMEOUT: Duration = Duration::from_millis(2_000);
/// Keyboard shortcut that leaves the meeting in most client builds.
const LEAVE_SHORTCUT: &str = "Alt+Q";
/// Frame name the web client registers for its meeting document.
const CLIENT_FRAME_NAME: &str = "webclient";

/// Basic fingerprint softening, applied once after navigation. This is
/// deliberately shallow: the engine does not try to defeat
/// anti-automation countermeasures.
const SOFTEN_FINGERPRINT_JS: &str = r#"
    (() => {
        try {
            Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
            window.chrome = window.chrome || { runtime: {} };
        } catch (e) {}
        return true;
    })()
"#;

/// Scans body text for terminal-state wording so a dead meeting fails
/// fast instead of waiting out the lobby budget.
const TERMINAL_TEXT_JS: &str = r#"
    (() => {
        const t = ((document.body && document.body.innerText) || '').toLowerCase();
        return ['meeting has ended', 'meeting has been ended', 'has been closed',
                'removed from the meeting', 'invalid meeting', 'an error occurred']
            .some(k => t.includes(k));
    })()
"#;

/// Workflow stages, linear with one optional skip (monitoring).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    Init,
    Navigated,
    CookieHandled,
    SurfaceResolved,
    NameFilled,
    JoinSubmitted,
    AdmissionPending,
    Admitted,
    MessageSent,
    Monitoring,
    Left,
    Completed,
}

/// Inferred classification of the session's standing in the meeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeetingState {
    NotAdmitted,
    InLobby,
    InMeeting,
}

/// What a completed session looked like.
#[derive(Debug)]
pub struct SessionReport {
    /// Every stage entered, in order, ending with `Completed`
    pub stages: Vec<Stage>,
    /// Replies dispatched by the monitor loop
    pub replies_sent: usize,
    /// How monitoring ended, if it ran
    pub monitor_exit: Option<ExitReason>,
}

fn leave_candidates() -> Vec<Descriptor> {
    vec![
        Descriptor::role("button", "Leave"),
        Descriptor::role("button", "Leave Meeting"),
        Descriptor::attr("aria-label", "leave"),
        Descriptor::css("button[class*=\"leave\"]"),
    ]
}

fn name_input_candidates() -> Vec<Descriptor> {
    vec![
        Descriptor::role("textbox", "Your Name"),
        Descriptor::Placeholder("Your Name".to_string()),
        Descriptor::css("input[type=\"text\"]"),
    ]
}

fn join_candidates() -> Vec<Descriptor> {
    vec![
        Descriptor::role("button", "Join"),
        Descriptor::role("button", "Join Meeting"),
        Descriptor::attr("aria-label", "join"),
        Descriptor::css("button[class*=\"join\"]"),
    ]
}

/// Drives one meeting session end to end.
pub struct JoinWorkflow {
    /// Top-level page surface, as supplied by the host
    page: Arc<dyn Surface>,
    /// Surface selected at `SurfaceResolved`; permanent afterwards
    surface: Arc<dyn Surface>,
    config: SessionConfig,
    sink: Arc<dyn DiagnosticsSink>,
    resolver: CandidateResolver,
    /// Weak leave-control reference captured at admission
    leave_button: Option<ElementRef>,
    replies_sent: usize,
    monitor_exit: Option<ExitReason>,
}

impl JoinWorkflow {
    pub fn new(
        page: Arc<dyn Surface>,
        config: SessionConfig,
        sink: Arc<dyn DiagnosticsSink>,
    ) -> Self {
        let resolver = CandidateResolver::new(config.timeouts.probe(), config.timeouts.fallback());
        Self {
            surface: page.clone(),
            page,
            config,
            sink,
            resolver,
            leave_button: None,
            replies_sent: 0,
            monitor_exit: None,
        }
    }

    /// Run the workflow to completion. On a fatal error a best-effort
    /// screenshot is captured before the error propagates; if the
    /// surface is already unusable the capture is skipped.
    pub async fn run(mut self) -> Result<SessionReport, EngineError> {
        let mut stage = Stage::Init;
        let mut stages = vec![stage];

        loop {
            match self.step(stage).await {
                Ok(next) => {
                    debug!(from = ?stage, to = ?next, "stage transition");
                    stage = next;
                    stages.push(stage);
                    if stage == Stage::Completed {
                        info!(stages = stages.len(), "session completed");
                        return Ok(SessionReport {
                            stages,
                            replies_sent: self.replies_sent,
                            monitor_exit: self.monitor_exit,
                        });
                    }
                }
                Err(e) => {
                    self.sink.emit(
                        Level::Error,
                        "workflow stage failed",
                        serde_json::json!({ "stage": format!("{stage:?}"), "error": e.to_string() }),
                    );
                    diagnostics::capture_screenshot(
                        &self.surface,
                        &self.sink,
                        &self.config.artifact_dir,
                        "workflow-failed",
                    )
                    .await;
                    return Err(e);
                }
            }
        }
    }

    /// One handler per state; the match is the whole transition table.
    async fn step(&mut self, stage: Stage) -> Result<Stage, EngineError> {
        match stage {
            Stage::Init => self.navigate().await,
            Stage::Navigated => self.handle_cookies().await,
            Stage::CookieHandled => self.resolve_surface().await,
            Stage::SurfaceResolved => self.fill_name().await,
            Stage::NameFilled => self.submit_join().await,
            Stage::JoinSubmitted => Ok(Stage::AdmissionPending),
            Stage::AdmissionPending => self.await_admission().await,
            Stage::Admitted => self.send_initial_message().await,
            Stage::MessageSent => {
                if self.config.monitor {
                    Ok(Stage::Monitoring)
                } else {
                    self.leave().await
                }
            }
            Stage::Monitoring => self.monitor_then_leave().await,
            Stage::Left => Ok(Stage::Completed),
            Stage::Completed => Ok(Stage::Completed),
        }
    }

    async fn navigate(&mut self) -> Result<Stage, EngineError> {
        info!(url = %self.config.meeting_url, "navigating to meeting");
        self.page
            .navigate(&self.config.meeting_url, self.config.timeouts.navigation())
            .await
            .map_err(|e| EngineError::Navigation(e.to_string()))?;

        // Best effort; the page may forbid evaluation this early.
        let _ = self.page.evaluate(SOFTEN_FINGERPRINT_JS).await;
        Ok(Stage::Navigated)
    }

    /// A consent banner may or may not exist; its absence is normal.
    async fn handle_cookies(&mut self) -> Result<Stage, EngineError> {
        let consent = Descriptor::role("button", "Accept Cookies");
        match self
            .page
            .wait_for(&consent, COOKIE_TIMEOUT, WaitState::Visible)
            .await
        {
            Ok(element) => {
                if let Err(e) = self.page.click(&element, COOKIE_TIMEOUT).await {
                    debug!(error = %e, "cookie consent click failed, continuing");
                }
            }
            Err(_) => debug!("no cookie banner"),
        }
        Ok(Stage::CookieHandled)
    }

    /// Prefer an embedded frame identified as the web client, then a
    /// frame registered under the known client name, then the page
    /// itself. The choice is permanent for the session.
    async fn resolve_surface(&mut self) -> Result<Stage, EngineError> {
        let frames = self.page.frames().await.unwrap_or_default();

        let client = frames.iter().position(|f| {
            f.url
                .as_deref()
                .is_some_and(|u| u.contains("/wc/") || u.contains("webclient"))
        });
        let named = frames
            .iter()
            .position(|f| f.name.as_deref() == Some(CLIENT_FRAME_NAME));

        let mut frames = frames;
        self.surface = match client.or(named) {
            Some(index) => {
                let frame = frames.swap_remove(index);
                info!(frame = ?frame.name, "using embedded client frame");
                frame.surface
            }
            None => {
                info!("using top-level page as surface");
                self.page.clone()
            }
        };
        Ok(Stage::SurfaceResolved)
    }

    /// Poll for the name-entry field until the configured bound, then
    /// fill the display name. Timeout here is fatal.
    async fn fill_name(&mut self) -> Result<Stage, EngineError> {
        let deadline = Instant::now() + self.config.timeouts.name_input();
        let candidates = name_input_candidates();

        loop {
            if let Some(resolved) = self.resolver.resolve(self.surface.as_ref(), &candidates).await
            {
                self.surface
                    .fill(
                        &resolved.element,
                        &self.config.display_name,
                        self.config.timeouts.name_input(),
                    )
                    .await?;
                info!(name = %self.config.display_name, "display name filled");
                return Ok(Stage::NameFilled);
            }
            if Instant::now() >= deadline {
                return Err(EngineError::NameEntryTimeout(format!(
                    "no name-entry field within {:?}",
                    self.config.timeouts.name_input()
                )));
            }
            tokio::time::sleep(self.config.timeouts.settle()).await;
        }
    }

    async fn submit_join(&mut self) -> Result<Stage, EngineError> {
        overlay::dismiss_modals(
            &self.surface,
            &self.sink,
            "join-submit",
            self.config.timeouts.chat(),
        )
        .await;

        let candidates = join_candidates();
        match self.resolver.resolve(self.surface.as_ref(), &candidates).await {
            Some(resolved) => {
                debug!(index = resolved.index, "join control resolved");
                self.surface
                    .click(&resolved.element, self.config.timeouts.chat())
                    .await?;
            }
            None => {
                // Last resort: most join forms submit on Enter.
                warn!("no join control resolved, pressing Enter");
                let _ = self.surface.send_keys("Enter").await;
            }
        }
        tokio::time::sleep(self.config.timeouts.settle()).await;
        Ok(Stage::JoinSubmitted)
    }

    /// Classify the session by probing indicator controls
    /// concurrently. Two or more in-meeting-only indicators visible
    /// means admitted, full stop.
    pub(crate) async fn probe_meeting_state(&self) -> MeetingState {
        let indicators = [
            Descriptor::attr("aria-label", "leave"),
            Descriptor::Text("host will let you in".to_string()),
            Descriptor::role("button", "Join Audio"),
            Descriptor::role("button", "Participants"),
            Descriptor::role("button", "Chat"),
            Descriptor::role("button", "Start Video"),
        ];

        let budget = self.config.timeouts.probe();
        let results = join_all(
            indicators
                .iter()
                .map(|d| probe_visible(self.surface.as_ref(), d, budget)),
        )
        .await;

        let leave_visible = results[0];
        let waiting_visible = results[1];
        let in_meeting_count = results[2..].iter().filter(|v| **v).count();

        if in_meeting_count >= 2 || leave_visible {
            MeetingState::InMeeting
        } else if waiting_visible {
            MeetingState::InLobby
        } else {
            MeetingState::NotAdmitted
        }
    }

    async fn await_admission(&mut self) -> Result<Stage, EngineError> {
        tokio::time::sleep(self.config.timeouts.settle()).await;

        if self.probe_meeting_state().await == MeetingState::InMeeting {
            info!("already in meeting, skipping lobby wait");
            self.capture_leave_button().await;
            return Ok(Stage::Admitted);
        }

        let poll = self.config.timeouts.admission_poll();
        let attempts = self
            .config
            .timeouts
            .lobby_ms
            .div_ceil(self.config.timeouts.admission_poll_ms.max(1))
            .max(1);
        info!(attempts, "waiting for admission");

        let leave = leave_candidates();
        for attempt in 1..=attempts {
            match self
                .surface
                .wait_for(&leave[0], poll, WaitState::Visible)
                .await
            {
                Ok(element) => {
                    info!(attempt, "admitted to meeting");
                    self.leave_button = Some(element);
                    return Ok(Stage::Admitted);
                }
                Err(_) => {
                    debug!(attempt, attempts, "not admitted yet");
                    diagnostics::capture_dom_snapshot(&self.surface, &self.sink, "lobby-wait")
                        .await;
                    if self.meeting_terminated().await {
                        return Err(EngineError::MeetingTerminated(
                            "terminal-state text detected while waiting in lobby".to_string(),
                        ));
                    }
                }
            }
        }

        diagnostics::capture_screenshot(
            &self.surface,
            &self.sink,
            &self.config.artifact_dir,
            "admission-timeout",
        )
        .await;
        Err(EngineError::AdmissionTimeout(format!(
            "not admitted within {:?}",
            self.config.timeouts.lobby()
        )))
    }

    async fn meeting_terminated(&self) -> bool {
        matches!(
            self.surface.evaluate(TERMINAL_TEXT_JS).await,
            Ok(serde_json::Value::Bool(true))
        )
    }

    async fn capture_leave_button(&mut self) {
        for descriptor in leave_candidates() {
            if let Ok(Some(element)) = self.surface.locate(&descriptor).await {
                self.leave_button = Some(element);
                return;
            }
        }
    }

    fn chat_panel(&self) -> ChatPanel {
        ChatPanel::new(
            self.surface.clone(),
            self.sink.clone(),
            self.resolver,
            self.config.timeouts.clone(),
        )
    }

    async fn send_initial_message(&mut self) -> Result<Stage, EngineError> {
        let Some(message) = self.config.message.clone() else {
            info!("no message configured, skipping send");
            return Ok(Stage::MessageSent);
        };
        self.chat_panel().send(&message).await?;
        Ok(Stage::MessageSent)
    }

    /// Run the monitor loop, then leave regardless of how it ended.
    /// A monitoring failure still gets the leave cleanup before the
    /// error is re-raised.
    async fn monitor_then_leave(&mut self) -> Result<Stage, EngineError> {
        let chat = self.chat_panel();
        let monitor = ChatMonitor::new(
            self.surface.clone(),
            self.sink.clone(),
            self.config.timeouts.clone(),
            self.config.display_name.clone(),
            self.config.message.clone(),
        );

        match monitor.run(&chat).await {
            Ok(outcome) => {
                self.replies_sent = outcome.replies_sent;
                self.monitor_exit = Some(outcome.exit);
                self.leave().await
            }
            Err(e) => {
                warn!(error = %e, "monitoring failed, leaving before propagating");
                let _ = self.leave().await;
                Err(e)
            }
        }
    }

    /// Leave is always best-effort: try the captured reference, then
    /// the host "End" path, then any leave/end-labelled control, then
    /// the keyboard shortcut. All four failing is logged, not fatal.
    async fn leave(&mut self) -> Result<Stage, EngineError> {
        tokio::time::sleep(self.config.timeouts.post_leave_delay()).await;

        let clicked = self.try_leave_click().await;
        if clicked {
            self.confirm_leave().await;
        } else {
            self.sink.emit(
                Level::Warn,
                "all leave strategies failed",
                serde_json::json!({}),
            );
        }
        info!("leave sequence finished");
        Ok(Stage::Left)
    }

    async fn try_leave_click(&mut self) -> bool {
        let budget = self.config.timeouts.chat();

        // 1. The reference captured at admission, re-resolved if it
        //    is absent or has gone stale.
        if self.leave_button.is_none() {
            self.capture_leave_button().await;
        }
        if let Some(element) = self.leave_button.clone() {
            match self.surface.click(&element, budget).await {
                Ok(()) => return true,
                Err(e) => {
                    debug!(error = %e, "captured leave reference stale, re-resolving");
                    self.leave_button = None;
                    self.capture_leave_button().await;
                    if let Some(fresh) = self.leave_button.clone() {
                        if self.surface.click(&fresh, budget).await.is_ok() {
                            return true;
                        }
                    }
                }
            }
        }

        // 2. Host path: the control reads "End" instead of "Leave".
        let end = Descriptor::role("button", "End");
        if let Ok(Some(element)) = self.surface.locate(&end).await {
            if self.surface.click(&element, budget).await.is_ok() {
                return true;
            }
        }

        // 3. Anything whose accessible label mentions leaving/ending.
        for descriptor in [
            Descriptor::attr("aria-label", "leave"),
            Descriptor::attr("aria-label", "end"),
        ] {
            if let Ok(Some(element)) = self.surface.locate(&descriptor).await {
                if self.surface.click(&element, budget).await.is_ok() {
                    return true;
                }
            }
        }

        // 4. Keyboard shortcut.
        self.surface.send_keys(LEAVE_SHORTCUT).await.is_ok()
    }

    /// Absence of a confirmation dialog is normal.
    async fn confirm_leave(&self) {
        let budget = self.config.timeouts.chat();
        for descriptor in [
            Descriptor::role("button", "Leave Meeting"),
            Descriptor::role("button", "Leave"),
            Descriptor::css("[role=\"dialog\"] button[class*=\"leave\"]"),
        ] {
            if let Ok(Some(element)) = self.surface.locate(&descriptor).await {
                if self.surface.click(&element, budget).await.is_ok() {
                    debug!("leave confirmed");
                    return;
                }
            }
        }
        debug!("no leave confirmation dialog");
    }
}

/// Bounded, non-blocking visibility probe; errors count as invisible.
async fn probe_visible(surface: &dyn Surface, descriptor: &Descriptor, budget: Duration) -> bool {
    let probe = async {
        match surface.locate(descriptor).await {
            Ok(Some(element)) => surface.is_visible(&element, budget).await.unwrap_or(false),
            _ => false,
        }
    };
    tokio::time::timeout(budget, probe).await.unwrap_or(false)
}
