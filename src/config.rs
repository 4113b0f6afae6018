//! Session configuration.
//!
//! The host loads and validates this before a session starts; the
//! engine treats it as read-only. Every default is documented on the
//! field it belongs to.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Read-only configuration for one meeting session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Web-client address of the meeting to join.
    pub meeting_url: String,
    /// Display name entered on the join screen; also used to detect
    /// self-originated chat messages and mentions.
    pub display_name: String,
    /// One-time message posted after admission. `None` skips the send
    /// stage entirely.
    #[serde(default)]
    pub message: Option<String>,
    /// Whether to run the chat-monitoring loop after the one-time send.
    #[serde(default = "default_true")]
    pub monitor: bool,
    /// Directory where debug screenshots and snapshots are written.
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,
    #[serde(default)]
    pub timeouts: Timeouts,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            meeting_url: String::new(),
            display_name: String::new(),
            message: None,
            monitor: true,
            artifact_dir: default_artifact_dir(),
            timeouts: Timeouts::default(),
        }
    }
}

/// All timing knobs of the engine, in milliseconds.
///
/// Poll and settle intervals live here rather than as constants so the
/// deterministic test suite can run with near-zero waits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timeouts {
    /// Bound on the initial navigation. Default 60000.
    #[serde(default = "default_navigation_ms")]
    pub navigation_ms: u64,
    /// Bound on locating the name-entry field. Default 15000.
    #[serde(default = "default_name_input_ms")]
    pub name_input_ms: u64,
    /// Total budget for waiting out a moderated lobby. Default 300000.
    #[serde(default = "default_lobby_ms")]
    pub lobby_ms: u64,
    /// Bound on resolving chat controls and inputs. Default 10000.
    #[serde(default = "default_chat_ms")]
    pub chat_ms: u64,
    /// Delay between the last chat action and leaving. Default 3000.
    #[serde(default = "default_post_leave_delay_ms")]
    pub post_leave_delay_ms: u64,
    /// Interval between admission poll attempts. Default 5000.
    #[serde(default = "default_admission_poll_ms")]
    pub admission_poll_ms: u64,
    /// Interval between chat poll iterations. Default 1500.
    #[serde(default = "default_monitor_poll_ms")]
    pub monitor_poll_ms: u64,
    /// Back-off after a failed chat poll. Default 5000.
    #[serde(default = "default_monitor_backoff_ms")]
    pub monitor_backoff_ms: u64,
    /// Render-settle delay after clicks and toggles. Default 1000.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    /// Per-candidate budget for the parallel probe phase. Default 800.
    #[serde(default = "default_probe_ms")]
    pub probe_ms: u64,
    /// Per-candidate budget for the sequential fallback phase.
    /// Default 2000.
    #[serde(default = "default_fallback_ms")]
    pub fallback_ms: u64,
}

impl Timeouts {
    pub fn navigation(&self) -> Duration {
        Duration::from_millis(self.navigation_ms)
    }
    pub fn name_input(&self) -> Duration {
        Duration::from_millis(self.name_input_ms)
    }
    pub fn lobby(&self) -> Duration {
        Duration::from_millis(self.lobby_ms)
    }
    pub fn chat(&self) -> Duration {
        Duration::from_millis(self.chat_ms)
    }
    pub fn post_leave_delay(&self) -> Duration {
        Duration::from_millis(self.post_leave_delay_ms)
    }
    pub fn admission_poll(&self) -> Duration {
        Duration::from_millis(self.admission_poll_ms)
    }
    pub fn monitor_poll(&self) -> Duration {
        Duration::from_millis(self.monitor_poll_ms)
    }
    pub fn monitor_backoff(&self) -> Duration {
        Duration::from_millis(self.monitor_backoff_ms)
    }
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
    pub fn probe(&self) -> Duration {
        Duration::from_millis(self.probe_ms)
    }
    pub fn fallback(&self) -> Duration {
        Duration::from_millis(self.fallback_ms)
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            navigation_ms: default_navigation_ms(),
            name_input_ms: default_name_input_ms(),
            lobby_ms: default_lobby_ms(),
            chat_ms: default_chat_ms(),
            post_leave_delay_ms: default_post_leave_delay_ms(),
            admission_poll_ms: default_admission_poll_ms(),
            monitor_poll_ms: default_monitor_poll_ms(),
            monitor_backoff_ms: default_monitor_backoff_ms(),
            settle_ms: default_settle_ms(),
            probe_ms: default_probe_ms(),
            fallback_ms: default_fallback_ms(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_artifact_dir() -> PathBuf {
    PathBuf::from("debug_artifacts")
}
fn default_navigation_ms() -> u64 {
    60_000
}
fn default_name_input_ms() -> u64 {
    15_000
}
fn default_lobby_ms() -> u64 {
    300_000
}
fn default_chat_ms() -> u64 {
    10_000
}
fn default_post_leave_delay_ms() -> u64 {
    3_000
}
fn default_admission_poll_ms() -> u64 {
    5_000
}
fn default_monitor_poll_ms() -> u64 {
    1_500
}
fn default_monitor_backoff_ms() -> u64 {
    5_000
}
fn default_settle_ms() -> u64 {
    1_000
}
fn default_probe_ms() -> u64 {
    800
}
fn default_fallback_ms() -> u64 {
    2_000
}
