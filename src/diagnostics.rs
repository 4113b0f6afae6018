//! Structured diagnostics.
//!
//! The engine reports everything through a [`DiagnosticsSink`]:
//! fire-and-forget, never blocks, never fails the caller. The default
//! sink forwards to `tracing`; hosts that want their own pipeline
//! implement the trait themselves.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use once_cell::sync::OnceCell;
use tracing::{debug, error, info, warn};

use crate::surface::Surface;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

/// Receives structured engine events. Implementations must not block.
pub trait DiagnosticsSink: Send + Sync {
    fn emit(&self, level: Level, message: &str, context: serde_json::Value);
}

/// Default sink: forwards every event to the `tracing` macros with the
/// structured context rendered as a field.
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn emit(&self, level: Level, message: &str, context: serde_json::Value) {
        match level {
            Level::Debug => debug!(context = %context, "{message}"),
            Level::Info => info!(context = %context, "{message}"),
            Level::Warn => warn!(context = %context, "{message}"),
            Level::Error => error!(context = %context, "{message}"),
        }
    }
}

static TRACING_INIT: OnceCell<()> = OnceCell::new();

/// Install an env-filtered `tracing` subscriber. Safe to call more
/// than once; only the first call installs.
pub fn init_tracing() {
    TRACING_INIT.get_or_init(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .try_init();
    });
}

/// Name a debug artifact by (reason, timestamp).
pub fn artifact_name(reason: &str, extension: &str) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis();
    format!("{reason}-{millis}.{extension}")
}

/// Best-effort screenshot into the artifact directory. Failures are
/// reported to the sink and swallowed; diagnostics never abort the
/// session on their own.
pub async fn capture_screenshot(
    surface: &Arc<dyn Surface>,
    sink: &Arc<dyn DiagnosticsSink>,
    dir: &Path,
    reason: &str,
) -> Option<PathBuf> {
    let path = dir.join(artifact_name(reason, "png"));
    match surface.screenshot(&path).await {
        Ok(()) => {
            sink.emit(
                Level::Info,
                "captured debug screenshot",
                serde_json::json!({ "reason": reason, "path": path.display().to_string() }),
            );
            Some(path)
        }
        Err(e) => {
            sink.emit(
                Level::Warn,
                "screenshot capture failed",
                serde_json::json!({ "reason": reason, "error": e.to_string() }),
            );
            None
        }
    }
}

/// Best-effort DOM snapshot, emitted through the sink as a structured
/// event (persistence is the host's concern). The snapshot is
/// truncated so a pathological document cannot balloon a log record.
pub async fn capture_dom_snapshot(
    surface: &Arc<dyn Surface>,
    sink: &Arc<dyn DiagnosticsSink>,
    reason: &str,
) {
    const MAX_SNAPSHOT_CHARS: usize = 32 * 1024;

    match surface
        .evaluate("document.documentElement.outerHTML")
        .await
    {
        Ok(value) => {
            let mut html = value.as_str().unwrap_or_default().to_string();
            if html.len() > MAX_SNAPSHOT_CHARS {
                let mut cut = MAX_SNAPSHOT_CHARS;
                while !html.is_char_boundary(cut) {
                    cut -= 1;
                }
                html.truncate(cut);
            }
            sink.emit(
                Level::Debug,
                "captured DOM snapshot",
                serde_json::json!({
                    "reason": reason,
                    "artifact": artifact_name(reason, "html"),
                    "snapshot": html,
                }),
            );
        }
        Err(e) => {
            sink.emit(
                Level::Warn,
                "DOM snapshot failed",
                serde_json::json!({ "reason": reason, "error": e.to_string() }),
            );
        }
    }
}
