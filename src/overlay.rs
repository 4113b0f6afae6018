//! Blocking-overlay dismissal.
//!
//! Modal dialogs appear at arbitrary points between workflow stages and
//! swallow clicks aimed at stage-critical controls. Dismissal is a
//! monotonic best-effort cleanup: it never errors and never blocks
//! stage progress; a residual overlay is tolerated and only surfaced
//! as a diagnostic.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::debug;

use crate::descriptor::Descriptor;
use crate::diagnostics::{DiagnosticsSink, Level};
use crate::surface::Surface;

/// Counts overlay containers currently attached to the document.
const OVERLAY_COUNT_JS: &str = r#"
    document.querySelectorAll(
        '[role="dialog"], [aria-modal="true"], .modal[style*="display: block"], .overlay-container > *'
    ).length
"#;

/// Detaches overlay containers outright and reports how many went.
const OVERLAY_REMOVE_JS: &str = r#"
    (() => {
        const nodes = document.querySelectorAll(
            '[role="dialog"], [aria-modal="true"], .modal[style*="display: block"], .overlay-container > *'
        );
        nodes.forEach(n => n.remove());
        return nodes.length;
    })()
"#;

/// Controls that close well-behaved dialogs.
fn dismiss_candidates() -> Vec<Descriptor> {
    vec![
        Descriptor::role("button", "Close"),
        Descriptor::role("button", "Dismiss"),
        Descriptor::role("button", "Got it"),
        Descriptor::role("button", "OK"),
        Descriptor::attr("aria-label", "close"),
        Descriptor::css("[role=\"dialog\"] button[class*=\"close\"]"),
    ]
}

/// Clear any blocking overlay before the caller proceeds. `context`
/// names the stage on whose behalf we are cleaning, for diagnostics.
pub async fn dismiss_modals(
    surface: &Arc<dyn Surface>,
    sink: &Arc<dyn DiagnosticsSink>,
    context: &str,
    click_budget: Duration,
) {
    // Cheap path: nothing is blocking, which is the common case.
    let count = overlay_count(surface).await;
    if count == 0 {
        return;
    }
    debug!(context, count, "overlays detected, attempting dismissal");

    // Press every known dismiss control concurrently; individual
    // failures are expected and ignored.
    let candidates = dismiss_candidates();
    let attempts = candidates.iter().map(|descriptor| async move {
        if let Ok(Some(element)) = surface.locate(descriptor).await {
            let _ = surface.click(&element, click_budget).await;
        }
    });
    join_all(attempts).await;

    // Blanket fallback: most dialogs honor Escape.
    let _ = surface.send_keys("Escape").await;

    let remaining = overlay_count(surface).await;
    if remaining == 0 {
        debug!(context, "overlays cleared");
        return;
    }

    // Last resort: detach the containers structurally.
    let removed = surface
        .evaluate(OVERLAY_REMOVE_JS)
        .await
        .ok()
        .and_then(|v| v.as_u64())
        .unwrap_or(0);
    sink.emit(
        Level::Warn,
        "force-removed overlay containers",
        serde_json::json!({ "context": context, "removed": removed }),
    );
}

async fn overlay_count(surface: &Arc<dyn Surface>) -> u64 {
    surface
        .evaluate(OVERLAY_COUNT_JS)
        .await
        .ok()
        .and_then(|v| v.as_u64())
        .unwrap_or(0)
}
