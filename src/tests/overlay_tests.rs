use std::sync::Arc;
use std::time::Duration;

use crate::descriptor::Descriptor;
use crate::diagnostics::{DiagnosticsSink, TracingSink};
use crate::overlay::dismiss_modals;
use crate::surface::Surface;
use crate::tests::fake_surface::{Action, FakeSurface};

const BUDGET: Duration = Duration::from_millis(20);

fn sink() -> Arc<dyn DiagnosticsSink> {
    Arc::new(TracingSink)
}

#[tokio::test]
async fn no_overlays_is_a_no_op() {
    let surface = FakeSurface::new("page");
    let as_surface: Arc<dyn Surface> = surface.clone();

    dismiss_modals(&as_surface, &sink(), "test", BUDGET).await;

    // Cheap path: no clicks, no keys, nothing.
    assert!(surface.actions().is_empty());
}

#[tokio::test]
async fn well_behaved_dialog_is_clicked_away() {
    let surface = FakeSurface::new("page");
    surface.set_overlay_count(1);
    surface.add_element(Descriptor::role("button", "Close"), "modal-close", true);
    surface.set_overlay_clear_token("modal-close");
    let as_surface: Arc<dyn Surface> = surface.clone();

    dismiss_modals(&as_surface, &sink(), "test", BUDGET).await;

    assert_eq!(surface.overlay_count(), 0);
    let actions = surface.actions();
    assert!(actions.contains(&Action::Click("modal-close".to_string())));
    // Escape is always pressed as the blanket fallback.
    assert!(actions.contains(&Action::SendKeys("Escape".to_string())));
}

#[tokio::test]
async fn stubborn_overlays_are_force_removed() {
    let surface = FakeSurface::new("page");
    surface.set_overlay_count(2);
    // No dismiss control anywhere; clicks and Escape change nothing,
    // so the structural removal path has to clear them.
    let as_surface: Arc<dyn Surface> = surface.clone();

    dismiss_modals(&as_surface, &sink(), "test", BUDGET).await;

    assert_eq!(surface.overlay_count(), 0);
}
