use std::sync::Arc;
use std::time::Duration;

use crate::chat::ChatPanel;
use crate::descriptor::Descriptor;
use crate::diagnostics::TracingSink;
use crate::errors::EngineError;
use crate::resolver::CandidateResolver;
use crate::tests::fake_surface::{Action, FakeSurface};
use crate::tests::test_timeouts;

fn panel_for(surface: &Arc<FakeSurface>) -> ChatPanel {
    ChatPanel::new(
        surface.clone(),
        Arc::new(TracingSink),
        CandidateResolver::new(Duration::from_millis(20), Duration::from_millis(10)),
        test_timeouts(),
    )
}

#[tokio::test]
async fn send_fills_input_and_presses_enter() {
    let surface = FakeSurface::new("page");
    surface.add_element(Descriptor::role("button", "Chat"), "chat-btn", true);
    surface.add_element(
        Descriptor::role("textbox", "Type message here"),
        "chat-input",
        true,
    );

    panel_for(&surface).send("I'm in.").await.unwrap();

    let actions = surface.actions();
    assert!(actions.contains(&Action::Click("chat-btn".to_string())));
    assert!(actions.contains(&Action::Fill("chat-input".to_string(), "I'm in.".to_string())));
    assert!(actions.contains(&Action::PressKey(
        "chat-input".to_string(),
        "Enter".to_string()
    )));
}

#[tokio::test]
async fn missing_chat_control_falls_back_to_shortcut() {
    let surface = FakeSurface::new("page");
    surface.add_element(
        Descriptor::role("textbox", "Type message here"),
        "chat-input",
        true,
    );

    panel_for(&surface).send("hello").await.unwrap();

    assert!(surface
        .actions()
        .contains(&Action::SendKeys("Alt+H".to_string())));
}

#[tokio::test]
async fn input_in_embedded_frame_is_found() {
    let page = FakeSurface::new("page");
    page.add_element(Descriptor::role("button", "Chat"), "chat-btn", true);
    let frame = FakeSurface::new("chat-frame");
    frame.add_element(
        Descriptor::role("textbox", "Type message here"),
        "frame-input",
        true,
    );
    page.add_frame(Some("chat"), None, frame.clone());

    panel_for(&page).send("hello").await.unwrap();

    assert_eq!(frame.fill_count("hello"), 1);
    assert!(frame.actions().contains(&Action::PressKey(
        "frame-input".to_string(),
        "Enter".to_string()
    )));
}

#[tokio::test]
async fn activation_ladder_accepts_scanned_textarea() {
    let surface = FakeSurface::new("page");
    surface.add_element(Descriptor::role("button", "Chat"), "chat-btn", true);
    // No input visible anywhere; the scripted textarea scan is the
    // strategy that finally produces one.
    surface.set_pick_textarea(true);

    panel_for(&surface).send("hello").await.unwrap();

    assert_eq!(surface.fill_count("hello"), 1);
    let actions = surface.actions();
    // Earlier ladder rungs ran first: focus cycling and panel toggles.
    assert!(actions.contains(&Action::SendKeys("Tab".to_string())));
    assert!(
        actions
            .iter()
            .filter(|a| matches!(a, Action::SendKeys(k) if k == "Alt+H"))
            .count()
            >= 2
    );
}

#[tokio::test]
async fn unresolvable_input_is_a_distinct_error() {
    let surface = FakeSurface::new("page");
    surface.add_element(Descriptor::role("button", "Chat"), "chat-btn", true);

    let err = panel_for(&surface).send("hello").await.unwrap_err();
    assert!(matches!(err, EngineError::ChatInputUnresolved(_)));
    assert_eq!(surface.fill_count("hello"), 0);
}
