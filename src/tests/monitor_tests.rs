use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use crate::chat::ChatPanel;
use crate::descriptor::Descriptor;
use crate::diagnostics::TracingSink;
use crate::errors::EngineError;
use crate::monitor::{
    ChatMonitor, ExitReason, SeenMessageSet, DEFAULT_REPLY, MAX_CONSECUTIVE_ERRORS, MENTION_REPLY,
};
use crate::resolver::CandidateResolver;
use crate::tests::fake_surface::FakeSurface;
use crate::tests::test_timeouts;

const BOT_NAME: &str = "Friday BOT";
const INITIAL_MESSAGE: &str = "I'm in.";

/// Surface with a working chat control and input so replies can land.
fn chat_ready_surface() -> Arc<FakeSurface> {
    let surface = FakeSurface::new("page");
    surface.add_element(Descriptor::role("button", "Chat"), "chat-btn", true);
    surface.add_element(
        Descriptor::role("textbox", "Type message here"),
        "chat-input",
        true,
    );
    surface
}

fn monitor_for(surface: &Arc<FakeSurface>) -> ChatMonitor {
    ChatMonitor::new(
        surface.clone(),
        Arc::new(TracingSink),
        test_timeouts(),
        BOT_NAME.to_string(),
        Some(INITIAL_MESSAGE.to_string()),
    )
}

fn panel_for(surface: &Arc<FakeSurface>) -> ChatPanel {
    ChatPanel::new(
        surface.clone(),
        Arc::new(TracingSink),
        CandidateResolver::new(Duration::from_millis(20), Duration::from_millis(10)),
        test_timeouts(),
    )
}

fn msg(sender: &str, text: &str) -> serde_json::Value {
    json!({ "sender": sender, "text": text, "raw": format!("{sender}: {text}") })
}

#[tokio::test]
async fn replaying_a_message_replies_exactly_once() {
    let surface = chat_ready_surface();
    // Same (sender, text) three times in one batch, then again in the
    // next poll.
    surface.push_poll(Ok(json!([
        msg("Alice", "hello"),
        msg("Alice", "hello"),
        msg("Alice", "hello"),
    ])));
    surface.push_poll(Ok(json!([msg("Alice", "hello")])));
    surface.push_poll(Ok(json!([msg("Bob", "quit")])));

    let outcome = monitor_for(&surface)
        .run(&panel_for(&surface))
        .await
        .unwrap();

    assert_eq!(outcome.exit, ExitReason::QuitCommand);
    assert_eq!(outcome.replies_sent, 1);
    assert_eq!(surface.fill_count(DEFAULT_REPLY), 1);
}

#[tokio::test]
async fn self_messages_never_get_replies() {
    let surface = chat_ready_surface();
    surface.push_poll(Ok(json!([
        msg(BOT_NAME, "talking to myself"),
        msg("Alice", DEFAULT_REPLY),
        msg("Alice", MENTION_REPLY),
        msg("Alice", INITIAL_MESSAGE),
    ])));
    surface.push_poll(Ok(json!([msg("Bob", "quit")])));

    let outcome = monitor_for(&surface)
        .run(&panel_for(&surface))
        .await
        .unwrap();

    assert_eq!(outcome.replies_sent, 0);
    assert_eq!(surface.fill_count(DEFAULT_REPLY), 0);
    assert_eq!(surface.fill_count(MENTION_REPLY), 0);
}

#[tokio::test]
async fn quit_ends_loop_and_skips_rest_of_batch() {
    let surface = chat_ready_surface();
    surface.push_poll(Ok(json!([
        msg("Alice", "hi there"),
        msg("Bob", "quit"),
        msg("Carol", "anyone home?"),
    ])));

    let outcome = monitor_for(&surface)
        .run(&panel_for(&surface))
        .await
        .unwrap();

    assert_eq!(outcome.exit, ExitReason::QuitCommand);
    assert_eq!(outcome.polls, 1);
    // Alice got a reply; Carol, after the quit, did not.
    assert_eq!(outcome.replies_sent, 1);
    assert_eq!(surface.fill_count(DEFAULT_REPLY), 1);
}

#[tokio::test]
async fn quit_matching_is_normalized() {
    let surface = chat_ready_surface();
    surface.push_poll(Ok(json!([msg("Bob", "  QUIT  ")])));

    let outcome = monitor_for(&surface)
        .run(&panel_for(&surface))
        .await
        .unwrap();
    assert_eq!(outcome.exit, ExitReason::QuitCommand);
    assert_eq!(outcome.replies_sent, 0);
}

#[tokio::test]
async fn mention_gets_distinct_reply() {
    let surface = chat_ready_surface();
    surface.push_poll(Ok(json!([
        msg("Alice", "hey friday bot, are you real?"),
        msg("Bob", "hello everyone"),
    ])));
    surface.push_poll(Ok(json!([msg("Bob", "quit")])));

    let outcome = monitor_for(&surface)
        .run(&panel_for(&surface))
        .await
        .unwrap();

    assert_eq!(outcome.replies_sent, 2);
    assert_eq!(surface.fill_count(MENTION_REPLY), 1);
    assert_eq!(surface.fill_count(DEFAULT_REPLY), 1);
}

#[tokio::test]
async fn consecutive_poll_failures_hit_the_ceiling() {
    let surface = chat_ready_surface();
    for _ in 0..MAX_CONSECUTIVE_ERRORS {
        surface.push_poll(Err("scrape blew up"));
    }

    let err = monitor_for(&surface)
        .run(&panel_for(&surface))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::MonitoringExhausted(_)));
    assert_eq!(surface.pending_polls(), 0);
}

#[tokio::test]
async fn one_success_resets_the_error_counter() {
    let surface = chat_ready_surface();
    // Four failures, a success, then a full ceiling's worth again.
    for _ in 0..(MAX_CONSECUTIVE_ERRORS - 1) {
        surface.push_poll(Err("scrape blew up"));
    }
    surface.push_poll(Ok(json!([])));
    for _ in 0..MAX_CONSECUTIVE_ERRORS {
        surface.push_poll(Err("scrape blew up"));
    }

    let err = monitor_for(&surface)
        .run(&panel_for(&surface))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::MonitoringExhausted(_)));
    // The run consumed every planned poll: the mid-sequence success
    // reset the counter, otherwise it would have aborted early.
    assert_eq!(surface.pending_polls(), 0);
}

#[tokio::test]
async fn broken_first_tier_over_empty_chat_is_not_a_poll_error() {
    let surface = chat_ready_surface();
    // The first structural tier errors on every poll, but a later
    // tier evaluates cleanly each time, so the error ceiling must
    // never be reached.
    for _ in 0..(MAX_CONSECUTIVE_ERRORS * 2) {
        surface.push_poll_first_tier_failure("selector blew up");
    }
    surface.push_poll(Ok(json!([msg("Bob", "quit")])));

    let outcome = monitor_for(&surface)
        .run(&panel_for(&surface))
        .await
        .expect("healthy later tiers must keep the loop alive");
    assert_eq!(outcome.exit, ExitReason::QuitCommand);
    assert_eq!(surface.pending_polls(), 0);
}

#[tokio::test]
async fn failed_reply_dispatch_is_not_a_poll_error() {
    // A chat control but no input anywhere: every reply dispatch fails
    // with ChatInputUnresolved after the activation ladder.
    let surface = FakeSurface::new("page");
    surface.add_element(Descriptor::role("button", "Chat"), "chat-btn", true);
    surface.push_poll(Ok(json!([msg("Alice", "hello")])));
    surface.push_poll(Ok(json!([msg("Bob", "quit")])));

    let outcome = monitor_for(&surface)
        .run(&panel_for(&surface))
        .await
        .expect("reply failure must not kill the loop");
    assert_eq!(outcome.exit, ExitReason::QuitCommand);
    assert_eq!(outcome.replies_sent, 0);
}

#[test]
fn seen_set_evicts_oldest_at_capacity() {
    let mut seen = SeenMessageSet::new(2);
    let a = ("Alice".to_string(), "one".to_string());
    let b = ("Bob".to_string(), "two".to_string());
    let c = ("Carol".to_string(), "three".to_string());

    assert!(seen.insert(a.clone()));
    assert!(!seen.insert(a.clone()));
    assert!(seen.insert(b.clone()));
    assert!(seen.insert(c.clone()));

    assert_eq!(seen.len(), 2);
    assert!(!seen.contains(&a));
    assert!(seen.contains(&b));
    assert!(seen.contains(&c));
}

#[test]
fn seen_set_empty() {
    let seen = SeenMessageSet::new(8);
    assert!(seen.is_empty());
}
