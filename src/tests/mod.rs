
mod chat_tests;
mod monitor_tests;
mod overlay_tests;
mod resolver_tests;

use crate::config::Timeouts;

/// Timing knobs shrunk so the suite never actually waits.
pub(crate) fn test_timeouts() -> Timeouts {
    Timeouts {
        navigation_ms: 50,
        name_input_ms: 30,
        lobby_ms: 10,
        chat_ms: 20,
        post_leave_delay_ms: 1,
        admission_poll_ms: 5,
        monitor_poll_ms: 1,
        monitor_backoff_ms: 1,
        settle_ms: 1,
        probe_ms: 20,
        fallback_ms: 10,
    }
}
