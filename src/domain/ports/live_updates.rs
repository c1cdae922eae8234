//! Live-update sink port.

use crate::domain::models::LiveEvent;

/// Fire-and-forget publisher for dashboard events.
///
/// `notify` must not block on slow subscribers and must not report failures
/// to the caller.
pub trait LiveUpdateSink: Send + Sync {
    fn notify(&self, event: LiveEvent);
}

/// Sink that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl LiveUpdateSink for NullSink {
    fn notify(&self, _event: LiveEvent) {}
}
