use std::time::Duration;

use strum::{Display, EnumIter};
use tokio::time::Instant;

/// Input and window events that count as user activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
#[strum(serialize_all = "camelCase")]
pub enum ActivityEvent {
    /// Window focus.
    Focus,
    /// Pointer movement.
    PointerMove,
    /// Touch start.
    Touch,
    /// Wheel scroll.
    Wheel,
    /// Key press.
    KeyDown,
}

/// Leading-edge throttle: the first event of a window passes, the rest of that
/// window is dropped.
#[derive(Debug, Clone)]
pub struct ActivityThrottle {
    window: Duration,
    last_passed: Option<Instant>,
}

impl ActivityThrottle {
    /// A throttle passing at most one event per `window`.
    #[must_use]
    pub const fn new(window: Duration) -> Self {
        Self {
            window,
            last_passed: None,
        }
    }

    /// Whether an event at `now` passes.
    pub fn pass(&mut self, now: Instant) -> bool {
        if self
            .last_passed
            .is_some_and(|last| now.saturating_duration_since(last) < self.window)
        {
            return false;
        }
        self.last_passed = Some(now);
        true
    }

    /// Starts a fresh window on the next event.
    pub fn reset(&mut self) {
        self.last_passed = None;
    }
}
