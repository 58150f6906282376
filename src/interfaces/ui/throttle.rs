use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

pub const DEFAULT_THROTTLE_WINDOW: Duration = Duration::from_millis(500);

/// Drops repeated triggers that arrive within `window` of the last accepted one.
#[derive(Debug)]
pub struct ClickThrottle {
    window: Duration,
    last_accepted: Mutex<Option<Instant>>,
}

impl ClickThrottle {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_accepted: Mutex::new(None),
        }
    }

    /// Returns `true` if the trigger should go through.
    pub fn try_acquire(&self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    fn try_acquire_at(&self, now: Instant) -> bool {
        let mut last = self
            .last_accepted
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match *last {
            Some(previous) if now.saturating_duration_since(previous) < self.window => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }
}

impl Default for ClickThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_THROTTLE_WINDOW)
    }
}
