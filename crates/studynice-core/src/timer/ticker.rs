//! Display refresh scheduling.
//!
//! A running timer has to be redrawn at least once per second. The ticker
//! only answers "is a redraw due?" for a polled event loop; it never touches
//! the session itself.

use std::time::Duration;

use super::clock::Clock;

/// Upper bound on the refresh interval (>= 1 Hz).
pub const MAX_REFRESH_INTERVAL_MS: u64 = 1_000;

#[derive(Debug, Clone)]
pub struct DisplayTicker {
    interval_ms: u64,
    next_due_ms: Option<u64>,
}

impl DisplayTicker {
    /// Intervals are clamped to `1..=1000` ms.
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms: interval_ms.clamp(1, MAX_REFRESH_INTERVAL_MS),
            next_due_ms: None,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Returns true when a redraw is due at `now_ms` and schedules the next.
    /// The first poll is always due.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        match self.next_due_ms {
            Some(due) if now_ms < due => false,
            _ => {
                self.next_due_ms = Some(now_ms + self.interval_ms);
                true
            }
        }
    }

    pub fn poll_clock<C: Clock>(&mut self, clock: &C) -> bool {
        self.poll(clock.now_ms())
    }

    /// How long the event loop may sleep before the next poll.
    pub fn time_until_due(&self, now_ms: u64) -> Duration {
        let wait = self
            .next_due_ms
            .map(|due| due.saturating_sub(now_ms))
            .unwrap_or(0);
        Duration::from_millis(wait)
    }

    /// Forget the schedule, e.g. after the timer stopped running.
    pub fn cancel(&mut self) {
        self.next_due_ms = None;
    }
}

impl Default for DisplayTicker {
    fn default() -> Self {
        Self::new(MAX_REFRESH_INTERVAL_MS)
    }
}
