#![forbid(unsafe_code)]

use core::time::Duration;

/// Deterministic monotonic clock controlled by the host.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeterministicClock {
    now: Duration,
}

impl DeterministicClock {
    /// Create a clock starting at `0`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            now: Duration::ZERO,
        }
    }

    /// Current monotonic time.
    #[must_use]
    pub const fn now(&self) -> Duration {
        self.now
    }

    /// Set current monotonic time. Time never runs backwards.
    pub fn set(&mut self, now: Duration) {
        self.now = self.now.max(now);
    }

    /// Advance monotonic time by `dt`.
    pub fn advance(&mut self, dt: Duration) {
        self.now = self.now.saturating_add(dt);
    }

    /// Advance by a host-supplied millisecond count.
    ///
    /// Non-finite and negative values are ignored.
    pub fn advance_ms(&mut self, ms: f64) {
        if let Some(dt) = duration_from_ms(ms) {
            self.advance(dt);
        }
    }

    /// Set from a host-supplied millisecond timestamp.
    ///
    /// Non-finite and negative values are ignored.
    pub fn set_ms(&mut self, ms: f64) {
        if let Some(now) = duration_from_ms(ms) {
            self.set(now);
        }
    }
}

fn duration_from_ms(ms: f64) -> Option<Duration> {
    if !ms.is_finite() || ms < 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(ms / 1000.0).ok()
}
