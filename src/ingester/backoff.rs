//! Idle delay after failed cycles.

use std::time::Duration;

use rand::Rng;

/// Exponential delay with jitter, driven by consecutive failed cycles.
///
/// With `n` consecutive failures the idle delay is
/// `base * 2^(n-1)`, capped at `max(cap, base)`. Zero or one failure yields
/// exactly `base`; longer delays get ±25% jitter.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    cap: Duration,
    failures: u32,
}

impl Backoff {
    /// Create a backoff around the regular poll interval.
    #[must_use]
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self {
            base,
            cap: cap.max(base),
            failures: 0,
        }
    }

    /// Count one more failed cycle. Returns the new streak length.
    pub fn record_failure(&mut self) -> u32 {
        self.failures = self.failures.saturating_add(1);
        self.failures
    }

    /// Forget the failure streak.
    pub fn reset(&mut self) {
        self.failures = 0;
    }

    /// Current consecutive failure count.
    #[must_use]
    pub const fn failures(&self) -> u32 {
        self.failures
    }

    /// Delay before jitter.
    #[must_use]
    pub fn base_delay(&self) -> Duration {
        if self.failures <= 1 {
            return self.base;
        }
        let exponent = (self.failures - 1).min(31);
        self.base.saturating_mul(1u32 << exponent).min(self.cap)
    }

    /// Delay to sleep before the next cycle.
    #[must_use]
    pub fn next_delay(&self) -> Duration {
        let delay = self.base_delay();
        if self.failures <= 1 || delay.is_zero() {
            return delay;
        }
        delay.mul_f64(rand::thread_rng().gen_range(0.75..=1.25))
    }
}
