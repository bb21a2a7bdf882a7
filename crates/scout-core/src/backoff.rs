//! Exponential backoff shared by the fetcher and the identity rotator.
//!
//! A [`BackoffPolicy`] only computes delays; callers own the sleeping so the
//! reporter can observe every wait.

use std::time::Duration;

/// Upper bound applied to every backoff delay unless overridden.
pub const DEFAULT_BACKOFF_CAP: Duration = Duration::from_secs(60);

/// `(initial, multiplier, jitter, cap) -> next delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay used before the first retry.
    pub initial: Duration,
    pub multiplier: u32,
    /// Maximum random jitter added on each step (uniform [0, jitter]).
    pub jitter: Duration,
    pub cap: Duration,
}

impl BackoffPolicy {
    /// Doubling policy with no jitter, capped at 60s.
    pub fn new(initial: Duration) -> Self {
        Self {
            initial,
            multiplier: 2,
            jitter: Duration::ZERO,
            cap: DEFAULT_BACKOFF_CAP,
        }
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_cap(mut self, cap: Duration) -> Self {
        self.cap = cap;
        self
    }

    /// The first delay, clamped to the cap.
    pub fn first(&self) -> Duration {
        self.initial.min(self.cap)
    }

    /// Delay to use after `current`: `min(current * multiplier + jitter, cap)`.
    pub fn next_delay(&self, current: Duration) -> Duration {
        let scaled = current.saturating_mul(self.multiplier);
        (scaled + self.sample_jitter()).min(self.cap)
    }

    fn sample_jitter(&self) -> Duration {
        let max_ms = self.jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::random_range(0..=max_ms))
    }
}
