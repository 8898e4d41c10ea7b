/// file: src/backoff.rs
/// description: capped exponential reconnect delay with optional jitter
use crate::config::StreamConfig;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    jitter: f64,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            jitter: 0.0,
        }
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    pub fn from_config(config: &StreamConfig) -> Self {
        Self::new(config.reconnect_delay, config.max_reconnect_delay)
            .with_jitter(config.reconnect_jitter)
    }

    /// `min(base * 2^(attempt - 1), max)` for attempt >= 1, before jitter.
    pub fn capped_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base
            .checked_mul(1_u32 << exponent)
            .map_or(self.max, |delay| delay.min(self.max))
    }

    /// Delay to wait before reconnect attempt `attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let capped = self.capped_delay(attempt);
        if self.jitter == 0.0 {
            return capped;
        }

        // Symmetric jitter: +/- jitter * capped
        let spread = capped.as_secs_f64() * self.jitter;
        let offset = (fastrand::f64() * 2.0 - 1.0) * spread;
        let jittered = (capped.as_secs_f64() + offset).clamp(0.0, self.max.as_secs_f64());
        Duration::from_secs_f64(jittered)
    }
}
