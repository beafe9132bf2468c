//! Reconnect delay schedule.

use std::time::Duration;

use infrawatch_core::BackoffConfig;

/// Exponential backoff: `base, base*factor, base*factor^2, ..` capped at
/// `max`, back to `base` on [`Backoff::reset`].
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    current: Duration,
    attempt: u32,
}

impl Backoff {
    /// Fresh schedule starting at `config.base`.
    #[must_use]
    pub fn new(config: BackoffConfig) -> Self {
        let current = config.base.min(config.max);
        Self {
            config,
            current,
            attempt: 0,
        }
    }

    /// Delay for the next retry; advances the schedule.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.grow(delay);
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    /// Delay the next call to [`Backoff::next_delay`] will return.
    #[must_use]
    pub const fn peek(&self) -> Duration {
        self.current
    }

    /// Retries scheduled since the last reset.
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Called after a successful open.
    pub fn reset(&mut self) {
        self.current = self.config.base.min(self.config.max);
        self.attempt = 0;
    }

    fn grow(&self, delay: Duration) -> Duration {
        // A factor below 1 would shrink the delay between resets.
        let factor = self.config.factor.max(1.0);
        Duration::try_from_secs_f64(delay.as_secs_f64() * factor)
            .unwrap_or(self.config.max)
            .min(self.config.max)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}
