//! Exponential backoff between reconnection attempts

use porthole_common::ResilienceConfig;
use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct BackoffConfig {
    pub base: Duration,
    pub max: Duration,
    /// Growth per failed attempt
    pub factor: f64,
    /// Jitter factor (0.0 - 1.0)
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        ResilienceConfig::default().into()
    }
}

impl From<ResilienceConfig> for BackoffConfig {
    fn from(config: ResilienceConfig) -> Self {
        Self {
            base: config.reconnect_base,
            max: config.reconnect_max,
            factor: 2.0,
            jitter: config.jitter_factor.clamp(0.0, 1.0),
        }
    }
}

/// Delay calculator; one instance per reconnecting tunnel
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    attempt: u32,
}

impl Backoff {
    #[must_use]
    pub fn new(config: BackoffConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Delay before the next attempt; counts the attempt.
    #[must_use]
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.delay_for(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    /// Call once a tunnel is up again.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let max_secs = self.config.max.as_secs_f64();
        // powi takes i32; anything past 64 doublings is over the cap anyway
        let exponent = i32::try_from(attempt.min(64)).unwrap_or(64);
        let exp_secs = (self.config.base.as_secs_f64() * self.config.factor.powi(exponent))
            .min(max_secs);

        let spread = exp_secs * self.config.jitter;
        let jitter = if spread > 0.0 {
            rand::thread_rng().gen_range(-spread..=spread)
        } else {
            0.0
        };

        Duration::from_secs_f64((exp_secs + jitter).clamp(0.0, max_secs))
    }
}
