//! Reconnection Policy
//!
//! Exponential backoff with jitter between stream connection attempts.
//! Attempt `n` waits `initial * multiplier^(n-1)`, capped at `max_delay`,
//! then randomized by `±jitter_factor`.

use std::time::Duration;

use rand::Rng;

use crate::infrastructure::config::StreamSettings;

/// Configuration for reconnection behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Growth factor between consecutive attempts.
    pub multiplier: f64,
    /// Jitter as a fraction of the delay (0.1 = ±10%).
    pub jitter_factor: f64,
    /// Attempts allowed before giving up (0 = unlimited).
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self::from_stream_settings(&StreamSettings::default())
    }
}

impl ReconnectConfig {
    /// Build from stream settings with the default ±10% jitter.
    #[must_use]
    pub const fn from_stream_settings(settings: &StreamSettings) -> Self {
        Self {
            initial_delay: settings.reconnect_delay_initial,
            max_delay: settings.reconnect_delay_max,
            multiplier: settings.reconnect_delay_multiplier,
            jitter_factor: 0.1,
            max_attempts: settings.max_reconnect_attempts,
        }
    }

    /// Disable jitter, for deterministic delays.
    #[must_use]
    pub const fn without_jitter(mut self) -> Self {
        self.jitter_factor = 0.0;
        self
    }

    /// Un-jittered delay before attempt `attempt` (1-based).
    #[must_use]
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let factor = self.multiplier.max(1.0).powi(exponent);
        #[allow(clippy::cast_precision_loss)]
        let initial_ms = self.initial_delay.as_millis() as f64;
        #[allow(clippy::cast_precision_loss)]
        let max_ms = self.max_delay.as_millis() as f64;

        let millis = (initial_ms * factor).min(max_ms);
        if !millis.is_finite() || millis <= 0.0 {
            return Duration::ZERO;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Duration::from_millis(millis.round() as u64)
    }
}

/// Tracks attempts across one run of a stream client.
///
/// Call [`next_delay`](Self::next_delay) after each failure and
/// [`reset`](Self::reset) once a connection opens.
#[derive(Debug)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    attempt: u32,
}

impl ReconnectPolicy {
    /// Create a policy with no attempts made.
    #[must_use]
    pub const fn new(config: ReconnectConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Delay before the next attempt, or `None` once attempts are exhausted.
    #[must_use]
    pub fn next_delay(&mut self) -> Option<Duration> {
        if !self.should_retry() {
            return None;
        }
        self.attempt += 1;
        Some(self.jitter(self.config.base_delay(self.attempt)))
    }

    /// Forget previous attempts after a successful connection.
    pub const fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Attempts made since the last reset.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempt
    }

    /// Whether another attempt is allowed.
    #[must_use]
    pub const fn should_retry(&self) -> bool {
        self.config.max_attempts == 0 || self.attempt < self.config.max_attempts
    }

    fn jitter(&self, delay: Duration) -> Duration {
        if self.config.jitter_factor <= 0.0 || delay.is_zero() {
            return delay;
        }
        #[allow(clippy::cast_precision_loss)]
        let base_ms = delay.as_millis() as f64;
        let spread = base_ms * self.config.jitter_factor;
        let offset: f64 = rand::rng().random_range(-spread..=spread);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Duration::from_millis((base_ms + offset).max(1.0) as u64)
    }
}
