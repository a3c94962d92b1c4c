use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::CoreError;

/// Bounded exponential backoff used for link sync and accept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Delay before the second attempt, in milliseconds.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Upper bound on any single delay, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Multiplier applied per attempt.
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
    /// Fraction of the delay added as random jitter (0.0 - 1.0).
    #[serde(default)]
    pub jitter_fraction: f64,
    /// Total attempts, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_initial_delay_ms() -> u64 {
    100
}
fn default_max_delay_ms() -> u64 {
    5_000
}
fn default_backoff_factor() -> f64 {
    2.0
}
fn default_max_attempts() -> u32 {
    5
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_factor: default_backoff_factor(),
            jitter_fraction: 0.0,
            max_attempts: default_max_attempts(),
        }
    }
}

impl RetryPolicy {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.max_attempts == 0 {
            return Err(CoreError::InvalidConfig(
                "max_attempts must be at least 1".into(),
            ));
        }
        if !(1.0..=10.0).contains(&self.backoff_factor) {
            return Err(CoreError::InvalidConfig(
                "backoff_factor must be between 1.0 and 10.0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.jitter_fraction) {
            return Err(CoreError::InvalidConfig(
                "jitter_fraction must be between 0.0 and 1.0".into(),
            ));
        }
        if self.initial_delay_ms > self.max_delay_ms {
            return Err(CoreError::InvalidConfig(
                "initial_delay_ms must not exceed max_delay_ms".into(),
            ));
        }
        Ok(())
    }

    /// Delay to wait after the given failed attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = (self.initial_delay_ms as f64) * self.backoff_factor.powi(attempt as i32);
        let capped = base.min(self.max_delay_ms as f64);

        let jitter_range = capped * self.jitter_fraction;
        let jitter = if jitter_range > 0.0 {
            rand::thread_rng().gen_range(0.0..jitter_range)
        } else {
            0.0
        };

        Duration::from_millis((capped + jitter) as u64)
    }
}

/// Runtime configuration shared by the engine components of one party.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Retry policy for link sync and accept.
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Timeout for a single transport call, in milliseconds.
    #[serde(default = "default_transport_timeout_ms")]
    pub transport_timeout_ms: u64,
    /// Capacity of the event bus broadcast channel.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
    /// Number of past events kept for late waiters.
    #[serde(default = "default_event_history")]
    pub event_history: usize,
}

fn default_transport_timeout_ms() -> u64 {
    2_000
}
fn default_event_channel_capacity() -> usize {
    256
}
fn default_event_history() -> usize {
    128
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            transport_timeout_ms: default_transport_timeout_ms(),
            event_channel_capacity: default_event_channel_capacity(),
            event_history: default_event_history(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        self.retry.validate()?;
        if self.transport_timeout_ms == 0 {
            return Err(CoreError::InvalidConfig(
                "transport_timeout_ms must be positive".into(),
            ));
        }
        if self.event_channel_capacity == 0 {
            return Err(CoreError::InvalidConfig(
                "event_channel_capacity must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn transport_timeout(&self) -> Duration {
        Duration::from_millis(self.transport_timeout_ms)
    }
}
