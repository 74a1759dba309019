use crate::{
    config::{Config, PollOverride},
    error::PolicyError,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 30;

/// Fixed-interval retry policy for one polling session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPolicy")]
pub struct PollPolicy {
    interval: Duration,
    max_attempts: u32,
    timeout: Option<Duration>,
}

impl PollPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Result<Self, PolicyError> {
        if interval.is_zero() {
            return Err(PolicyError::ZeroInterval);
        }
        if max_attempts == 0 {
            return Err(PolicyError::ZeroAttempts);
        }
        Ok(Self {
            interval,
            max_attempts,
            timeout: None,
        })
    }

    /// Overrides the derived `interval * max_attempts` bound.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, PolicyError> {
        if timeout.is_zero() {
            return Err(PolicyError::ZeroTimeout);
        }
        self.timeout = Some(timeout);
        Ok(self)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Explicit wall-clock bound, if one was set.
    pub fn explicit_timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
            .unwrap_or_else(|| self.interval.saturating_mul(self.max_attempts))
    }

    /// Base `[polling]` policy with the given per-driver override applied.
    pub fn from_config(cfg: &Config, over: Option<&PollOverride>) -> Result<Self, PolicyError> {
        let base = &cfg.polling;
        let interval_seconds = over
            .and_then(|o| o.interval_seconds)
            .unwrap_or(base.interval_seconds);
        let max_attempts = over
            .and_then(|o| o.max_attempts)
            .unwrap_or(base.max_attempts);
        let timeout_seconds = over
            .and_then(|o| o.timeout_seconds)
            .unwrap_or(base.timeout_seconds);

        let policy = Self::new(Duration::from_secs(interval_seconds), max_attempts)?;
        if timeout_seconds > 0 {
            policy.with_timeout(Duration::from_secs(timeout_seconds))
        } else {
            Ok(policy)
        }
    }
}

/// Unchecked wire form; deserialization goes through [`PollPolicy::new`].
#[derive(Deserialize)]
struct RawPolicy {
    interval: Duration,
    max_attempts: u32,
    #[serde(default)]
    timeout: Option<Duration>,
}

impl TryFrom<RawPolicy> for PollPolicy {
    type Error = PolicyError;

    fn try_from(raw: RawPolicy) -> Result<Self, Self::Error> {
        let policy = Self::new(raw.interval, raw.max_attempts)?;
        match raw.timeout {
            Some(t) => policy.with_timeout(t),
            None => Ok(policy),
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            timeout: None,
        }
    }
}
