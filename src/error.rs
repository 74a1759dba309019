use std::time::Duration;
use thiserror::Error;

/// Failure reported by a status probe.
///
/// `Transient` failures are retried within the attempt budget; `Fatal`
/// failures end the polling session immediately.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("transient probe failure: {0}")]
    Transient(String),

    #[error("fatal probe failure: {0}")]
    Fatal(String),
}

impl ProbeError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProbeError::Transient(_))
    }

    pub fn message(&self) -> &str {
        match self {
            ProbeError::Transient(m) | ProbeError::Fatal(m) => m,
        }
    }
}

/// Invalid polling configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("poll interval must be greater than zero")]
    ZeroInterval,

    #[error("max_attempts must be at least 1")]
    ZeroAttempts,

    #[error("explicit timeout must be greater than zero")]
    ZeroTimeout,
}

/// A polling session that did not succeed, as a `Result` error.
#[derive(Debug, Clone, Error)]
pub enum PollError {
    #[error("{subject}: reached terminal status {status:?} after {attempts} attempt(s)")]
    TerminalStatus {
        subject: String,
        status: String,
        attempts: usize,
    },

    #[error("{subject}: probe failed after {attempts} attempt(s): {message}")]
    Fatal {
        subject: String,
        message: String,
        attempts: usize,
    },

    #[error("{subject}: timed out after {attempts} attempt(s) in {elapsed:?}; last: {last}")]
    Timeout {
        subject: String,
        attempts: usize,
        elapsed: Duration,
        last: String,
    },

    #[error("{subject}: cancelled after {attempts} attempt(s)")]
    Cancelled { subject: String, attempts: usize },
}
