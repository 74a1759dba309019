use crate::{error::PollError, error::ProbeError, util::now_rfc3339};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// One observation made by the poller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSample<S> {
    /// 1-based.
    pub attempt: u32,
    pub value: Option<S>,
    pub observed_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl<S> StatusSample<S> {
    pub(crate) fn observed(attempt: u32, value: S) -> Self {
        Self {
            attempt,
            value: Some(value),
            observed_at: now_rfc3339(),
            raw: None,
        }
    }

    pub(crate) fn errored(attempt: u32, err: &ProbeError) -> Self {
        Self {
            attempt,
            value: None,
            observed_at: now_rfc3339(),
            raw: Some(err.message().to_string()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.value.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PollState {
    Succeeded,
    TimedOut,
    Failed,
    Cancelled,
}

impl PollState {
    pub fn is_success(self) -> bool {
        self == PollState::Succeeded
    }
}

impl fmt::Display for PollState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PollState::Succeeded => "succeeded",
            PollState::TimedOut => "timed_out",
            PollState::Failed => "failed",
            PollState::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Terminal result of one polling session.
#[derive(Debug, Clone, Serialize)]
pub struct PollOutcome<S> {
    state: PollState,
    attempts: Vec<StatusSample<S>>,
    #[serde(with = "millis")]
    elapsed: Duration,
}

impl<S> PollOutcome<S> {
    pub(crate) fn new(state: PollState, attempts: Vec<StatusSample<S>>, elapsed: Duration) -> Self {
        Self {
            state,
            attempts,
            elapsed,
        }
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    pub fn is_success(&self) -> bool {
        self.state.is_success()
    }

    pub fn attempts(&self) -> &[StatusSample<S>] {
        &self.attempts
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.len()
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Last status value the probe actually returned.
    pub fn final_value(&self) -> Option<&S> {
        self.attempts.iter().rev().find_map(|s| s.value.as_ref())
    }

    /// Error text of the last sample, when that sample was a probe error.
    pub fn last_diagnostic(&self) -> Option<&str> {
        self.attempts.last().and_then(|s| s.raw.as_deref())
    }
}

impl<S: Clone + fmt::Display> PollOutcome<S> {
    pub fn into_result(self, subject: &str) -> Result<S, PollError> {
        let attempts = self.attempts.len();
        let last_value = self.final_value().cloned();
        let subject = subject.to_string();

        match self.state {
            PollState::Succeeded => last_value.ok_or_else(|| PollError::Fatal {
                subject,
                message: "succeeded without a status value".into(),
                attempts,
            }),
            PollState::Failed => match self.attempts.last() {
                Some(StatusSample { value: None, raw, .. }) => Err(PollError::Fatal {
                    subject,
                    message: raw.clone().unwrap_or_default(),
                    attempts,
                }),
                _ => Err(PollError::TerminalStatus {
                    subject,
                    status: last_value.map(|v| v.to_string()).unwrap_or_default(),
                    attempts,
                }),
            },
            PollState::TimedOut => {
                let last = match self.attempts.last() {
                    Some(StatusSample {
                        value: Some(v), ..
                    }) => v.to_string(),
                    Some(StatusSample { raw: Some(r), .. }) => r.clone(),
                    _ => String::new(),
                };
                Err(PollError::Timeout {
                    subject,
                    attempts,
                    elapsed: self.elapsed,
                    last,
                })
            }
            PollState::Cancelled => Err(PollError::Cancelled { subject, attempts }),
        }
    }
}

mod millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }
}
