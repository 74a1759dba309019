//! Poll-until-ready primitive.
//!
//! A session calls a read-only probe at a fixed interval until the status it
//! returns satisfies the success predicate, hits a terminal failure, or the
//! policy's attempt budget runs out. The poller never logs or prints; callers
//! attach a [`PollObserver`] for progress reporting.

mod cancel;
mod matcher;
mod outcome;

pub use cancel::CancelToken;
pub use matcher::StatusMatcher;
pub use outcome::{PollOutcome, PollState, StatusSample};

use crate::{error::ProbeError, policy::PollPolicy};
use std::fmt;
use std::time::Instant;
use tracing::{debug, warn};

/// Receives every sample right after the poller records it.
pub trait PollObserver<S> {
    fn on_sample(&self, sample: &StatusSample<S>);
}

impl<S, F> PollObserver<S> for F
where
    F: Fn(&StatusSample<S>),
{
    fn on_sample(&self, sample: &StatusSample<S>) {
        self(sample)
    }
}

/// Logs each sample through `tracing`, tagged with the subject being polled.
#[derive(Debug, Clone)]
pub struct TracingObserver {
    subject: String,
    max_attempts: u32,
}

impl TracingObserver {
    pub fn new(subject: impl Into<String>, policy: &PollPolicy) -> Self {
        Self {
            subject: subject.into(),
            max_attempts: policy.max_attempts(),
        }
    }
}

impl<S: fmt::Display> PollObserver<S> for TracingObserver {
    fn on_sample(&self, sample: &StatusSample<S>) {
        match (&sample.value, &sample.raw) {
            (Some(v), _) => debug!(
                subject = %self.subject,
                attempt = sample.attempt,
                max_attempts = self.max_attempts,
                status = %v,
                "poll sample"
            ),
            (None, raw) => warn!(
                subject = %self.subject,
                attempt = sample.attempt,
                max_attempts = self.max_attempts,
                error = raw.as_deref().unwrap_or(""),
                "poll probe error"
            ),
        }
    }
}

/// One configured polling session.
pub struct Poller<'a, S> {
    policy: PollPolicy,
    cancel: Option<&'a CancelToken>,
    observer: Option<&'a dyn PollObserver<S>>,
}

impl<'a, S> Poller<'a, S> {
    pub fn new(policy: PollPolicy) -> Self {
        Self {
            policy,
            cancel: None,
            observer: None,
        }
    }

    pub fn with_cancel(mut self, token: &'a CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_observer(mut self, observer: &'a dyn PollObserver<S>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Runs the session to completion, blocking the calling thread.
    pub fn poll<P, T, X>(&self, mut probe: P, is_terminal: T, is_success: X) -> PollOutcome<S>
    where
        P: FnMut() -> Result<S, ProbeError>,
        T: Fn(&S) -> bool,
        X: Fn(&S) -> bool,
    {
        let started = Instant::now();
        let max_attempts = self.policy.max_attempts();
        let mut samples = Vec::new();

        for attempt in 1..=max_attempts {
            if self.cancelled() {
                return PollOutcome::new(PollState::Cancelled, samples, started.elapsed());
            }

            let (verdict, sample) = match probe() {
                Ok(status) => {
                    let verdict = if is_success(&status) {
                        Some(PollState::Succeeded)
                    } else if is_terminal(&status) {
                        Some(PollState::Failed)
                    } else {
                        None
                    };
                    (verdict, StatusSample::observed(attempt, status))
                }
                Err(err) => {
                    let verdict = (!err.is_retryable()).then_some(PollState::Failed);
                    (verdict, StatusSample::errored(attempt, &err))
                }
            };

            if let Some(observer) = self.observer {
                observer.on_sample(&sample);
            }
            samples.push(sample);

            if let Some(state) = verdict {
                return PollOutcome::new(state, samples, started.elapsed());
            }
            if attempt == max_attempts {
                break;
            }
            if let Some(limit) = self.policy.explicit_timeout() {
                if started.elapsed() + self.policy.interval() > limit {
                    break;
                }
            }
            if self.sleep() {
                return PollOutcome::new(PollState::Cancelled, samples, started.elapsed());
            }
        }

        PollOutcome::new(PollState::TimedOut, samples, started.elapsed())
    }

    fn cancelled(&self) -> bool {
        self.cancel.is_some_and(CancelToken::is_cancelled)
    }

    /// Returns `true` if the sleep was cut short by cancellation.
    fn sleep(&self) -> bool {
        match self.cancel {
            Some(token) => token.sleep(self.policy.interval()),
            None => {
                std::thread::sleep(self.policy.interval());
                false
            }
        }
    }
}

/// Polls `probe` under `policy` with no cancellation or observer attached.
pub fn poll<S, P, T, X>(probe: P, is_terminal: T, is_success: X, policy: &PollPolicy) -> PollOutcome<S>
where
    P: FnMut() -> Result<S, ProbeError>,
    T: Fn(&S) -> bool,
    X: Fn(&S) -> bool,
{
    Poller::new(*policy).poll(probe, is_terminal, is_success)
}
