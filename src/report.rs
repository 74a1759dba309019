use crate::{
    poller::{PollOutcome, PollState},
    resource::ResourceKind,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub run_name: String,
    pub config_hash: String,
    pub started: String,
    pub finished: String,
    pub ok: bool,
    pub steps: Vec<StepReport>,
}

/// Summary of one polling session, in the order the run executed it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReport {
    pub step: String,
    pub subject: String,
    pub state: PollState,
    #[serde(default)]
    pub final_value: Option<serde_json::Value>,
    pub attempts: usize,
    pub elapsed_ms: u64,
    #[serde(default)]
    pub diagnostic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub samples: Option<serde_json::Value>,
}

impl StepReport {
    pub fn from_outcome<S: Serialize>(
        step: &str,
        subject: &str,
        outcome: &PollOutcome<S>,
        record_samples: bool,
    ) -> Self {
        let samples = if record_samples {
            serde_json::to_value(outcome.attempts()).ok()
        } else {
            None
        };
        Self {
            step: step.to_string(),
            subject: subject.to_string(),
            state: outcome.state(),
            final_value: outcome
                .final_value()
                .and_then(|v| serde_json::to_value(v).ok()),
            attempts: outcome.attempt_count(),
            elapsed_ms: u64::try_from(outcome.elapsed().as_millis()).unwrap_or(u64::MAX),
            diagnostic: outcome.last_diagnostic().map(str::to_string),
            samples,
        }
    }

    pub(crate) fn exhausted_names(base: &str, kind: ResourceKind, tried: u32) -> Self {
        Self {
            step: "resource.name".into(),
            subject: format!("{kind}/{base}"),
            state: PollState::Failed,
            final_value: None,
            attempts: usize::try_from(tried).unwrap_or(usize::MAX),
            elapsed_ms: 0,
            diagnostic: Some(format!("all {tried} candidate name(s) were unavailable")),
            samples: None,
        }
    }

    pub fn ok(&self) -> bool {
        self.state.is_success()
    }
}
