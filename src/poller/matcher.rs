use serde::{Deserialize, Serialize};

/// Success and terminal-failure predicates over string statuses.
///
/// Comparison ignores ASCII case and surrounding whitespace, since `az ... -o tsv`
/// output carries a trailing newline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMatcher {
    pub success: Vec<String>,
    pub failure: Vec<String>,
}

impl StatusMatcher {
    pub fn new<I, J, A, B>(success: I, failure: J) -> Self
    where
        I: IntoIterator<Item = A>,
        J: IntoIterator<Item = B>,
        A: Into<String>,
        B: Into<String>,
    {
        Self {
            success: success.into_iter().map(Into::into).collect(),
            failure: failure.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_success(&self, status: &str) -> bool {
        contains(&self.success, status)
    }

    pub fn is_failure(&self, status: &str) -> bool {
        contains(&self.failure, status)
    }

    pub fn is_terminal(&self, status: &str) -> bool {
        self.is_success(status) || self.is_failure(status)
    }
}

fn contains(set: &[String], status: &str) -> bool {
    let status = status.trim();
    set.iter().any(|s| s.trim().eq_ignore_ascii_case(status))
}
