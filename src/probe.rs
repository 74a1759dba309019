use crate::{backend::process::CommandError, config::Classification, error::ProbeError};
use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureClass {
    Fatal,
    Transient,
    NotFound,
    Conflict,
}

/// Sorts CLI failures into retry classes by matching stderr.
///
/// Fatal patterns win over everything else, so an auth failure that also
/// mentions "not found" still ends the session.
#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    fatal: Vec<Regex>,
    transient: Vec<Regex>,
    not_found: Vec<Regex>,
    conflict: Vec<Regex>,
    unknown_is_transient: bool,
}

impl ErrorClassifier {
    pub fn from_config(cfg: &Classification) -> Result<Self> {
        Ok(Self {
            fatal: compile(&cfg.fatal_patterns).with_context(|| "fatal_patterns")?,
            transient: compile(&cfg.transient_patterns).with_context(|| "transient_patterns")?,
            not_found: compile(&cfg.not_found_patterns).with_context(|| "not_found_patterns")?,
            conflict: compile(&cfg.conflict_patterns).with_context(|| "conflict_patterns")?,
            unknown_is_transient: cfg.unknown_is_transient,
        })
    }

    pub fn classify(&self, text: &str) -> FailureClass {
        if matches_any(&self.fatal, text) {
            FailureClass::Fatal
        } else if matches_any(&self.not_found, text) {
            FailureClass::NotFound
        } else if matches_any(&self.conflict, text) {
            FailureClass::Conflict
        } else if matches_any(&self.transient, text) || self.unknown_is_transient {
            FailureClass::Transient
        } else {
            FailureClass::Fatal
        }
    }

    /// Classifies a failed command. Missing executables are always fatal and
    /// command timeouts always transient.
    pub fn classify_command(&self, err: &CommandError) -> FailureClass {
        match err {
            CommandError::Spawn { .. } => FailureClass::Fatal,
            CommandError::TimedOut { .. } => FailureClass::Transient,
            CommandError::Exit { .. } | CommandError::Io { .. } => self.classify(err.diagnostic()),
        }
    }

    /// Maps a failure to a probe error for callers with no use for
    /// not-found or conflict results; both count as fatal there.
    pub fn to_probe_error(&self, err: &CommandError) -> ProbeError {
        match self.classify_command(err) {
            FailureClass::Transient => ProbeError::Transient(err.to_string()),
            FailureClass::Fatal | FailureClass::NotFound | FailureClass::Conflict => {
                ProbeError::Fatal(err.to_string())
            }
        }
    }
}

fn compile(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| Regex::new(p).with_context(|| format!("bad regex {p:?}")))
        .collect()
}

fn matches_any(set: &[Regex], text: &str) -> bool {
    set.iter().any(|re| re.is_match(text))
}
