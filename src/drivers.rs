//! Polling sessions for each provisioning stage.
//!
//! Every driver is a probe plus predicates handed to [`Poller`]; none of them
//! loop on their own.

use crate::{
    backend::{Backend, CreateResult, NodeReadiness},
    config::ResourceEntry,
    error::ProbeError,
    policy::PollPolicy,
    poller::{CancelToken, PollOutcome, Poller, StatusMatcher, TracingObserver},
    report::StepReport,
    resource::ResourceKind,
};
use std::fmt;
use tracing::{info, warn};

/// Status recorded for objects that do not exist yet.
pub const ABSENT: &str = "Absent";
pub const ACCEPTED: &str = "Accepted";
pub const CONFLICT: &str = "Conflict";

/// Policy and cancellation shared by the sessions of one stage.
#[derive(Debug, Clone, Copy)]
pub struct Session<'a> {
    pub policy: PollPolicy,
    pub cancel: Option<&'a CancelToken>,
}

impl<'a> Session<'a> {
    pub fn new(policy: PollPolicy, cancel: Option<&'a CancelToken>) -> Self {
        Self { policy, cancel }
    }

    fn run<S, P, T, X>(&self, subject: &str, probe: P, is_terminal: T, is_success: X) -> PollOutcome<S>
    where
        S: fmt::Display,
        P: FnMut() -> Result<S, ProbeError>,
        T: Fn(&S) -> bool,
        X: Fn(&S) -> bool,
    {
        let observer = TracingObserver::new(subject, &self.policy);
        let mut poller = Poller::<S>::new(self.policy).with_observer(&observer);
        if let Some(token) = self.cancel {
            poller = poller.with_cancel(token);
        }
        let outcome = poller.poll(probe, is_terminal, is_success);
        log_outcome(subject, &outcome);
        outcome
    }
}

fn log_outcome<S: fmt::Display>(subject: &str, outcome: &PollOutcome<S>) {
    let last = outcome
        .final_value()
        .map(|v| v.to_string())
        .unwrap_or_default();
    if outcome.is_success() {
        info!(
            "{subject}: {} after {} attempt(s) in {:?} ({last})",
            outcome.state(),
            outcome.attempt_count(),
            outcome.elapsed()
        );
    } else {
        warn!(
            "{subject}: {} after {} attempt(s) in {:?} (last={last:?} diag={:?})",
            outcome.state(),
            outcome.attempt_count(),
            outcome.elapsed(),
            outcome.last_diagnostic().unwrap_or("")
        );
    }
}

/// Runs a kick-off command, retrying only transient failures.
pub fn submit<F>(session: &Session<'_>, subject: &str, mut action: F) -> PollOutcome<String>
where
    F: FnMut() -> Result<(), ProbeError>,
{
    session.run(
        subject,
        || action().map(|()| ACCEPTED.to_string()),
        |_| true,
        |_| true,
    )
}

pub fn wait_provider_registered<B: Backend + ?Sized>(
    backend: &B,
    namespace: &str,
    session: &Session<'_>,
    matcher: &StatusMatcher,
) -> PollOutcome<String> {
    session.run(
        &format!("provider {namespace}"),
        || backend.provider_state(namespace),
        |s| matcher.is_terminal(s),
        |s| matcher.is_success(s),
    )
}

pub fn wait_cluster_connected<B: Backend + ?Sized>(
    backend: &B,
    session: &Session<'_>,
    matcher: &StatusMatcher,
) -> PollOutcome<String> {
    session.run(
        "cluster connectivity",
        || {
            backend
                .cluster_connectivity()
                .map(|s| s.unwrap_or_else(|| ABSENT.to_string()))
        },
        |s| matcher.is_terminal(s),
        |s| matcher.is_success(s),
    )
}

/// Waits until the connected cluster publishes an OIDC issuer URL.
pub fn wait_oidc_issuer<B: Backend + ?Sized>(backend: &B, session: &Session<'_>) -> PollOutcome<String> {
    session.run(
        "oidc issuer",
        || {
            backend
                .oidc_issuer_url()
                .map(|s| s.unwrap_or_else(|| ABSENT.to_string()))
        },
        |s| s != ABSENT,
        |s| s != ABSENT,
    )
}

pub fn wait_nodes_ready<B: Backend + ?Sized>(
    backend: &B,
    session: &Session<'_>,
    min_ready: u32,
) -> PollOutcome<NodeReadiness> {
    session.run(
        "node readiness",
        || backend.node_readiness(),
        |n: &NodeReadiness| n.all_ready(min_ready),
        |n: &NodeReadiness| n.all_ready(min_ready),
    )
}

pub fn wait_resource_provisioned<B: Backend + ?Sized>(
    backend: &B,
    kind: ResourceKind,
    name: &str,
    session: &Session<'_>,
    matcher: &StatusMatcher,
) -> PollOutcome<String> {
    session.run(
        &format!("{kind} {name}"),
        || {
            backend
                .resource_state(kind, name)
                .map(|s| s.unwrap_or_else(|| ABSENT.to_string()))
        },
        |s| matcher.is_terminal(s),
        |s| matcher.is_success(s),
    )
}

/// Result of making sure one configured resource exists.
#[derive(Debug, Clone)]
pub struct EnsuredResource {
    /// Name the resource ended up with, if any candidate worked.
    pub name: Option<String>,
    pub steps: Vec<StepReport>,
}

impl EnsuredResource {
    pub fn ok(&self) -> bool {
        self.name.is_some() && self.steps.iter().all(StepReport::ok)
    }
}

/// Finds or creates the resource, moving to a suffixed name whenever the
/// current candidate is taken, then waits for it to finish provisioning.
pub fn ensure_resource<B: Backend + ?Sized>(
    backend: &B,
    entry: &ResourceEntry,
    session: &Session<'_>,
    matcher: &StatusMatcher,
    record_samples: bool,
) -> EnsuredResource {
    let kind = entry.kind;
    let mut steps = Vec::new();

    for attempt in 0..entry.max_name_attempts {
        let name = kind.candidate_name(&entry.name, attempt);
        let subject = format!("{kind}/{name}");

        let lookup = session.run(
            &format!("lookup {subject}"),
            || {
                backend
                    .resource_state(kind, &name)
                    .map(|s| s.unwrap_or_else(|| ABSENT.to_string()))
            },
            |_| true,
            |_| true,
        );
        steps.push(StepReport::from_outcome("resource.lookup", &subject, &lookup, record_samples));
        if !lookup.is_success() {
            return EnsuredResource { name: None, steps };
        }

        let existing = lookup.final_value().is_some_and(|s| s != ABSENT);
        if existing {
            info!("{subject} already exists; reusing");
        } else {
            let create = session.run(
                &format!("create {subject}"),
                || {
                    backend.create_resource(kind, &name).map(|r| match r {
                        CreateResult::Created => ACCEPTED.to_string(),
                        CreateResult::NameConflict(_) => CONFLICT.to_string(),
                    })
                },
                |_| true,
                |_| true,
            );
            steps.push(StepReport::from_outcome("resource.create", &subject, &create, record_samples));
            if !create.is_success() {
                return EnsuredResource { name: None, steps };
            }
            if create.final_value().is_some_and(|s| s == CONFLICT) {
                warn!("{subject}: name unavailable, trying next candidate");
                continue;
            }
        }

        let ready = wait_resource_provisioned(backend, kind, &name, session, matcher);
        steps.push(StepReport::from_outcome("resource.wait", &subject, &ready, record_samples));
        let name = ready.is_success().then_some(name);
        return EnsuredResource { name, steps };
    }

    warn!(
        "{kind} {}: no available name after {} candidate(s)",
        entry.name, entry.max_name_attempts
    );
    steps.push(StepReport::exhausted_names(&entry.name, kind, entry.max_name_attempts));
    EnsuredResource { name: None, steps }
}
