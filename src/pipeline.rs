use crate::{
    backend::Backend,
    config::{Config, PollOverride},
    drivers::{self, Session},
    policy::PollPolicy,
    poller::{CancelToken, StatusMatcher},
    report::{RunReport, StepReport},
    util::{now_rfc3339, sha256_hex},
};
use anyhow::{anyhow, Result};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Nodes,
    Providers,
    Connect,
    Resources,
}

impl Stage {
    /// Order the full run executes stages in.
    pub const ALL: [Stage; 4] = [Stage::Nodes, Stage::Providers, Stage::Connect, Stage::Resources];
}

pub struct Pipeline<B: Backend> {
    cfg: Config,
    backend: B,
    cancel: CancelToken,
}

impl<B: Backend + Sync> Pipeline<B> {
    pub fn new(cfg: &Config, backend: B) -> Self {
        Self {
            cfg: cfg.clone(),
            backend,
            cancel: CancelToken::new(),
        }
    }

    /// Token shared by every session this pipeline starts.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn session(&self, over: Option<&PollOverride>) -> Result<Session<'_>> {
        let policy = PollPolicy::from_config(&self.cfg, over)?;
        Ok(Session::new(policy, Some(&self.cancel)))
    }

    /// Cancels sibling sessions when fail-fast is on and a step failed.
    fn settle(&self, steps: &[StepReport]) {
        if self.cfg.global.fail_fast && steps.iter().any(|s| !s.ok()) {
            self.cancel.cancel();
        }
    }

    pub fn run_stage(&self, stage: Stage) -> Result<Vec<StepReport>> {
        match stage {
            Stage::Nodes => self.nodes(),
            Stage::Providers => self.providers(&self.cfg.azure.providers),
            Stage::Connect => self.connect(),
            Stage::Resources => self.resources(),
        }
    }

    /// Runs the given stages in order and collects every step.
    pub fn run(&self, stages: &[Stage]) -> Result<RunReport> {
        let started = now_rfc3339();
        let config_hash = sha256_hex(self.cfg.normalized_for_hash().as_bytes());
        let run_id = sha256_hex(format!("{config_hash}:{started}").as_bytes())[..16].to_string();
        info!("run_id={run_id} stages={stages:?}");

        let mut steps = Vec::new();
        for &stage in stages {
            if self.cancel.is_cancelled() {
                warn!("skipping {stage:?}: run cancelled");
                break;
            }
            let stage_steps = self.run_stage(stage)?;
            let failed = stage_steps.iter().any(|s| !s.ok());
            steps.extend(stage_steps);
            if failed && self.cfg.global.fail_fast {
                warn!("{stage:?} failed; stopping");
                break;
            }
        }

        let ok = !steps.is_empty() && steps.iter().all(StepReport::ok);
        Ok(RunReport {
            run_id,
            run_name: self.cfg.global.run_name.clone(),
            config_hash,
            started,
            finished: now_rfc3339(),
            ok,
            steps,
        })
    }

    pub fn nodes(&self) -> Result<Vec<StepReport>> {
        let session = self.session(self.cfg.polling.nodes.as_ref())?;
        let outcome =
            drivers::wait_nodes_ready(&self.backend, &session, self.cfg.kubernetes.min_ready_nodes);
        let steps = vec![StepReport::from_outcome(
            "nodes.wait",
            "cluster",
            &outcome,
            self.cfg.debug.record_samples,
        )];
        self.settle(&steps);
        Ok(steps)
    }

    /// Registers providers, running up to `max_parallel_sessions` at once.
    /// Steps come back in the order of `namespaces`.
    pub fn providers(&self, namespaces: &[String]) -> Result<Vec<StepReport>> {
        let session = self.session(self.cfg.polling.providers.as_ref())?;
        let matcher = StatusMatcher::new(
            &self.cfg.azure.provider_success_states,
            &self.cfg.azure.provider_failure_states,
        );
        let width = self.cfg.polling.max_parallel_sessions.max(1);

        let mut steps = Vec::new();
        for batch in namespaces.chunks(width) {
            let results = std::thread::scope(|scope| {
                let handles: Vec<_> = batch
                    .iter()
                    .map(|ns| {
                        let session = &session;
                        let matcher = &matcher;
                        scope.spawn(move || self.provider(ns, session, matcher))
                    })
                    .collect();
                handles
                    .into_iter()
                    .map(|h| h.join().map_err(|_| anyhow!("provider session panicked")))
                    .collect::<Result<Vec<_>>>()
            })?;
            for r in results {
                steps.extend(r);
            }
        }
        Ok(steps)
    }

    fn provider(&self, namespace: &str, session: &Session<'_>, matcher: &StatusMatcher) -> Vec<StepReport> {
        let record = self.cfg.debug.record_samples;
        let submit = drivers::submit(session, &format!("register {namespace}"), || {
            self.backend.register_provider(namespace)
        });
        let mut steps = vec![StepReport::from_outcome("provider.register", namespace, &submit, record)];
        if submit.is_success() {
            let wait = drivers::wait_provider_registered(&self.backend, namespace, session, matcher);
            steps.push(StepReport::from_outcome("provider.wait", namespace, &wait, record));
        }
        self.settle(&steps);
        steps
    }

    pub fn connect(&self) -> Result<Vec<StepReport>> {
        let record = self.cfg.debug.record_samples;
        let subject = self.cfg.azure.cluster_name.clone();
        let mut steps = Vec::new();

        if self.cfg.azure.connect_cluster {
            let session = self.session(self.cfg.polling.cluster.as_ref())?;
            let matcher = StatusMatcher::new(
                &self.cfg.azure.cluster_success_states,
                &self.cfg.azure.cluster_failure_states,
            );
            let submit = drivers::submit(&session, "connect cluster", || self.backend.connect_cluster());
            steps.push(StepReport::from_outcome("cluster.connect", &subject, &submit, record));
            if !submit.is_success() {
                self.settle(&steps);
                return Ok(steps);
            }
            let wait = drivers::wait_cluster_connected(&self.backend, &session, &matcher);
            steps.push(StepReport::from_outcome("cluster.wait", &subject, &wait, record));
            if !wait.is_success() {
                self.settle(&steps);
                return Ok(steps);
            }
        }

        if self.cfg.azure.enable_oidc_issuer {
            let session = self.session(self.cfg.polling.oidc.as_ref())?;
            let oidc = drivers::wait_oidc_issuer(&self.backend, &session);
            steps.push(StepReport::from_outcome("oidc.wait", &subject, &oidc, record));
        }
        self.settle(&steps);
        Ok(steps)
    }

    pub fn resources(&self) -> Result<Vec<StepReport>> {
        let session = self.session(self.cfg.polling.resources.as_ref())?;
        let matcher = StatusMatcher::new(
            &self.cfg.azure.resource_success_states,
            &self.cfg.azure.resource_failure_states,
        );

        let mut steps = Vec::new();
        for entry in &self.cfg.resources {
            if self.cancel.is_cancelled() {
                break;
            }
            let ensured = drivers::ensure_resource(
                &self.backend,
                entry,
                &session,
                &matcher,
                self.cfg.debug.record_samples,
            );
            if let Some(name) = &ensured.name {
                info!("{} {} ready as {name}", entry.kind, entry.name);
            }
            self.settle(&ensured.steps);
            steps.extend(ensured.steps);
        }
        Ok(steps)
    }
}
