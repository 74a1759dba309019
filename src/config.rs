use crate::resource::ResourceKind;
use anyhow::{anyhow, Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub global: Global,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub polling: Polling,
    #[serde(default)]
    pub tools: Tools,
    #[serde(default)]
    pub azure: Azure,
    #[serde(default)]
    pub kubernetes: Kubernetes,
    #[serde(default)]
    pub resources: Vec<ResourceEntry>,
    #[serde(default)]
    pub classification: Classification,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub debug: Debug,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        cfg.validate()
            .with_context(|| format!("invalid config: {}", path.display()))?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.polling.interval_seconds == 0 {
            return Err(anyhow!("polling.interval_seconds must be > 0"));
        }
        if self.polling.max_attempts == 0 {
            return Err(anyhow!("polling.max_attempts must be >= 1"));
        }
        for (name, over) in self.polling.overrides() {
            if over.interval_seconds == Some(0) {
                return Err(anyhow!("polling.{name}.interval_seconds must be > 0"));
            }
            if over.max_attempts == Some(0) {
                return Err(anyhow!("polling.{name}.max_attempts must be >= 1"));
            }
        }
        if self.polling.max_parallel_sessions == 0 {
            return Err(anyhow!("polling.max_parallel_sessions must be >= 1"));
        }
        for (name, patterns) in self.classification.pattern_sets() {
            for p in patterns {
                Regex::new(p)
                    .with_context(|| format!("classification.{name}: bad regex {p:?}"))?;
            }
        }
        for r in &self.resources {
            if r.name.trim().is_empty() {
                return Err(anyhow!("resources: entry of kind {} has an empty name", r.kind));
            }
            if r.max_name_attempts == 0 {
                return Err(anyhow!("resources.{}: max_name_attempts must be >= 1", r.name));
            }
        }
        Ok(())
    }

    /// A stable, normalization-friendly string for hashing.
    pub fn normalized_for_hash(&self) -> String {
        toml::to_string(self).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Global {
    pub run_name: String,
    pub print_summary: bool,
    /// Stop sibling sessions as soon as one fails.
    pub fail_fast: bool,
}
impl Default for Global {
    fn default() -> Self {
        Self {
            run_name: "default".into(),
            print_summary: true,
            fail_fast: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paths {
    pub out_dir: String,
}
impl Default for Paths {
    fn default() -> Self {
        Self {
            out_dir: "out".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Polling {
    pub interval_seconds: u64,
    pub max_attempts: u32,
    /// 0 means `interval_seconds * max_attempts`.
    pub timeout_seconds: u64,
    pub max_parallel_sessions: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub providers: Option<PollOverride>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<PollOverride>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oidc: Option<PollOverride>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<PollOverride>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<PollOverride>,
}
impl Default for Polling {
    fn default() -> Self {
        Self {
            interval_seconds: 10,
            max_attempts: 30,
            timeout_seconds: 0,
            max_parallel_sessions: 1,
            providers: None,
            cluster: None,
            oidc: None,
            nodes: None,
            resources: None,
        }
    }
}

impl Polling {
    fn overrides(&self) -> impl Iterator<Item = (&'static str, &PollOverride)> {
        [
            ("providers", self.providers.as_ref()),
            ("cluster", self.cluster.as_ref()),
            ("oidc", self.oidc.as_ref()),
            ("nodes", self.nodes.as_ref()),
            ("resources", self.resources.as_ref()),
        ]
        .into_iter()
        .filter_map(|(name, o)| o.map(|o| (name, o)))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOverride {
    #[serde(default)]
    pub interval_seconds: Option<u64>,
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tools {
    pub az_exe: String,
    pub kubectl_exe: String,
    /// Passed as `KUBECONFIG` when non-empty.
    pub kubeconfig: String,
    pub command_timeout_seconds: u64,
    /// Applies to `connectedk8s connect` and resource creation.
    pub long_command_timeout_seconds: u64,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}
impl Default for Tools {
    fn default() -> Self {
        Self {
            az_exe: "az".into(),
            kubectl_exe: "kubectl".into(),
            kubeconfig: "".into(),
            command_timeout_seconds: 120,
            long_command_timeout_seconds: 900,
            env: Default::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Azure {
    pub subscription_id: String,
    pub resource_group: String,
    pub location: String,
    pub cluster_name: String,
    pub providers: Vec<String>,
    pub provider_success_states: Vec<String>,
    pub provider_failure_states: Vec<String>,
    pub connect_cluster: bool,
    pub enable_oidc_issuer: bool,
    pub cluster_success_states: Vec<String>,
    pub cluster_failure_states: Vec<String>,
    pub resource_success_states: Vec<String>,
    pub resource_failure_states: Vec<String>,
}
impl Default for Azure {
    fn default() -> Self {
        Self {
            subscription_id: "".into(),
            resource_group: "".into(),
            location: "eastus".into(),
            cluster_name: "".into(),
            providers: vec![
                "Microsoft.ExtendedLocation".into(),
                "Microsoft.Kubernetes".into(),
                "Microsoft.KubernetesConfiguration".into(),
                "Microsoft.IoTOperations".into(),
                "Microsoft.DeviceRegistry".into(),
                "Microsoft.SecretSyncController".into(),
            ],
            provider_success_states: vec!["Registered".into()],
            provider_failure_states: vec!["Failed".into()],
            connect_cluster: true,
            enable_oidc_issuer: true,
            cluster_success_states: vec!["Connected".into()],
            cluster_failure_states: vec!["Expired".into(), "Failed".into()],
            resource_success_states: vec!["Succeeded".into()],
            resource_failure_states: vec!["Failed".into(), "Canceled".into()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Kubernetes {
    pub min_ready_nodes: u32,
}
impl Default for Kubernetes {
    fn default() -> Self {
        Self { min_ready_nodes: 1 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceEntry {
    pub kind: ResourceKind,
    pub name: String,
    #[serde(default = "default_max_name_attempts")]
    pub max_name_attempts: u32,
}

fn default_max_name_attempts() -> u32 {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub fatal_patterns: Vec<String>,
    pub transient_patterns: Vec<String>,
    pub not_found_patterns: Vec<String>,
    pub conflict_patterns: Vec<String>,
    pub unknown_is_transient: bool,
}
impl Default for Classification {
    fn default() -> Self {
        Self {
            fatal_patterns: vec![
                "(?i)please run 'az login'".into(),
                "AuthorizationFailed".into(),
                "InvalidAuthenticationToken".into(),
                "(?i)subscription .* (could not be found|doesn't exist)".into(),
                "SubscriptionNotFound".into(),
                "(?i)unauthorized".into(),
                "(?i)forbidden".into(),
            ],
            transient_patterns: vec![
                "(?i)timed? ?out".into(),
                "(?i)connection (reset|refused|aborted)".into(),
                "(?i)was refused".into(),
                "(?i)temporary failure".into(),
                "TooManyRequests".into(),
                "\\b(429|500|502|503|504)\\b".into(),
                "(?i)service ?unavailable".into(),
                "(?i)unable to connect to the server".into(),
                "(?i)tls handshake".into(),
            ],
            not_found_patterns: vec![
                "ResourceNotFound".into(),
                "\\(NotFound\\)".into(),
                "(?i)was not found".into(),
                "(?i)could not be found".into(),
            ],
            conflict_patterns: vec![
                "AlreadyExists".into(),
                "VaultAlreadyExists".into(),
                "StorageAccountAlreadyTaken".into(),
                "(?i)already (exists|taken|in use)".into(),
                "(?i)is not available".into(),
            ],
            unknown_is_transient: true,
        }
    }
}

impl Classification {
    pub(crate) fn pattern_sets(&self) -> [(&'static str, &[String]); 4] {
        [
            ("fatal_patterns", self.fatal_patterns.as_slice()),
            ("transient_patterns", self.transient_patterns.as_slice()),
            ("not_found_patterns", self.not_found_patterns.as_slice()),
            ("conflict_patterns", self.conflict_patterns.as_slice()),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: true,
            file_path: "".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Debug {
    pub keep_command_stderr: bool,
    pub dump_effective_config: bool,
    /// Include every sample in the run report, not just the summary.
    pub record_samples: bool,
}
impl Default for Debug {
    fn default() -> Self {
        Self {
            keep_command_stderr: true,
            dump_effective_config: true,
            record_samples: true,
        }
    }
}
