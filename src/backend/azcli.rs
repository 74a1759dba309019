use super::{
    process::{CommandError, CommandRunner},
    types::parse_node_list,
    Backend, CreateResult, NodeReadiness, ToolDiag,
};
use crate::{
    config::Config,
    error::ProbeError,
    probe::{ErrorClassifier, FailureClass},
    resource::ResourceKind,
};
use anyhow::Result;
use std::time::Duration;
use tracing::{debug, info};

/// [`Backend`] backed by the `az` and `kubectl` executables.
#[derive(Debug, Clone)]
pub struct CliBackend {
    cfg: Config,
    runner: CommandRunner,
    classifier: ErrorClassifier,
    long_timeout: Option<Duration>,
}

impl CliBackend {
    pub fn new(cfg: &Config) -> Result<Self> {
        let classifier = ErrorClassifier::from_config(&cfg.classification)?;
        let runner = CommandRunner::new(&cfg.tools, cfg.debug.keep_command_stderr);
        let long_timeout = (cfg.tools.long_command_timeout_seconds > 0)
            .then(|| Duration::from_secs(cfg.tools.long_command_timeout_seconds));
        Ok(Self {
            cfg: cfg.clone(),
            runner,
            classifier,
            long_timeout,
        })
    }

    fn az(&self, args: &[&str]) -> Result<String, CommandError> {
        self.az_owned(args.iter().map(|s| s.to_string()).collect(), false)
    }

    fn az_owned(&self, mut args: Vec<String>, long: bool) -> Result<String, CommandError> {
        let sub = self.cfg.azure.subscription_id.trim();
        if !sub.is_empty() {
            args.push("--subscription".into());
            args.push(sub.to_string());
        }
        let out = if long {
            self.runner
                .run_with_timeout(&self.cfg.tools.az_exe, &args, self.long_timeout)?
        } else {
            self.runner.run(&self.cfg.tools.az_exe, &args)?
        };
        Ok(out.stdout)
    }

    fn kubectl(&self, args: &[&str]) -> Result<String, CommandError> {
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        Ok(self.runner.run(&self.cfg.tools.kubectl_exe, &args)?.stdout)
    }

    fn probe_err(&self, err: &CommandError) -> ProbeError {
        self.classifier.to_probe_error(err)
    }

    /// Runs a `show`-style query, mapping not-found failures to `None`.
    fn query_optional(&self, args: Vec<String>) -> Result<Option<String>, ProbeError> {
        match self.az_owned(args, false) {
            Ok(out) => Ok(tsv_value(&out)),
            Err(err) => match self.classifier.classify_command(&err) {
                FailureClass::NotFound => Ok(None),
                _ => Err(self.probe_err(&err)),
            },
        }
    }

    fn cluster(&self) -> Result<(&str, &str), ProbeError> {
        let name = required("azure.cluster_name", &self.cfg.azure.cluster_name)?;
        let rg = required("azure.resource_group", &self.cfg.azure.resource_group)?;
        Ok((name, rg))
    }

    fn tool_diag(&self, name: &str, exe: &str, result: Result<String, CommandError>) -> ToolDiag {
        let (ok, version, error) = match result {
            Ok(v) => (true, Some(v), None),
            Err(e) => (false, None, Some(e.to_string())),
        };
        ToolDiag {
            name: name.to_string(),
            exe: exe.to_string(),
            ok,
            version,
            error,
        }
    }
}

impl Backend for CliBackend {
    fn doctor(&self) -> Result<Vec<ToolDiag>> {
        let az = self
            .runner
            .run(&self.cfg.tools.az_exe, &strings(&["version", "-o", "json"]))
            .map(|out| json_version(&out.stdout, &["azure-cli"]));
        let kubectl = self
            .runner
            .run(
                &self.cfg.tools.kubectl_exe,
                &strings(&["version", "--client", "-o", "json"]),
            )
            .map(|out| json_version(&out.stdout, &["clientVersion", "gitVersion"]));

        Ok(vec![
            self.tool_diag("az", &self.cfg.tools.az_exe, az),
            self.tool_diag("kubectl", &self.cfg.tools.kubectl_exe, kubectl),
        ])
    }

    fn register_provider(&self, namespace: &str) -> Result<(), ProbeError> {
        info!("registering provider {namespace}");
        self.az(&["provider", "register", "--namespace", namespace, "-o", "none"])
            .map(|_| ())
            .map_err(|e| self.probe_err(&e))
    }

    fn provider_state(&self, namespace: &str) -> Result<String, ProbeError> {
        let out = self
            .az(&[
                "provider",
                "show",
                "--namespace",
                namespace,
                "--query",
                "registrationState",
                "-o",
                "tsv",
            ])
            .map_err(|e| self.probe_err(&e))?;
        tsv_value(&out).ok_or_else(|| {
            ProbeError::Transient(format!("empty registrationState for {namespace}"))
        })
    }

    fn connect_cluster(&self) -> Result<(), ProbeError> {
        let (name, rg) = self.cluster()?;
        let location = required("azure.location", &self.cfg.azure.location)?;
        info!("connecting cluster {name} in {rg}/{location}");
        let mut args = strings(&[
            "connectedk8s",
            "connect",
            "--name",
            name,
            "--resource-group",
            rg,
            "--location",
            location,
        ]);
        if self.cfg.azure.enable_oidc_issuer {
            args.extend(strings(&["--enable-oidc-issuer", "--enable-workload-identity"]));
        }
        args.extend(strings(&["-o", "none"]));

        match self.az_owned(args, true) {
            Ok(_) => Ok(()),
            Err(err) => match self.classifier.classify_command(&err) {
                FailureClass::Conflict => {
                    debug!("cluster {name} already connected: {}", err.diagnostic());
                    Ok(())
                }
                _ => Err(self.probe_err(&err)),
            },
        }
    }

    fn cluster_connectivity(&self) -> Result<Option<String>, ProbeError> {
        let (name, rg) = self.cluster()?;
        self.query_optional(strings(&[
            "connectedk8s",
            "show",
            "--name",
            name,
            "--resource-group",
            rg,
            "--query",
            "connectivityStatus",
            "-o",
            "tsv",
        ]))
    }

    fn oidc_issuer_url(&self) -> Result<Option<String>, ProbeError> {
        let (name, rg) = self.cluster()?;
        self.query_optional(strings(&[
            "connectedk8s",
            "show",
            "--name",
            name,
            "--resource-group",
            rg,
            "--query",
            "oidcIssuerProfile.issuerUrl",
            "-o",
            "tsv",
        ]))
    }

    fn node_readiness(&self) -> Result<NodeReadiness, ProbeError> {
        let out = self
            .kubectl(&["get", "nodes", "-o", "json"])
            .map_err(|e| self.probe_err(&e))?;
        // A half-started API server can return truncated output.
        parse_node_list(&out)
            .map_err(|e| ProbeError::Transient(format!("parsing kubectl nodes JSON: {e}")))
    }

    fn resource_state(&self, kind: ResourceKind, name: &str) -> Result<Option<String>, ProbeError> {
        let rg = required("azure.resource_group", &self.cfg.azure.resource_group)?;
        self.query_optional(kind.show_args(name, rg))
    }

    fn create_resource(&self, kind: ResourceKind, name: &str) -> Result<CreateResult, ProbeError> {
        let rg = required("azure.resource_group", &self.cfg.azure.resource_group)?;
        let location = required("azure.location", &self.cfg.azure.location)?;
        info!("creating {kind} {name}");
        match self.az_owned(kind.create_args(name, rg, location), true) {
            Ok(_) => Ok(CreateResult::Created),
            Err(err) => match self.classifier.classify_command(&err) {
                FailureClass::Conflict => {
                    Ok(CreateResult::NameConflict(err.diagnostic().to_string()))
                }
                _ => Err(self.probe_err(&err)),
            },
        }
    }
}

fn required<'a>(key: &str, value: &'a str) -> Result<&'a str, ProbeError> {
    let v = value.trim();
    if v.is_empty() {
        return Err(ProbeError::Fatal(format!("{key} is not set")));
    }
    Ok(v)
}

/// `az -o tsv` prints `None` or nothing for null fields.
fn tsv_value(raw: &str) -> Option<String> {
    let v = raw.trim();
    if v.is_empty() || v == "None" || v == "null" {
        None
    } else {
        Some(v.to_string())
    }
}

fn json_version(raw: &str, path: &[&str]) -> String {
    let parsed: serde_json::Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(_) => return raw.trim().to_string(),
    };
    let mut cur = &parsed;
    for key in path {
        match cur.get(key) {
            Some(next) => cur = next,
            None => return "unknown".into(),
        }
    }
    cur.as_str().map(str::to_string).unwrap_or_else(|| cur.to_string())
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
