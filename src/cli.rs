use crate::{
    backend::{azcli::CliBackend, Backend},
    config::Config,
    pipeline::{Pipeline, Stage},
    report::{RunReport, StepReport},
    util::ensure_dir,
};
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "arc-readiness")]
#[command(about = "Waits for Azure providers, Arc cluster connectivity, nodes and resources to become ready")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./arc-readiness.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Report whether az and kubectl are usable.
    Doctor {},
    /// Register resource providers and wait until they are registered.
    Providers {
        /// Provider namespaces; defaults to azure.providers.
        #[arg(long = "namespace")]
        namespaces: Vec<String>,
    },
    /// Connect the cluster to Arc and wait for connectivity and the OIDC issuer.
    Connect {},
    /// Wait for cluster nodes to report Ready.
    Nodes {},
    /// Create configured resources and wait for provisioning.
    Resources {},
    /// Run every stage and write a report.
    Run {
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
}

/// Returns `Ok(false)` when the command ran but some session did not succeed.
pub fn dispatch(args: Args) -> Result<bool> {
    let cfg_path = resolve_config_path(args.config.as_deref())?;
    let cfg = Config::load(&cfg_path)?;

    if let Command::Run { out_dir } = &args.cmd {
        return run(&args, &cfg, out_dir.as_deref());
    }

    let log_path = resolve_log_path(&cfg, None);
    let _guard = init_logging(&args, &cfg, log_path.as_deref())?;
    let pipeline = Pipeline::new(&cfg, CliBackend::new(&cfg)?);

    let steps = match &args.cmd {
        Command::Doctor {} => return doctor(pipeline.backend()),
        Command::Providers { namespaces } if !namespaces.is_empty() => {
            pipeline.providers(namespaces)?
        }
        Command::Providers { .. } => pipeline.run_stage(Stage::Providers)?,
        Command::Connect {} => pipeline.run_stage(Stage::Connect)?,
        Command::Nodes {} => pipeline.run_stage(Stage::Nodes)?,
        Command::Resources {} => pipeline.run_stage(Stage::Resources)?,
        Command::Run { .. } => pipeline.run(&Stage::ALL)?.steps,
    };

    print_steps(&steps)?;
    Ok(steps.iter().all(StepReport::ok))
}

fn resolve_config_path(user: Option<&Path>) -> Result<PathBuf> {
    if let Some(p) = user {
        return Ok(p.to_path_buf());
    }
    let default = PathBuf::from("arc-readiness.toml");
    if default.exists() {
        Ok(default)
    } else {
        Ok(PathBuf::from("arc-readiness.example.toml"))
    }
}

fn init_logging(args: &Args, cfg: &Config, file_path: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = match args.log_level.as_deref() {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(cfg.logging.level.as_str())),
    };

    let stdout_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed()
    };

    let (file_layer, guard) = if let Some(path) = file_path {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::File::create(path)
            .with_context(|| format!("create log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn doctor(backend: &dyn Backend) -> Result<bool> {
    let diag = backend.doctor()?;
    println!("{}", serde_json::to_string_pretty(&diag)?);
    Ok(diag.iter().all(|d| d.ok))
}

fn print_steps(steps: &[StepReport]) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(steps)?);
    Ok(())
}

fn run(args: &Args, cfg: &Config, out_override: Option<&Path>) -> Result<bool> {
    let out_root = out_override
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&cfg.paths.out_dir));
    ensure_dir(&out_root)?;

    let log_path = resolve_log_path(cfg, Some(&out_root));
    let _guard = init_logging(args, cfg, log_path.as_deref())?;

    let pipeline = Pipeline::new(cfg, CliBackend::new(cfg)?);
    let report = pipeline.run(&Stage::ALL)?;

    let run_dir = out_root.join(&report.run_id);
    ensure_dir(&run_dir)?;
    info!("run_id={} out={}", report.run_id, run_dir.display());

    if cfg.debug.dump_effective_config {
        let raw = toml::to_string(cfg).unwrap_or_default();
        std::fs::write(run_dir.join("effective-config.toml"), raw)?;
    }

    std::fs::write(
        run_dir.join("report.json"),
        serde_json::to_string_pretty(&report)?,
    )
    .with_context(|| format!("writing report to {}", run_dir.display()))?;

    if cfg.global.print_summary {
        print_summary(&report, &run_dir)?;
    }

    Ok(report.ok)
}

fn print_summary(report: &RunReport, run_dir: &Path) -> Result<()> {
    let failed: Vec<_> = report
        .steps
        .iter()
        .filter(|s| !s.ok())
        .map(|s| {
            serde_json::json!({
                "step": s.step,
                "subject": s.subject,
                "state": s.state,
                "diagnostic": s.diagnostic,
            })
        })
        .collect();
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "run_id": report.run_id,
            "run_dir": run_dir,
            "status": if report.ok { "ok" } else { "failed" },
            "steps": report.steps.len(),
            "failed": failed,
        }))?
    );
    Ok(())
}

fn resolve_log_path(cfg: &Config, out_dir: Option<&Path>) -> Option<PathBuf> {
    if !cfg.logging.write_to_file {
        return None;
    }

    if !cfg.logging.file_path.is_empty() {
        return Some(PathBuf::from(&cfg.logging.file_path));
    }

    if let Some(out_dir) = out_dir {
        return Some(out_dir.join("arc-readiness.log"));
    }

    Some(PathBuf::from(&cfg.paths.out_dir).join("arc-readiness.log"))
}
