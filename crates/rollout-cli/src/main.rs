//! Rollout - push-to-main deployment runner
//!
//! Usage:
//!   rollout deploy --event "$GITHUB_EVENT_PATH"   # CI job entry point
//!   rollout deploy --branch main --commit <sha>   # manual run
//!   rollout script                                # print the remote script
//!   rollout check                                 # validate config and secrets
//!   rollout history                               # recent deployments

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use console::style;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rollout_core::config::{RemoteConfig, RolloutConfig};
use rollout_core::history::{DeploymentOutcome, DeploymentRecord};
use rollout_core::prelude::*;
use rollout_core::secrets::{
    ENV_HOST, ENV_PROJECT_PATH, ENV_SSH_KEY, ENV_SSH_KEY_PATH, ENV_USERNAME, SecretsError,
};

#[derive(Parser)]
#[command(name = "rollout")]
#[command(about = "Deploy a Python app over SSH when main is pushed", long_about = None)]
struct Cli {
    /// Configuration file (default: ./rollout.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory for history and locks
    #[arg(long, global = true, value_name = "DIR")]
    state_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the deployment for a push event
    ///
    /// The event comes from --event, then --branch, then the GITHUB_*
    /// variables of the CI runner.
    Deploy {
        /// Push webhook payload (e.g. $GITHUB_EVENT_PATH)
        #[arg(long, value_name = "FILE", conflicts_with = "branch")]
        event: Option<PathBuf>,

        /// Branch for a manual run
        #[arg(long)]
        branch: Option<String>,

        /// Commit for a manual run
        #[arg(long, requires = "branch")]
        commit: Option<String>,

        /// Run the script on this machine instead of over SSH
        #[arg(long)]
        local: bool,

        /// Print what would run without opening a session
        #[arg(long)]
        dry_run: bool,

        /// Deploy even if the commit already went out
        #[arg(long)]
        force: bool,

        /// Output format
        #[arg(short = 'f', long, default_value = "table")]
        format: OutputFormat,
    },

    /// Print the remote script for the configured target
    Script,

    /// Validate configuration and deployment secrets
    Check {
        /// Output format
        #[arg(short = 'f', long, default_value = "table")]
        format: OutputFormat,
    },

    /// Show recent deployments to the configured target
    History {
        /// Number of entries to show
        #[arg(long, short = 'n', default_value_t = 10)]
        limit: usize,

        /// Output format
        #[arg(short = 'f', long, default_value = "table")]
        format: OutputFormat,
    },

    /// Write a default rollout.toml
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// Machine-readable JSON
    Json,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rollout=info,rollout_core=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let ctx = AppContext::with_defaults(cli.config, cli.state_dir)?;

    match cli.command {
        Commands::Deploy {
            event,
            branch,
            commit,
            local,
            dry_run,
            force,
            format,
        } => {
            let event = resolve_event(event, branch, commit)?;
            let report = run_deploy(&ctx, &event, local, DeployOptions { dry_run, force })?;
            print_report(&report, format)?;
            if report.is_failure() {
                std::process::exit(1);
            }
        }
        Commands::Script => run_script(&ctx)?,
        Commands::Check { format } => {
            if !run_check(&ctx, format)? {
                std::process::exit(1);
            }
        }
        Commands::History { limit, format } => run_history(&ctx, limit, format)?,
        Commands::Init { force } => run_init(&ctx, force)?,
    }

    Ok(())
}

fn resolve_event(
    event: Option<PathBuf>,
    branch: Option<String>,
    commit: Option<String>,
) -> Result<PushEvent> {
    if let Some(path) = event {
        return PushEvent::from_payload_file(&path);
    }
    if let Some(branch) = branch {
        return Ok(PushEvent::manual(&branch, commit));
    }
    PushEvent::from_env(|key| std::env::var(key).ok())
}

fn load_config(ctx: &AppContext) -> Result<RolloutConfig> {
    ctx.config_store()
        .load()
        .with_context(|| format!("Failed to load {}", ctx.config_path().display()))
}

/// Local runs default host and user to this machine when nothing is configured.
fn local_remote_config(config: &RemoteConfig) -> RemoteConfig {
    let mut remote = config.clone();
    if remote.host.is_none() && std::env::var(ENV_HOST).is_err() {
        remote.host = Some("localhost".to_string());
    }
    if remote.username.is_none() && std::env::var(ENV_USERNAME).is_err() {
        remote.username = std::env::var("USER").ok();
    }
    remote
}

fn run_deploy(
    ctx: &AppContext,
    event: &PushEvent,
    local: bool,
    options: DeployOptions,
) -> Result<DeployReport> {
    let config = load_config(ctx)?;
    let timeout = config.remote.timeout_secs.map(Duration::from_secs);

    let deployer = Deployer::from_context(&config, ctx);
    if local {
        let target = RemoteTarget::from_env(&local_remote_config(&config.remote))?;
        let session = LocalSession::new().with_timeout(timeout);
        deployer.run(event, &target, &session, options)
    } else {
        let target = RemoteTarget::from_env(&config.remote)?;
        let session = SshSession::new(target.clone(), &config.remote);
        deployer.run(event, &target, &session, options)
    }
}

fn run_script(ctx: &AppContext) -> Result<()> {
    let config = load_config(ctx)?;
    let project_path = std::env::var(ENV_PROJECT_PATH)
        .ok()
        .filter(|path| !path.is_empty())
        .or_else(|| config.remote.project_path.clone())
        .ok_or_else(|| SecretsError::Missing(vec![ENV_PROJECT_PATH.to_string()]))?;

    print!(
        "{}",
        DeployScript::from_config(&config.script, &project_path).render()
    );
    Ok(())
}

/// Returns false when the runner could not deploy.
fn run_check(ctx: &AppContext, format: OutputFormat) -> Result<bool> {
    let config = load_config(ctx);
    let target = match &config {
        Ok(config) => Some(RemoteTarget::from_env(&config.remote)),
        Err(_) => None,
    };
    let ok = config.is_ok() && matches!(target, Some(Ok(_)));

    match format {
        OutputFormat::Json => {
            let resolved = target.as_ref().and_then(|t| t.as_ref().ok());
            let secrets_error = target.as_ref().and_then(|t| t.as_ref().err());
            let output = serde_json::json!({
                "config_path": ctx.config_path().display().to_string(),
                "config_exists": ctx.config_store().exists(),
                "config_error": config.as_ref().err().map(|e| format!("{e:#}")),
                "target": resolved.map(|t| t.display()),
                "identity": resolved.map(|t| t.identity.describe()),
                "secrets_error": secrets_error.map(|e| e.to_string()),
                "ok": ok,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Table => {
            let source = if ctx.config_store().exists() {
                ctx.config_path().display().to_string()
            } else {
                format!("{} (not found, using defaults)", ctx.config_path().display())
            };
            println!("{:<12} {}", "Config", source);
            match &config {
                Ok(config) => {
                    println!("{:<12} {}", "Trigger", config.trigger.branch);
                    println!(
                        "{:<12} {}",
                        "Strict",
                        if config.script.strict { "yes" } else { "no" }
                    );
                }
                Err(err) => println!("{:<12} {}", "Error", style(format!("{err:#}")).red()),
            }
            match &target {
                Some(Ok(target)) => {
                    println!("{:<12} {}", "Target", target.display());
                    println!("{:<12} {}", "Identity", target.identity.describe());
                }
                Some(Err(err)) => println!("{:<12} {}", "Secrets", style(err).red()),
                None => {}
            }
            if std::env::var(ENV_SSH_KEY).is_err() && std::env::var(ENV_SSH_KEY_PATH).is_err() {
                println!(
                    "{:<12} {}",
                    "Note",
                    style(format!(
                        "neither {ENV_SSH_KEY} nor {ENV_SSH_KEY_PATH} is set"
                    ))
                    .dim()
                );
            }
            println!();
            if ok {
                println!("{}", style("Ready to deploy").green());
            } else {
                println!("{}", style("Not ready to deploy").red());
            }
        }
    }

    Ok(ok)
}

fn run_history(ctx: &AppContext, limit: usize, format: OutputFormat) -> Result<()> {
    let config = load_config(ctx)?;
    let target = RemoteTarget::from_env(&config.remote)?;
    let history = ctx.history_store().load(&target.key())?;
    let records: Vec<&DeploymentRecord> = history.recent(limit).collect();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&records)?),
        OutputFormat::Table => {
            if records.is_empty() {
                println!("No deployments to {} yet", target.display());
                return Ok(());
            }
            println!(
                "{:<6} {:<20} {:<10} {:<15} {:<8} Steps",
                "ID", "Started", "Commit", "Outcome", "Time"
            );
            for record in records {
                let commit = record
                    .commit
                    .as_deref()
                    .map(|sha| sha.get(..7).unwrap_or(sha))
                    .unwrap_or("-");
                let outcome = format!("{:<15}", record.outcome.to_string());
                let outcome = match record.outcome {
                    DeploymentOutcome::Succeeded => style(outcome).green(),
                    _ => style(outcome).red(),
                };
                println!(
                    "{:<6} {:<20} {:<10} {} {:<8} {}/{}",
                    record.id,
                    record.started_at.format("%Y-%m-%d %H:%M:%S"),
                    commit,
                    outcome,
                    format!("{}s", record.duration_secs()),
                    record.steps_reached,
                    record.total_steps
                );
            }
        }
    }
    Ok(())
}

fn run_init(ctx: &AppContext, force: bool) -> Result<()> {
    let store = ctx.config_store();
    if store.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            store.config_path().display()
        );
    }
    store.save(&RolloutConfig::default())?;
    println!(
        "{} Wrote {}",
        style("✓").green(),
        store.config_path().display()
    );
    Ok(())
}

fn print_report(report: &DeployReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        OutputFormat::Table => {
            let commit = report.commit.as_deref().unwrap_or("unknown");
            println!("{:<10} {}", "Target", report.target);
            println!("{:<10} {} @ {}", "Ref", report.git_ref, commit);
            if let Some(session) = &report.session {
                println!("{:<10} {}", "Session", session);
            }
            println!("{:<10} {}", "Status", status_line(&report.status));
            if matches!(
                report.status,
                DeployStatus::Succeeded | DeployStatus::Failed { .. }
            ) {
                println!(
                    "{:<10} {}/{}",
                    "Steps", report.steps_reached, report.total_steps
                );
            }
            if let (DeployStatus::DryRun, Some(script)) = (&report.status, &report.script) {
                println!();
                print!("{}", script);
            }
        }
    }
    Ok(())
}

fn status_line(status: &DeployStatus) -> String {
    match status {
        DeployStatus::Succeeded => style("deployed").green().to_string(),
        DeployStatus::Failed { exit_code } => style(match exit_code {
            Some(code) => format!("failed (exit code {code})"),
            None => "failed (terminated by signal)".to_string(),
        })
        .red()
        .to_string(),
        DeployStatus::SessionFailed { error } => {
            style(format!("session failed: {error}")).red().to_string()
        }
        DeployStatus::Skipped { reason } => {
            style(format!("skipped: {reason}")).yellow().to_string()
        }
        DeployStatus::AlreadyDeployed { record_id } => {
            format!("already deployed (record #{record_id})")
        }
        DeployStatus::DryRun => style("dry run").cyan().to_string(),
    }
}
