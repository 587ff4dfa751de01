//! Deployment orchestration: trigger, dedupe, lock, run, record.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;

use crate::config::RolloutConfig;
use crate::context::AppContext;
use crate::history::{DeploymentOutcome, DeploymentRecord, HistoryStore};
use crate::lock::DeployLock;
use crate::remote::RemoteSession;
use crate::script::{self, DeployScript};
use crate::secrets::RemoteTarget;
use crate::trigger::{PushEvent, SkipReason, TriggerDecision};

#[derive(Debug, Clone, Copy, Default)]
pub struct DeployOptions {
    /// Render the script but do not open a session
    pub dry_run: bool,
    /// Deploy even if this commit already went out
    pub force: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeployStatus {
    Succeeded,
    Failed { exit_code: Option<i32> },
    SessionFailed { error: String },
    Skipped { reason: SkipReason },
    AlreadyDeployed { record_id: u64 },
    DryRun,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeployReport {
    #[serde(flatten)]
    pub status: DeployStatus,
    pub target: String,
    pub git_ref: String,
    pub commit: Option<String>,
    /// Session description, when one was opened
    pub session: Option<String>,
    /// Rendered script, when one was produced
    pub script: Option<String>,
    pub steps_reached: usize,
    pub total_steps: usize,
    /// History entry written for this run
    pub record_id: Option<u64>,
}

impl DeployReport {
    /// Whether the job should report failure.
    pub fn is_failure(&self) -> bool {
        matches!(
            self.status,
            DeployStatus::Failed { .. } | DeployStatus::SessionFailed { .. }
        )
    }
}

pub struct Deployer<'a> {
    config: &'a RolloutConfig,
    history: HistoryStore,
    lock_dir: PathBuf,
}

impl<'a> Deployer<'a> {
    pub fn new(config: &'a RolloutConfig, state_dir: &Path) -> Self {
        Self {
            config,
            history: HistoryStore::new(state_dir),
            lock_dir: state_dir.join("locks"),
        }
    }

    pub fn from_context(config: &'a RolloutConfig, ctx: &AppContext) -> Self {
        Self {
            config,
            history: ctx.history_store(),
            lock_dir: ctx.lock_dir(),
        }
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Run the deployment procedure for one push event.
    pub fn run(
        &self,
        event: &PushEvent,
        target: &RemoteTarget,
        session: &dyn RemoteSession,
        options: DeployOptions,
    ) -> anyhow::Result<DeployReport> {
        let deploy_script = DeployScript::from_config(&self.config.script, &target.project_path);
        let total_steps = deploy_script.steps().len();
        let mut report = DeployReport {
            status: DeployStatus::DryRun,
            target: target.display(),
            git_ref: event.git_ref.clone(),
            commit: event.after.clone(),
            session: None,
            script: None,
            steps_reached: 0,
            total_steps,
            record_id: None,
        };

        if let TriggerDecision::Skip(reason) = self.config.trigger.evaluate(event) {
            tracing::info!(
                git_ref = %event.git_ref,
                %reason,
                "push does not trigger a deployment"
            );
            report.status = DeployStatus::Skipped { reason };
            return Ok(report);
        }

        let target_key = target.key();
        let rendered = deploy_script.render();
        if options.dry_run {
            if let Some(record_id) = self.already_deployed(&target_key, event, options)? {
                report.status = DeployStatus::AlreadyDeployed { record_id };
            } else {
                report.script = Some(rendered);
            }
            return Ok(report);
        }

        // the dedupe check and the history append both happen under the lock
        let _lock = DeployLock::acquire(&self.lock_dir, &target_key)?;
        if let Some(record_id) = self.already_deployed(&target_key, event, options)? {
            report.status = DeployStatus::AlreadyDeployed { record_id };
            return Ok(report);
        }
        report.script = Some(rendered.clone());

        report.session = Some(session.describe());
        tracing::info!(
            destination = %report.target,
            commit = event.short_commit().unwrap_or("unknown"),
            session = %session.describe(),
            "starting deployment"
        );

        let started_at = Utc::now();
        let result = session.execute(&rendered);
        let finished_at = Utc::now();

        let (outcome, exit_code, error) = match &result {
            Ok(output) => {
                report.steps_reached = script::steps_reached(&output.stdout, total_steps);
                if output.success() {
                    report.status = DeployStatus::Succeeded;
                    (DeploymentOutcome::Succeeded, output.exit_code, None)
                } else {
                    report.status = DeployStatus::Failed {
                        exit_code: output.exit_code,
                    };
                    (DeploymentOutcome::Failed, output.exit_code, None)
                }
            }
            Err(err) => {
                report.status = DeployStatus::SessionFailed {
                    error: err.to_string(),
                };
                (DeploymentOutcome::SessionFailed, None, Some(err.to_string()))
            }
        };

        match outcome {
            DeploymentOutcome::Succeeded => tracing::info!(
                steps = report.steps_reached,
                total = total_steps,
                "deployment finished"
            ),
            _ => tracing::warn!(
                %outcome,
                exit_code = ?exit_code,
                steps = report.steps_reached,
                total = total_steps,
                "deployment did not succeed"
            ),
        }

        let record = DeploymentRecord {
            id: 0,
            target: report.target.clone(),
            git_ref: event.git_ref.clone(),
            commit: event.after.clone(),
            started_at,
            finished_at,
            outcome,
            exit_code,
            steps_reached: report.steps_reached,
            total_steps,
            error,
        };
        let id = self
            .history
            .append(&target_key, record, self.config.history.limit)?;
        report.record_id = Some(id);

        Ok(report)
    }

    /// Id of an earlier successful deployment of this commit, unless forced.
    fn already_deployed(
        &self,
        target_key: &str,
        event: &PushEvent,
        options: DeployOptions,
    ) -> anyhow::Result<Option<u64>> {
        if options.force {
            return Ok(None);
        }
        let Some(commit) = &event.after else {
            return Ok(None);
        };
        let previous = self.history.last_success_for(target_key, commit)?;
        if let Some(previous) = &previous {
            tracing::info!(
                commit = %commit,
                record = previous.id,
                "commit already deployed to this target, skipping"
            );
        }
        Ok(previous.map(|record| record.id))
    }
}
