//! History record types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const HISTORY_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentOutcome {
    /// The session finished with exit status 0
    Succeeded,
    /// The script ran but exited non-zero
    Failed,
    /// The session could not be established or did not finish
    SessionFailed,
}

impl fmt::Display for DeploymentOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DeploymentOutcome::Succeeded => "succeeded",
            DeploymentOutcome::Failed => "failed",
            DeploymentOutcome::SessionFailed => "session failed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    /// Sequence number within the target's history
    pub id: u64,
    /// `user@host:path`
    pub target: String,
    pub git_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: DeploymentOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    pub steps_reached: usize,
    pub total_steps: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeploymentRecord {
    pub fn duration_secs(&self) -> i64 {
        (self.finished_at - self.started_at).num_seconds()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentHistory {
    pub version: u32,
    /// Oldest first
    #[serde(default)]
    pub records: Vec<DeploymentRecord>,
}

impl Default for DeploymentHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl DeploymentHistory {
    pub fn new() -> Self {
        Self {
            version: HISTORY_VERSION,
            records: Vec::new(),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.version != HISTORY_VERSION {
            anyhow::bail!(
                "Unsupported history version {} (expected {})",
                self.version,
                HISTORY_VERSION
            );
        }
        Ok(())
    }

    pub fn next_id(&self) -> u64 {
        self.records.last().map(|r| r.id + 1).unwrap_or(1)
    }

    /// Append a record and keep only the newest `limit` entries.
    pub fn push(&mut self, mut record: DeploymentRecord, limit: usize) -> u64 {
        let id = self.next_id();
        record.id = id;
        self.records.push(record);
        if self.records.len() > limit {
            let excess = self.records.len() - limit;
            self.records.drain(..excess);
        }
        id
    }

    /// Most recent successful deployment of `commit`.
    pub fn last_success_for(&self, commit: &str) -> Option<&DeploymentRecord> {
        self.records.iter().rev().find(|record| {
            record.outcome == DeploymentOutcome::Succeeded
                && record.commit.as_deref() == Some(commit)
        })
    }

    /// Newest first.
    pub fn recent(&self, limit: usize) -> impl Iterator<Item = &DeploymentRecord> {
        self.records.iter().rev().take(limit)
    }
}
