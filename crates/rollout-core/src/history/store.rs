//! History persistence in the state directory
//!
//! Layout: `<state_dir>/history/<target_key>.json`

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;

use super::types::{DeploymentHistory, DeploymentRecord};

#[derive(Debug, Clone)]
pub struct HistoryStore {
    dir: PathBuf,
}

impl HistoryStore {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            dir: state_dir.join("history"),
        }
    }

    pub fn history_path(&self, target_key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", target_key))
    }

    /// Load a target's history; a missing file is an empty history.
    pub fn load(&self, target_key: &str) -> anyhow::Result<DeploymentHistory> {
        let path = self.history_path(target_key);
        if !path.exists() {
            return Ok(DeploymentHistory::new());
        }

        let bytes = fs::read(&path)
            .with_context(|| format!("Failed to read history: {}", path.display()))?;
        let history: DeploymentHistory = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse history: {}", path.display()))?;
        history.validate()?;
        Ok(history)
    }

    /// Append a record, keeping at most `limit` records. Returns the record id.
    pub fn append(
        &self,
        target_key: &str,
        record: DeploymentRecord,
        limit: usize,
    ) -> anyhow::Result<u64> {
        let mut history = self.load(target_key)?;
        let id = history.push(record, limit);
        self.save(target_key, &history)?;
        Ok(id)
    }

    pub fn last_success_for(
        &self,
        target_key: &str,
        commit: &str,
    ) -> anyhow::Result<Option<DeploymentRecord>> {
        Ok(self.load(target_key)?.last_success_for(commit).cloned())
    }

    /// Save atomically (tmp + rename)
    fn save(&self, target_key: &str, history: &DeploymentHistory) -> anyhow::Result<()> {
        fs::create_dir_all(&self.dir).with_context(|| {
            format!("Failed to create history directory: {}", self.dir.display())
        })?;

        let path = self.history_path(target_key);
        let tmp_path = self
            .dir
            .join(format!("{}.json.{}.tmp", target_key, std::process::id()));

        let bytes = serde_json::to_vec_pretty(history).context("Failed to serialize history")?;
        fs::write(&tmp_path, bytes)
            .with_context(|| format!("Failed to write tmp history: {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &path)
            .with_context(|| format!("Failed to rename tmp history: {}", tmp_path.display()))?;

        tracing::debug!(path = %path.display(), records = history.records.len(), "history saved");
        Ok(())
    }
}
