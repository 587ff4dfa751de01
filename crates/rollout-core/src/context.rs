//! Application context shared by the CLI commands.

use std::path::{Path, PathBuf};

use crate::config::{ConfigStore, config_path_for};
use crate::history::HistoryStore;

/// Paths the runner works with.
///
/// Frontends create this once and hand it to commands.
#[derive(Debug, Clone)]
pub struct AppContext {
    project_root: PathBuf,
    state_dir: PathBuf,
    config_path: PathBuf,
}

impl AppContext {
    /// Create a new context with explicit paths.
    pub fn new(project_root: PathBuf, state_dir: PathBuf, config_path: PathBuf) -> Self {
        Self {
            project_root,
            state_dir,
            config_path,
        }
    }

    /// Context for the current directory and the default state directory.
    ///
    /// Either path can be overridden.
    pub fn with_defaults(
        config_path: Option<PathBuf>,
        state_dir: Option<PathBuf>,
    ) -> anyhow::Result<Self> {
        let project_root = std::env::current_dir()?;
        let config_path = config_path.unwrap_or_else(|| config_path_for(&project_root));
        let state_dir = match state_dir {
            Some(dir) => dir,
            None => Self::default_state_dir()?,
        };
        Ok(Self::new(project_root, state_dir, config_path))
    }

    /// `$XDG_STATE_HOME/rollout`, falling back to the local data directory.
    pub fn default_state_dir() -> anyhow::Result<PathBuf> {
        let base = dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .ok_or_else(|| anyhow::anyhow!("Cannot determine state directory"))?;
        Ok(base.join("rollout"))
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn config_store(&self) -> ConfigStore {
        ConfigStore::from_path(self.config_path.clone())
    }

    pub fn history_store(&self) -> HistoryStore {
        HistoryStore::new(&self.state_dir)
    }

    pub fn lock_dir(&self) -> PathBuf {
        self.state_dir.join("locks")
    }
}
