//! Config store for loading and saving rollout.toml.

use std::path::{Path, PathBuf};

use anyhow::Context;

use super::{RolloutConfig, parser, paths::config_path_for};

#[derive(Debug, Clone)]
pub struct ConfigStore {
    config_path: PathBuf,
}

impl ConfigStore {
    /// Store for `rollout.toml` in the given project root.
    pub fn for_project(project_root: &Path) -> Self {
        Self::from_path(config_path_for(project_root))
    }

    pub fn from_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn exists(&self) -> bool {
        self.config_path.exists()
    }

    /// Load the config; a missing file yields the defaults.
    pub fn load(&self) -> anyhow::Result<RolloutConfig> {
        if !self.config_path.exists() {
            tracing::debug!(
                path = %self.config_path.display(),
                "config file not found, using defaults"
            );
            return Ok(RolloutConfig::new());
        }
        parser::parse_rollout_toml(&self.config_path)
    }

    pub fn save(&self, config: &RolloutConfig) -> anyhow::Result<()> {
        let content = parser::to_toml(config).context("Failed to serialize config to TOML")?;
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        std::fs::write(&self.config_path, content).with_context(|| {
            format!(
                "Failed to write config file: {}",
                self.config_path.display()
            )
        })?;
        Ok(())
    }
}
