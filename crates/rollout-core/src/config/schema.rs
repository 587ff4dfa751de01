//! Configuration schema for rollout.toml
//!
//! ```toml
//! [trigger]
//! branch = "main"
//!
//! [remote]
//! port = 22
//! project_path = "~/placement-bot"
//!
//! [script]
//! entrypoint = "app.py"
//! args = ["-d"]
//! ```
//!
//! Connection secrets (host, username, key) normally come from the
//! environment; the `[remote]` values are only fallbacks.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration structure for rollout.toml
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RolloutConfig {
    #[serde(default)]
    pub trigger: TriggerConfig,

    #[serde(default)]
    pub remote: RemoteConfig,

    #[serde(default)]
    pub script: ScriptConfig,

    #[serde(default)]
    pub history: HistoryConfig,
}

/// Which pushes start a deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// Branch whose pushes are deployed
    #[serde(default = "default_branch")]
    pub branch: String,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            branch: default_branch(),
        }
    }
}

/// Remote host settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Host address (overridden by DEPLOY_HOST)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Login user (overridden by DEPLOY_USERNAME)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Project checkout on the remote host (overridden by DEPLOY_PROJECT_PATH)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_path: Option<String>,

    /// Private key file on the runner (overridden by DEPLOY_SSH_KEY_PATH)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_path: Option<PathBuf>,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Seconds allowed for the SSH handshake
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Overall limit for the whole session; unlimited when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// Value passed as `-o StrictHostKeyChecking=...`
    #[serde(default = "default_host_key_checking")]
    pub strict_host_key_checking: String,

    /// Extra `-o` options handed to ssh verbatim
    #[serde(default)]
    pub ssh_options: Vec<String>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: None,
            username: None,
            project_path: None,
            key_path: None,
            port: default_port(),
            connect_timeout_secs: default_connect_timeout(),
            timeout_secs: None,
            strict_host_key_checking: default_host_key_checking(),
            ssh_options: Vec::new(),
        }
    }
}

/// Commands of the remote deployment script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptConfig {
    /// Git remote to pull from
    #[serde(default = "default_git_remote")]
    pub remote: String,

    /// Branch to pull
    #[serde(default = "default_branch")]
    pub branch: String,

    /// Virtual environment directory, relative to the project path
    #[serde(default = "default_venv_dir")]
    pub venv_dir: String,

    /// Interpreter used to create the virtual environment
    #[serde(default = "default_python")]
    pub python: String,

    #[serde(default = "default_pip")]
    pub pip: String,

    #[serde(default = "default_requirements")]
    pub requirements: String,

    /// Interpreter used to launch the application (inside the venv)
    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    #[serde(default = "default_entrypoint")]
    pub entrypoint: String,

    #[serde(default = "default_args")]
    pub args: Vec<String>,

    /// Abort on the first failing command (`set -e`)
    #[serde(default)]
    pub strict: bool,

    /// Print a progress marker before every step
    #[serde(default = "default_true")]
    pub announce_steps: bool,

    #[serde(default = "default_completion_message")]
    pub completion_message: String,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            remote: default_git_remote(),
            branch: default_branch(),
            venv_dir: default_venv_dir(),
            python: default_python(),
            pip: default_pip(),
            requirements: default_requirements(),
            interpreter: default_interpreter(),
            entrypoint: default_entrypoint(),
            args: default_args(),
            strict: false,
            announce_steps: true,
            completion_message: default_completion_message(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Number of records kept per target
    #[serde(default = "default_history_limit")]
    pub limit: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            limit: default_history_limit(),
        }
    }
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_port() -> u16 {
    22
}

fn default_connect_timeout() -> u64 {
    15
}

fn default_host_key_checking() -> String {
    "accept-new".to_string()
}

fn default_git_remote() -> String {
    "origin".to_string()
}

fn default_venv_dir() -> String {
    ".venv".to_string()
}

fn default_python() -> String {
    "python3".to_string()
}

fn default_pip() -> String {
    "pip".to_string()
}

fn default_requirements() -> String {
    "requirements.txt".to_string()
}

fn default_interpreter() -> String {
    "python".to_string()
}

fn default_entrypoint() -> String {
    "app.py".to_string()
}

fn default_args() -> Vec<String> {
    vec!["-d".to_string()]
}

fn default_true() -> bool {
    true
}

fn default_completion_message() -> String {
    "Deployment finished".to_string()
}

fn default_history_limit() -> usize {
    50
}

impl RolloutConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        require_non_empty("trigger.branch", &self.trigger.branch)?;

        if self.remote.port == 0 {
            anyhow::bail!("remote.port must be greater than zero");
        }
        if self.remote.connect_timeout_secs == 0 {
            anyhow::bail!("remote.connect_timeout_secs must be greater than zero");
        }
        if self.remote.timeout_secs == Some(0) {
            anyhow::bail!("remote.timeout_secs must be greater than zero when set");
        }
        require_non_empty(
            "remote.strict_host_key_checking",
            &self.remote.strict_host_key_checking,
        )?;

        let script = &self.script;
        require_non_empty("script.remote", &script.remote)?;
        require_non_empty("script.branch", &script.branch)?;
        require_non_empty("script.venv_dir", &script.venv_dir)?;
        require_non_empty("script.python", &script.python)?;
        require_non_empty("script.pip", &script.pip)?;
        require_non_empty("script.requirements", &script.requirements)?;
        require_non_empty("script.interpreter", &script.interpreter)?;
        require_non_empty("script.entrypoint", &script.entrypoint)?;

        if self.history.limit == 0 {
            anyhow::bail!("history.limit must be greater than zero");
        }

        Ok(())
    }
}

fn require_non_empty(field: &str, value: &str) -> anyhow::Result<()> {
    if value.trim().is_empty() {
        anyhow::bail!("{} cannot be empty", field);
    }
    Ok(())
}
