//! SSH session backed by the system `ssh` client.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::NamedTempFile;
use tokio::process::Command;

use super::{RemoteSession, SessionError, SessionOutput, process};
use crate::config::RemoteConfig;
use crate::secrets::{Identity, RemoteTarget, SecretString};

/// Exit status ssh uses for its own failures (connect, auth, host key).
pub const SSH_CONNECT_FAILURE: i32 = 255;

#[derive(Debug, Clone)]
pub struct SshSession {
    target: RemoteTarget,
    program: PathBuf,
    connect_timeout_secs: u64,
    strict_host_key_checking: String,
    extra_options: Vec<String>,
    timeout: Option<Duration>,
}

impl SshSession {
    pub fn new(target: RemoteTarget, config: &RemoteConfig) -> Self {
        Self {
            target,
            program: PathBuf::from("ssh"),
            connect_timeout_secs: config.connect_timeout_secs,
            strict_host_key_checking: config.strict_host_key_checking.clone(),
            extra_options: config.ssh_options.clone(),
            timeout: config.timeout_secs.map(Duration::from_secs),
        }
    }

    /// Use a different ssh binary.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn target(&self) -> &RemoteTarget {
        &self.target
    }

    /// Arguments passed to ssh; the script itself goes to stdin.
    pub fn args(&self, key_file: Option<&Path>) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("StrictHostKeyChecking={}", self.strict_host_key_checking),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout_secs),
        ];
        for option in &self.extra_options {
            args.push("-o".to_string());
            args.push(option.clone());
        }
        args.push("-p".to_string());
        args.push(self.target.port.to_string());
        if let Some(key) = key_file {
            args.push("-i".to_string());
            args.push(key.display().to_string());
            args.push("-o".to_string());
            args.push("IdentitiesOnly=yes".to_string());
        }
        args.push(self.target.destination());
        args.push("bash".to_string());
        args.push("-s".to_string());
        args
    }

    /// Write key material to a private temp file that lives as long as the guard.
    fn write_key_material(material: &SecretString) -> Result<NamedTempFile, SessionError> {
        let mut file = tempfile::Builder::new()
            .prefix("rollout-key-")
            .tempfile()
            .map_err(SessionError::KeyMaterial)?;
        let mut content = material.expose().replace("\r\n", "\n");
        // ssh rejects keys without a trailing newline
        if !content.ends_with('\n') {
            content.push('\n');
        }
        file.write_all(content.as_bytes())
            .and_then(|_| file.flush())
            .map_err(SessionError::KeyMaterial)?;
        Ok(file)
    }
}

impl RemoteSession for SshSession {
    fn describe(&self) -> String {
        format!(
            "ssh {}:{} ({})",
            self.target.destination(),
            self.target.port,
            self.target.identity.describe()
        )
    }

    fn execute(&self, script: &str) -> Result<SessionOutput, SessionError> {
        let key_guard = match &self.target.identity {
            Identity::KeyMaterial(material) => Some(Self::write_key_material(material)?),
            _ => None,
        };
        let key_path = match (&self.target.identity, &key_guard) {
            (Identity::KeyMaterial(_), Some(file)) => Some(file.path().to_path_buf()),
            (Identity::KeyFile(path), _) => Some(path.clone()),
            _ => None,
        };

        let mut command = Command::new(&self.program);
        command.args(self.args(key_path.as_deref()));

        tracing::info!(session = %self.describe(), "opening remote session");
        let program = self.program.display().to_string();
        let output = process::run_script(command, &program, script, self.timeout)?;
        drop(key_guard);

        // 255 is also a valid script exit status; only a silent 255 means ssh itself failed
        if output.exit_code == Some(SSH_CONNECT_FAILURE) && output.stdout.trim().is_empty() {
            let stderr = output.stderr.trim().to_string();
            tracing::warn!(%stderr, "ssh could not establish the session");
            return Err(SessionError::Connect {
                code: SSH_CONNECT_FAILURE,
                stderr,
            });
        }

        Ok(output)
    }
}
