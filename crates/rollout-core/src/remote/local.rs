//! Session that runs the script on the current machine.

use std::path::PathBuf;
use std::time::Duration;

use tokio::process::Command;

use super::{RemoteSession, SessionError, SessionOutput, process};

/// Runs the script with a local `bash -s`, for targets on the runner itself.
#[derive(Debug, Clone)]
pub struct LocalSession {
    shell: PathBuf,
    working_dir: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl LocalSession {
    pub fn new() -> Self {
        Self {
            shell: PathBuf::from("bash"),
            working_dir: None,
            timeout: None,
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_shell(mut self, shell: impl Into<PathBuf>) -> Self {
        self.shell = shell.into();
        self
    }
}

impl Default for LocalSession {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteSession for LocalSession {
    fn describe(&self) -> String {
        format!("local {}", self.shell.display())
    }

    fn execute(&self, script: &str) -> Result<SessionOutput, SessionError> {
        let mut command = Command::new(&self.shell);
        command.arg("-s");
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let program = self.shell.display().to_string();
        process::run_script(command, &program, script, self.timeout)
    }
}
