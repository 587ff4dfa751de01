#![allow(dead_code)]

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use rollout_core::remote::{RemoteSession, SessionError, SessionOutput};
use rollout_core::secrets::{Identity, RemoteTarget};

/// Session that records scripts instead of running them.
pub struct RecordingSession {
    pub scripts: RefCell<Vec<String>>,
    respond: Box<dyn Fn(&str) -> Result<SessionOutput, SessionError>>,
}

impl RecordingSession {
    /// Every run exits 0 and prints all step markers found in the script.
    pub fn succeeding() -> Self {
        Self::with(|script| {
            Ok(SessionOutput {
                exit_code: Some(0),
                stdout: echoed_markers(script),
                stderr: String::new(),
            })
        })
    }

    pub fn with<F>(respond: F) -> Self
    where
        F: Fn(&str) -> Result<SessionOutput, SessionError> + 'static,
    {
        Self {
            scripts: RefCell::new(Vec::new()),
            respond: Box::new(respond),
        }
    }

    pub fn calls(&self) -> usize {
        self.scripts.borrow().len()
    }
}

impl RemoteSession for RecordingSession {
    fn describe(&self) -> String {
        "recording".to_string()
    }

    fn execute(&self, script: &str) -> Result<SessionOutput, SessionError> {
        self.scripts.borrow_mut().push(script.to_string());
        (self.respond)(script)
    }
}

/// What `echo '==> [i/N] ...'` lines would print.
pub fn echoed_markers(script: &str) -> String {
    script
        .lines()
        .filter_map(|line| line.strip_prefix("echo '==> ["))
        .map(|rest| format!("==> [{}\n", rest.trim_end_matches('\'')))
        .collect()
}

pub fn target(project_path: &str) -> RemoteTarget {
    RemoteTarget {
        host: "bot.example.com".to_string(),
        port: 22,
        username: "deploy".to_string(),
        project_path: project_path.to_string(),
        identity: Identity::Agent,
    }
}

#[cfg(unix)]
pub fn write_executable(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}
