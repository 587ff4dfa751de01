//! Remote sessions that execute the deployment script.
//!
//! A session receives the whole rendered script on stdin and runs it in a
//! single shell, so the steps share working directory and environment.

mod local;
mod process;
mod ssh;

pub use local::LocalSession;
pub use ssh::{SSH_CONNECT_FAILURE, SshSession};

use std::io;

use thiserror::Error;

/// Captured result of a finished session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionOutput {
    /// `None` when the process was ended by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl SessionOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("could not establish remote session (exit code {code}): {stderr}")]
    Connect { code: i32, stderr: String },

    #[error("session timed out after {secs}s")]
    TimedOut { secs: u64 },

    #[error("failed to prepare ssh key material: {0}")]
    KeyMaterial(#[source] io::Error),

    #[error("session I/O failed: {0}")]
    Io(#[from] io::Error),
}

/// Something that can run a shell script against the deployment target.
pub trait RemoteSession {
    /// Short description for logs, e.g. `ssh deploy@example.com:22`.
    fn describe(&self) -> String;

    /// Run the script and wait for it to finish.
    ///
    /// An `Err` means the session itself failed (could not start, connect
    /// or finish in time). A script that ran and exited non-zero is an
    /// `Ok` output with that exit code.
    fn execute(&self, script: &str) -> Result<SessionOutput, SessionError>;
}
