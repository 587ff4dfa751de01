//! Push events and the trigger that decides whether they deploy.

mod event;

pub use event::PushEvent;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::TriggerConfig;

/// Why an event did not start a deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    /// The ref is a tag or something else outside `refs/heads/`
    NotABranch(String),
    /// Push to a branch other than the configured one
    OtherBranch(String),
    /// The push deleted the branch
    BranchDeleted,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotABranch(git_ref) => write!(f, "{} is not a branch", git_ref),
            SkipReason::OtherBranch(branch) => write!(f, "push to {} is not deployed", branch),
            SkipReason::BranchDeleted => f.write_str("branch was deleted"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerDecision {
    Deploy,
    Skip(SkipReason),
}

impl TriggerConfig {
    /// Decide whether a push event starts a deployment.
    pub fn evaluate(&self, event: &PushEvent) -> TriggerDecision {
        let Some(branch) = event.branch() else {
            return TriggerDecision::Skip(SkipReason::NotABranch(event.git_ref.clone()));
        };
        if branch != self.branch {
            return TriggerDecision::Skip(SkipReason::OtherBranch(branch.to_string()));
        }
        if event.deleted {
            return TriggerDecision::Skip(SkipReason::BranchDeleted);
        }
        TriggerDecision::Deploy
    }
}
