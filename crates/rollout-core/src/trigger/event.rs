//! Push event sources: webhook payloads, CI environment, manual runs.

use anyhow::Context;
use serde::{Deserialize, Serialize};

const BRANCH_PREFIX: &str = "refs/heads/";

/// A push that may trigger a deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushEvent {
    /// Full ref, e.g. `refs/heads/main`
    pub git_ref: String,
    /// Commit the ref points to after the push
    pub after: Option<String>,
    pub before: Option<String>,
    /// `owner/name` of the pushed repository
    pub repository: Option<String>,
    pub pusher: Option<String>,
    pub deleted: bool,
}

/// Subset of the GitHub push webhook payload.
#[derive(Debug, Deserialize)]
struct PushPayload {
    #[serde(rename = "ref")]
    git_ref: String,
    #[serde(default)]
    after: Option<String>,
    #[serde(default)]
    before: Option<String>,
    #[serde(default)]
    deleted: bool,
    #[serde(default)]
    repository: Option<PayloadRepository>,
    #[serde(default)]
    pusher: Option<PayloadPusher>,
}

#[derive(Debug, Deserialize)]
struct PayloadRepository {
    full_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PayloadPusher {
    name: Option<String>,
}

impl PushEvent {
    /// Parse a push webhook payload.
    pub fn from_payload(json: &str) -> anyhow::Result<Self> {
        let payload: PushPayload =
            serde_json::from_str(json).context("Failed to parse push event payload")?;

        Ok(Self {
            git_ref: payload.git_ref,
            after: payload.after.filter(|sha| !is_null_sha(sha)),
            before: payload.before.filter(|sha| !is_null_sha(sha)),
            repository: payload.repository.and_then(|r| r.full_name),
            pusher: payload.pusher.and_then(|p| p.name),
            deleted: payload.deleted,
        })
    }

    /// Read a payload file, e.g. `$GITHUB_EVENT_PATH`.
    pub fn from_payload_file(path: &std::path::Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read event file: {}", path.display()))?;
        Self::from_payload(&content)
            .with_context(|| format!("Invalid event file: {}", path.display()))
    }

    /// Build an event from the variables a CI runner exports.
    pub fn from_env<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(name) = lookup("GITHUB_EVENT_NAME")
            && name != "push"
        {
            anyhow::bail!("Event '{}' is not a push event", name);
        }

        let git_ref = lookup("GITHUB_REF")
            .filter(|r| !r.is_empty())
            .ok_or_else(|| anyhow::anyhow!("GITHUB_REF is not set; pass --event or --branch"))?;

        Ok(Self {
            git_ref,
            after: lookup("GITHUB_SHA").filter(|sha| !sha.is_empty()),
            before: None,
            repository: lookup("GITHUB_REPOSITORY"),
            pusher: lookup("GITHUB_ACTOR"),
            deleted: false,
        })
    }

    /// Event for a deployment started by hand.
    pub fn manual(branch: &str, commit: Option<String>) -> Self {
        Self {
            git_ref: format!("{}{}", BRANCH_PREFIX, branch),
            after: commit,
            before: None,
            repository: None,
            pusher: None,
            deleted: false,
        }
    }

    /// Branch name for `refs/heads/*` refs.
    pub fn branch(&self) -> Option<&str> {
        self.git_ref
            .strip_prefix(BRANCH_PREFIX)
            .filter(|name| !name.is_empty())
    }

    /// Short commit id for display.
    pub fn short_commit(&self) -> Option<&str> {
        self.after.as_deref().map(|sha| sha.get(..7).unwrap_or(sha))
    }
}

fn is_null_sha(sha: &str) -> bool {
    !sha.is_empty() && sha.chars().all(|c| c == '0')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const PAYLOAD: &str = r#"{
        "ref": "refs/heads/main",
        "before": "0000000000000000000000000000000000000000",
        "after": "9f2c1e4b7a6d5c3b2a1908f7e6d5c4b3a2918070",
        "deleted": false,
        "repository": { "full_name": "campus/placement-bot", "private": true },
        "pusher": { "name": "octocat", "email": "octocat@example.com" },
        "commits": []
    }"#;

    #[test]
    fn parses_github_push_payload() {
        let event = PushEvent::from_payload(PAYLOAD).unwrap();
        assert_eq!(event.git_ref, "refs/heads/main");
        assert_eq!(event.branch(), Some("main"));
        assert_eq!(
            event.after.as_deref(),
            Some("9f2c1e4b7a6d5c3b2a1908f7e6d5c4b3a2918070")
        );
        // all-zero sha marks a newly created branch
        assert_eq!(event.before, None);
        assert_eq!(event.repository.as_deref(), Some("campus/placement-bot"));
        assert_eq!(event.pusher.as_deref(), Some("octocat"));
        assert_eq!(event.short_commit(), Some("9f2c1e4"));
    }

    #[test]
    fn payload_without_ref_is_rejected() {
        assert!(PushEvent::from_payload(r#"{"after": "abc"}"#).is_err());
    }

    #[test]
    fn from_env_reads_runner_variables() {
        let vars: HashMap<&str, &str> = [
            ("GITHUB_EVENT_NAME", "push"),
            ("GITHUB_REF", "refs/heads/main"),
            ("GITHUB_SHA", "abc1234def"),
            ("GITHUB_REPOSITORY", "campus/placement-bot"),
        ]
        .into_iter()
        .collect();

        let event = PushEvent::from_env(|key| vars.get(key).map(|v| v.to_string())).unwrap();
        assert_eq!(event.branch(), Some("main"));
        assert_eq!(event.after.as_deref(), Some("abc1234def"));
    }

    #[test]
    fn from_env_rejects_other_events() {
        let err = PushEvent::from_env(|key| match key {
            "GITHUB_EVENT_NAME" => Some("pull_request".to_string()),
            "GITHUB_REF" => Some("refs/pull/1/merge".to_string()),
            _ => None,
        })
        .unwrap_err();
        assert!(err.to_string().contains("not a push event"));
    }

    #[test]
    fn from_env_requires_ref() {
        let err = PushEvent::from_env(|_| None).unwrap_err();
        assert!(err.to_string().contains("GITHUB_REF"));
    }

    #[test]
    fn manual_event_targets_branch() {
        let event = PushEvent::manual("main", None);
        assert_eq!(event.git_ref, "refs/heads/main");
        assert_eq!(event.branch(), Some("main"));
        assert_eq!(event.short_commit(), None);
    }

    #[test]
    fn non_branch_refs_have_no_branch() {
        let event = PushEvent::manual("", None);
        assert_eq!(event.branch(), None);

        let tag = PushEvent {
            git_ref: "refs/tags/v1.0".to_string(),
            ..PushEvent::manual("main", None)
        };
        assert_eq!(tag.branch(), None);
    }
}
