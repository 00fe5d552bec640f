//! SCM capability layer for the healing agent.
//!
//! Everything the healing loop needs from the outside world lives behind the
//! two traits in this crate: [`GitWorkspace`] for local repository operations
//! (clone, branch, commit, push) and [`CiStatusSource`] for querying the state
//! of a CI pipeline. The default implementations drive the `git` CLI and the
//! GitHub Actions REST API; [`sim::ScriptedCi`] provides a fully in-memory CI
//! source for tests and demos.

pub mod git;
pub mod github;
pub mod sim;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while talking to an SCM backend.
#[derive(Debug, Error)]
pub enum ScmError {
    /// A git CLI invocation exited non-zero.
    #[error("git command failed: {0}")]
    Git(String),

    /// Clone did not complete within the configured timeout.
    #[error("clone timed out after {0}s")]
    CloneTimeout(u64),

    /// HTTP request to the CI backend failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The repository URL could not be parsed into owner/name.
    #[error("unrecognized repository url: {0}")]
    RepoUrl(String),

    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of a commit operation.
#[derive(Debug, Clone)]
pub struct CommitResult {
    /// Commit SHA, or `None` when the working tree had nothing to commit.
    pub commit_id: Option<String>,
}

/// Outcome of a push to the remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// The branch was pushed.
    Success,
    /// The push was rejected or the remote was unreachable.
    Failed(String),
}

impl PushOutcome {
    /// Whether the push landed on the remote.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Snapshot of the most recent CI run for a branch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CiRunSnapshot {
    /// Raw status reported by the backend (`queued`, `in_progress`, `completed`).
    pub status: String,
    /// Conclusion once the run completed (`success`, `failure`, ...).
    pub conclusion: Option<String>,
    /// Link to the run, when the backend exposes one.
    pub run_url: Option<String>,
}

impl CiRunSnapshot {
    /// Whether the backend considers this run finished.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == "completed"
    }

    /// Whether a completed run concluded successfully.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.is_completed() && self.conclusion.as_deref() == Some("success")
    }
}

/// Local git repository operations.
#[async_trait]
pub trait GitWorkspace: Send + Sync {
    /// Clone `url` into `dest` (shallow, depth-limited).
    async fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), ScmError>;

    /// Create `name` if it does not exist, otherwise check it out.
    async fn create_or_checkout_branch(&self, repo: &Path, name: &str) -> Result<(), ScmError>;

    /// Stage `files` (all changes when empty) and commit with `message`.
    async fn commit(
        &self,
        repo: &Path,
        files: &[String],
        message: &str,
    ) -> Result<CommitResult, ScmError>;

    /// Push `branch` to the `origin` remote.
    async fn push(&self, repo: &Path, branch: &str) -> Result<PushOutcome, ScmError>;
}

/// A source of CI run status for a repository branch.
#[async_trait]
pub trait CiStatusSource: Send + Sync {
    /// Latest CI run for `branch`, or `None` when no run has started yet.
    async fn latest_run(
        &self,
        repo_url: &str,
        branch: &str,
    ) -> Result<Option<CiRunSnapshot>, ScmError>;
}

/// Split a GitHub repository URL into `(owner, name)`.
///
/// Accepts `https://github.com/owner/name`, with or without a trailing
/// `.git` suffix or slash.
///
/// # Errors
/// Returns [`ScmError::RepoUrl`] when the URL has no owner/name pair.
pub fn parse_owner_repo(url: &str) -> Result<(String, String), ScmError> {
    let trimmed = url.trim_end_matches('/');
    let mut parts = trimmed.rsplit('/');
    let name = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ScmError::RepoUrl(url.to_string()))?;
    let owner = parts
        .next()
        .filter(|s| !s.is_empty() && !s.contains(':'))
        .ok_or_else(|| ScmError::RepoUrl(url.to_string()))?;
    Ok((
        owner.to_string(),
        name.trim_end_matches(".git").to_string(),
    ))
}
