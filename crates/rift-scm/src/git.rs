//! Git workspace operations over the `git` CLI.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::{CommitResult, GitWorkspace, PushOutcome, ScmError};

/// Default author identity for automated commits.
const AUTHOR_NAME: &str = "RIFT AI Agent";
const AUTHOR_EMAIL: &str = "agent@rift2026.ai";

/// [`GitWorkspace`] implementation that shells out to the `git` CLI.
#[derive(Debug, Clone)]
pub struct GitCli {
    /// Token injected into the clone/push URL for authenticated access.
    token: Option<String>,
    /// Shallow clone depth.
    clone_depth: u32,
    /// Clone timeout in seconds.
    clone_timeout_secs: u64,
}

impl GitCli {
    /// Create a new CLI-backed workspace.
    #[must_use]
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token.filter(|t| !t.is_empty()),
            clone_depth: 1,
            clone_timeout_secs: 60,
        }
    }

    /// Override the clone timeout.
    #[must_use]
    pub fn with_clone_timeout(mut self, secs: u64) -> Self {
        self.clone_timeout_secs = secs;
        self
    }

    /// Insert the token into an `https://github.com/...` URL.
    fn authenticated_url(&self, url: &str) -> String {
        match &self.token {
            Some(token) if url.starts_with("https://") && !url.contains('@') => {
                url.replacen("https://", &format!("https://{token}@"), 1)
            }
            _ => url.to_string(),
        }
    }

    /// Run a git command, returning captured stdout on success.
    async fn run_git(&self, cwd: Option<&Path>, args: &[&str]) -> Result<String, ScmError> {
        debug!(args = ?args, "running git");

        let mut cmd = Command::new("git");
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        let output = cmd
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            Err(ScmError::Git(stderr))
        }
    }
}

#[async_trait]
impl GitWorkspace for GitCli {
    async fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), ScmError> {
        let auth_url = self.authenticated_url(url);
        let depth = self.clone_depth.to_string();
        let dest_str = dest.to_string_lossy().to_string();
        let args = ["clone", "--depth", depth.as_str(), &auth_url, &dest_str];

        let clone = self.run_git(None, &args);
        match tokio::time::timeout(
            std::time::Duration::from_secs(self.clone_timeout_secs),
            clone,
        )
        .await
        {
            Ok(result) => result.map(|_| ()),
            Err(_) => Err(ScmError::CloneTimeout(self.clone_timeout_secs)),
        }
    }

    async fn create_or_checkout_branch(&self, repo: &Path, name: &str) -> Result<(), ScmError> {
        // -b fails when the branch already exists; fall back to a plain checkout.
        if self
            .run_git(Some(repo), &["checkout", "-b", name])
            .await
            .is_ok()
        {
            return Ok(());
        }
        self.run_git(Some(repo), &["checkout", name]).await.map(|_| ())
    }

    async fn commit(
        &self,
        repo: &Path,
        files: &[String],
        message: &str,
    ) -> Result<CommitResult, ScmError> {
        if files.is_empty() {
            self.run_git(Some(repo), &["add", "-A"]).await?;
        } else {
            let mut args = vec!["add", "--"];
            args.extend(files.iter().map(String::as_str));
            self.run_git(Some(repo), &args).await?;
        }

        let staged = self
            .run_git(Some(repo), &["status", "--porcelain"])
            .await?;
        if staged.is_empty() {
            debug!("nothing to commit");
            return Ok(CommitResult { commit_id: None });
        }

        self.run_git(
            Some(repo),
            &[
                "-c",
                &format!("user.name={AUTHOR_NAME}"),
                "-c",
                &format!("user.email={AUTHOR_EMAIL}"),
                "commit",
                "-m",
                message,
            ],
        )
        .await?;

        let sha = self.run_git(Some(repo), &["rev-parse", "HEAD"]).await?;
        Ok(CommitResult {
            commit_id: Some(sha),
        })
    }

    async fn push(&self, repo: &Path, branch: &str) -> Result<PushOutcome, ScmError> {
        let refspec = format!("{branch}:{branch}");
        match self
            .run_git(Some(repo), &["push", "--set-upstream", "origin", &refspec])
            .await
        {
            Ok(_) => Ok(PushOutcome::Success),
            Err(ScmError::Git(stderr)) => {
                warn!(branch, "push failed: {stderr}");
                Ok(PushOutcome::Failed(stderr))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authenticated_url_inserts_token() {
        let git = GitCli::new(Some("tok123".to_string()));
        assert_eq!(
            git.authenticated_url("https://github.com/owner/repo"),
            "https://tok123@github.com/owner/repo"
        );
    }

    #[test]
    fn test_authenticated_url_without_token() {
        let git = GitCli::new(None);
        assert_eq!(
            git.authenticated_url("https://github.com/owner/repo"),
            "https://github.com/owner/repo"
        );
    }

    #[test]
    fn test_authenticated_url_skips_existing_credentials() {
        let git = GitCli::new(Some("tok123".to_string()));
        assert_eq!(
            git.authenticated_url("https://other@github.com/owner/repo"),
            "https://other@github.com/owner/repo"
        );
    }
}
