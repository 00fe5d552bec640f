//! Commit guard - branch protection and commit-message policy.
//!
//! Nothing reaches the remote without passing through here: the target branch
//! must be outside the protected set, every commit message must carry the
//! mandatory prefix, and all fixes from one attempt are batched into a single
//! commit to keep the commit count down.

use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use rift_scm::{GitWorkspace, PushOutcome};

use crate::error::HealerError;
use crate::types::{Fix, FixStatus};

/// Marker every automated commit message must begin with.
pub const COMMIT_PREFIX: &str = "[AI-AGENT]";

/// Branches that must never receive direct writes.
pub const PROTECTED_BRANCHES: &[&str] = &["main", "master", "develop", "dev", "production"];

/// Whether `branch` is in the protected set (case-insensitive).
#[must_use]
pub fn is_protected(branch: &str) -> bool {
    let lowered = branch.to_lowercase();
    PROTECTED_BRANCHES.contains(&lowered.as_str())
}

/// Rewrite `message` to start with the mandatory prefix when it does not.
#[must_use]
pub fn enforce_prefix(message: &str) -> String {
    if message.starts_with(COMMIT_PREFIX) {
        message.to_string()
    } else {
        format!("{COMMIT_PREFIX} {message}")
    }
}

/// Result of one guarded commit attempt.
#[derive(Debug, Clone)]
pub struct CommitOutcome {
    /// Branch the commit landed on.
    pub branch: String,
    /// Number of commits created.
    pub commits_created: u32,
    /// Push result.
    pub push: PushOutcome,
}

/// Guards every write that reaches the remote.
pub struct CommitGuard {
    workspace: Arc<dyn GitWorkspace>,
}

impl CommitGuard {
    #[must_use]
    pub fn new(workspace: Arc<dyn GitWorkspace>) -> Self {
        Self { workspace }
    }

    /// Commit all applied fixes from one attempt as a single batch and push.
    ///
    /// # Errors
    /// Returns [`HealerError::ProtectedBranch`] when `branch` is protected;
    /// the refusal is final, never retried. Propagates SCM failures.
    pub async fn commit_fixes(
        &self,
        repo: &Path,
        branch: &str,
        fixes: &[Fix],
        files: &[String],
    ) -> Result<CommitOutcome, HealerError> {
        if is_protected(branch) {
            return Err(HealerError::ProtectedBranch(branch.to_string()));
        }

        self.workspace
            .create_or_checkout_branch(repo, branch)
            .await?;

        let applied: Vec<&Fix> = fixes
            .iter()
            .filter(|f| f.status == FixStatus::Fixed)
            .collect();
        if applied.is_empty() {
            return Ok(CommitOutcome {
                branch: branch.to_string(),
                commits_created: 0,
                push: PushOutcome::Success,
            });
        }

        let message = batch_message(&applied);
        let result = self.workspace.commit(repo, files, &message).await?;
        let commits_created = u32::from(result.commit_id.is_some());

        if commits_created == 0 {
            info!(branch, "working tree already clean, nothing committed");
            return Ok(CommitOutcome {
                branch: branch.to_string(),
                commits_created: 0,
                push: PushOutcome::Success,
            });
        }

        let push = self.workspace.push(repo, branch).await?;
        if let PushOutcome::Failed(reason) = &push {
            warn!(branch, "push rejected: {reason}");
        }

        Ok(CommitOutcome {
            branch: branch.to_string(),
            commits_created,
            push,
        })
    }
}

/// One prefixed message for a whole batch of fixes, with the per-fix
/// messages in the body.
fn batch_message(applied: &[&Fix]) -> String {
    let subject = enforce_prefix(&format!("Fix: apply {} automated fixes", applied.len()));
    let body = applied
        .iter()
        .map(|f| enforce_prefix(&f.commit_message))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{subject}\n\n{body}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rift_scm::{CommitResult, ScmError};
    use std::sync::Mutex;

    use crate::types::{BugCategory, Defect};

    #[derive(Default)]
    struct RecordingGit {
        branches: Mutex<Vec<String>>,
        commits: Mutex<Vec<String>>,
        pushes: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl GitWorkspace for RecordingGit {
        async fn clone_repo(&self, _url: &str, _dest: &Path) -> Result<(), ScmError> {
            Ok(())
        }

        async fn create_or_checkout_branch(
            &self,
            _repo: &Path,
            name: &str,
        ) -> Result<(), ScmError> {
            self.branches.lock().unwrap().push(name.to_string());
            Ok(())
        }

        async fn commit(
            &self,
            _repo: &Path,
            _files: &[String],
            message: &str,
        ) -> Result<CommitResult, ScmError> {
            self.commits.lock().unwrap().push(message.to_string());
            Ok(CommitResult {
                commit_id: Some("abc123".to_string()),
            })
        }

        async fn push(&self, _repo: &Path, branch: &str) -> Result<PushOutcome, ScmError> {
            self.pushes.lock().unwrap().push(branch.to_string());
            Ok(PushOutcome::Success)
        }
    }

    fn sample_fix(line: usize) -> Fix {
        let defect = Defect {
            file: "main.py".to_string(),
            line_number: line,
            category: BugCategory::Syntax,
            description: "Add missing colon".to_string(),
            fix_hint: "add the colon at the correct position".to_string(),
        };
        Fix {
            commit_message: crate::fix::commit_message(&defect),
            defect,
            original_line: "def f(a)".to_string(),
            replacement: "def f(a):".to_string(),
            status: FixStatus::Fixed,
        }
    }

    #[test]
    fn test_protected_set_is_case_insensitive() {
        for branch in ["main", "MASTER", "Develop", "dev", "production"] {
            assert!(is_protected(branch), "{branch} should be protected");
        }
        assert!(!is_protected("TEAM_LEAD_AI_Fix"));
    }

    #[test]
    fn test_enforce_prefix() {
        assert_eq!(
            enforce_prefix("Fix SYNTAX: add colon"),
            "[AI-AGENT] Fix SYNTAX: add colon"
        );
        assert_eq!(
            enforce_prefix("[AI-AGENT] already prefixed"),
            "[AI-AGENT] already prefixed"
        );
    }

    #[tokio::test]
    async fn test_protected_branch_refused_before_any_write() {
        let git = Arc::new(RecordingGit::default());
        let guard = CommitGuard::new(git.clone());
        let fixes = vec![sample_fix(1)];

        let err = guard
            .commit_fixes(Path::new("/tmp/repo"), "main", &fixes, &[])
            .await
            .unwrap_err();

        assert!(matches!(err, HealerError::ProtectedBranch(_)));
        assert!(git.branches.lock().unwrap().is_empty());
        assert!(git.commits.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fixes_batched_into_single_commit() {
        let git = Arc::new(RecordingGit::default());
        let guard = CommitGuard::new(git.clone());
        let fixes = vec![sample_fix(1), sample_fix(2), sample_fix(3)];

        let outcome = guard
            .commit_fixes(Path::new("/tmp/repo"), "TEAM_LEAD_AI_Fix", &fixes, &[])
            .await
            .unwrap();

        assert_eq!(outcome.commits_created, 1);
        assert!(outcome.push.is_success());

        let commits = git.commits.lock().unwrap();
        assert_eq!(commits.len(), 1);
        assert!(commits[0].starts_with("[AI-AGENT] Fix: apply 3 automated fixes"));
    }

    #[tokio::test]
    async fn test_no_applied_fixes_means_no_commit() {
        let git = Arc::new(RecordingGit::default());
        let guard = CommitGuard::new(git.clone());
        let mut failed = sample_fix(1);
        failed.status = FixStatus::Failed;

        let outcome = guard
            .commit_fixes(Path::new("/tmp/repo"), "TEAM_LEAD_AI_Fix", &[failed], &[])
            .await
            .unwrap();

        assert_eq!(outcome.commits_created, 0);
        assert!(git.commits.lock().unwrap().is_empty());
    }
}
