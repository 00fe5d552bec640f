//! End-to-end healing loop tests over in-memory capabilities.

use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rift_healer::config::{HealerConfig, PollerConfig};
use rift_healer::service::HealerService;
use rift_healer::types::{CiStatus, FixStatus, Run, RunStatus};
use rift_scm::sim::ScriptedCi;
use rift_scm::{CiStatusSource, CommitResult, GitWorkspace, PushOutcome, ScmError};

/// A small repository with one unused import and one missing colon.
const BUGGY_MAIN: &str = "import sys\n\ndef subtract(a, b)\n    return a - b\n\nif __name__ == \"__main__\":\n    print(subtract(3, 1))\n";

/// Fake git workspace: "cloning" writes a buggy repository into the
/// destination and every commit snapshots the tree it would have committed.
#[derive(Default)]
struct FakeGit {
    fail_clone: bool,
    branches: Mutex<Vec<String>>,
    commit_messages: Mutex<Vec<String>>,
    committed_main: Mutex<Option<String>>,
    pushes: Mutex<Vec<String>>,
}

impl FakeGit {
    fn failing_clone() -> Self {
        Self {
            fail_clone: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl GitWorkspace for FakeGit {
    async fn clone_repo(&self, _url: &str, dest: &Path) -> Result<(), ScmError> {
        if self.fail_clone {
            return Err(ScmError::Git("fatal: repository not found".to_string()));
        }
        std::fs::create_dir_all(dest)?;
        std::fs::write(dest.join("main.py"), BUGGY_MAIN)?;
        Ok(())
    }

    async fn create_or_checkout_branch(&self, _repo: &Path, name: &str) -> Result<(), ScmError> {
        self.branches.lock().unwrap().push(name.to_string());
        Ok(())
    }

    async fn commit(
        &self,
        repo: &Path,
        _files: &[String],
        message: &str,
    ) -> Result<CommitResult, ScmError> {
        self.commit_messages.lock().unwrap().push(message.to_string());
        if let Ok(content) = std::fs::read_to_string(repo.join("main.py")) {
            *self.committed_main.lock().unwrap() = Some(content);
        }
        Ok(CommitResult {
            commit_id: Some(format!(
                "sha{}",
                self.commit_messages.lock().unwrap().len()
            )),
        })
    }

    async fn push(&self, _repo: &Path, branch: &str) -> Result<PushOutcome, ScmError> {
        self.pushes.lock().unwrap().push(branch.to_string());
        Ok(PushOutcome::Success)
    }
}

fn test_config(results_dir: &Path) -> HealerConfig {
    HealerConfig {
        max_retries: 5,
        results_dir: results_dir.to_path_buf(),
        poller: PollerConfig {
            settle_secs: 0,
            interval_secs: 1,
            timeout_secs: 30,
        },
        ..HealerConfig::default()
    }
}

async fn run_to_completion(service: &HealerService, repo_url: &str) -> Run {
    let mut events = service.subscribe();
    let started = service
        .start_run(repo_url, "RIFT ORGANISERS", "Saiyam Kumar")
        .await
        .expect("run should start");

    assert_eq!(started.branch_name, "RIFT_ORGANISERS_SAIYAM_KUMAR_AI_Fix");

    tokio::time::timeout(Duration::from_secs(30), async {
        loop {
            let event = events.recv().await.expect("event channel open");
            if event.run_id() == started.run_id && event.is_terminal() {
                break;
            }
        }
    })
    .await
    .expect("run should reach a terminal state");

    service
        .get_run(&started.run_id)
        .await
        .expect("run snapshot available")
}

#[tokio::test]
async fn heals_repository_and_stops_on_first_passing_attempt() {
    let results = tempfile::tempdir().unwrap();
    let git = Arc::new(FakeGit::default());
    // CI fails once, passes on the second attempt's poll.
    let ci: Arc<dyn CiStatusSource> = Arc::new(ScriptedCi::fail_then_pass(1));

    let service = HealerService::new(test_config(results.path()), git.clone(), ci, None);
    let run = run_to_completion(&service, "https://github.com/demo/buggy").await;

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.final_ci_status, Some(CiStatus::Passed));
    // PASSED on the second poll means exactly two iterations, budget unspent.
    assert_eq!(run.iterations, 2);
    assert!(run.error.is_none());

    // Both defects were fixed and batched into a single commit.
    assert_eq!(run.total_fixes, 2);
    assert!(run.fixes.iter().all(|f| f.status == FixStatus::Fixed));
    assert!(run
        .fixes
        .iter()
        .all(|f| f.commit_message.starts_with("[AI-AGENT]")));

    let messages = git.commit_messages.lock().unwrap().clone();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].starts_with("[AI-AGENT] Fix: apply 2 automated fixes"));

    // The committed tree really was healed.
    let committed = git.committed_main.lock().unwrap().clone().unwrap();
    assert!(committed.contains("def subtract(a, b):"));
    assert!(!committed.contains("import sys"));

    let score = run.score.expect("completed run is scored");
    assert_eq!(score.commit_count, 1);
    assert_eq!(score.final_score, 110);

    // Terminal snapshot was persisted under the run id.
    assert!(results.path().join(format!("{}.json", run.run_id)).exists());
}

#[tokio::test]
async fn exhausted_retry_budget_completes_with_failed_ci() {
    let results = tempfile::tempdir().unwrap();
    let git = Arc::new(FakeGit::default());
    let ci: Arc<dyn CiStatusSource> = Arc::new(ScriptedCi::new(vec![
        rift_scm::sim::ScriptedResponse::Run(ScriptedCi::failed_run()),
    ]));

    let mut config = test_config(results.path());
    config.max_retries = 3;
    let service = HealerService::new(config, git, ci, None);
    let run = run_to_completion(&service, "https://github.com/demo/buggy").await;

    // Trying and failing is not itself an error.
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.final_ci_status, Some(CiStatus::Failed));
    assert_eq!(run.iterations, 3);
    assert!(run.error.is_none());
    assert!(run.score.is_some());
    assert_eq!(run.ci_attempts.len(), 3);
}

#[tokio::test]
async fn clone_failure_aborts_run_with_degraded_score() {
    let results = tempfile::tempdir().unwrap();
    let git = Arc::new(FakeGit::failing_clone());
    let ci: Arc<dyn CiStatusSource> = Arc::new(ScriptedCi::fail_then_pass(0));

    let service = HealerService::new(test_config(results.path()), git, ci, None);
    let run = run_to_completion(&service, "https://github.com/demo/missing").await;

    assert_eq!(run.status, RunStatus::Error);
    let error = run.error.expect("clone error captured verbatim");
    assert!(error.contains("repository not found"));

    let score = run.score.expect("aborted run still gets a degraded score");
    assert_eq!(score.commit_count, 0);
    assert_eq!(run.fixes.len(), 0);
}

#[tokio::test]
async fn second_iteration_rescans_the_fixed_tree() {
    let results = tempfile::tempdir().unwrap();
    let git = Arc::new(FakeGit::default());
    let ci: Arc<dyn CiStatusSource> = Arc::new(ScriptedCi::fail_then_pass(1));

    let service = HealerService::new(test_config(results.path()), git.clone(), ci, None);
    let run = run_to_completion(&service, "https://github.com/demo/buggy").await;

    // The first iteration healed every defect, so the second found nothing
    // new and committed nothing.
    assert_eq!(run.total_fixes, 2);
    assert_eq!(git.commit_messages.lock().unwrap().len(), 1);
    assert_eq!(run.iterations, 2);
}
