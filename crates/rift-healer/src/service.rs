//! Service boundary: start runs, read snapshots, subscribe to events.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use rift_scm::git::GitCli;
use rift_scm::github::GitHubActions;
use rift_scm::{CiStatusSource, GitWorkspace};

use crate::branch::derive_branch_name;
use crate::config::HealerConfig;
use crate::error::HealerError;
use crate::events::RunEvent;
use crate::fix::llm::LlmFixer;
use crate::fix::FixStrategy;
use crate::orchestrator::Orchestrator;
use crate::registry::RunRegistry;
use crate::score;
use crate::types::{CiStatus, Run, RunStatus};

/// Handle returned when a run is accepted.
#[derive(Debug, Clone)]
pub struct StartedRun {
    pub run_id: String,
    pub branch_name: String,
}

/// The healing agent's outward-facing API. Each accepted request becomes an
/// independent background run; idempotency is not provided.
pub struct HealerService {
    config: HealerConfig,
    registry: Arc<RunRegistry>,
    orchestrator: Arc<Orchestrator>,
}

impl HealerService {
    /// Build a service over explicit capabilities.
    #[must_use]
    pub fn new(
        config: HealerConfig,
        workspace: Arc<dyn GitWorkspace>,
        ci: Arc<dyn CiStatusSource>,
        strategy: Option<Arc<dyn FixStrategy>>,
    ) -> Self {
        let registry = RunRegistry::new(config.results_dir.clone());
        let orchestrator = Arc::new(Orchestrator::new(
            config.clone(),
            workspace,
            ci,
            strategy,
        ));
        Self {
            config,
            registry,
            orchestrator,
        }
    }

    /// Build a service with the default capabilities: git CLI workspace,
    /// GitHub Actions CI source, and the LLM strategy when configured.
    #[must_use]
    pub fn with_defaults(config: HealerConfig) -> Self {
        let workspace: Arc<dyn GitWorkspace> = Arc::new(
            GitCli::new(config.github_token.clone()).with_clone_timeout(config.clone_timeout_secs),
        );
        let ci: Arc<dyn CiStatusSource> = Arc::new(GitHubActions::new(config.github_token.clone()));
        let strategy: Option<Arc<dyn FixStrategy>> =
            LlmFixer::from_config(&config.llm).map(|f| Arc::new(f) as Arc<dyn FixStrategy>);
        Self::new(config, workspace, ci, strategy)
    }

    /// Accept a healing request and spawn its run in the background.
    ///
    /// # Errors
    /// Returns [`HealerError::InvalidRepoUrl`] when the URL cannot be
    /// normalized into a GitHub repository URL.
    pub async fn start_run(
        &self,
        repo_url: &str,
        team_name: &str,
        leader_name: &str,
    ) -> Result<StartedRun, HealerError> {
        let repo_url = normalize_repo_url(repo_url)?;
        let run_id = Uuid::new_v4().to_string()[..8].to_string();
        let branch_name = derive_branch_name(team_name, leader_name);

        let run = Run::new(&run_id, &repo_url, team_name, leader_name, &branch_name);
        self.registry.insert(run).await;
        info!(run_id, branch_name, repo_url, "run accepted");

        let orchestrator = self.orchestrator.clone();
        let registry = self.registry.clone();
        let timeout_secs = self.config.run_timeout_secs;
        let id = run_id.clone();
        tokio::spawn(async move {
            let deadline = Duration::from_secs(timeout_secs);
            if tokio::time::timeout(deadline, orchestrator.execute(&id, &registry))
                .await
                .is_err()
            {
                abandon_run(&registry, &id, timeout_secs).await;
            }
        });

        Ok(StartedRun {
            run_id,
            branch_name,
        })
    }

    /// Snapshot of one run.
    pub async fn get_run(&self, run_id: &str) -> Option<Run> {
        self.registry.get(run_id).await
    }

    /// Snapshot of every known run.
    pub async fn list_runs(&self) -> Vec<Run> {
        self.registry.list().await
    }

    /// Subscribe to run-state-changed events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.registry.subscribe()
    }
}

/// Mark a run that outlived its overall deadline as errored.
async fn abandon_run(registry: &RunRegistry, run_id: &str, timeout_secs: u64) {
    let Some(mut run) = registry.get(run_id).await else {
        return;
    };
    if run.status.is_terminal() {
        return;
    }
    warn!(run_id, "run abandoned after {timeout_secs}s");
    let completed_at = chrono::Utc::now();
    run.status = RunStatus::Error;
    run.error = Some(format!("run abandoned after {timeout_secs}s"));
    run.final_ci_status = Some(CiStatus::Failed);
    run.completed_at = Some(completed_at);
    run.score = Some(score::calculate(run.started_at, completed_at, 0));
    registry.store(run).await;
}

/// Normalize common GitHub URL shorthands to a full `https://` URL.
///
/// # Errors
/// Returns [`HealerError::InvalidRepoUrl`] for anything that is not a
/// GitHub repository reference.
pub fn normalize_repo_url(raw: &str) -> Result<String, HealerError> {
    let url = raw.trim();
    if url.starts_with("https://github.com/") || url.starts_with("http://github.com/") {
        return Ok(url.to_string());
    }
    if let Some(rest) = url.strip_prefix("github.com/") {
        return Ok(format!("https://github.com/{rest}"));
    }
    if let Some(rest) = url.strip_prefix("www.github.com/") {
        return Ok(format!("https://github.com/{rest}"));
    }
    if url.contains('/') && !url.starts_with("http") {
        return Ok(format!("https://github.com/{url}"));
    }
    Err(HealerError::InvalidRepoUrl(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_accepts_full_urls() {
        assert_eq!(
            normalize_repo_url("https://github.com/owner/repo").unwrap(),
            "https://github.com/owner/repo"
        );
    }

    #[test]
    fn test_normalize_expands_shorthands() {
        assert_eq!(
            normalize_repo_url("github.com/owner/repo").unwrap(),
            "https://github.com/owner/repo"
        );
        assert_eq!(
            normalize_repo_url("www.github.com/owner/repo").unwrap(),
            "https://github.com/owner/repo"
        );
        assert_eq!(
            normalize_repo_url("owner/repo").unwrap(),
            "https://github.com/owner/repo"
        );
    }

    #[test]
    fn test_normalize_rejects_non_repo_input() {
        assert!(normalize_repo_url("not a url").is_err());
        assert!(normalize_repo_url("https://gitlab.com/owner/repo").is_err());
    }
}
