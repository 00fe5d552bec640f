//! CI status source backed by the GitHub Actions REST API.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::{parse_owner_repo, CiRunSnapshot, CiStatusSource, ScmError};

const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Queries the latest workflow run for a branch via the GitHub REST API.
#[derive(Debug, Clone)]
pub struct GitHubActions {
    client: reqwest::Client,
    token: Option<String>,
    api_base: String,
}

/// One page of workflow runs from the API.
#[derive(Debug, Deserialize)]
struct WorkflowRunsPage {
    workflow_runs: Vec<WorkflowRun>,
}

#[derive(Debug, Deserialize)]
struct WorkflowRun {
    status: String,
    conclusion: Option<String>,
    html_url: Option<String>,
}

impl GitHubActions {
    /// Create a new CI source. `token` may be empty for public repositories.
    #[must_use]
    pub fn new(token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            token: token.filter(|t| !t.is_empty()),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    /// Point the client at a different API host (used in tests).
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }
}

#[async_trait]
impl CiStatusSource for GitHubActions {
    async fn latest_run(
        &self,
        repo_url: &str,
        branch: &str,
    ) -> Result<Option<CiRunSnapshot>, ScmError> {
        let (owner, repo) = parse_owner_repo(repo_url)?;
        let url = format!(
            "{}/repos/{owner}/{repo}/actions/runs?branch={}&per_page=1",
            self.api_base,
            urlencoding::encode(branch),
        );

        debug!(%owner, %repo, branch, "querying workflow runs");

        let mut request = self
            .client
            .get(&url)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "rift-healer");
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let page: WorkflowRunsPage = request
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(page.workflow_runs.into_iter().next().map(|run| CiRunSnapshot {
            status: run.status,
            conclusion: run.conclusion,
            run_url: run.html_url,
        }))
    }
}
