//! CI poller - watches a branch until its pipeline reaches a terminal state.
//!
//! Single polling loop per monitoring phase: an initial settle delay, then
//! query/sleep until the backend reports a completed run or the deadline
//! passes. Query failures are tolerated and recorded; only the deadline ends
//! the loop on a persistently unreachable backend.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use rift_scm::CiStatusSource;

use crate::config::PollerConfig;
use crate::types::{CiAttempt, CiStatus};

/// Polls a [`CiStatusSource`] until a terminal status or timeout.
pub struct CiPoller {
    source: Arc<dyn CiStatusSource>,
    config: PollerConfig,
}

impl CiPoller {
    #[must_use]
    pub fn new(source: Arc<dyn CiStatusSource>, config: PollerConfig) -> Self {
        Self { source, config }
    }

    /// Poll the latest run for `branch` until it completes or the configured
    /// timeout elapses.
    ///
    /// Returns the final status together with every observation made along
    /// the way. The final observation is always appended, including the
    /// `Timeout` marker when the deadline passes.
    pub async fn poll(&self, repo_url: &str, branch: &str) -> (CiStatus, Vec<CiAttempt>) {
        let started = Instant::now();
        let deadline = started + Duration::from_secs(self.config.timeout_secs);
        let mut attempts: Vec<CiAttempt> = Vec::new();
        let mut iteration: u32 = 0;

        // Give CI a moment to pick up the push before the first query.
        let settle = Duration::from_secs(self.config.settle_secs);
        if started + settle < deadline {
            tokio::time::sleep(settle).await;
        }

        loop {
            if Instant::now() >= deadline {
                iteration += 1;
                attempts.push(CiAttempt {
                    iteration,
                    elapsed_secs: started.elapsed().as_secs(),
                    status: CiStatus::Timeout,
                    conclusion: Some(format!(
                        "CI did not complete within {}s",
                        self.config.timeout_secs
                    )),
                });
                return (CiStatus::Timeout, attempts);
            }

            iteration += 1;
            let elapsed_secs = started.elapsed().as_secs();

            match self.source.latest_run(repo_url, branch).await {
                Ok(Some(run)) if run.is_completed() => {
                    let status = if run.passed() {
                        CiStatus::Passed
                    } else {
                        CiStatus::Failed
                    };
                    attempts.push(CiAttempt {
                        iteration,
                        elapsed_secs,
                        status,
                        conclusion: run.conclusion,
                    });
                    debug!(branch, ?status, "CI reached terminal state");
                    return (status, attempts);
                }
                Ok(Some(run)) => {
                    attempts.push(CiAttempt {
                        iteration,
                        elapsed_secs,
                        status: CiStatus::Pending,
                        conclusion: Some(run.status),
                    });
                }
                Ok(None) => {
                    attempts.push(CiAttempt {
                        iteration,
                        elapsed_secs,
                        status: CiStatus::Pending,
                        conclusion: Some("no runs yet".to_string()),
                    });
                }
                Err(e) => {
                    // Transient query failures are tolerated until timeout.
                    warn!(branch, "CI query failed: {e}");
                    attempts.push(CiAttempt {
                        iteration,
                        elapsed_secs,
                        status: CiStatus::Error,
                        conclusion: Some(e.to_string()),
                    });
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            let interval = Duration::from_secs(self.config.interval_secs);
            tokio::time::sleep(interval.min(remaining)).await;
        }
    }
}
