//! In-memory run registry with change events and terminal persistence.
//!
//! The registry is the only cross-run shared structure. Every update replaces
//! the stored [`Run`] wholesale under the write lock, so concurrent readers
//! always observe a complete snapshot, never a partially updated record.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, warn};

use crate::events::RunEvent;
use crate::types::{Run, RunStatus};

/// Capacity of the event channel; slow subscribers lag rather than block.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Shared registry of runs keyed by run id.
pub struct RunRegistry {
    runs: RwLock<HashMap<String, Run>>,
    events: broadcast::Sender<RunEvent>,
    results_dir: PathBuf,
}

impl RunRegistry {
    /// Create an empty registry persisting terminal snapshots to `results_dir`.
    #[must_use]
    pub fn new(results_dir: PathBuf) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            runs: RwLock::new(HashMap::new()),
            events,
            results_dir,
        })
    }

    /// Insert a freshly created run.
    pub async fn insert(&self, run: Run) {
        let event = RunEvent::StatusChanged {
            run_id: run.run_id.clone(),
            status: run.status,
            timestamp: chrono::Utc::now(),
        };
        self.runs.write().await.insert(run.run_id.clone(), run);
        let _ = self.events.send(event);
    }

    /// Replace the stored record for a run and publish the matching event.
    ///
    /// Terminal snapshots are additionally persisted to disk.
    pub async fn store(&self, run: Run) {
        let event = match (run.status, &run.error) {
            (RunStatus::Error, error) => RunEvent::Error {
                run_id: run.run_id.clone(),
                error: error.clone().unwrap_or_else(|| "unknown error".to_string()),
                timestamp: chrono::Utc::now(),
            },
            (RunStatus::Completed, _) => RunEvent::Completed {
                run_id: run.run_id.clone(),
                final_ci_status: run.final_ci_status,
                score: run.score,
                timestamp: chrono::Utc::now(),
            },
            (status, _) => RunEvent::StatusChanged {
                run_id: run.run_id.clone(),
                status,
                timestamp: chrono::Utc::now(),
            },
        };

        if run.status.is_terminal() {
            self.persist(&run);
        }

        self.runs.write().await.insert(run.run_id.clone(), run);
        let _ = self.events.send(event);
    }

    /// Snapshot of one run.
    pub async fn get(&self, run_id: &str) -> Option<Run> {
        self.runs.read().await.get(run_id).cloned()
    }

    /// Snapshot of every known run.
    pub async fn list(&self) -> Vec<Run> {
        self.runs.read().await.values().cloned().collect()
    }

    /// Subscribe to run-state-changed events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.events.subscribe()
    }

    /// Write a terminal run snapshot to the results directory.
    ///
    /// Persistence failures are logged and never fail the run.
    fn persist(&self, run: &Run) {
        let path = self.results_dir.join(format!("{}.json", run.run_id));
        match self.try_persist(run, &path) {
            Ok(()) => {
                debug!(run_id = %run.run_id, path = %path.display(), "persisted run snapshot");
            }
            Err(e) => warn!(run_id = %run.run_id, "failed to persist run snapshot: {e}"),
        }
    }

    fn try_persist(&self, run: &Run, path: &std::path::Path) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.results_dir)?;
        let json = serde_json::to_string_pretty(run)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
