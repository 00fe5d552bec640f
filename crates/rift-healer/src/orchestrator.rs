//! Healing loop orchestrator.
//!
//! Drives one run end to end: clone, then up to `max_retries` iterations of
//! analyze -> test-discover -> fix -> commit -> monitor. The loop stops at
//! the first passing CI attempt. A run that exhausts its budget still
//! completes (with a failed final CI status); only clone failures and
//! unexpected errors abort the run.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use walkdir::{DirEntry, WalkDir};

use rift_scm::{CiStatusSource, GitWorkspace};

use crate::config::HealerConfig;
use crate::error::HealerError;
use crate::fix::{self, DeterministicFixer, FixStrategy};
use crate::guard::CommitGuard;
use crate::poller::CiPoller;
use crate::registry::RunRegistry;
use crate::scanner::DefectScanner;
use crate::score;
use crate::types::{CiStatus, Fix, FixStatus, Run, RunStatus};

/// Directories never scanned for source files.
const EXCLUDED_DIRS: &[&str] = &[
    ".git",
    "__pycache__",
    ".pytest_cache",
    "node_modules",
    ".venv",
    "venv",
];

/// Drives healing runs. One instance is shared by every run; each run owns
/// its own scratch clone.
pub struct Orchestrator {
    config: HealerConfig,
    scanner: DefectScanner,
    fixer: DeterministicFixer,
    guard: CommitGuard,
    workspace: Arc<dyn GitWorkspace>,
    poller: CiPoller,
    strategy: Option<Arc<dyn FixStrategy>>,
}

impl Orchestrator {
    /// Assemble an orchestrator from its capabilities.
    #[must_use]
    pub fn new(
        config: HealerConfig,
        workspace: Arc<dyn GitWorkspace>,
        ci: Arc<dyn CiStatusSource>,
        strategy: Option<Arc<dyn FixStrategy>>,
    ) -> Self {
        let guard = CommitGuard::new(workspace.clone());
        let poller = CiPoller::new(ci, config.poller.clone());
        Self {
            config,
            scanner: DefectScanner::new(),
            fixer: DeterministicFixer::new(),
            guard,
            workspace,
            poller,
            strategy,
        }
    }

    /// Execute the run registered under `run_id` to a terminal state.
    ///
    /// Every outcome ends with a terminal snapshot in the registry; errors
    /// are captured on the run rather than propagated.
    pub async fn execute(&self, run_id: &str, registry: &RunRegistry) {
        let Some(mut run) = registry.get(run_id).await else {
            warn!(run_id, "run disappeared before orchestration started");
            return;
        };

        let result = self.heal(&mut run, registry).await;
        let completed_at = chrono::Utc::now();
        run.completed_at = Some(completed_at);

        match result {
            Ok(total_commits) => {
                run.status = RunStatus::Completed;
                if run.final_ci_status.is_none() {
                    run.final_ci_status = Some(CiStatus::Failed);
                }
                run.score = Some(score::calculate(run.started_at, completed_at, total_commits));
                info!(
                    run_id = %run.run_id,
                    final_ci_status = ?run.final_ci_status,
                    iterations = run.iterations,
                    "run completed"
                );
            }
            Err(e) => {
                error!(run_id = %run.run_id, "run aborted: {e}");
                run.status = RunStatus::Error;
                run.error = Some(e.to_string());
                run.final_ci_status = Some(CiStatus::Failed);
                // Degraded score: an aborted run has no commits to count.
                run.score = Some(score::calculate(run.started_at, completed_at, 0));
            }
        }

        registry.store(run).await;
    }

    /// The healing loop proper. Returns the total commit count on success.
    async fn heal(&self, run: &mut Run, registry: &RunRegistry) -> Result<u32, HealerError> {
        run.status = RunStatus::Cloning;
        registry.store(run.clone()).await;

        // Each run owns its clone; the scratch directory is removed on drop.
        let workdir = tempfile::tempdir()?;
        let repo_root = workdir.path().to_path_buf();
        self.workspace
            .clone_repo(&run.repo_url, &repo_root)
            .await
            .map_err(|e| HealerError::Clone(e.to_string()))?;
        info!(run_id = %run.run_id, "cloned {}", run.repo_url);

        let mut total_commits = 0u32;

        for iteration in 1..=self.config.max_retries {
            run.iterations = iteration;
            run.status = RunStatus::Analyzing;
            registry.store(run.clone()).await;

            let files = list_source_files(&repo_root, self.config.max_files);
            if files.is_empty() && iteration == 1 {
                info!(run_id = %run.run_id, "no source files found to analyze");
                run.final_ci_status = Some(CiStatus::Passed);
                return Ok(total_commits);
            }
            info!(run_id = %run.run_id, iteration, files = files.len(), "analyzing");

            run.status = RunStatus::Testing;
            run.test_files = files.iter().filter(|p| is_test_file(p)).count();
            registry.store(run.clone()).await;

            run.status = RunStatus::Fixing;
            registry.store(run.clone()).await;
            let fixes_before = run.fixes.len();
            let modified = self.fix_files(&repo_root, &files, run).await;
            run.total_fixes = run.fixes.len();
            info!(
                run_id = %run.run_id,
                iteration,
                new_fixes = run.fixes.len() - fixes_before,
                "fix pass finished"
            );

            run.status = RunStatus::Committing;
            registry.store(run.clone()).await;
            let iteration_fixes = &run.fixes[fixes_before..];
            let outcome = self
                .guard
                .commit_fixes(&repo_root, &run.branch_name, iteration_fixes, &modified)
                .await?;
            total_commits += outcome.commits_created;

            run.status = RunStatus::Monitoring;
            registry.store(run.clone()).await;
            let (ci_status, attempts) = self.poller.poll(&run.repo_url, &run.branch_name).await;
            run.ci_attempts.extend(attempts);

            if ci_status == CiStatus::Passed {
                run.final_ci_status = Some(CiStatus::Passed);
                return Ok(total_commits);
            }
            info!(run_id = %run.run_id, iteration, ?ci_status, "attempt did not pass");
        }

        run.final_ci_status = Some(CiStatus::Failed);
        Ok(total_commits)
    }

    /// Scan and fix every file, respecting the total-fix ceiling.
    ///
    /// Unreadable files are skipped and the rest continue; failed writes
    /// downgrade that file's fixes to `Failed` so nothing is silently
    /// dropped. Returns the relative paths of modified files.
    async fn fix_files(&self, root: &Path, files: &[PathBuf], run: &mut Run) -> Vec<String> {
        let mut modified = Vec::new();

        for path in files {
            if run.fixes.len() >= self.config.max_fixes {
                warn!(
                    run_id = %run.run_id,
                    ceiling = self.config.max_fixes,
                    "fix ceiling reached, remaining files skipped"
                );
                break;
            }

            let rel = path
                .strip_prefix(root)
                .unwrap_or(path)
                .to_string_lossy()
                .replace('\\', "/");

            let content = match std::fs::read_to_string(path) {
                Ok(content) => content,
                Err(e) => {
                    // Per-file containment: skip this file, continue others.
                    let scan_err = HealerError::Scan {
                        file: rel.clone(),
                        message: e.to_string(),
                    };
                    warn!("skipping file: {scan_err}");
                    continue;
                }
            };

            let mut defects = self.scanner.scan(&rel, &content);
            if defects.is_empty() {
                continue;
            }
            defects.truncate(self.config.max_fixes - run.fixes.len());

            // Alternate strategy first; the deterministic path is the
            // mandatory fallback and is never skipped.
            let (fixes, revised) = match &self.strategy {
                Some(strategy) => match strategy.revise_file(&rel, &content, &defects).await {
                    Some(revised) => (fix::diff_fixes(&defects, &content, &revised), revised),
                    None => self.fixer.synthesize_file(&defects, &content),
                },
                None => self.fixer.synthesize_file(&defects, &content),
            };

            let fixes: Vec<Fix> = if revised == content {
                fixes
            } else {
                match std::fs::write(path, &revised) {
                    Ok(()) => {
                        modified.push(rel.clone());
                        fixes
                    }
                    Err(e) => {
                        warn!(file = %rel, "failed to write fixes: {e}");
                        fixes
                            .into_iter()
                            .map(|mut f| {
                                f.status = FixStatus::Failed;
                                f
                            })
                            .collect()
                    }
                }
            };

            run.fixes.extend(fixes);
        }

        modified
    }
}

/// Enumerate Python source files under `root`, excluding infrastructure
/// directories, sorted for determinism and capped at `max_files`.
fn list_source_files(root: &Path, max_files: usize) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| !is_excluded_dir(e))
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "py"))
        .map(DirEntry::into_path)
        .collect();
    files.sort();
    files.truncate(max_files);
    files
}

fn is_excluded_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| EXCLUDED_DIRS.contains(&name))
}

fn is_test_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| name.to_lowercase().contains("test"))
}
