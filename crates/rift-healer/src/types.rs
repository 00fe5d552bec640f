//! Core types for the healing pipeline.
//!
//! This module defines the primary data structures for:
//! - Representing a healing run and its lifecycle
//! - Classifying located defects
//! - Recording synthesized fixes and CI observations
//! - Scoring completed runs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a [`Run`].
///
/// Transitions are one-directional; the sequence from [`RunStatus::Analyzing`]
/// onward repeats once per healing iteration. Terminal statuses never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Starting,
    Cloning,
    Analyzing,
    Testing,
    Fixing,
    Committing,
    Monitoring,
    Completed,
    Error,
}

impl RunStatus {
    /// Whether this status ends the run.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

/// Classification of a located defect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BugCategory {
    /// Unused import
    Linting,
    /// Missing block terminator (trailing colon)
    Syntax,
    /// Assignment used as comparison
    Logic,
    /// String/number concatenation without conversion
    TypeError,
    /// Relative import
    Import,
    /// Mixed tabs and spaces in leading whitespace
    Indentation,
}

impl BugCategory {
    /// Category name as it appears in commit messages and reports.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Linting => "LINTING",
            Self::Syntax => "SYNTAX",
            Self::Logic => "LOGIC",
            Self::TypeError => "TYPE_ERROR",
            Self::Import => "IMPORT",
            Self::Indentation => "INDENTATION",
        }
    }
}

impl std::fmt::Display for BugCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A located, classified issue. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Defect {
    /// File path relative to the repository root.
    pub file: String,
    /// 1-based line number.
    pub line_number: usize,
    /// Defect classification.
    pub category: BugCategory,
    /// Human-readable description (used in commit messages).
    pub description: String,
    /// Machine-readable hint for the fix synthesizer.
    pub fix_hint: String,
}

/// Application status of a [`Fix`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FixStatus {
    /// The fix was synthesized and applied to the working tree.
    Fixed,
    /// No transform applied; the original line was left untouched.
    Failed,
}

/// The synthesized remedy for one [`Defect`]. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fix {
    /// The originating defect.
    pub defect: Defect,
    /// Line content before the fix.
    pub original_line: String,
    /// Proposed content; empty signals line deletion.
    pub replacement: String,
    /// Commit message, always carrying the mandatory prefix.
    pub commit_message: String,
    /// Whether the fix was applied.
    pub status: FixStatus,
}

impl Fix {
    /// Whether this fix removes the line entirely.
    #[must_use]
    pub fn is_deletion(&self) -> bool {
        self.status == FixStatus::Fixed && self.replacement.is_empty()
    }
}

/// Observed CI status during polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CiStatus {
    Pending,
    Passed,
    Failed,
    Timeout,
    Error,
}

impl CiStatus {
    /// Whether the poller stops on this status.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Passed | Self::Failed | Self::Timeout)
    }
}

/// One observation of CI status during polling. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CiAttempt {
    /// 1-based poll sequence number within one monitoring phase.
    pub iteration: u32,
    /// Seconds elapsed since polling started.
    pub elapsed_secs: u64,
    /// Observed status.
    pub status: CiStatus,
    /// Conclusion detail reported by the backend, if any.
    pub conclusion: Option<String>,
}

/// Derived run score. `final_score = max(0, base + speed_bonus - efficiency_penalty)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub base: u32,
    pub speed_bonus: u32,
    pub efficiency_penalty: u32,
    pub final_score: u32,
    /// Wall-clock duration of the run in seconds.
    pub execution_secs: u64,
    /// Commits counted toward the efficiency penalty.
    pub commit_count: u32,
}

/// One end-to-end healing attempt over a target repository.
///
/// Owned exclusively by the orchestrator; every externally visible update
/// replaces the stored record wholesale, so readers never observe a torn
/// snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub run_id: String,
    pub repo_url: String,
    pub team_name: String,
    pub leader_name: String,
    /// Derived deterministically at creation; immutable afterwards.
    pub branch_name: String,
    pub status: RunStatus,
    pub fixes: Vec<Fix>,
    pub ci_attempts: Vec<CiAttempt>,
    /// Healing-loop iterations executed so far.
    pub iterations: u32,
    pub total_fixes: usize,
    /// Test files discovered during the testing phase.
    pub test_files: usize,
    pub score: Option<Score>,
    pub final_ci_status: Option<CiStatus>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Terminal error text, captured verbatim.
    pub error: Option<String>,
}

impl Run {
    /// Create a new run in the [`RunStatus::Starting`] state.
    #[must_use]
    pub fn new(
        run_id: impl Into<String>,
        repo_url: impl Into<String>,
        team_name: impl Into<String>,
        leader_name: impl Into<String>,
        branch_name: impl Into<String>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            repo_url: repo_url.into(),
            team_name: team_name.into(),
            leader_name: leader_name.into(),
            branch_name: branch_name.into(),
            status: RunStatus::Starting,
            fixes: Vec::new(),
            ci_attempts: Vec::new(),
            iterations: 0,
            total_fixes: 0,
            test_files: 0,
            score: None,
            final_ci_status: None,
            started_at: Utc::now(),
            completed_at: None,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_serializes_screaming_snake() {
        assert_eq!(
            serde_json::to_string(&RunStatus::Monitoring).unwrap(),
            "\"MONITORING\""
        );
        assert_eq!(
            serde_json::to_string(&BugCategory::TypeError).unwrap(),
            "\"TYPE_ERROR\""
        );
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Error.is_terminal());
        assert!(!RunStatus::Monitoring.is_terminal());

        assert!(CiStatus::Timeout.is_terminal());
        assert!(!CiStatus::Pending.is_terminal());
        assert!(!CiStatus::Error.is_terminal());
    }

    #[test]
    fn test_fix_deletion() {
        let defect = Defect {
            file: "utils.py".to_string(),
            line_number: 2,
            category: BugCategory::Linting,
            description: "Remove unused import 'sys'".to_string(),
            fix_hint: "remove the import statement".to_string(),
        };
        let fix = Fix {
            defect,
            original_line: "import sys".to_string(),
            replacement: String::new(),
            commit_message: "[AI-AGENT] Fix LINTING: Remove unused import 'sys' in utils.py:2"
                .to_string(),
            status: FixStatus::Fixed,
        };
        assert!(fix.is_deletion());
    }
}
