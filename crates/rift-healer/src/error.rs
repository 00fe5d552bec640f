//! Error taxonomy for the healing pipeline.
//!
//! File-level and defect-level failures are contained and surface as data on
//! the run (skipped files, `Failed` fixes, `ERROR` CI attempts). The variants
//! here are the failures that abort a phase or the whole run.

use thiserror::Error;

/// Errors raised by the healing core.
#[derive(Debug, Error)]
pub enum HealerError {
    /// Repository clone failed; fatal to the run.
    #[error("clone failed: {0}")]
    Clone(String),

    /// Refused to write to a protected branch; fatal to the commit step.
    #[error("refusing to write to protected branch '{0}'")]
    ProtectedBranch(String),

    /// A file could not be read for scanning; the file is skipped.
    #[error("scan failed for {file}: {message}")]
    Scan { file: String, message: String },

    /// The repository URL is not a usable GitHub URL.
    #[error("invalid repository url: {0}")]
    InvalidRepoUrl(String),

    /// SCM capability failure.
    #[error(transparent)]
    Scm(#[from] rift_scm::ScmError),

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
