//! Autonomous CI/CD healing agent.
//!
//! Given a repository URL, the agent clones it, scans source files for a
//! fixed taxonomy of defects, synthesizes minimal fixes, commits them on a
//! derived branch under a strict naming/protection policy, and polls CI
//! until it passes or the retry budget runs out. Completed runs are scored
//! on speed and commit efficiency.
//!
//! The outward-facing API is [`service::HealerService`]; every external
//! capability (git, CI status, the optional LLM fix strategy) is a trait so
//! backends stay pluggable.

pub mod branch;
pub mod config;
pub mod error;
pub mod events;
pub mod fix;
pub mod guard;
pub mod orchestrator;
pub mod poller;
pub mod registry;
pub mod scanner;
pub mod score;
pub mod service;
pub mod types;

pub use config::HealerConfig;
pub use error::HealerError;
pub use service::{HealerService, StartedRun};
pub use types::{BugCategory, CiAttempt, CiStatus, Defect, Fix, FixStatus, Run, RunStatus, Score};
