//! Scripted CI source for tests and offline demos.
//!
//! The healing loop never special-cases simulated CI; it only ever sees the
//! [`CiStatusSource`] trait. This module supplies the pluggable stand-in used
//! when no real CI backend is reachable.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::{CiRunSnapshot, CiStatusSource, ScmError};

/// One scripted answer to a status query.
#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    /// Return this run snapshot.
    Run(CiRunSnapshot),
    /// No run has started for the branch yet.
    NoRuns,
    /// The query itself fails (network-style error).
    QueryError(String),
}

/// CI source that replays a fixed sequence of responses.
///
/// Each query consumes the next response; the final response repeats once the
/// script is exhausted, so a scripted "pass" stays passed.
pub struct ScriptedCi {
    responses: Mutex<VecDeque<ScriptedResponse>>,
}

impl ScriptedCi {
    /// Create a source that replays `responses` in order.
    #[must_use]
    pub fn new(responses: Vec<ScriptedResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
        }
    }

    /// Script `failures` completed-and-failed runs followed by a passing run.
    #[must_use]
    pub fn fail_then_pass(failures: usize) -> Self {
        let mut responses: Vec<ScriptedResponse> = (0..failures)
            .map(|_| ScriptedResponse::Run(Self::failed_run()))
            .collect();
        responses.push(ScriptedResponse::Run(Self::passed_run()));
        Self::new(responses)
    }

    /// A completed run that concluded successfully.
    #[must_use]
    pub fn passed_run() -> CiRunSnapshot {
        CiRunSnapshot {
            status: "completed".to_string(),
            conclusion: Some("success".to_string()),
            run_url: None,
        }
    }

    /// A completed run that concluded in failure.
    #[must_use]
    pub fn failed_run() -> CiRunSnapshot {
        CiRunSnapshot {
            status: "completed".to_string(),
            conclusion: Some("failure".to_string()),
            run_url: None,
        }
    }

    fn next_response(&self) -> ScriptedResponse {
        let mut responses = self.responses.lock().unwrap_or_else(|e| e.into_inner());
        if responses.len() > 1 {
            responses.pop_front().unwrap_or(ScriptedResponse::NoRuns)
        } else {
            responses.front().cloned().unwrap_or(ScriptedResponse::NoRuns)
        }
    }
}

#[async_trait]
impl CiStatusSource for ScriptedCi {
    async fn latest_run(
        &self,
        _repo_url: &str,
        _branch: &str,
    ) -> Result<Option<CiRunSnapshot>, ScmError> {
        match self.next_response() {
            ScriptedResponse::Run(run) => Ok(Some(run)),
            ScriptedResponse::NoRuns => Ok(None),
            ScriptedResponse::QueryError(message) => Err(ScmError::Git(message)),
        }
    }
}
