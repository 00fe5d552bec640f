//! Configuration for the healing agent.
//!
//! Every knob has a serde default so a config can be loaded from JSON, and
//! [`HealerConfig::from_env`] builds one from the environment the way the
//! agent is deployed in practice.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the CI poller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Delay before the first status query, giving CI time to pick up the push.
    #[serde(default = "default_settle_secs")]
    pub settle_secs: u64,
    /// Sleep between status queries.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Overall polling deadline per monitoring phase.
    #[serde(default = "default_ci_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_settle_secs() -> u64 {
    15
}
fn default_interval_secs() -> u64 {
    30
}
fn default_ci_timeout_secs() -> u64 {
    300
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            settle_secs: default_settle_secs(),
            interval_secs: default_interval_secs(),
            timeout_secs: default_ci_timeout_secs(),
        }
    }
}

/// Configuration for the optional LLM fix strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// API key; the strategy is disabled when unset.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_temperature")]
    pub temperature: f32,
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: u32,
    /// OpenAI-compatible API base URL.
    #[serde(default = "default_llm_api_base")]
    pub api_base: String,
}

fn default_llm_model() -> String {
    "gpt-3.5-turbo".to_string()
}
fn default_llm_temperature() -> f32 {
    0.1
}
fn default_llm_max_tokens() -> u32 {
    1500
}
fn default_llm_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_llm_model(),
            temperature: default_llm_temperature(),
            max_tokens: default_llm_max_tokens(),
            api_base: default_llm_api_base(),
        }
    }
}

/// Top-level configuration for the healing agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealerConfig {
    /// Token for authenticated clone/push and CI queries.
    #[serde(default)]
    pub github_token: Option<String>,
    /// Healing-loop retry budget.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Clone timeout in seconds.
    #[serde(default = "default_clone_timeout_secs")]
    pub clone_timeout_secs: u64,
    /// Ceiling on files scanned per iteration.
    #[serde(default = "default_max_files")]
    pub max_files: usize,
    /// Ceiling on total fixes per run.
    #[serde(default = "default_max_fixes")]
    pub max_fixes: usize,
    /// Overall deadline for one run before it is abandoned.
    #[serde(default = "default_run_timeout_secs")]
    pub run_timeout_secs: u64,
    /// Directory where terminal run snapshots are persisted.
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,
    #[serde(default)]
    pub poller: PollerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

fn default_max_retries() -> u32 {
    5
}
fn default_clone_timeout_secs() -> u64 {
    60
}
fn default_max_files() -> usize {
    20
}
fn default_max_fixes() -> usize {
    50
}
fn default_run_timeout_secs() -> u64 {
    1800
}
fn default_results_dir() -> PathBuf {
    PathBuf::from("./results")
}

impl Default for HealerConfig {
    fn default() -> Self {
        Self {
            github_token: None,
            max_retries: default_max_retries(),
            clone_timeout_secs: default_clone_timeout_secs(),
            max_files: default_max_files(),
            max_fixes: default_max_fixes(),
            run_timeout_secs: default_run_timeout_secs(),
            results_dir: default_results_dir(),
            poller: PollerConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

impl HealerConfig {
    /// Build a configuration from environment variables, falling back to
    /// defaults for anything unset or unparseable.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            github_token: env_string("GITHUB_TOKEN"),
            max_retries: env_parse("MAX_RETRIES", default_max_retries()),
            clone_timeout_secs: env_parse("HEALER_CLONE_TIMEOUT_SECS", default_clone_timeout_secs()),
            max_files: env_parse("HEALER_MAX_FILES", default_max_files()),
            max_fixes: env_parse("HEALER_MAX_FIXES", default_max_fixes()),
            run_timeout_secs: env_parse("HEALER_RUN_TIMEOUT_SECS", default_run_timeout_secs()),
            results_dir: env_string("HEALER_RESULTS_DIR")
                .map_or_else(default_results_dir, PathBuf::from),
            poller: PollerConfig {
                settle_secs: env_parse("HEALER_CI_SETTLE_SECS", default_settle_secs()),
                interval_secs: env_parse("HEALER_CI_INTERVAL_SECS", default_interval_secs()),
                timeout_secs: env_parse("HEALER_CI_TIMEOUT_SECS", default_ci_timeout_secs()),
            },
            llm: LlmConfig {
                api_key: env_string("OPENAI_API_KEY"),
                model: env_string("LLM_MODEL").unwrap_or_else(default_llm_model),
                temperature: env_parse("LLM_TEMPERATURE", default_llm_temperature()),
                max_tokens: env_parse("MAX_TOKENS", default_llm_max_tokens()),
                api_base: env_string("LLM_API_BASE").unwrap_or_else(default_llm_api_base),
            },
        }
    }
}

/// Read an environment variable, treating empty values as unset.
fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Parse an environment variable, falling back to `default`.
fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HealerConfig::default();
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.max_files, 20);
        assert_eq!(config.max_fixes, 50);
        assert_eq!(config.poller.timeout_secs, 300);
        assert_eq!(config.llm.model, "gpt-3.5-turbo");
    }

    #[test]
    fn test_deserialize_partial_json() {
        let config: HealerConfig =
            serde_json::from_str(r#"{"max_retries": 3, "poller": {"interval_secs": 5}}"#).unwrap();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.poller.interval_secs, 5);
        assert_eq!(config.poller.settle_secs, 15);
    }
}
