//! LLM-backed whole-file fix strategy.
//!
//! Sends the file content and defect list to an OpenAI-compatible chat
//! endpoint and expects a strict JSON document back. Any transport, schema,
//! or parse failure returns `None` so the caller falls through to the
//! deterministic path - never a silent empty result.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::LlmConfig;
use crate::types::Defect;

use super::FixStrategy;

/// Fix strategy backed by an OpenAI-compatible chat completion API.
pub struct LlmFixer {
    client: reqwest::Client,
    config: LlmConfig,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// The strict schema the model must answer with.
#[derive(Debug, Deserialize)]
struct RevisedFile {
    revised_content: String,
}

impl LlmFixer {
    /// Build the strategy from configuration; `None` when no API key is set.
    #[must_use]
    pub fn from_config(config: &LlmConfig) -> Option<Self> {
        config.api_key.as_ref()?;
        Some(Self {
            client: reqwest::Client::new(),
            config: config.clone(),
        })
    }

    fn prompt(file: &str, content: &str, defects: &[Defect]) -> String {
        let issues = defects
            .iter()
            .map(|d| {
                format!(
                    "line {}: {} - {}",
                    d.line_number, d.category, d.description
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "Fix the following Python file by addressing these issues and \
             nothing else.\n\nFile: {file}\n\nIssues:\n{issues}\n\n\
             Original code:\n```python\n{content}\n```\n\n\
             Respond with a single JSON object of the form \
             {{\"revised_content\": \"<entire corrected file>\"}}. \
             Make minimal changes and keep the code functionally equivalent."
        )
    }
}

#[async_trait]
impl FixStrategy for LlmFixer {
    async fn revise_file(&self, file: &str, content: &str, defects: &[Defect]) -> Option<String> {
        let api_key = self.config.api_key.as_deref()?;
        let url = format!("{}/chat/completions", self.config.api_base);

        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: "You are an expert Python code fixer. Respond only with the \
                              requested JSON object."
                        .to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: Self::prompt(file, content, defects),
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        debug!(file, defects = defects.len(), "requesting LLM revision");

        let response = match self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
        {
            Ok(response) => response,
            Err(e) => {
                warn!(file, "LLM request failed: {e}");
                return None;
            }
        };

        let chat: ChatResponse = match response.json().await {
            Ok(chat) => chat,
            Err(e) => {
                warn!(file, "LLM response was not valid JSON: {e}");
                return None;
            }
        };

        let answer = chat.choices.into_iter().next()?.message.content;

        // Strict schema: anything that does not parse falls back to the
        // deterministic path.
        match serde_json::from_str::<RevisedFile>(answer.trim()) {
            Ok(revised) if !revised.revised_content.is_empty() => Some(revised.revised_content),
            Ok(_) => {
                warn!(file, "LLM returned empty revised content");
                None
            }
            Err(e) => {
                warn!(file, "LLM answer did not match schema: {e}");
                None
            }
        }
    }
}
