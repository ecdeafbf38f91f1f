//! Generation client: completion provider, JSON extraction and retry.
//!
//! Defines the [`CompletionClient`] trait with one HTTP implementation,
//! [`OpenAiCompatibleClient`], which speaks the `/chat/completions`
//! protocol (Groq by default).
//!
//! # Retry Strategy
//!
//! A generation is a small state machine:
//!
//! ```text
//! Initial ──parse ok──▶ Succeeded
//!    │
//!    └─parse failed──▶ Retrying ──parse ok──▶ Succeeded
//!                          │
//!                          └─parse failed──▶ Failed
//! ```
//!
//! The first call runs at an exploratory temperature. A single retry runs
//! colder and adds a corrective message asking for one bare JSON object.
//! Transport errors are not retried.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::{Duration, Instant};

use crate::config::GenerationConfig;
use crate::error::{preview, IdeaError};
use crate::models::IdeaDocument;

pub const SYSTEM_INSTRUCTION: &str = "Respond only with valid JSON.";
pub const CORRECTIVE_INSTRUCTION: &str =
    "Return only a single valid JSON object, with no markdown and no text before or after it.";
/// Characters of the last raw response kept in a [`IdeaError::Generation`].
pub const ERROR_PREVIEW_CHARS: usize = 800;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: &str) -> Self {
        Self {
            role: "system".to_string(),
            content: content.to_string(),
        }
    }

    pub fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }
}

/// A chat-completion backend.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Model identifier sent with each request.
    fn model_name(&self) -> &str;

    /// Send the conversation and return the first choice's text.
    async fn complete(&self, messages: &[ChatMessage], temperature: f32) -> Result<String>;
}

// ============ OpenAI-compatible HTTP client ============

pub struct OpenAiCompatibleClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiCompatibleClient {
    pub fn new(config: &GenerationConfig, api_key: &str, model: &str) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompatibleClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ChatMessage], temperature: f32) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature,
        };
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .context("Failed to send completion request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            bail!("Completion API error ({}): {}", status, error_text);
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .context("Failed to parse completion response")?;

        chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.unwrap_or_default().trim().to_string())
            .context("Completion response has no choices")
    }
}

// ============ JSON extraction ============

/// Pull a JSON object out of a model response.
///
/// Tries the whole trimmed text first, then the span from the first `{`
/// to the last `}`. Anything that is not an object counts as a failure.
pub fn extract_json(raw: &str) -> Option<Map<String, Value>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(trimmed) {
        return Some(obj);
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&trimmed[start..=end]) {
        Ok(Value::Object(obj)) => Some(obj),
        _ => None,
    }
}

// ============ Retry state machine ============

/// Bounded retry: one escalation to a colder, stricter call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub temperature: f32,
    pub retry_temperature: f32,
    pub corrective_instruction: String,
}

impl RetryPolicy {
    pub fn from_config(config: &GenerationConfig) -> Self {
        Self {
            temperature: config.temperature,
            retry_temperature: config.retry_temperature,
            corrective_instruction: CORRECTIVE_INSTRUCTION.to_string(),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&GenerationConfig::default())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GenerationState {
    Initial,
    Retrying,
    Succeeded {
        payload: Map<String, Value>,
        raw: String,
    },
    Failed {
        raw: String,
    },
}

/// A successful generation.
#[derive(Debug, Clone)]
pub struct Generation {
    pub payload: Map<String, Value>,
    pub idea: IdeaDocument,
    pub raw: String,
    pub attempts: u32,
    pub elapsed: Duration,
}

/// A failed generation: the typed error plus the raw text for diagnostics.
#[derive(Debug)]
pub struct GenerationFailure {
    pub error: anyhow::Error,
    pub last_raw: Option<String>,
    pub elapsed: Duration,
}

pub struct IdeaGenerator<'a> {
    client: &'a dyn CompletionClient,
    policy: RetryPolicy,
}

impl<'a> IdeaGenerator<'a> {
    pub fn new(client: &'a dyn CompletionClient, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    fn messages(&self, prompt: &str, corrective: bool) -> Vec<ChatMessage> {
        let mut messages = vec![
            ChatMessage::system(SYSTEM_INSTRUCTION),
            ChatMessage::user(prompt),
        ];
        if corrective {
            messages.push(ChatMessage::user(&self.policy.corrective_instruction));
        }
        messages
    }

    /// One completion call. Transport errors end the machine immediately.
    async fn attempt(
        &self,
        prompt: &str,
        retrying: bool,
        attempts: &mut u32,
        last_raw: &mut Option<String>,
        started: Instant,
    ) -> Result<String, GenerationFailure> {
        let temperature = if retrying {
            self.policy.retry_temperature
        } else {
            self.policy.temperature
        };
        *attempts += 1;
        let raw = self
            .client
            .complete(&self.messages(prompt, retrying), temperature)
            .await
            .map_err(|error| GenerationFailure {
                error,
                last_raw: last_raw.clone(),
                elapsed: started.elapsed(),
            })?;
        *last_raw = Some(raw.clone());
        Ok(raw)
    }

    /// Run the state machine to completion.
    ///
    /// On failure the [`GenerationFailure`] carries either the transport
    /// error or an [`IdeaError::Generation`] with a bounded preview.
    pub async fn generate(&self, prompt: &str) -> Result<Generation, GenerationFailure> {
        let started = Instant::now();
        let mut state = GenerationState::Initial;
        let mut attempts = 0;
        let mut last_raw: Option<String> = None;

        loop {
            state = match state {
                GenerationState::Initial => {
                    let raw = self
                        .attempt(prompt, false, &mut attempts, &mut last_raw, started)
                        .await?;
                    match extract_json(&raw) {
                        Some(payload) => GenerationState::Succeeded { payload, raw },
                        None => {
                            tracing::warn!(
                                attempt = attempts,
                                action = "retry_llm",
                                "json_extract_failed"
                            );
                            GenerationState::Retrying
                        }
                    }
                }
                GenerationState::Retrying => {
                    let raw = self
                        .attempt(prompt, true, &mut attempts, &mut last_raw, started)
                        .await?;
                    match extract_json(&raw) {
                        Some(payload) => GenerationState::Succeeded { payload, raw },
                        None => GenerationState::Failed { raw },
                    }
                }
                GenerationState::Succeeded { payload, raw } => {
                    return Ok(Generation {
                        idea: IdeaDocument::from_payload(&payload),
                        payload,
                        raw,
                        attempts,
                        elapsed: started.elapsed(),
                    });
                }
                GenerationState::Failed { raw } => {
                    return Err(GenerationFailure {
                        error: IdeaError::Generation {
                            preview: preview(&raw, ERROR_PREVIEW_CHARS),
                        }
                        .into(),
                        last_raw: Some(raw),
                        elapsed: started.elapsed(),
                    });
                }
            };
        }
    }
}
