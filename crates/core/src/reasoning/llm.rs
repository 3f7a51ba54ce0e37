//! Model-backed reasoning through the `llm` crate.

use super::parse::parse_reply;
use super::prompt::{user_message, SYSTEM_PROMPT};
use super::{Reasoner, ReasoningMode, ReasoningOutput, ReasoningRequest};
use crate::constants::LLM_MAX_ATTEMPTS;
use crate::error::{CorepError, CorepResult};
use async_trait::async_trait;
use llm::builder::{LLMBackend, LLMBuilder};
use llm::chat::ChatMessage;
use std::sync::Arc;
use std::time::Duration;

const TEMPERATURE: f32 = 0.1;
const MAX_TOKENS: u32 = 2000;

/// Resolve a provider name to an `llm` backend.
///
/// # Errors
/// Returns `InvalidConfig` for providers the build does not support.
pub fn map_backend(provider: &str) -> CorepResult<LLMBackend> {
    match provider.trim().to_lowercase().as_str() {
        "openai" => Ok(LLMBackend::OpenAI),
        "anthropic" => Ok(LLMBackend::Anthropic),
        "google" => Ok(LLMBackend::Google),
        "ollama" => Ok(LLMBackend::Ollama),
        "groq" => Ok(LLMBackend::Groq),
        "mistral" => Ok(LLMBackend::Mistral),
        "deepseek" => Ok(LLMBackend::DeepSeek),
        other => Err(CorepError::InvalidConfig(format!(
            "unknown LLM provider: {other}"
        ))),
    }
}

/// Connection settings for a chat model.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub provider: String,
    pub model: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

/// A single system + user exchange with a chat model.
///
/// This is the seam tests use to script backend behaviour.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// `provider:model`, for logs and the audit trail.
    fn describe(&self) -> String;

    /// # Errors
    /// `BackendUnavailable` when the model cannot be reached or refuses the request.
    async fn complete(&self, system: &str, user: &str) -> CorepResult<String>;
}

pub struct LlmChatBackend {
    settings: LlmSettings,
}

impl LlmChatBackend {
    /// # Errors
    /// Returns `InvalidConfig` for an unknown provider.
    pub fn new(settings: LlmSettings) -> CorepResult<Self> {
        map_backend(&settings.provider)?;
        Ok(Self { settings })
    }
}

#[async_trait]
impl ChatBackend for LlmChatBackend {
    fn describe(&self) -> String {
        format!("{}:{}", self.settings.provider, self.settings.model)
    }

    async fn complete(&self, system: &str, user: &str) -> CorepResult<String> {
        let mut builder = LLMBuilder::new()
            .backend(map_backend(&self.settings.provider)?)
            .model(&self.settings.model)
            .system(system)
            .temperature(TEMPERATURE)
            .max_tokens(MAX_TOKENS)
            .timeout_seconds(self.settings.timeout_secs);
        if !self.settings.api_key.is_empty() {
            builder = builder.api_key(&self.settings.api_key);
        }

        let llm = builder
            .build()
            .map_err(|e| CorepError::InvalidConfig(format!("build LLM: {e}")))?;

        let messages = vec![ChatMessage::user().content(user).build()];
        let response = llm
            .chat(&messages)
            .await
            .map_err(|e| CorepError::BackendUnavailable(format!("chat: {e}")))?;

        match response.text() {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(CorepError::MalformedResponse("LLM returned no text".into())),
        }
    }
}

/// Reasoner that prompts a chat model and parses its reply.
///
/// Each attempt is bounded by `attempt_timeout`; an attempt that runs out of time counts as
/// `BackendUnavailable`, so it is retried and can trigger a heuristic fallback.
pub struct LlmReasoner {
    backend: Arc<dyn ChatBackend>,
    attempt_timeout: Duration,
}

impl LlmReasoner {
    pub fn new(backend: Arc<dyn ChatBackend>, attempt_timeout: Duration) -> Self {
        Self {
            backend,
            attempt_timeout,
        }
    }

    async fn attempt(&self, user: &str) -> CorepResult<String> {
        match tokio::time::timeout(self.attempt_timeout, self.backend.complete(SYSTEM_PROMPT, user))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(CorepError::BackendUnavailable(format!(
                "no reply within {} seconds",
                self.attempt_timeout.as_secs()
            ))),
        }
    }
}

#[async_trait]
impl Reasoner for LlmReasoner {
    fn mode(&self) -> ReasoningMode {
        ReasoningMode::Llm
    }

    async fn generate(&self, request: &ReasoningRequest<'_>) -> CorepResult<ReasoningOutput> {
        let user = user_message(request);
        let mut attempt = 1;

        let raw = loop {
            match self.attempt(&user).await {
                Ok(raw) => break raw,
                Err(CorepError::BackendUnavailable(reason)) if attempt < LLM_MAX_ATTEMPTS => {
                    tracing::warn!(
                        "{} attempt {} failed, retrying: {}",
                        self.backend.describe(),
                        attempt,
                        reason
                    );
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        };

        tracing::debug!("raw reply from {}: {}", self.backend.describe(), raw);
        let mut output = parse_reply(&raw, request.template)?;
        output
            .notes
            .insert(0, format!("Fields generated by {}", self.backend.describe()));
        Ok(output)
    }
}
