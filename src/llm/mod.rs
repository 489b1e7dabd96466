//! Model client: provider trait, error classification, and the
//! facade the agent talks to.

pub mod http_utils;
pub mod providers;

use crate::config::{Settings, GEMINI_MAX_OUTPUT_TOKENS};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure classes for model requests.
///
/// The agent maps each class to a user-facing message; nothing here is
/// fatal to the process.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The vendor rejected the request for quota reasons (HTTP 429)
    #[error("rate limited: {0}")]
    RateLimited(String),
    /// The API key was rejected (HTTP 401/403)
    #[error("authentication failed: {0}")]
    AuthFailed(String),
    /// The request exceeded the configured timeout
    #[error("request timed out after {0}s")]
    Timeout(u64),
    /// Any other non-success response from the vendor
    #[error("API error: {0}")]
    Api(String),
    /// Connectivity failure before a response was received
    #[error("network error: {0}")]
    Network(String),
    /// The response body did not have the expected shape
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    /// Missing client/API key
    #[error("missing configuration: {0}")]
    MissingConfig(String),
}

/// One prompt turn as sent to a provider
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Message {
    /// "user" or "assistant"
    pub role: String,
    /// Message text
    pub content: String,
}

/// A hosted generative-model backend
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send system instructions, prior turns, and the new user message;
    /// return the completion text.
    async fn chat_completion(
        &self,
        system_prompt: &str,
        history: &[Message],
        user_message: &str,
        model_id: &str,
        max_tokens: u32,
    ) -> Result<String, LlmError>;
}

/// Facade owning the configured provider and model id
pub struct LlmClient {
    provider: Box<dyn LlmProvider>,
    model_id: String,
}

impl LlmClient {
    /// Build a client from settings.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::MissingConfig`] if no API key is configured.
    pub fn new(settings: &Settings) -> Result<Self, LlmError> {
        let api_key = settings
            .gemini_api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| LlmError::MissingConfig("GEMINI_API_KEY".to_string()))?;

        let provider = providers::GeminiProvider::new(
            api_key.to_string(),
            settings.llm_http_timeout_secs,
        );

        Ok(Self {
            provider: Box::new(provider),
            model_id: settings.gemini_model.clone(),
        })
    }

    /// Build a client around an arbitrary provider (used by tests)
    #[must_use]
    pub fn with_provider(provider: Box<dyn LlmProvider>, model_id: String) -> Self {
        Self { provider, model_id }
    }

    /// Model identifier requests are sent to
    #[must_use]
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Request a completion for the given prompt turns.
    ///
    /// # Errors
    ///
    /// Propagates the provider's classified [`LlmError`].
    pub async fn chat_completion(
        &self,
        system_prompt: &str,
        history: &[Message],
        user_message: &str,
    ) -> Result<String, LlmError> {
        self.provider
            .chat_completion(
                system_prompt,
                history,
                user_message,
                &self.model_id,
                GEMINI_MAX_OUTPUT_TOKENS,
            )
            .await
    }
}
