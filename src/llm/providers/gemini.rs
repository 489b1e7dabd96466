//! Google Gemini provider, speaking the `generateContent` REST API.

use crate::config::GEMINI_CHAT_TEMPERATURE;
use crate::llm::http_utils::{create_http_client, extract_text_content, send_json_request};
use crate::llm::{LlmError, LlmProvider, Message};
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde_json::json;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Model provider backed by Google Gemini
pub struct GeminiProvider {
    http_client: HttpClient,
    api_key: String,
    base_url: String,
    timeout_secs: u64,
}

impl GeminiProvider {
    /// Create a provider against the production Gemini endpoint
    #[must_use]
    pub fn new(api_key: String, timeout_secs: u64) -> Self {
        Self::with_base_url(api_key, timeout_secs, DEFAULT_BASE_URL.to_string())
    }

    /// Create a provider against an alternate endpoint (used by tests)
    #[must_use]
    pub fn with_base_url(api_key: String, timeout_secs: u64, base_url: String) -> Self {
        Self {
            http_client: create_http_client(timeout_secs),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout_secs,
        }
    }

    fn generate_url(&self, model_id: &str) -> String {
        format!(
            "{}/models/{model_id}:generateContent?key={}",
            self.base_url, self.api_key
        )
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    async fn chat_completion(
        &self,
        system_prompt: &str,
        history: &[Message],
        user_message: &str,
        model_id: &str,
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        let mut contents = Vec::new();
        for msg in history {
            if msg.role != "system" {
                // Gemini names the assistant side "model"
                let role = if msg.role == "user" { "user" } else { "model" };
                contents.push(json!({
                    "role": role,
                    "parts": [{"text": msg.content}]
                }));
            }
        }
        contents.push(json!({
            "role": "user",
            "parts": [{"text": user_message}]
        }));

        let body = json!({
            "contents": contents,
            "system_instruction": {
                "parts": [{"text": system_prompt}]
            },
            "generationConfig": {
                "temperature": GEMINI_CHAT_TEMPERATURE,
                "maxOutputTokens": max_tokens
            }
        });

        let url = self.generate_url(model_id);
        let res_json =
            send_json_request(&self.http_client, &url, &body, self.timeout_secs).await?;
        extract_text_content(
            &res_json,
            &["candidates", "0", "content", "parts", "0", "text"],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_url_includes_model_and_key() {
        let provider = GeminiProvider::with_base_url(
            "secret".to_string(),
            30,
            "http://localhost:9999/v1beta/".to_string(),
        );
        assert_eq!(
            provider.generate_url("gemini-1.5-flash-latest"),
            "http://localhost:9999/v1beta/models/gemini-1.5-flash-latest:generateContent?key=secret"
        );
    }
}
