//! Gemini provider against a mocked HTTP server: request shape,
//! response parsing, and error classification.

use std::time::Duration;
use teams_digital_agent::llm::providers::GeminiProvider;
use teams_digital_agent::llm::{LlmError, LlmProvider, Message};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn provider_for(server: &MockServer, timeout_secs: u64) -> GeminiProvider {
    GeminiProvider::with_base_url(
        "test-key".to_string(),
        timeout_secs,
        format!("{}/v1beta", server.uri()),
    )
}

fn history() -> Vec<Message> {
    vec![
        Message {
            role: "user".to_string(),
            content: "Q1".to_string(),
        },
        Message {
            role: "assistant".to_string(),
            content: "A1".to_string(),
        },
    ]
}

#[tokio::test]
async fn request_shape_and_response_parsing() -> Result<(), LlmError> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-test:generateContent"))
        .and(query_param("key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "candidates": [{
                "content": {"parts": [{"text": "The answer."}]}
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_for(&server, 5);
    let reply = provider
        .chat_completion("system text", &history(), "Q2", "gemini-test", 256)
        .await?;
    assert_eq!(reply, "The answer.");

    let requests = server.received_requests().await.unwrap_or_default();
    let body: serde_json::Value =
        serde_json::from_slice(&requests[0].body).expect("request body json");

    // History maps user/assistant onto Gemini's user/model roles,
    // with the new input appended last
    let contents = body["contents"].as_array().expect("contents array");
    assert_eq!(contents.len(), 3);
    assert_eq!(contents[0]["role"], "user");
    assert_eq!(contents[1]["role"], "model");
    assert_eq!(contents[2]["role"], "user");
    assert_eq!(contents[2]["parts"][0]["text"], "Q2");

    assert_eq!(body["system_instruction"]["parts"][0]["text"], "system text");
    assert_eq!(body["generationConfig"]["maxOutputTokens"], 256);
    Ok(())
}

#[tokio::test]
async fn quota_exhaustion_maps_to_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
        .mount(&server)
        .await;

    let result = provider_for(&server, 5)
        .chat_completion("s", &[], "hi", "gemini-test", 64)
        .await;
    assert!(matches!(result, Err(LlmError::RateLimited(_))));
}

#[tokio::test]
async fn rejected_key_maps_to_auth_failed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_string("API key invalid"))
        .mount(&server)
        .await;

    let result = provider_for(&server, 5)
        .chat_completion("s", &[], "hi", "gemini-test", 64)
        .await;
    assert!(matches!(result, Err(LlmError::AuthFailed(_))));
}

#[tokio::test]
async fn slow_response_maps_to_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(5))
                .set_body_json(serde_json::json!({"candidates": []})),
        )
        .mount(&server)
        .await;

    let result = provider_for(&server, 1)
        .chat_completion("s", &[], "hi", "gemini-test", 64)
        .await;
    assert!(matches!(result, Err(LlmError::Timeout(1))));
}

#[tokio::test]
async fn unexpected_body_maps_to_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "candidates": []
        })))
        .mount(&server)
        .await;

    let result = provider_for(&server, 5)
        .chat_completion("s", &[], "hi", "gemini-test", 64)
        .await;
    assert!(matches!(result, Err(LlmError::InvalidResponse(_))));
}

#[tokio::test]
async fn server_error_maps_to_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .mount(&server)
        .await;

    let result = provider_for(&server, 5)
        .chat_completion("s", &[], "hi", "gemini-test", 64)
        .await;
    assert!(matches!(result, Err(LlmError::Api(_))));
}
