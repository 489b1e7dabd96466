//! Router-level tests: activity dispatch, auth rejection, health, and
//! the local test endpoint.

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use std::sync::Arc;
use teams_digital_agent::agent::DigitalAgent;
use teams_digital_agent::bot::{router, AppState, ConnectorClient, TokenValidator};
use teams_digital_agent::config::Settings;
use teams_digital_agent::documents::DocumentProcessor;
use teams_digital_agent::llm::{LlmClient, LlmError, LlmProvider, Message};
use teams_digital_agent::agent::history::ConversationStore;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct ScriptedProvider(&'static str);

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn chat_completion(
        &self,
        _system_prompt: &str,
        _history: &[Message],
        _user_message: &str,
        _model_id: &str,
        _max_tokens: u32,
    ) -> Result<String, LlmError> {
        Ok(self.0.to_string())
    }
}

fn emulator_settings() -> Settings {
    serde_json::from_value(serde_json::json!({"gemini_api_key": "k"}))
        .expect("settings from defaults")
}

fn make_state(settings: Settings, validator: Option<Arc<TokenValidator>>) -> Arc<AppState> {
    let settings = Arc::new(settings);
    let llm = LlmClient::with_provider(
        Box::new(ScriptedProvider("scripted reply")),
        "gemini-test".to_string(),
    );
    let documents = DocumentProcessor::new(settings.max_file_size_bytes(), 2000);
    let store = ConversationStore::new(settings.max_conversation_history, 60, 100);
    let agent = Arc::new(DigitalAgent::with_parts(llm, documents, store, &settings));

    Arc::new(AppState {
        settings: settings.clone(),
        agent,
        connector: Arc::new(ConnectorClient::new(&settings)),
        validator,
        http: reqwest::Client::new(),
    })
}

fn post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn message_activity(service_url: &str, text: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "message",
        "id": "act-1",
        "serviceUrl": service_url,
        "channelId": "emulator",
        "from": {"id": "user-1", "name": "Ada"},
        "recipient": {"id": "bot-1", "name": "Digital Agent"},
        "conversation": {"id": "conv-1"},
        "text": text
    })
}

#[tokio::test]
async fn message_activity_is_answered_via_connector() {
    let connector_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v3/conversations/conv-1/activities"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&connector_server)
        .await;

    let app = router(make_state(emulator_settings(), None));
    let activity = message_activity(&connector_server.uri(), "Hello bot");

    let response = app
        .oneshot(post_json("/api/messages", &activity))
        .await
        .expect("router response");
    assert_eq!(response.status(), StatusCode::OK);

    let requests = connector_server.received_requests().await.unwrap_or_default();
    assert_eq!(requests.len(), 1);
    let posted: serde_json::Value =
        serde_json::from_slice(&requests[0].body).expect("posted activity json");
    assert_eq!(posted["type"], "message");
    assert_eq!(posted["text"], "scripted reply");
    assert_eq!(posted["from"]["id"], "bot-1");
    assert_eq!(posted["recipient"]["id"], "user-1");
    assert_eq!(posted["replyToId"], "act-1");
}

#[tokio::test]
async fn missing_bearer_token_is_rejected_when_auth_enabled() {
    let mut settings = emulator_settings();
    settings.microsoft_app_id = Some("app-id".to_string());
    settings.microsoft_app_password = Some("secret".to_string());

    let validator = Arc::new(TokenValidator::with_metadata_url(
        "app-id".to_string(),
        "http://127.0.0.1:1/metadata".to_string(),
    ));
    let app = router(make_state(settings, Some(validator)));

    let activity = message_activity("http://unused", "Hello");
    let response = app
        .oneshot(post_json("/api/messages", &activity))
        .await
        .expect("router response");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn non_message_activity_is_acknowledged_without_agent_call() {
    let connector_server = MockServer::start().await;

    let app = router(make_state(emulator_settings(), None));
    let activity = serde_json::json!({
        "type": "typing",
        "serviceUrl": connector_server.uri(),
        "conversation": {"id": "conv-1"}
    });

    let response = app
        .oneshot(post_json("/api/messages", &activity))
        .await
        .expect("router response");
    assert_eq!(response.status(), StatusCode::OK);

    // Nothing was posted back
    let requests = connector_server.received_requests().await.unwrap_or_default();
    assert!(requests.is_empty());
}

#[tokio::test]
async fn conversation_update_greets_new_members() {
    let connector_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v3/conversations/conv-1/activities"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&connector_server)
        .await;

    let app = router(make_state(emulator_settings(), None));
    let activity = serde_json::json!({
        "type": "conversationUpdate",
        "serviceUrl": connector_server.uri(),
        "recipient": {"id": "bot-1"},
        "conversation": {"id": "conv-1"},
        "membersAdded": [{"id": "user-9"}, {"id": "bot-1"}]
    });

    let response = app
        .oneshot(post_json("/api/messages", &activity))
        .await
        .expect("router response");
    assert_eq!(response.status(), StatusCode::OK);

    let requests = connector_server.received_requests().await.unwrap_or_default();
    assert_eq!(requests.len(), 1);
    let posted: serde_json::Value =
        serde_json::from_slice(&requests[0].body).expect("posted activity json");
    assert!(posted["text"]
        .as_str()
        .unwrap_or_default()
        .contains("Welcome"));
}

#[tokio::test]
async fn health_endpoint_reports_model() {
    let app = router(make_state(emulator_settings(), None));

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/health")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("router response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let json: serde_json::Value = serde_json::from_slice(&body).expect("health json");
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["model"], "gemini-1.5-flash-latest");
}

#[tokio::test]
async fn test_endpoint_available_in_emulator_mode_only() {
    // Emulator mode: direct chat works
    let app = router(make_state(emulator_settings(), None));
    let response = app
        .oneshot(post_json(
            "/test",
            &serde_json::json!({"message": "ping"}),
        ))
        .await
        .expect("router response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let json: serde_json::Value = serde_json::from_slice(&body).expect("test json");
    assert_eq!(json["reply"], "scripted reply");

    // With credentials configured the endpoint is not mounted
    let mut settings = emulator_settings();
    settings.microsoft_app_id = Some("app-id".to_string());
    settings.microsoft_app_password = Some("secret".to_string());
    let app = router(make_state(settings, None));

    let response = app
        .oneshot(post_json(
            "/test",
            &serde_json::json!({"message": "ping"}),
        ))
        .await
        .expect("router response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
