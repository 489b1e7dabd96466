//! HTTP surface: the Bot Framework webhook, a health probe, and a
//! local-development chat endpoint.

use crate::activity::{Activity, ACTIVITY_TYPE_CONVERSATION_UPDATE, ACTIVITY_TYPE_MESSAGE};
use crate::agent::{DigitalAgent, UploadedFile};
use crate::bot::auth::TokenValidator;
use crate::bot::connector::ConnectorClient;
use crate::config::Settings;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Shared state for the HTTP handlers
pub struct AppState {
    /// Immutable service configuration
    pub settings: Arc<Settings>,
    /// The conversational agent
    pub agent: Arc<DigitalAgent>,
    /// Outbound reply delivery
    pub connector: Arc<ConnectorClient>,
    /// Inbound token validation; `None` in emulator mode
    pub validator: Option<Arc<TokenValidator>>,
    /// Client for fetching attachment content
    pub http: reqwest::Client,
}

/// Build the service router.
///
/// `POST /test` is only mounted in emulator mode, where inbound
/// validation is disabled anyway.
pub fn router(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .route("/api/messages", post(messages))
        .route("/health", get(health));

    if !state.settings.auth_configured() {
        router = router.route("/test", post(test_chat));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    model: String,
    timestamp: String,
}

#[derive(Debug, Deserialize)]
struct TestChatRequest {
    message: String,
    #[serde(default)]
    user_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct TestChatResponse {
    reply: String,
    timestamp: String,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        model: state.settings.gemini_model.clone(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Direct chat endpoint for local testing without a Bot Framework
/// client in front.
async fn test_chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TestChatRequest>,
) -> impl IntoResponse {
    let user_id = request.user_id.unwrap_or_else(|| "test_user".to_string());
    let reply = state.agent.handle(&user_id, &request.message, &[]).await;

    Json(TestChatResponse {
        reply,
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// The Bot Framework messaging endpoint.
async fn messages(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(activity): Json<Activity>,
) -> Response {
    if let Some(validator) = &state.validator {
        let auth_header = headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok());
        if let Err(e) = validator.validate(auth_header).await {
            warn!("Rejected inbound activity: {}", e);
            return StatusCode::UNAUTHORIZED.into_response();
        }
    }

    match activity.activity_type.as_str() {
        ACTIVITY_TYPE_MESSAGE => handle_message(&state, &activity).await,
        ACTIVITY_TYPE_CONVERSATION_UPDATE => handle_conversation_update(&state, &activity).await,
        other => {
            debug!("Ignoring activity type: {}", other);
            StatusCode::OK.into_response()
        }
    }
}

async fn handle_message(state: &AppState, activity: &Activity) -> Response {
    let Some(conversation_id) = activity.conversation_key() else {
        return (StatusCode::BAD_REQUEST, "activity has no conversation").into_response();
    };

    let text = activity.text.clone().unwrap_or_default();
    let files = download_attachments(state, activity).await;

    if text.trim().is_empty() && files.is_empty() {
        debug!("Message activity with no usable content; acknowledging");
        return StatusCode::OK.into_response();
    }

    let reply = state.agent.handle(&conversation_id, &text, &files).await;
    deliver_reply(state, activity, &reply).await;

    StatusCode::OK.into_response()
}

async fn handle_conversation_update(state: &AppState, activity: &Activity) -> Response {
    let bot_id = activity.recipient.as_ref().map(|r| r.id.as_str());

    if let Some(members) = &activity.members_added {
        for member in members {
            if Some(member.id.as_str()) != bot_id {
                deliver_reply(state, activity, state.agent.welcome_message()).await;
            }
        }
    }

    StatusCode::OK.into_response()
}

/// Post the reply when the activity names a connector; otherwise log
/// it (emulator payloads without a service URL).
async fn deliver_reply(state: &AppState, activity: &Activity, reply: &str) {
    if activity.service_url.is_some() {
        if let Err(e) = state.connector.send_reply(activity, reply).await {
            warn!("Failed to deliver reply: {:#}", e);
        }
    } else {
        info!("No service URL on activity; reply: {}", reply);
    }
}

/// Fetch the content of each usable attachment.
///
/// Teams includes a `text/html` rendering of the message itself as an
/// attachment; that and anything without a content URL is skipped.
/// Download failures are logged and skipped so the message text still
/// gets answered.
async fn download_attachments(state: &AppState, activity: &Activity) -> Vec<UploadedFile> {
    let Some(attachments) = &activity.attachments else {
        return Vec::new();
    };

    let mut files = Vec::new();
    for attachment in attachments {
        if attachment.content_type.as_deref() == Some("text/html") {
            continue;
        }
        let Some(url) = attachment.download_url() else {
            continue;
        };
        let name = attachment
            .name
            .clone()
            .unwrap_or_else(|| "attachment".to_string());

        match fetch_attachment(state, url).await {
            Ok(bytes) => files.push(UploadedFile {
                name,
                content_type: attachment.content_type.clone(),
                bytes,
            }),
            Err(e) => warn!("Failed to download attachment {}: {:#}", name, e),
        }
    }
    files
}

async fn fetch_attachment(state: &AppState, url: &str) -> anyhow::Result<Vec<u8>> {
    let response = state.http.get(url).send().await?;
    if !response.status().is_success() {
        anyhow::bail!("attachment fetch returned {}", response.status());
    }

    // Far-oversized bodies are dropped here; the document processor
    // enforces the exact cap and produces the user-facing message.
    let hard_cap = state.settings.max_file_size_bytes().saturating_mul(4);
    if let Some(length) = response.content_length() {
        if length as usize > hard_cap {
            anyhow::bail!("attachment of {} bytes exceeds the download cap", length);
        }
    }

    let bytes = response.bytes().await?;
    Ok(bytes.to_vec())
}
