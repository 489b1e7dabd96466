//! Outbound delivery: posting reply activities back to the Bot
//! Framework connector named in the inbound activity's `serviceUrl`.

use crate::activity::Activity;
use crate::config::{
    Settings, BOT_FRAMEWORK_LOGIN_URL, BOT_FRAMEWORK_TOKEN_SCOPE, CONNECTOR_INITIAL_BACKOFF_MS,
    CONNECTOR_MAX_BACKOFF_MS, CONNECTOR_MAX_RETRIES,
};
use anyhow::{anyhow, bail, Context as _, Result};
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tracing::warn;

/// Credentials for the client-credentials grant
#[derive(Debug, Clone)]
struct AppCredentials {
    app_id: String,
    app_password: String,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

/// Client for posting activities to the connector service
pub struct ConnectorClient {
    http: reqwest::Client,
    credentials: Option<AppCredentials>,
    login_url: String,
    token_cache: Arc<RwLock<Option<CachedToken>>>,
}

impl ConnectorClient {
    /// Build a connector client from settings.
    ///
    /// Without configured app credentials no token is attached to
    /// outbound posts (local emulator mode).
    #[must_use]
    pub fn new(settings: &Settings) -> Self {
        let credentials = if settings.auth_configured() {
            Some(AppCredentials {
                app_id: settings.microsoft_app_id.clone().unwrap_or_default(),
                app_password: settings.microsoft_app_password.clone().unwrap_or_default(),
            })
        } else {
            None
        };

        let login_url = settings.microsoft_app_tenant_id.as_deref().map_or_else(
            || BOT_FRAMEWORK_LOGIN_URL.to_string(),
            |tenant| format!("https://login.microsoftonline.com/{tenant}/oauth2/v2.0/token"),
        );

        Self {
            http: reqwest::Client::new(),
            credentials,
            login_url,
            token_cache: Arc::new(RwLock::new(None)),
        }
    }

    /// Point token acquisition at an alternate login endpoint
    /// (used by tests)
    #[must_use]
    pub fn with_login_url(mut self, login_url: String) -> Self {
        self.login_url = login_url;
        self
    }

    /// Post a reply to the conversation the activity arrived on.
    ///
    /// Delivery is retried with jittered exponential backoff; the last
    /// error is returned once attempts are exhausted.
    ///
    /// # Errors
    ///
    /// Fails when the activity lacks a service URL or conversation,
    /// when no token can be obtained, or when every delivery attempt
    /// is rejected.
    pub async fn send_reply(&self, incoming: &Activity, text: &str) -> Result<()> {
        let service_url = incoming
            .service_url
            .as_deref()
            .ok_or_else(|| anyhow!("activity has no service URL"))?;
        let conversation_id = incoming
            .conversation
            .as_ref()
            .map(|c| c.id.as_str())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| anyhow!("activity has no conversation"))?;

        let reply = incoming.create_reply(text);
        let url = format!(
            "{}/v3/conversations/{conversation_id}/activities",
            service_url.trim_end_matches('/')
        );

        let strategy = ExponentialBackoff::from_millis(CONNECTOR_INITIAL_BACKOFF_MS)
            .max_delay(Duration::from_millis(CONNECTOR_MAX_BACKOFF_MS))
            .map(jitter)
            .take(CONNECTOR_MAX_RETRIES);

        Retry::spawn(strategy, || self.post_activity(&url, &reply))
            .await
            .map_err(|e| {
                warn!(
                    "Reply delivery to {} failed after {} attempts: {}",
                    url, CONNECTOR_MAX_RETRIES, e
                );
                e
            })
    }

    async fn post_activity(&self, url: &str, activity: &Activity) -> Result<()> {
        let mut request = self.http.post(url).json(activity);
        if let Some(token) = self.access_token().await? {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.context("connector request failed")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("connector returned {status}: {body}");
        }
        Ok(())
    }

    /// Get a connector access token, refreshing shortly before expiry.
    async fn access_token(&self) -> Result<Option<String>> {
        let Some(credentials) = &self.credentials else {
            return Ok(None);
        };

        {
            let cache = self.token_cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.expires_at > Instant::now() + Duration::from_secs(60) {
                    return Ok(Some(cached.token.clone()));
                }
            }
        }

        let response = self
            .http
            .post(&self.login_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", credentials.app_id.as_str()),
                ("client_secret", credentials.app_password.as_str()),
                ("scope", BOT_FRAMEWORK_TOKEN_SCOPE),
            ])
            .send()
            .await
            .context("token request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("token endpoint returned {status}: {body}");
        }

        let token: TokenResponse = response
            .json()
            .await
            .context("token response was not valid JSON")?;

        let cached = CachedToken {
            token: token.access_token.clone(),
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        };
        *self.token_cache.write().await = Some(cached);

        Ok(Some(token.access_token))
    }
}
