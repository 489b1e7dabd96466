//! Configuration and settings management
//!
//! Loads settings from environment variables and defines service constants.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Google Gemini API key (required)
    pub gemini_api_key: Option<String>,

    /// Gemini model identifier
    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,

    /// Bot Framework application id (production auth)
    pub microsoft_app_id: Option<String>,
    /// Bot Framework application password (production auth)
    pub microsoft_app_password: Option<String>,
    /// Tenant id for single-tenant bot registrations
    pub microsoft_app_tenant_id: Option<String>,

    /// Bind address for the HTTP listener
    #[serde(default = "default_host")]
    pub host: String,
    /// Bind port for the HTTP listener
    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum accepted attachment size in megabytes
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: usize,

    /// Maximum number of turns kept per conversation
    #[serde(default = "default_max_conversation_history")]
    pub max_conversation_history: usize,

    /// Number of trailing turns included in the model prompt
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Override for the default system instructions
    pub system_message: Option<String>,

    /// Timeout for model API requests, in seconds
    #[serde(default = "default_llm_http_timeout_secs")]
    pub llm_http_timeout_secs: u64,
}

fn default_gemini_model() -> String {
    "gemini-1.5-flash-latest".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3978
}

const fn default_max_file_size_mb() -> usize {
    10
}

const fn default_max_conversation_history() -> usize {
    20
}

const fn default_history_window() -> usize {
    12
}

const fn default_llm_http_timeout_secs() -> u64 {
    30
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails or a required variable
    /// is missing.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(File::with_name("config/default").required(false))
            // Add in the current environment file
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            // Add in a local configuration file
            // This file shouldn't be checked into git
            .add_source(File::with_name("config/local").required(false))
            // Add in settings from the environment (with a prefix of APP)
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            // Also add settings from environment variables directly (without prefix)
            // Note: Environment::default() auto-converts UPPER_SNAKE_CASE to snake_case
            // ignore_empty treats empty env vars as unset
            .add_source(Environment::default().ignore_empty(true).try_parsing(true))
            .build()?;

        let settings: Self = s.try_deserialize()?;
        settings.validate()?;

        Ok(settings)
    }

    /// Validate required configuration
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` naming the missing variable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.gemini_api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(()),
            _ => Err(ConfigError::Message(
                "Missing required environment variable: GEMINI_API_KEY".to_string(),
            )),
        }
    }

    /// Whether Bot Framework credentials are configured.
    ///
    /// Without them the service runs in local emulator mode: inbound
    /// token validation is skipped and the `/test` endpoint is mounted.
    #[must_use]
    pub fn auth_configured(&self) -> bool {
        let set = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        set(&self.microsoft_app_id) && set(&self.microsoft_app_password)
    }

    /// Attachment size cap in bytes
    #[must_use]
    pub const fn max_file_size_bytes(&self) -> usize {
        self.max_file_size_mb * 1024 * 1024
    }

    /// System instructions sent with every model request
    #[must_use]
    pub fn system_instructions(&self) -> &str {
        self.system_message
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_SYSTEM_MESSAGE)
    }
}

/// Default system instructions for the model
pub const DEFAULT_SYSTEM_MESSAGE: &str = "You are a helpful digital assistant working within Microsoft Teams. \
Provide helpful, professional responses and keep them concise but informative. \
If the user asks about your capabilities, mention that you can answer questions, \
help with analysis and problem-solving, process shared documents, and maintain \
conversation context. Respond naturally and professionally.";

/// File extensions accepted for text extraction
pub const SUPPORTED_FILE_EXTENSIONS: &[&str] =
    &["txt", "md", "pdf", "docx", "xlsx", "csv", "json"];

/// Sampling temperature for chat requests
pub const GEMINI_CHAT_TEMPERATURE: f64 = 0.7;
/// Output token cap for chat requests
pub const GEMINI_MAX_OUTPUT_TOKENS: u32 = 2048;

/// Cap on extracted document text, in characters
pub const MAX_EXTRACTED_CHARS: usize = 8_000;

// Conversation store configuration
/// Idle lifetime of a conversation before its history is dropped
pub const CONVERSATION_TTL_SECS: u64 = 6 * 60 * 60;
/// Maximum number of conversations tracked at once
pub const CONVERSATION_CACHE_CAPACITY: u64 = 10_000;

// Outbound connector retry policy
/// Initial backoff for reply delivery retries
pub const CONNECTOR_INITIAL_BACKOFF_MS: u64 = 500;
/// Backoff ceiling for reply delivery retries
pub const CONNECTOR_MAX_BACKOFF_MS: u64 = 4_000;
/// Delivery attempts before giving up
pub const CONNECTOR_MAX_RETRIES: usize = 3;

// Bot Framework endpoints
/// OpenID metadata document listing the JWKS endpoint
pub const BOT_FRAMEWORK_OPENID_METADATA_URL: &str =
    "https://login.botframework.com/v1/.well-known/openidconfiguration";
/// Expected issuer of inbound connector tokens
pub const BOT_FRAMEWORK_TOKEN_ISSUER: &str = "https://api.botframework.com";
/// Token endpoint for outbound client-credentials auth
pub const BOT_FRAMEWORK_LOGIN_URL: &str =
    "https://login.microsoftonline.com/botframework.com/oauth2/v2.0/token";
/// Scope requested for outbound connector calls
pub const BOT_FRAMEWORK_TOKEN_SCOPE: &str = "https://api.botframework.com/.default";
/// Lifetime of cached signing keys
pub const JWKS_CACHE_TTL_SECS: u64 = 24 * 60 * 60;
