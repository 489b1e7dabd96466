//! Inbound request authentication.
//!
//! Bot Framework calls carry an RS256-signed bearer token. Validation
//! checks the signature against the connector's published signing keys
//! (fetched from the OpenID metadata document and cached), the audience
//! (this bot's app id), and the issuer.

use crate::config::{
    BOT_FRAMEWORK_OPENID_METADATA_URL, BOT_FRAMEWORK_TOKEN_ISSUER, JWKS_CACHE_TTL_SECS,
};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use moka::future::Cache;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Reasons an inbound request is rejected
#[derive(Debug, Error)]
pub enum AuthError {
    /// No `Authorization: Bearer` header was supplied
    #[error("missing bearer token")]
    MissingToken,
    /// The token failed signature, audience, or issuer checks
    #[error("invalid token: {0}")]
    InvalidToken(String),
    /// The connector's signing keys could not be obtained
    #[error("signing keys unavailable: {0}")]
    KeysUnavailable(String),
}

#[derive(Debug, Deserialize)]
struct OpenIdMetadata {
    jwks_uri: String,
}

#[derive(Debug, Clone, Deserialize)]
struct Jwk {
    #[serde(default)]
    kid: Option<String>,
    #[serde(default)]
    n: Option<String>,
    #[serde(default)]
    e: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JwkSet {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Claims {
    aud: String,
    iss: String,
}

/// Validates inbound connector tokens against the published JWKS
pub struct TokenValidator {
    http: reqwest::Client,
    app_id: String,
    metadata_url: String,
    keys: Cache<String, Arc<JwkSet>>,
}

impl TokenValidator {
    /// Create a validator for the given bot app id
    #[must_use]
    pub fn new(app_id: String) -> Self {
        Self::with_metadata_url(app_id, BOT_FRAMEWORK_OPENID_METADATA_URL.to_string())
    }

    /// Create a validator against an alternate metadata document
    /// (used by tests)
    #[must_use]
    pub fn with_metadata_url(app_id: String, metadata_url: String) -> Self {
        let keys = Cache::builder()
            .max_capacity(4)
            .time_to_live(Duration::from_secs(JWKS_CACHE_TTL_SECS))
            .build();

        Self {
            http: reqwest::Client::new(),
            app_id,
            metadata_url,
            keys,
        }
    }

    /// Validate the `Authorization` header of an inbound request.
    ///
    /// # Errors
    ///
    /// Returns the matching [`AuthError`] when the header is missing,
    /// the token fails validation, or the signing keys cannot be
    /// fetched.
    pub async fn validate(&self, auth_header: Option<&str>) -> Result<(), AuthError> {
        let token = parse_bearer(auth_header).ok_or(AuthError::MissingToken)?;

        let header = decode_header(token).map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        let kid = header
            .kid
            .ok_or_else(|| AuthError::InvalidToken("token has no key id".to_string()))?;

        let jwks = self.signing_keys().await?;
        let jwk = jwks
            .keys
            .iter()
            .find(|k| k.kid.as_deref() == Some(kid.as_str()))
            .ok_or_else(|| AuthError::InvalidToken(format!("unknown signing key {kid}")))?;

        let (n, e) = match (&jwk.n, &jwk.e) {
            (Some(n), Some(e)) => (n, e),
            _ => {
                return Err(AuthError::KeysUnavailable(format!(
                    "signing key {kid} has no RSA components"
                )))
            }
        };
        let key = DecodingKey::from_rsa_components(n, e)
            .map_err(|e| AuthError::KeysUnavailable(e.to_string()))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.app_id]);
        validation.set_issuer(&[BOT_FRAMEWORK_TOKEN_ISSUER]);

        decode::<Claims>(token, &key, &validation)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        Ok(())
    }

    async fn signing_keys(&self) -> Result<Arc<JwkSet>, AuthError> {
        self.keys
            .try_get_with("jwks".to_string(), self.fetch_keys())
            .await
            .map_err(|e: Arc<AuthError>| AuthError::KeysUnavailable(e.to_string()))
    }

    async fn fetch_keys(&self) -> Result<Arc<JwkSet>, AuthError> {
        let metadata: OpenIdMetadata = self
            .http
            .get(&self.metadata_url)
            .send()
            .await
            .map_err(|e| AuthError::KeysUnavailable(e.to_string()))?
            .json()
            .await
            .map_err(|e| AuthError::KeysUnavailable(e.to_string()))?;

        let jwks: JwkSet = self
            .http
            .get(&metadata.jwks_uri)
            .send()
            .await
            .map_err(|e| AuthError::KeysUnavailable(e.to_string()))?
            .json()
            .await
            .map_err(|e| AuthError::KeysUnavailable(e.to_string()))?;

        Ok(Arc::new(jwks))
    }
}

/// Extract the token from an `Authorization: Bearer ...` header value
#[must_use]
pub fn parse_bearer(header: Option<&str>) -> Option<&str> {
    let value = header?.trim();
    let token = value.strip_prefix("Bearer ").or_else(|| value.strip_prefix("bearer "))?;
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}
