//! HTTP utilities for the model client
//!
//! Shared request/response handling: one place that sends a JSON POST,
//! classifies failures into [`LlmError`] variants, and walks a JSON
//! response path.

use crate::llm::LlmError;
use reqwest::Client as HttpClient;
use serde_json::Value;
use std::time::Duration;

/// Creates an HTTP client configured with the given request timeout.
///
/// A dedicated timeout prevents indefinite hangs when the API is slow
/// or unresponsive; the caller maps expiry to [`LlmError::Timeout`].
#[must_use]
pub fn create_http_client(timeout_secs: u64) -> HttpClient {
    HttpClient::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_else(|_| HttpClient::new())
}

/// Sends a JSON POST and returns the parsed JSON response.
///
/// Failures are classified per status code: 429 becomes
/// [`LlmError::RateLimited`], 401/403 become [`LlmError::AuthFailed`],
/// other non-success statuses become [`LlmError::Api`]. Transport
/// timeouts become [`LlmError::Timeout`], remaining connectivity
/// problems [`LlmError::Network`].
///
/// # Errors
///
/// Returns the classified [`LlmError`] described above, or
/// [`LlmError::InvalidResponse`] if the body is not valid JSON.
pub async fn send_json_request(
    client: &HttpClient,
    url: &str,
    body: &Value,
    timeout_secs: u64,
) -> Result<Value, LlmError> {
    let response = client.post(url).json(body).send().await.map_err(|e| {
        if e.is_timeout() {
            LlmError::Timeout(timeout_secs)
        } else {
            LlmError::Network(e.to_string())
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        let detail = clean_error_body(&error_text, status.as_u16());

        return Err(match status.as_u16() {
            429 => LlmError::RateLimited(detail),
            401 | 403 => LlmError::AuthFailed(detail),
            _ => LlmError::Api(detail),
        });
    }

    response
        .json()
        .await
        .map_err(|e| LlmError::InvalidResponse(e.to_string()))
}

/// Normalizes a vendor error body for logging and user-facing mapping.
///
/// HTML error pages from proxies are replaced with a short notice and
/// long bodies are truncated.
fn clean_error_body(body: &str, status: u16) -> String {
    let trimmed = body.trim_start();
    let is_html = trimmed.starts_with("<!DOCTYPE")
        || trimmed.starts_with("<html")
        || trimmed.starts_with("<HTML");

    if is_html {
        return format!("{status} (server returned an HTML error page)");
    }

    if body.len() > 500 {
        let cut = body
            .char_indices()
            .nth(500)
            .map_or(body.len(), |(pos, _)| pos);
        format!("{status} - {}... (truncated)", &body[..cut])
    } else {
        format!("{status} - {body}")
    }
}

/// Extracts text content from a JSON response by navigating a path.
///
/// Path segments that parse as integers index into arrays, everything
/// else looks up object keys.
///
/// # Example
/// ```ignore
/// // For Gemini: ["candidates", "0", "content", "parts", "0", "text"]
/// let content = extract_text_content(&response, &["candidates", "0", "content", "parts", "0", "text"])?;
/// ```
///
/// # Errors
///
/// Returns [`LlmError::InvalidResponse`] if the path is missing or the
/// target is not a string.
pub fn extract_text_content(response: &Value, path: &[&str]) -> Result<String, LlmError> {
    let mut current = response;

    for segment in path {
        if let Ok(index) = segment.parse::<usize>() {
            current = current.get(index).ok_or_else(|| {
                LlmError::InvalidResponse(format!("missing index {index} in response"))
            })?;
        } else {
            current = current.get(*segment).ok_or_else(|| {
                LlmError::InvalidResponse(format!("missing key {segment} in response"))
            })?;
        }
    }

    current
        .as_str()
        .map(ToString::to_string)
        .ok_or_else(|| LlmError::InvalidResponse(format!("expected string, got: {current:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_text_content_gemini_format() -> Result<(), LlmError> {
        let response = json!({
            "candidates": [{
                "content": {
                    "parts": [{
                        "text": "Gemini response"
                    }]
                }
            }]
        });

        let result = extract_text_content(
            &response,
            &["candidates", "0", "content", "parts", "0", "text"],
        )?;
        assert_eq!(result, "Gemini response");
        Ok(())
    }

    #[test]
    fn test_extract_text_content_missing_path() {
        let response = json!({"foo": "bar"});
        let result = extract_text_content(&response, &["missing", "path"]);
        assert!(matches!(result, Err(LlmError::InvalidResponse(_))));
    }

    #[test]
    fn test_extract_text_content_non_string_target() {
        let response = json!({"value": 42});
        let result = extract_text_content(&response, &["value"]);
        assert!(matches!(result, Err(LlmError::InvalidResponse(_))));
    }

    #[test]
    fn test_clean_error_body_html_page() {
        let detail = clean_error_body("<!DOCTYPE html><html>boom</html>", 502);
        assert!(detail.contains("502"));
        assert!(!detail.contains("boom"));
    }

    #[test]
    fn test_clean_error_body_truncates() {
        let body = "x".repeat(2000);
        let detail = clean_error_body(&body, 500);
        assert!(detail.len() < 600);
        assert!(detail.ends_with("(truncated)"));
    }
}
