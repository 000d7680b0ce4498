//! Wire format and HTTP transport for the `generateContent` endpoint

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use url::Url;

use super::{GenerationTransport, TransportError, TransportResponse};
use crate::{Error, Result};

/// Request body: `{contents: [{role, parts: [{text}]}]}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
}

impl GenerateContentRequest {
    /// A single, non-conversational user turn
    #[must_use]
    pub fn user_turn(prompt: &str) -> Self {
        Self {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
        }
    }

    /// Text of the first part of the first content entry
    #[must_use]
    pub fn prompt(&self) -> Option<&str> {
        self.contents
            .first()
            .and_then(|c| c.parts.first())
            .and_then(|p| p.text.as_deref())
    }
}

/// One content entry (request or candidate)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// One text part
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Response body; every level is optional so partial bodies still parse
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

/// One generated candidate
#[derive(Debug, Clone, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
}

/// Pull `candidates[0].content.parts[0].text` out of a response body
///
/// Returns `None` for invalid JSON, a missing field, or an empty string.
#[must_use]
pub fn extract_text(body: &str) -> Option<String> {
    let response: GenerateContentResponse = serde_json::from_str(body).ok()?;

    response
        .candidates
        .into_iter()
        .next()?
        .content?
        .parts
        .into_iter()
        .next()?
        .text
        .filter(|t| !t.is_empty())
}

/// HTTPS transport for a Gemini-style `generateContent` endpoint
pub struct GeminiTransport {
    client: reqwest::Client,
    endpoint: Url,
    api_key: Option<SecretString>,
}

impl GeminiTransport {
    /// Create a transport for `{base_url}/models/{model}:generateContent`
    ///
    /// # Errors
    ///
    /// Returns error if the endpoint URL cannot be built
    pub fn new(base_url: &Url, model: &str, api_key: Option<SecretString>) -> Result<Self> {
        if model.trim().is_empty() {
            return Err(Error::Config("generation model must not be empty".to_string()));
        }

        let base = base_url.as_str().trim_end_matches('/');
        let endpoint = Url::parse(&format!("{base}/models/{model}:generateContent"))
            .map_err(|e| Error::Config(format!("invalid generation endpoint: {e}")))?;

        if api_key.is_none() {
            tracing::warn!("no generation API key configured; requests will likely be rejected");
        }

        Ok(Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
        })
    }

    /// Fully-qualified endpoint (without the key)
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl GenerationTransport for GeminiTransport {
    async fn send(
        &self,
        request: &GenerateContentRequest,
    ) -> std::result::Result<TransportResponse, TransportError> {
        let mut builder = self.client.post(self.endpoint.clone()).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.query(&[("key", key.expose_secret())]);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError(e.to_string()))?;

        tracing::debug!(status, body_bytes = body.len(), "received generation response");
        Ok(TransportResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_single_user_turn() {
        let request = GenerateContentRequest::user_turn("hello");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"contents": [{"role": "user", "parts": [{"text": "hello"}]}]})
        );
        assert_eq!(request.prompt(), Some("hello"));
    }

    #[test]
    fn extracts_nested_text() {
        let body = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"42"}]}}]}"#;
        assert_eq!(extract_text(body), Some("42".to_string()));
    }

    #[test]
    fn missing_levels_yield_none() {
        assert_eq!(extract_text("{}"), None);
        assert_eq!(extract_text(r#"{"candidates":[]}"#), None);
        assert_eq!(extract_text(r#"{"candidates":[{}]}"#), None);
        assert_eq!(extract_text(r#"{"candidates":[{"content":{"parts":[]}}]}"#), None);
        assert_eq!(extract_text(r#"{"candidates":[{"content":{"parts":[{}]}}]}"#), None);
    }

    #[test]
    fn empty_text_counts_as_missing() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":""}]}}]}"#;
        assert_eq!(extract_text(body), None);
    }

    #[test]
    fn invalid_json_yields_none() {
        assert_eq!(extract_text("not json"), None);
        assert_eq!(extract_text(""), None);
    }

    #[test]
    fn endpoint_includes_model() {
        let base = Url::parse("https://example.test/v1beta/").unwrap();
        let transport = GeminiTransport::new(&base, "gemini-test", None).unwrap();
        assert_eq!(
            transport.endpoint().as_str(),
            "https://example.test/v1beta/models/gemini-test:generateContent"
        );
    }

    #[test]
    fn empty_model_rejected() {
        let base = Url::parse("https://example.test").unwrap();
        assert!(GeminiTransport::new(&base, " ", None).is_err());
    }
}
