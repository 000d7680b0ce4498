//! Resilient client for the remote generation endpoint
//!
//! Each call sends one self-contained user turn; conversation memory lives in
//! the local transcript only. Failed attempts are retried per [`RetryPolicy`].

mod gemini;
pub mod retry;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

pub use gemini::{
    Candidate, Content, GeminiTransport, GenerateContentRequest, GenerateContentResponse, Part,
    extract_text,
};
pub use retry::{RetryPolicy, StatusClass, classify_status, delay_for_backoff};

/// Longest slice of an error body kept in a failure
const MAX_DETAIL_CHARS: usize = 200;

/// Terminal failure of a `generate` call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationFailure {
    /// Endpoint answered 429
    #[error("rate limited by the generation endpoint")]
    RateLimited,

    /// Endpoint answered with a 5xx status
    #[error("generation endpoint server error (status {0})")]
    ServerError(u16),

    /// Request never produced an HTTP response
    #[error("network error: {0}")]
    Network(String),

    /// Non-retryable status, or an ok response without generated text
    #[error("unexpected response: {detail}")]
    Unexpected {
        /// HTTP status, when one was received
        status: Option<u16>,
        /// Short description or body excerpt
        detail: String,
    },

    /// Every attempt failed
    #[error("no response after {attempts} attempts ({last})")]
    RetriesExhausted {
        /// Attempts made
        attempts: u32,
        /// Failure of the final attempt
        last: Box<GenerationFailure>,
    },
}

impl GenerationFailure {
    /// Whether the failure points at a missing or rejected credential
    #[must_use]
    pub fn is_auth(&self) -> bool {
        match self {
            Self::Unexpected {
                status: Some(401 | 403),
                ..
            } => true,
            Self::RetriesExhausted { last, .. } => last.is_auth(),
            _ => false,
        }
    }

    /// Whether the failure is transport-level
    #[must_use]
    pub fn is_network(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::RetriesExhausted { last, .. } => last.is_network(),
            _ => false,
        }
    }
}

/// Raw HTTP outcome of one attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body as text
    pub body: String,
}

/// Connection-level failure (no HTTP status was received)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Sends one request to the generation endpoint
#[async_trait]
pub trait GenerationTransport: Send + Sync {
    /// Perform a single HTTP exchange
    async fn send(
        &self,
        request: &GenerateContentRequest,
    ) -> std::result::Result<TransportResponse, TransportError>;
}

/// Waits between attempts
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Suspend for `duration`
    async fn sleep(&self, duration: Duration);
}

/// Sleeper backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Anything that turns a prompt into generated text
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a reply for `prompt`
    ///
    /// # Errors
    ///
    /// Returns a [`GenerationFailure`] when no text could be obtained
    async fn generate(&self, prompt: &str) -> std::result::Result<String, GenerationFailure>;
}

/// Generation client with bounded exponential backoff
pub struct ResilientGenerationClient {
    transport: Arc<dyn GenerationTransport>,
    sleeper: Arc<dyn Sleeper>,
    policy: RetryPolicy,
}

impl ResilientGenerationClient {
    /// Create a client using the tokio timer between attempts
    #[must_use]
    pub fn new(transport: Arc<dyn GenerationTransport>, policy: RetryPolicy) -> Self {
        Self::with_sleeper(transport, Arc::new(TokioSleeper), policy)
    }

    /// Create a client with a custom sleeper
    #[must_use]
    pub fn with_sleeper(
        transport: Arc<dyn GenerationTransport>,
        sleeper: Arc<dyn Sleeper>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            sleeper,
            policy,
        }
    }

    /// Active retry policy
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    async fn back_off(&self, backoffs: &mut u32) {
        let delay = delay_for_backoff(&self.policy, *backoffs);
        tracing::debug!(?delay, "backing off before retry");
        self.sleeper.sleep(delay).await;
        *backoffs += 1;
    }
}

#[async_trait]
impl TextGenerator for ResilientGenerationClient {
    async fn generate(&self, prompt: &str) -> std::result::Result<String, GenerationFailure> {
        let request = GenerateContentRequest::user_turn(prompt);
        let mut backoffs = 0u32;
        let mut last = None;

        for attempt in 0..self.policy.max_attempts {
            tracing::debug!(attempt, prompt_chars = prompt.len(), "sending generation request");

            match self.transport.send(&request).await {
                Ok(response) => match classify_status(response.status) {
                    StatusClass::Success => {
                        if let Some(text) = extract_text(&response.body) {
                            tracing::info!(
                                attempt,
                                reply_chars = text.len(),
                                "generation complete"
                            );
                            return Ok(text);
                        }
                        // Counts against the budget; the backoff schedule is untouched
                        tracing::warn!(attempt, "ok response carried no generated text");
                        last = Some(GenerationFailure::Unexpected {
                            status: Some(response.status),
                            detail: "response missing candidates[0].content.parts[0].text"
                                .to_string(),
                        });
                    }
                    StatusClass::RateLimited => {
                        tracing::warn!(attempt, "generation endpoint rate limited");
                        last = Some(GenerationFailure::RateLimited);
                        self.back_off(&mut backoffs).await;
                    }
                    StatusClass::ServerError => {
                        tracing::warn!(
                            attempt,
                            status = response.status,
                            "generation endpoint server error"
                        );
                        last = Some(GenerationFailure::ServerError(response.status));
                        self.back_off(&mut backoffs).await;
                    }
                    StatusClass::Fatal => {
                        tracing::error!(
                            attempt,
                            status = response.status,
                            body = %response.body,
                            "generation request rejected"
                        );
                        return Err(GenerationFailure::Unexpected {
                            status: Some(response.status),
                            detail: format!(
                                "status {}: {}",
                                response.status,
                                truncate(&response.body, MAX_DETAIL_CHARS)
                            ),
                        });
                    }
                },
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "generation request failed");
                    last = Some(GenerationFailure::Network(e.0));
                    self.back_off(&mut backoffs).await;
                }
            }
        }

        let last = last.unwrap_or_else(|| GenerationFailure::Unexpected {
            status: None,
            detail: "no attempts were made".to_string(),
        });
        tracing::error!(
            attempts = self.policy.max_attempts,
            last = %last,
            "generation retries exhausted"
        );

        Err(GenerationFailure::RetriesExhausted {
            attempts: self.policy.max_attempts,
            last: Box::new(last),
        })
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
