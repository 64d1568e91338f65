pub mod ollama;
pub mod openai;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::config::{Config, Provider};

pub use ollama::{OllamaChat, OllamaEmbedder};
pub use openai::OpenAiChat;

const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

/// Role of a message in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One conversation message, in the wire shape both chat backends accept
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    #[inline]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    #[inline]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Text embedding backend. Deterministic for fixed input; fixed
/// dimensionality per model.
pub trait EmbeddingModel: Send + Sync {
    /// Identifier recorded with persisted collections and compared on load
    fn model_id(&self) -> &str;

    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Chat completion backend
pub trait LanguageModel: Send + Sync {
    fn model_id(&self) -> &str;

    fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Construct the chat backend selected by configuration
#[inline]
pub fn build_language_model(config: &Config) -> crate::Result<Arc<dyn LanguageModel>> {
    match config.llm.provider {
        Provider::Ollama => Ok(Arc::new(OllamaChat::new(&config.ollama, &config.llm)?)),
        Provider::OpenAi => Ok(Arc::new(OpenAiChat::new(&config.llm)?)),
    }
}

/// Construct the embedding backend (always the local Ollama server).
/// Returned concretely so callers can reach the health-check surface;
/// it coerces to `Arc<dyn EmbeddingModel>` where the trait is wanted.
#[inline]
pub fn build_embedder(config: &Config) -> crate::Result<Arc<OllamaEmbedder>> {
    Ok(Arc::new(OllamaEmbedder::new(&config.ollama)?))
}

pub(crate) fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}

/// Run an HTTP request with retry on server and transport errors.
/// Client errors (4xx) are returned immediately.
pub(crate) fn request_with_retry<F>(retry_attempts: u32, mut request_fn: F) -> Result<String>
where
    F: FnMut() -> Result<String, ureq::Error>,
{
    let mut last_error = None;

    for attempt in 1..=retry_attempts {
        debug!("HTTP request attempt {}/{}", attempt, retry_attempts);

        match request_fn() {
            Ok(response_text) => {
                debug!("Request succeeded on attempt {}", attempt);
                return Ok(response_text);
            }
            Err(error) => {
                let should_retry = match &error {
                    ureq::Error::StatusCode(status) => {
                        if *status >= 500 {
                            warn!(
                                "Server error (status {}), attempt {}/{}",
                                status, attempt, retry_attempts
                            );
                            true
                        } else {
                            warn!("Client error (status {}), not retrying", status);
                            return Err(anyhow::anyhow!("Client error: HTTP {}", status));
                        }
                    }
                    ureq::Error::ConnectionFailed
                    | ureq::Error::HostNotFound
                    | ureq::Error::Timeout(_)
                    | ureq::Error::Io(_) => {
                        warn!(
                            "Transport error: {}, attempt {}/{}",
                            error, attempt, retry_attempts
                        );
                        true
                    }
                    _ => {
                        warn!("Non-retryable error: {}", error);
                        false
                    }
                };

                if !should_retry {
                    return Err(anyhow::anyhow!("Non-retryable error: {}", error));
                }

                last_error = Some(anyhow::anyhow!("Request error: {}", error));

                if attempt < retry_attempts {
                    let delay_ms = EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1) * 1000;
                    let delay = Duration::from_millis(delay_ms);
                    debug!("Waiting {:?} before retry", delay);
                    std::thread::sleep(delay);
                }
            }
        }
    }

    error!("All {} request attempts failed", retry_attempts);

    Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Request failed after retries")))
}
