
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::config::LlmConfig;
use crate::providers::{
    ChatMessage, DEFAULT_RETRY_ATTEMPTS, LanguageModel, build_agent, request_with_retry,
};
use crate::{PdfChatError, Result};

const DEFAULT_API_BASE: &str = "https://api.openai.com";
const API_KEY_VAR: &str = "OPENAI_API_KEY";

/// Client for the OpenAI chat completions API (and compatible endpoints)
#[derive(Debug, Clone)]
pub struct OpenAiChat {
    base_url: Url,
    model: String,
    temperature: f32,
    api_key: String,
    agent: ureq::Agent,
    retry_attempts: u32,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: String,
}

impl OpenAiChat {
    /// Build the client, reading the API key from the environment. A missing
    /// key fails here, before any network call is attempted.
    #[inline]
    pub fn new(llm: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var(API_KEY_VAR).map_err(|_| {
            PdfChatError::Config(format!(
                "provider 'openai' requires the {API_KEY_VAR} environment variable"
            ))
        })?;

        let base = llm.api_base.as_deref().unwrap_or(DEFAULT_API_BASE);
        let base_url = Url::parse(base)
            .map_err(|_| PdfChatError::Config(format!("invalid OpenAI api_base: {base}")))?;

        Ok(Self {
            base_url,
            model: llm.model.clone(),
            temperature: llm.temperature,
            api_key,
            agent: build_agent(Duration::from_secs(llm.timeout_secs)),
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        })
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }
}

impl LanguageModel for OpenAiChat {
    #[inline]
    fn model_id(&self) -> &str {
        &self.model
    }

    #[inline]
    fn complete(&self, messages: &[ChatMessage]) -> anyhow::Result<String> {
        debug!(
            "Requesting OpenAI completion from {} ({} messages)",
            self.model,
            messages.len()
        );

        let request = CompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
        };

        let url = self
            .base_url
            .join("/v1/chat/completions")
            .context("Failed to build completions URL")?;

        let request_json =
            serde_json::to_string(&request).context("Failed to serialize completion request")?;

        let response_text = request_with_retry(self.retry_attempts, || {
            self.agent
                .post(url.as_str())
                .header("Content-Type", "application/json")
                .header("Authorization", &format!("Bearer {}", self.api_key))
                .send(&request_json)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
        .context("Failed to complete OpenAI request")?;

        let response: CompletionResponse = serde_json::from_str(&response_text)
            .context("Failed to parse completion response")?;

        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .context("Completion response contained no choices")
    }
}
