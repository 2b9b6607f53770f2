/// LLM Client — the single point of entry for text-generation backend calls.
///
/// ARCHITECTURAL RULE: No other module may call the generation backend directly.
/// All LLM interactions MUST go through the `TextGenerator` trait defined here.
///
/// Backend: Ollama-compatible `/api/generate`, non-streaming. One attempt per call,
/// bounded by the configured timeout. No retries.
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Request to generation backend timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("Failed to reach generation backend: {0}")]
    Unreachable(String),

    #[error("Generation backend returned status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Malformed response from generation backend: {0}")]
    Malformed(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

/// Anything that can turn a prompt into raw model text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, LlmError>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    eval_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct OllamaError {
    error: String,
}

/// Ollama `/api/generate` client.
#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    api_url: String,
    timeout: Duration,
}

impl OllamaClient {
    pub fn new(api_url: String, timeout: Duration) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Client(e.to_string()))?;
        Ok(Self {
            client,
            api_url,
            timeout,
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn classify(&self, e: reqwest::Error) -> LlmError {
        if e.is_timeout() {
            LlmError::Timeout {
                secs: self.timeout.as_secs(),
            }
        } else if e.is_decode() {
            LlmError::Malformed(e.to_string())
        } else {
            LlmError::Unreachable(e.to_string())
        }
    }
}

#[async_trait]
impl TextGenerator for OllamaClient {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, LlmError> {
        let request_body = GenerateRequest {
            model,
            prompt,
            stream: false,
        };

        debug!(
            model,
            prompt_chars = prompt.len(),
            url = %self.api_url,
            "Sending generation request"
        );

        let response = self
            .client
            .post(&self.api_url)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.classify(e))?;

        if !status.is_success() {
            warn!("Generation backend returned {}: {}", status, body);
            let message = serde_json::from_str::<OllamaError>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateResponse =
            serde_json::from_str(&body).map_err(|e| LlmError::Malformed(e.to_string()))?;

        if let (None, Some(error)) = (&parsed.response, parsed.error) {
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: error,
            });
        }

        let text = parsed.response.unwrap_or_default();
        debug!(
            response_chars = text.len(),
            eval_count = parsed.eval_count,
            "Generation response received"
        );
        Ok(text)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Response post-processing
// ────────────────────────────────────────────────────────────────────────────

static MARKDOWN_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:markdown)?\s*(.*?)\s*```").unwrap());

/// Extracts the first ```markdown / ``` fenced block, else returns the whole text.
/// The result is always trimmed.
pub fn extract_markdown(text: &str) -> &str {
    MARKDOWN_FENCE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(text)
        .trim()
}
