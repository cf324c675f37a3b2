//! OpenAI-compatible chat completion client
//!
//! Blocking from the caller's point of view; [`HttpLlmClient`] owns a small
//! tokio runtime and drives reqwest inside it, so it must only be called
//! from a worker thread, never from the consuming thread.

use crate::config::Config;
use crate::{MochaError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Per-call options, captured from the configuration snapshot at submit
/// time so a reload never changes an in-flight call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOptions {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Transport-level timeout; best-effort cancellation of calls the
    /// coordinator has already timed out.
    pub timeout: Duration,
}

impl CompletionOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.llm.model.clone(),
            temperature: config.llm.temperature,
            max_tokens: config.llm.max_tokens,
            timeout: config.net.answer_timeout(),
        }
    }
}

/// The completion seam: one blocking call, one text or error back.
pub trait LlmClient: Send + Sync {
    fn complete(&self, messages: &[ChatMessage], options: &CompletionOptions) -> Result<String>;
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

pub struct HttpLlmClient {
    base_url: String,
    api_key: String,
    http: reqwest::Client,
    runtime: tokio::runtime::Runtime,
}

impl HttpLlmClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| MochaError::Inference(format!("runtime creation failed: {e}")))?;
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| MochaError::Inference(format!("http client creation failed: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            http,
            runtime,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.llm.base_url.clone(), config.llm.api_key.clone())
    }
}

impl LlmClient for HttpLlmClient {
    fn complete(&self, messages: &[ChatMessage], options: &CompletionOptions) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatCompletionRequest {
            model: &options.model,
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            stream: false,
        };
        debug!(%url, model = %options.model, "requesting completion");

        self.runtime.block_on(async {
            let mut request = self.http.post(&url).timeout(options.timeout).json(&body);
            if !self.api_key.is_empty() {
                request = request.bearer_auth(&self.api_key);
            }

            let response = request.send().await.map_err(|e| {
                if e.is_timeout() {
                    MochaError::Inference(format!("request timed out: {e}"))
                } else {
                    MochaError::Inference(format!("request failed: {e}"))
                }
            })?;

            let status = response.status();
            if !status.is_success() {
                let preview: String = response
                    .text()
                    .await
                    .unwrap_or_default()
                    .chars()
                    .take(500)
                    .collect();
                warn!(%status, %preview, "chat completion returned non-success");
                return Err(MochaError::Inference(format!("endpoint returned {status}")));
            }

            let parsed: ChatCompletionResponse = response
                .json()
                .await
                .map_err(|e| MochaError::Inference(format!("malformed response: {e}")))?;

            parsed
                .choices
                .into_iter()
                .next()
                .map(|choice| choice.message.content.trim().to_string())
                .filter(|content| !content.is_empty())
                .ok_or_else(|| MochaError::Inference("response contained no content".into()))
        })
    }
}
