//! `ChatBackend` trait and the Ollama implementation.
//!
//! `OllamaClient` speaks the OpenAI-compatible `/v1/chat/completions` route
//! for replies and Ollama's native `/api/tags` route for the model catalog.
//! All connection details come from [`LlmConfig`].

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::LlmConfig;

// ---------------------------------------------------------------------------
// LlmError
// ---------------------------------------------------------------------------

/// Errors from the chat backend or model catalog.
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The server answered with a non-success status.
    #[error("server returned HTTP {0}")]
    Status(u16),

    #[error("LLM request timed out")]
    Timeout,

    /// The response body was not the JSON we expected.
    #[error("failed to parse LLM response: {0}")]
    Parse(String),

    #[error("LLM returned an empty response")]
    EmptyResponse,
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One chat turn as sent over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// ChatBackend trait
// ---------------------------------------------------------------------------

/// A single chat-completion call.
///
/// Implementors must be `Send + Sync` so they can be shared as
/// `Arc<dyn ChatBackend>` between the pipeline worker and the HTTP layer.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Ask `model` for the next assistant turn after `messages`.
    async fn complete(&self, model: &str, messages: &[ChatMessage]) -> Result<String, LlmError>;
}

const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn ChatBackend>) {}
};

// ---------------------------------------------------------------------------
// OllamaClient
// ---------------------------------------------------------------------------

/// Ollama over HTTP.
pub struct OllamaClient {
    client: reqwest::Client,
    config: LlmConfig,
}

impl OllamaClient {
    /// Build a client whose every request is bounded by
    /// `config.timeout_secs`.
    pub fn from_config(config: &LlmConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.config.api_key.as_deref() {
            Some(key) if !key.is_empty() => req.bearer_auth(key),
            _ => req,
        }
    }

    /// Installed model tags, sorted.
    pub async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        let req = self.authorize(self.client.get(self.url("/api/tags")));
        let response = req.send().await?;
        if !response.status().is_success() {
            return Err(LlmError::Status(response.status().as_u16()));
        }
        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;
        parse_model_tags(&json)
    }

    /// [`list_models`](Self::list_models), or the configured default model
    /// when the catalog is empty or unreachable.
    pub async fn models_or_default(&self) -> Vec<String> {
        match self.list_models().await {
            Ok(models) if !models.is_empty() => models,
            Ok(_) => {
                log::warn!("llm: no models installed, using {}", self.config.default_model);
                vec![self.config.default_model.clone()]
            }
            Err(e) => {
                log::warn!("llm: model catalog unavailable ({e}), using {}", self.config.default_model);
                vec![self.config.default_model.clone()]
            }
        }
    }
}

#[async_trait]
impl ChatBackend for OllamaClient {
    async fn complete(&self, model: &str, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let mut body = serde_json::json!({
            "model": model,
            "messages": messages,
            "stream": false,
        });
        if let Some(t) = self.config.temperature {
            body["temperature"] = serde_json::json!(t);
        }

        let req = self
            .authorize(self.client.post(self.url("/v1/chat/completions")))
            .json(&body);
        let response = req.send().await?;
        if !response.status().is_success() {
            return Err(LlmError::Status(response.status().as_u16()));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;
        parse_completion(&json)
    }
}

/// Pull the assistant text out of a chat-completions response.
fn parse_completion(json: &serde_json::Value) -> Result<String, LlmError> {
    let reply = json["choices"][0]["message"]["content"]
        .as_str()
        .ok_or(LlmError::EmptyResponse)?
        .trim()
        .to_string();

    if reply.is_empty() {
        return Err(LlmError::EmptyResponse);
    }
    Ok(reply)
}

/// Names from an `/api/tags` response, sorted.
fn parse_model_tags(json: &serde_json::Value) -> Result<Vec<String>, LlmError> {
    let models = json["models"]
        .as_array()
        .ok_or_else(|| LlmError::Parse("missing `models` array".into()))?;

    let mut names: Vec<String> = models
        .iter()
        .filter_map(|m| m["name"].as_str())
        .map(str::to_string)
        .collect();
    names.sort();
    Ok(names)
}

// ---------------------------------------------------------------------------
// Test double
// ---------------------------------------------------------------------------

#[cfg(test)]
pub use mock::MockChat;

#[cfg(test)]
mod mock {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;

    /// Returns a scripted reply (or failure) and records every request.
    pub struct MockChat {
        reply: Result<String, String>,
        delay: Duration,
        calls: Mutex<Vec<(String, Vec<ChatMessage>)>>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl MockChat {
        fn scripted(reply: Result<String, String>) -> Self {
            Self {
                reply,
                delay: Duration::ZERO,
                calls: Mutex::new(Vec::new()),
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }

        pub fn replying(reply: &str) -> Self {
            Self::scripted(Ok(reply.to_string()))
        }

        pub fn failing(reason: &str) -> Self {
            Self::scripted(Err(reason.to_string()))
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub fn calls(&self) -> Vec<(String, Vec<ChatMessage>)> {
            self.calls.lock().unwrap().clone()
        }

        /// Most requests ever outstanding at the same time.
        pub fn peak_in_flight(&self) -> usize {
            self.peak.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChatBackend for MockChat {
        async fn complete(&self, model: &str, messages: &[ChatMessage]) -> Result<String, LlmError> {
            self.calls
                .lock()
                .unwrap()
                .push((model.to_string(), messages.to_vec()));
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.reply.clone().map_err(LlmError::Request)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
