//! # Chat Completion Client
//!
//! Talks to an OpenAI-compatible `/chat/completions` endpoint. Transient
//! failures (timeouts, connection errors, 429 and 5xx) are retried with
//! exponential backoff plus random jitter, and a [`CircuitBreaker`] makes
//! calls fail fast while the upstream is down.

use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::Rng;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::circuit_breaker::CircuitBreaker;
use crate::config::{ChatConfig, RecoveryConfig};

#[derive(Debug, Clone, PartialEq)]
pub enum ChatError {
    /// Too many recent failures, the call was not attempted
    CircuitOpen,
    /// The request did not complete within the configured timeout
    Timeout,
    /// Connection or protocol failure before a response arrived
    Transport(String),
    /// The upstream is overloaded or failing (429 or 5xx)
    Upstream { status: u16, message: String },
    /// The API rejected the request (bad key, bad model, ...)
    Api(String),
    /// A success response without a completion in it
    InvalidResponse(String),
}

impl ChatError {
    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ChatError::Timeout | ChatError::Transport(_) | ChatError::Upstream { .. }
        )
    }
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatError::CircuitOpen => {
                write!(f, "Chat service temporarily unavailable after repeated failures")
            }
            ChatError::Timeout => write!(f, "Chat completion request timed out"),
            ChatError::Transport(msg) => write!(f, "Chat completion request failed: {msg}"),
            ChatError::Upstream { status, message } => {
                write!(f, "Chat service error (HTTP {status}): {message}")
            }
            ChatError::Api(msg) => write!(f, "{msg}"),
            ChatError::InvalidResponse(msg) => write!(f, "Invalid chat completion response: {msg}"),
        }
    }
}

impl std::error::Error for ChatError {}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ChatError::Timeout
        } else {
            ChatError::Transport(err.to_string())
        }
    }
}

/// Something that turns a system prompt and a user prompt into a reply
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// `max_tokens` overrides the configured completion length when set
    async fn complete(
        &self,
        system: &str,
        prompt: &str,
        max_tokens: Option<u32>,
    ) -> Result<String, ChatError>;
}

pub struct OpenAiClient {
    client: Client,
    config: ChatConfig,
    circuit_breaker: CircuitBreaker,
}

impl OpenAiClient {
    pub fn new(config: ChatConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .context("Failed to build HTTP client")?;
        let circuit_breaker = CircuitBreaker::new(config.recovery.clone());

        info!(model = %config.model, base_url = %config.base_url, "Chat completion client ready");

        Ok(Self {
            client,
            config,
            circuit_breaker,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url)
    }

    async fn send_once(
        &self,
        system: &str,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String, ChatError> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&json!({
                "model": self.config.model,
                "messages": [
                    { "role": "system", "content": system },
                    { "role": "user", "content": prompt }
                ],
                "max_tokens": max_tokens
            }))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let parsed: Option<Value> = serde_json::from_str(&body).ok();

        if !status.is_success() {
            let message = parsed
                .as_ref()
                .and_then(error_message)
                .unwrap_or_else(|| body.chars().take(200).collect());
            return Err(if is_retryable_status(status) {
                ChatError::Upstream {
                    status: status.as_u16(),
                    message,
                }
            } else {
                ChatError::Api(message)
            });
        }

        let parsed = parsed.ok_or_else(|| ChatError::InvalidResponse("body is not JSON".into()))?;

        // Some compatible servers report errors with a 200 status
        if let Some(message) = error_message(&parsed) {
            return Err(ChatError::Api(message));
        }

        parsed
            .get("choices")
            .and_then(|choices| choices.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ChatError::InvalidResponse("missing choices[0].message.content".into()))
    }
}

#[async_trait]
impl CompletionService for OpenAiClient {
    async fn complete(
        &self,
        system: &str,
        prompt: &str,
        max_tokens: Option<u32>,
    ) -> Result<String, ChatError> {
        if self.circuit_breaker.is_open() {
            warn!("Circuit breaker open, skipping chat completion");
            return Err(ChatError::CircuitOpen);
        }

        let max_tokens = max_tokens.unwrap_or(self.config.max_tokens);
        let recovery = &self.config.recovery;
        let mut attempt = 0;

        loop {
            match self.send_once(system, prompt, max_tokens).await {
                Ok(content) => {
                    self.circuit_breaker.record_success();
                    debug!(attempt, chars = content.len(), "Chat completion received");
                    return Ok(content);
                }
                Err(err) if err.is_transient() => {
                    self.circuit_breaker.record_failure();
                    if attempt >= recovery.max_retries || self.circuit_breaker.is_open() {
                        warn!(attempt, error = %err, "Chat completion failed, giving up");
                        return Err(err);
                    }
                    let delay = retry_delay(recovery, attempt);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Chat completion failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    warn!(error = %err, "Chat completion rejected");
                    return Err(err);
                }
            }
        }
    }
}

/// Backoff before retry number `attempt + 1`: exponential from the base
/// delay, capped at the maximum, plus up to a quarter of the base as jitter
pub fn retry_delay(config: &RecoveryConfig, attempt: u32) -> Duration {
    let exponential = config
        .base_retry_delay_ms
        .saturating_mul(1u64 << attempt.min(16));
    let jitter = if config.base_retry_delay_ms >= 4 {
        rand::thread_rng().gen_range(0..=config.base_retry_delay_ms / 4)
    } else {
        0
    };
    Duration::from_millis(
        exponential
            .saturating_add(jitter)
            .min(config.max_retry_delay_ms),
    )
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// `error.message` (or a bare `error` string) from an API body
fn error_message(body: &Value) -> Option<String> {
    let error = body.get("error")?;
    match error {
        Value::Null => None,
        Value::String(message) => Some(message.clone()),
        other => Some(
            other
                .get("message")
                .and_then(Value::as_str)
                .map_or_else(|| other.to_string(), str::to_string),
        ),
    }
}
