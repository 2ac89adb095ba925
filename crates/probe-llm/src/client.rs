//! Anthropic Messages API client
//!
//! Each call is stateless: one prompt in, one text block out. Rate limits
//! (429) and server errors back off and retry; other failures count toward
//! the shared circuit breaker.

use crate::auth;
use crate::circuit_breaker::CircuitBreaker;
use crate::types::{AnthropicMessage, AnthropicRequest, AnthropicResponse, Completion, Model};
use chrono::Utc;
use probe_core::config::LlmConfig;
use probe_core::{ProbeError, Result};
use std::sync::Arc;
use std::time::Duration;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

// Assist calls sit on the action retry path, so back off briefly
const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_SECS: u64 = 2;
const MAX_BACKOFF_SECS: u64 = 30;

#[derive(Clone)]
pub struct ClaudeClient {
    http: reqwest::Client,
    endpoint: String,
    model: Model,
    max_tokens: usize,
    api_key_env: String,
    breaker: Arc<CircuitBreaker>,
}

impl ClaudeClient {
    pub fn new(model: Model) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: ANTHROPIC_API_URL.to_string(),
            model,
            max_tokens: 1024,
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            breaker: Arc::new(CircuitBreaker::default()),
        }
    }

    /// Client configured from the `[llm]` section
    pub fn from_config(config: &LlmConfig) -> Self {
        let model = config.model.parse().unwrap_or_else(|e| {
            tracing::warn!("{}; using {}", e, Model::default());
            Model::default()
        });
        Self::new(model)
            .with_max_tokens(config.max_tokens)
            .with_api_key_env(config.api_key_env.clone())
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_api_key_env(mut self, var: impl Into<String>) -> Self {
        self.api_key_env = var.into();
        self
    }

    /// Point at another Messages-compatible endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = breaker;
        self
    }

    pub fn model(&self) -> Model {
        self.model
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Send one prompt and return the first text block
    pub async fn complete(&self, system: Option<&str>, prompt: &str) -> Result<Completion> {
        self.breaker.check()?;
        let token = auth::get_auth_token(&self.api_key_env)?;

        let request = AnthropicRequest {
            model: self.model.api_name().to_string(),
            max_tokens: self.max_tokens,
            system: system.map(String::from),
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        let mut retries = 0;
        let mut backoff_secs = INITIAL_BACKOFF_SECS;

        loop {
            tracing::debug!(model = %self.model, attempt = retries + 1, "Sending completion request");

            let response = match self
                .http
                .post(&self.endpoint)
                .header("x-api-key", &token)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .json(&request)
                .send()
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    self.breaker.record_failure();
                    return Err(ProbeError::Api(format!("Failed to send request: {}", e)));
                }
            };

            let status = response.status();

            if status.as_u16() == 429 {
                retries += 1;
                if retries > MAX_RETRIES {
                    self.breaker.record_failure();
                    let body = response.text().await.unwrap_or_default();
                    return Err(ProbeError::ApiLimit(format!(
                        "Rate limited after {} retries: {}",
                        MAX_RETRIES, body
                    )));
                }
                let wait_secs = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(backoff_secs)
                    .min(MAX_BACKOFF_SECS);
                tracing::warn!(wait_secs, retries, "Rate limited (429)");
                tokio::time::sleep(Duration::from_secs(wait_secs)).await;
                backoff_secs = (backoff_secs * 2).min(MAX_BACKOFF_SECS);
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                if status.is_server_error() && retries < MAX_RETRIES {
                    retries += 1;
                    tracing::warn!(%status, backoff_secs, retries, "Server error; retrying");
                    tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
                    backoff_secs = (backoff_secs * 2).min(MAX_BACKOFF_SECS);
                    continue;
                }
                self.breaker.record_failure();
                return Err(ProbeError::Api(format!("API error {}: {}", status, body)));
            }

            let parsed: AnthropicResponse = response
                .json()
                .await
                .map_err(|e| ProbeError::Api(format!("Failed to parse response: {}", e)))?;

            let text = parsed
                .content
                .iter()
                .find(|block| block.content_type == "text")
                .map(|block| block.text.clone())
                .ok_or_else(|| ProbeError::Api("No text content in response".to_string()))?;

            self.breaker.record_success();
            if let Some(usage) = &parsed.usage {
                tracing::debug!(
                    input_tokens = usage.input_tokens,
                    output_tokens = usage.output_tokens,
                    "Completion received"
                );
            }

            return Ok(Completion {
                text,
                model: self.model,
                timestamp: Utc::now(),
                usage: parsed.usage,
            });
        }
    }
}
