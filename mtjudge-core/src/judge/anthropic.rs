//! Anthropic Messages API backend.
//!
//! Differences from the OpenAI wire format:
//! - Auth via `x-api-key` header
//! - Required `anthropic-version` header
//! - System instruction is a top-level `system` field
//! - Answer text arrives as a list of content blocks

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

use super::{ChatBackend, JUDGE_TEMPERATURE, map_send_error};
use crate::config::HostedBackendConfig;
use crate::error::JudgeError;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicBackend {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: usize,
    timeout_secs: u64,
    id: String,
}

impl AnthropicBackend {
    /// Create the backend, reading the API key from `config.api_key_env`.
    pub fn new(config: &HostedBackendConfig) -> Result<Self, JudgeError> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| JudgeError::AuthFailed {
            backend: format!("Anthropic (env var '{}' not set)", config.api_key_env),
        })?;
        Self::new_with_key(config, api_key)
    }

    pub fn new_with_key(config: &HostedBackendConfig, api_key: String) -> Result<Self, JudgeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| JudgeError::Connection {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            timeout_secs: config.timeout_secs,
            id: format!("anthropic/{}", config.model),
        })
    }
}

pub fn build_body(model: &str, max_tokens: usize, system: &str, user: &str) -> Value {
    json!({
        "model": model,
        "max_tokens": max_tokens,
        "temperature": JUDGE_TEMPERATURE,
        "system": system,
        "messages": [
            { "role": "user", "content": user },
        ],
    })
}

/// Concatenate the text blocks of a Messages API response.
pub fn parse_response(body: &Value) -> Result<String, JudgeError> {
    let blocks = body["content"]
        .as_array()
        .ok_or_else(|| JudgeError::ResponseParse {
            message: "Missing 'content' array in response".to_string(),
        })?;

    let text: Vec<&str> = blocks
        .iter()
        .filter(|b| b["type"] == "text")
        .filter_map(|b| b["text"].as_str())
        .collect();

    if text.is_empty() {
        return Err(JudgeError::ResponseParse {
            message: "No text block in response".to_string(),
        });
    }
    Ok(text.concat())
}

fn error_message(body_text: &str) -> String {
    serde_json::from_str::<Value>(body_text)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(|s| s.to_string()))
        .unwrap_or_else(|| body_text.to_string())
}

pub fn map_http_error(status: reqwest::StatusCode, body_text: &str) -> JudgeError {
    match status.as_u16() {
        401 | 403 => JudgeError::AuthFailed {
            backend: "Anthropic".to_string(),
        },
        429 => JudgeError::RateLimited {
            backend: "Anthropic".to_string(),
            message: error_message(body_text),
        },
        _ => JudgeError::ApiRequest {
            message: format!("HTTP {}: {}", status, error_message(body_text)),
        },
    }
}

#[async_trait]
impl ChatBackend for AnthropicBackend {
    fn id(&self) -> &str {
        &self.id
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String, JudgeError> {
        let url = format!("{}/messages", self.base_url);
        let body = build_body(&self.model, self.max_tokens, system, user);
        debug!(url = %url, model = %self.model, "Sending Anthropic request");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| map_send_error(e, self.timeout_secs))?;

        let status = response.status();
        let body_text = response.text().await.map_err(|e| JudgeError::ResponseParse {
            message: format!("Failed to read response body: {}", e),
        })?;

        if !status.is_success() {
            return Err(map_http_error(status, &body_text));
        }

        let json: Value = serde_json::from_str(&body_text).map_err(|e| JudgeError::ResponseParse {
            message: format!("Invalid JSON: {}", e),
        })?;
        parse_response(&json)
    }
}
