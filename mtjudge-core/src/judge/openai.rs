//! OpenAI chat completions backend.
//!
//! Also used for any endpoint speaking the same wire format via `base_url`.
//! The local llama.cpp backend shares [`parse_response`] and
//! [`map_http_error`] since the server exposes the same routes.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

use super::{ChatBackend, JUDGE_TEMPERATURE, map_send_error};
use crate::config::HostedBackendConfig;
use crate::error::JudgeError;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiBackend {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: usize,
    timeout_secs: u64,
    id: String,
}

impl OpenAiBackend {
    /// Create the backend, reading the API key from `config.api_key_env`.
    pub fn new(config: &HostedBackendConfig) -> Result<Self, JudgeError> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| JudgeError::AuthFailed {
            backend: format!("OpenAI (env var '{}' not set)", config.api_key_env),
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
            id: format!("openai/{}", config.model),
        })
    }
}

/// Request body for one system + user exchange.
pub fn build_body(model: &str, max_tokens: usize, system: &str, user: &str) -> Value {
    json!({
        "model": model,
        "messages": [
            { "role": "system", "content": system },
            { "role": "user", "content": user },
        ],
        "temperature": JUDGE_TEMPERATURE,
        "max_tokens": max_tokens,
        "stream": false,
    })
}

/// Extract the answer text of the first choice.
pub fn parse_response(body: &Value) -> Result<String, JudgeError> {
    let choice = body
        .get("choices")
        .and_then(|c| c.get(0))
        .ok_or_else(|| JudgeError::ResponseParse {
            message: "No choices in response".to_string(),
        })?;

    choice
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| JudgeError::ResponseParse {
            message: "No text content in first choice".to_string(),
        })
}

/// `error.message` of an OpenAI-style error body, or the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(|s| s.to_string()))
        .unwrap_or_else(|| body.to_string())
}

/// Map a non-success HTTP status to a judge error.
pub fn map_http_error(status: reqwest::StatusCode, body: &str, backend: &str) -> JudgeError {
    match status.as_u16() {
        401 | 403 => {
            debug!(body = %body, "Authentication failed");
            JudgeError::AuthFailed {
                backend: backend.to_string(),
            }
        }
        429 => JudgeError::RateLimited {
            backend: backend.to_string(),
            message: error_message(body),
        },
        code if code >= 500 => JudgeError::ApiRequest {
            message: format!("Server error ({}): {}", status, error_message(body)),
        },
        _ => JudgeError::ApiRequest {
            message: format!("HTTP {}: {}", status, body),
        },
    }
}

/// POST `body` to `url` and decode the answer. Shared with the local backend.
pub(crate) async fn post_chat(
    client: &Client,
    url: &str,
    bearer: Option<&str>,
    body: &Value,
    backend: &str,
    timeout_secs: u64,
) -> Result<String, JudgeError> {
    let mut request = client
        .post(url)
        .header("Content-Type", "application/json")
        .json(body);
    if let Some(key) = bearer {
        request = request.header("Authorization", format!("Bearer {}", key));
    }

    let response = request
        .send()
        .await
        .map_err(|e| map_send_error(e, timeout_secs))?;

    let status = response.status();
    let response_body = response.text().await.map_err(|e| JudgeError::ApiRequest {
        message: format!("Failed to read response body: {}", e),
    })?;

    if !status.is_success() {
        return Err(map_http_error(status, &response_body, backend));
    }

    let json: Value = serde_json::from_str(&response_body).map_err(|e| JudgeError::ResponseParse {
        message: format!("Invalid JSON: {}", e),
    })?;
    parse_response(&json)
}

#[async_trait]
impl ChatBackend for OpenAiBackend {
    fn id(&self) -> &str {
        &self.id
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String, JudgeError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = build_body(&self.model, self.max_tokens, system, user);
        debug!(url = %url, model = %self.model, "Sending OpenAI completion request");
        post_chat(
            &self.client,
            &url,
            Some(&self.api_key),
            &body,
            "OpenAI",
            self.timeout_secs,
        )
        .await
    }
}
