//! Local-weights backend: a llama.cpp `llama-server` speaking the
//! OpenAI-compatible chat completions routes.
//!
//! With `spawn_server` set the server is launched as a child process for the
//! lifetime of the backend (killed on drop); otherwise an already running
//! server at `base_url` is used.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::{Child, Command};
use tracing::{debug, info};

use super::openai::post_chat;
use super::{ChatBackend, JUDGE_TEMPERATURE};
use crate::config::LocalBackendConfig;
use crate::error::JudgeError;

const HEALTH_POLL_INTERVAL: Duration = Duration::from_millis(500);

pub struct LocalBackend {
    client: Client,
    base_url: String,
    max_tokens: usize,
    repeat_penalty: f32,
    id: String,
    _server: Option<Child>,
}

impl LocalBackend {
    /// Launch the server if configured, then wait for it to become healthy.
    pub async fn start(config: &LocalBackendConfig) -> Result<Self, JudgeError> {
        let client = Client::new();
        let base_url = config.base_url.trim_end_matches('/').to_string();

        let server = if config.spawn_server {
            let model_path = config
                .model_path
                .as_deref()
                .ok_or_else(|| JudgeError::ServerStart {
                    message: "model_path is required to launch the local server".to_string(),
                })?;
            if !model_path.exists() {
                return Err(JudgeError::ServerStart {
                    message: format!("model file {} does not exist", model_path.display()),
                });
            }

            let args = server_args(config, model_path)?;
            info!(binary = %config.server_binary, model = %model_path.display(), "Launching local inference server");
            let mut child = Command::new(&config.server_binary)
                .args(&args)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| JudgeError::ServerStart {
                    message: format!("failed to spawn {}: {}", config.server_binary, e),
                })?;

            wait_until_healthy(
                &client,
                &base_url,
                &mut child,
                Duration::from_secs(config.startup_timeout_secs),
            )
            .await?;
            Some(child)
        } else {
            None
        };

        Ok(Self {
            client,
            id: backend_id(config),
            base_url,
            max_tokens: config.max_tokens,
            repeat_penalty: config.repeat_penalty,
            _server: server,
        })
    }

    pub fn build_body(&self, system: &str, user: &str) -> Value {
        build_body(self.max_tokens, self.repeat_penalty, system, user)
    }
}

fn backend_id(config: &LocalBackendConfig) -> String {
    let model = config
        .model_path
        .as_deref()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| config.base_url.clone());
    format!("local/{}", model)
}

/// Command-line arguments for `llama-server`.
pub fn server_args(config: &LocalBackendConfig, model_path: &Path) -> Result<Vec<String>, JudgeError> {
    let url = reqwest::Url::parse(&config.base_url).map_err(|e| JudgeError::ServerStart {
        message: format!("invalid base_url '{}': {}", config.base_url, e),
    })?;
    let host = url.host_str().unwrap_or("127.0.0.1").to_string();
    let port = url
        .port_or_known_default()
        .ok_or_else(|| JudgeError::ServerStart {
            message: format!("base_url '{}' has no port", config.base_url),
        })?;

    Ok(vec![
        "-m".to_string(),
        model_path.display().to_string(),
        "-c".to_string(),
        config.context_size.to_string(),
        "-t".to_string(),
        config.effective_threads().to_string(),
        "-ngl".to_string(),
        config.gpu_layers.to_string(),
        "-b".to_string(),
        config.batch_size.to_string(),
        "--host".to_string(),
        host,
        "--port".to_string(),
        port.to_string(),
    ])
}

pub fn build_body(max_tokens: usize, repeat_penalty: f32, system: &str, user: &str) -> Value {
    json!({
        "messages": [
            { "role": "system", "content": system },
            { "role": "user", "content": user },
        ],
        "temperature": JUDGE_TEMPERATURE,
        "top_p": 1.0,
        "repeat_penalty": repeat_penalty,
        "max_tokens": max_tokens,
        "stream": false,
    })
}

async fn wait_until_healthy(
    client: &Client,
    base_url: &str,
    child: &mut Child,
    timeout: Duration,
) -> Result<(), JudgeError> {
    let url = format!("{}/health", base_url);
    let started = Instant::now();

    loop {
        if let Ok(Some(status)) = child.try_wait() {
            return Err(JudgeError::ServerStart {
                message: format!("server exited during startup ({})", status),
            });
        }

        match client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => {
                info!(
                    elapsed_secs = started.elapsed().as_secs(),
                    "Local inference server is ready"
                );
                return Ok(());
            }
            Ok(resp) => debug!(status = %resp.status(), "Server not ready yet"),
            Err(e) => debug!(error = %e, "Server not reachable yet"),
        }

        if started.elapsed() >= timeout {
            return Err(JudgeError::ServerStart {
                message: format!("server not healthy after {}s", timeout.as_secs()),
            });
        }
        tokio::time::sleep(HEALTH_POLL_INTERVAL).await;
    }
}

#[async_trait]
impl ChatBackend for LocalBackend {
    fn id(&self) -> &str {
        &self.id
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String, JudgeError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = self.build_body(system, user);
        debug!(url = %url, "Sending local completion request");
        // No client timeout: local generation time grows with model size.
        post_chat(&self.client, &url, None, &body, "local", 0).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_server_args() {
        let config = LocalBackendConfig {
            threads: 4,
            base_url: "http://127.0.0.1:8089".into(),
            ..Default::default()
        };
        let args = server_args(&config, Path::new("/models/gemma.gguf")).unwrap();
        assert_eq!(
            args,
            vec![
                "-m", "/models/gemma.gguf", "-c", "2048", "-t", "4", "-ngl", "8", "-b", "64",
                "--host", "127.0.0.1", "--port", "8089",
            ]
        );
    }

    #[test]
    fn test_server_args_rejects_bad_url() {
        let config = LocalBackendConfig {
            base_url: "not a url".into(),
            ..Default::default()
        };
        assert!(matches!(
            server_args(&config, Path::new("m.gguf")),
            Err(JudgeError::ServerStart { .. })
        ));
    }

    #[test]
    fn test_build_body_sampling() {
        let body = build_body(128, 1.1, "sys", "pair");
        assert_eq!(body["temperature"], 0.0);
        assert_eq!(body["top_p"], 1.0);
        assert_eq!(body["max_tokens"], 128);
        assert!((body["repeat_penalty"].as_f64().unwrap() - 1.1).abs() < 1e-6);
        assert_eq!(body["messages"][1]["content"], "pair");
    }

    #[test]
    fn test_backend_id() {
        let config = LocalBackendConfig {
            model_path: Some(PathBuf::from("/models/gemma-3-27b-it-Q8_0.gguf")),
            ..Default::default()
        };
        assert_eq!(backend_id(&config), "local/gemma-3-27b-it-Q8_0.gguf");
        assert_eq!(
            backend_id(&LocalBackendConfig::default()),
            "local/http://127.0.0.1:8089"
        );
    }

    #[tokio::test]
    async fn test_start_requires_model_path() {
        let result = LocalBackend::start(&LocalBackendConfig::default()).await;
        assert!(matches!(result, Err(JudgeError::ServerStart { .. })));
    }

    #[tokio::test]
    async fn test_start_rejects_missing_model_file() {
        let config = LocalBackendConfig {
            model_path: Some(PathBuf::from("/nonexistent/model.gguf")),
            ..Default::default()
        };
        match LocalBackend::start(&config).await {
            Err(JudgeError::ServerStart { message }) => assert!(message.contains("does not exist")),
            Err(other) => panic!("Expected ServerStart, got {:?}", other),
            Ok(_) => panic!("Expected ServerStart, got a backend"),
        }
    }

    #[tokio::test]
    async fn test_start_without_spawn_uses_existing_server() {
        let config = LocalBackendConfig {
            spawn_server: false,
            base_url: "http://127.0.0.1:8089/".into(),
            ..Default::default()
        };
        let backend = LocalBackend::start(&config).await.unwrap();
        assert_eq!(backend.base_url, "http://127.0.0.1:8089");
    }
}
