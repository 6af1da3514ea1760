//! Judge backends.
//!
//! A judge is a text-generation backend asked whether a sentence pair is a
//! mistranslation. Backends implement [`ChatBackend`]; the [`JudgeAdapter`]
//! wraps one of them with the pair formatting and audit logging shared by all
//! backend families:
//! - Local GGUF weights behind a llama.cpp server ([`local::LocalBackend`])
//! - OpenAI chat completions API ([`openai::OpenAiBackend`])
//! - Anthropic Messages API ([`anthropic::AnthropicBackend`])
//!
//! Use [`create_judge`] to build the adapter selected by configuration.

pub mod anthropic;
pub mod local;
pub mod openai;

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::config::{BackendConfig, JudgeConfig, LanguageConfig};
use crate::error::JudgeError;

pub use anthropic::AnthropicBackend;
pub use local::LocalBackend;
pub use openai::OpenAiBackend;

/// Sampling temperature used for every judge call.
pub const JUDGE_TEMPERATURE: f32 = 0.0;

/// Character removed from both sides of a pair before it is sent to the judge.
/// The instruction uses it to bound the pair.
pub const DELIMITER: char = '_';

/// A single-turn chat completion backend.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Identifier recorded with each run, e.g. `openai/gpt-4o-mini`.
    fn id(&self) -> &str;

    /// Send one system instruction and one user message, return the answer text.
    async fn complete(&self, system: &str, user: &str) -> Result<String, JudgeError>;
}

/// Uniform `classify` contract over any [`ChatBackend`].
pub struct JudgeAdapter {
    backend: Box<dyn ChatBackend>,
    source_label: String,
    target_label: String,
}

impl JudgeAdapter {
    pub fn new(backend: Box<dyn ChatBackend>, languages: &LanguageConfig) -> Self {
        Self {
            backend,
            source_label: languages.source_label.clone(),
            target_label: languages.target_label.clone(),
        }
    }

    pub fn backend_id(&self) -> &str {
        self.backend.id()
    }

    /// Ask the judge about one pair and return its trimmed raw answer.
    ///
    /// Backend failures are returned as-is; nothing is retried here.
    pub async fn classify(
        &self,
        system_instruction: &str,
        source: &str,
        target: &str,
    ) -> Result<String, JudgeError> {
        let source = strip_delimiters(source);
        let target = strip_delimiters(target);
        let message = format_pair(&self.source_label, &source, &self.target_label, &target);

        let answer = match self.backend.complete(system_instruction, &message).await {
            Ok(answer) => answer.trim().to_string(),
            Err(e) => {
                tracing::warn!(
                    backend = self.backend.id(),
                    source = %source,
                    target = %target,
                    error = %e,
                    "Judge call failed"
                );
                return Err(e);
            }
        };

        tracing::info!(
            backend = self.backend.id(),
            source = %source,
            target = %target,
            answer = %answer,
            "Judge answered"
        );
        Ok(answer)
    }
}

pub fn strip_delimiters(text: &str) -> String {
    text.replace(DELIMITER, "")
}

/// The user message for one pair.
pub fn format_pair(source_label: &str, source: &str, target_label: &str, target: &str) -> String {
    format!(
        "{}: '''{}'''\n{}: '''{}'''",
        source_label, source, target_label, target
    )
}

/// Build the judge adapter for the backend selected in `config`.
///
/// For a local backend with `spawn_server` set, this launches the inference
/// server and waits until it reports healthy.
pub async fn create_judge(
    config: &JudgeConfig,
    languages: &LanguageConfig,
) -> Result<JudgeAdapter, JudgeError> {
    let (name, backend_config) = config.selected()?;
    tracing::info!(backend = name, kind = backend_config.kind(), "Creating judge");

    let backend: Box<dyn ChatBackend> = match backend_config {
        BackendConfig::Local(local) => Box::new(LocalBackend::start(local).await?),
        BackendConfig::OpenAi(hosted) => Box::new(OpenAiBackend::new(hosted)?),
        BackendConfig::Anthropic(hosted) => Box::new(AnthropicBackend::new(hosted)?),
    };
    Ok(JudgeAdapter::new(backend, languages))
}

/// Map a transport-level reqwest failure.
pub(crate) fn map_send_error(err: reqwest::Error, timeout_secs: u64) -> JudgeError {
    if err.is_timeout() {
        JudgeError::Timeout { timeout_secs }
    } else if err.is_connect() {
        JudgeError::Connection {
            message: err.to_string(),
        }
    } else {
        JudgeError::ApiRequest {
            message: format!("Request failed: {}", err),
        }
    }
}

/// Backend returning queued answers in order, for tests and dry runs.
///
/// Once the queue is empty every call fails with `JudgeError::ApiRequest`.
pub struct ScriptedBackend {
    id: String,
    answers: Mutex<VecDeque<Result<String, JudgeError>>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedBackend {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: "scripted".to_string(),
            answers: Mutex::new(answers.into_iter().map(|a| Ok(a.into())).collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue a failure to be returned by the next unanswered call.
    pub fn push_failure(&self, error: JudgeError) {
        self.lock_answers().push_back(Err(error));
    }

    /// Every (system, user) message pair received so far.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn lock_answers(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<String, JudgeError>>> {
        self.answers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    fn id(&self) -> &str {
        &self.id
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String, JudgeError> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((system.to_string(), user.to_string()));
        self.lock_answers()
            .pop_front()
            .unwrap_or_else(|| {
                Err(JudgeError::ApiRequest {
                    message: "scripted backend has no answers left".to_string(),
                })
            })
    }
}

/// Lets a test keep a handle on a [`ScriptedBackend`] it hands to an adapter.
#[async_trait]
impl<T: ChatBackend + ?Sized> ChatBackend for std::sync::Arc<T> {
    fn id(&self) -> &str {
        (**self).id()
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String, JudgeError> {
        (**self).complete(system, user).await
    }
}
