//! Configuration system for mtjudge.
//!
//! Uses `figment` for layered configuration: defaults -> user config file ->
//! workspace config file -> environment. Command-line flags are applied on
//! top of the loaded value by the CLI. The resulting
//! [`EvalConfig`] is built once at run start and passed by reference to the
//! scoring loop and the judge adapter.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, JudgeError};

/// Name of the workspace-level configuration file.
pub const WORKSPACE_CONFIG_FILE: &str = "mtjudge.toml";

/// Top-level configuration for an evaluation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvalConfig {
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub prompts: PromptsConfig,
    #[serde(default)]
    pub languages: LanguageConfig,
    #[serde(default)]
    pub judge: JudgeConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Parameters of a single run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Prompt version identifier, e.g. "2_1".
    #[serde(default = "default_prompt_version")]
    pub prompt_version: String,
    /// Maximum number of items to score. Negative means unbounded.
    #[serde(default = "default_limit")]
    pub limit: i64,
    /// Path to the bilingual corpus (.tmx or .po).
    #[serde(default = "default_corpus")]
    pub corpus: PathBuf,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            prompt_version: default_prompt_version(),
            limit: default_limit(),
            corpus: default_corpus(),
        }
    }
}

impl RunConfig {
    /// The item cap as an `Option`, `None` meaning unbounded.
    pub fn limit(&self) -> Option<usize> {
        usize::try_from(self.limit).ok()
    }
}

fn default_prompt_version() -> String {
    "2_1".to_string()
}

fn default_limit() -> i64 {
    200
}

fn default_corpus() -> PathBuf {
    PathBuf::from("dataset/dataset.tmx")
}

/// Where prompt texts and their metadata live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptsConfig {
    #[serde(default = "default_prompts_dir")]
    pub dir: PathBuf,
    /// YAML file holding `versions: { <n>: { goal: ... } }`.
    #[serde(default = "default_metadata_file")]
    pub metadata_file: String,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            dir: default_prompts_dir(),
            metadata_file: default_metadata_file(),
        }
    }
}

fn default_prompts_dir() -> PathBuf {
    PathBuf::from("config")
}

fn default_metadata_file() -> String {
    "metadata.yml".to_string()
}

/// Language codes and the labels shown to the judge and in audit output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageConfig {
    #[serde(default = "default_source_code")]
    pub source_code: String,
    #[serde(default = "default_target_code")]
    pub target_code: String,
    #[serde(default = "default_source_label")]
    pub source_label: String,
    #[serde(default = "default_target_label")]
    pub target_label: String,
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            source_code: default_source_code(),
            target_code: default_target_code(),
            source_label: default_source_label(),
            target_label: default_target_label(),
        }
    }
}

fn default_source_code() -> String {
    "en".to_string()
}

fn default_target_code() -> String {
    "ca".to_string()
}

fn default_source_label() -> String {
    "English".to_string()
}

fn default_target_label() -> String {
    "Catalan".to_string()
}

/// Judge backend selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeConfig {
    /// Name of the backend used for the run; must be a key of `backends`.
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Named backend configurations.
    #[serde(default = "default_backends")]
    pub backends: BTreeMap<String, BackendConfig>,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            backends: default_backends(),
        }
    }
}

impl JudgeConfig {
    /// Resolve the selected backend name to exactly one configuration.
    pub fn selected(&self) -> Result<(&str, &BackendConfig), JudgeError> {
        self.backends
            .get_key_value(self.backend.as_str())
            .map(|(name, cfg)| (name.as_str(), cfg))
            .ok_or_else(|| JudgeError::UnknownBackend {
                name: self.backend.clone(),
            })
    }
}

fn default_backend() -> String {
    "local".to_string()
}

fn default_backends() -> BTreeMap<String, BackendConfig> {
    let mut backends = BTreeMap::new();
    backends.insert(
        "local".to_string(),
        BackendConfig::Local(LocalBackendConfig::default()),
    );
    backends.insert(
        "openai".to_string(),
        BackendConfig::OpenAi(HostedBackendConfig {
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            ..Default::default()
        }),
    );
    backends.insert(
        "anthropic".to_string(),
        BackendConfig::Anthropic(HostedBackendConfig {
            model: "claude-3-5-haiku-latest".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            ..Default::default()
        }),
    );
    backends
}

/// The closed set of judge backend families.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// Local GGUF weights served by a llama.cpp server.
    Local(LocalBackendConfig),
    /// OpenAI chat completions API (or any compatible endpoint).
    #[serde(rename = "openai")]
    OpenAi(HostedBackendConfig),
    /// Anthropic Messages API.
    Anthropic(HostedBackendConfig),
}

impl BackendConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Local(_) => "local",
            Self::OpenAi(_) => "openai",
            Self::Anthropic(_) => "anthropic",
        }
    }
}

/// Local-weights backend: a llama.cpp server, optionally launched by us.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalBackendConfig {
    /// Path to the GGUF weights. Required when `spawn_server` is set.
    #[serde(default)]
    pub model_path: Option<PathBuf>,
    /// Server executable launched when `spawn_server` is set.
    #[serde(default = "default_server_binary")]
    pub server_binary: String,
    /// Base URL of the server (OpenAI-compatible routes under `/v1`).
    #[serde(default = "default_local_url")]
    pub base_url: String,
    /// Launch the server as a child process for the duration of the run.
    #[serde(default = "default_true")]
    pub spawn_server: bool,
    #[serde(default = "default_context_size")]
    pub context_size: usize,
    #[serde(default = "default_gpu_layers")]
    pub gpu_layers: u32,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Inference threads (0 = all available cores).
    #[serde(default)]
    pub threads: usize,
    #[serde(default = "default_local_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_repeat_penalty")]
    pub repeat_penalty: f32,
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout_secs: u64,
}

impl Default for LocalBackendConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            server_binary: default_server_binary(),
            base_url: default_local_url(),
            spawn_server: true,
            context_size: default_context_size(),
            gpu_layers: default_gpu_layers(),
            batch_size: default_batch_size(),
            threads: 0,
            max_tokens: default_local_max_tokens(),
            repeat_penalty: default_repeat_penalty(),
            startup_timeout_secs: default_startup_timeout(),
        }
    }
}

impl LocalBackendConfig {
    /// Resolved thread count, never zero.
    pub fn effective_threads(&self) -> usize {
        if self.threads > 0 {
            return self.threads;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

fn default_server_binary() -> String {
    "llama-server".to_string()
}

fn default_local_url() -> String {
    "http://127.0.0.1:8089".to_string()
}

fn default_context_size() -> usize {
    2048
}

fn default_gpu_layers() -> u32 {
    8
}

fn default_batch_size() -> usize {
    64
}

fn default_local_max_tokens() -> usize {
    128
}

fn default_repeat_penalty() -> f32 {
    1.1
}

fn default_startup_timeout() -> u64 {
    120
}

/// Hosted-API backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostedBackendConfig {
    /// Model identifier (e.g. "gpt-4o-mini").
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Optional base URL override for the API endpoint.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_hosted_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

impl Default for HostedBackendConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            api_key_env: String::new(),
            base_url: None,
            max_tokens: default_hosted_max_tokens(),
            timeout_secs: default_request_timeout(),
        }
    }
}

fn default_hosted_max_tokens() -> usize {
    512
}

fn default_request_timeout() -> u64 {
    120
}

/// Output locations for audit files and run records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

impl OutputConfig {
    /// Audit file for a scored run.
    pub fn audit_path(&self, prompt_version: &str, limit: i64) -> PathBuf {
        self.dir
            .join(format!("results-v{}-{}.txt", prompt_version, limit))
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

/// Structured log file location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
        }
    }
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_true() -> bool {
    true
}

/// Load configuration from all layers.
///
/// Precedence (highest first):
/// 1. Environment variables (`MTJUDGE_RUN__LIMIT`, `MTJUDGE_JUDGE__BACKEND`, ...)
/// 2. `explicit` config file, or `<workspace>/mtjudge.toml`
/// 3. User config (`<config dir>/mtjudge/config.toml`)
/// 4. Built-in defaults
///
/// Command-line flags are applied by the caller on the returned value.
pub fn load_config(
    workspace: Option<&Path>,
    explicit: Option<&Path>,
) -> Result<EvalConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(EvalConfig::default()));

    if let Some(config_dir) = directories::ProjectDirs::from("dev", "mtjudge", "mtjudge") {
        let user_config = config_dir.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::Invalid {
                    message: format!("config file {} does not exist", path.display()),
                });
            }
            figment = figment.merge(Toml::file(path));
        }
        None => {
            if let Some(ws) = workspace {
                let ws_config = ws.join(WORKSPACE_CONFIG_FILE);
                if ws_config.exists() {
                    figment = figment.merge(Toml::file(&ws_config));
                }
            }
        }
    }

    figment = figment.merge(Env::prefixed("MTJUDGE_").split("__"));

    figment.extract().map_err(|e| ConfigError::ParseError {
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = EvalConfig::default();
        assert_eq!(config.run.prompt_version, "2_1");
        assert_eq!(config.run.limit, 200);
        assert_eq!(config.languages.source_code, "en");
        assert_eq!(config.languages.target_label, "Catalan");
        assert_eq!(config.judge.backend, "local");
        assert_eq!(config.judge.backends.len(), 3);
    }

    #[test]
    fn test_limit_negative_is_unbounded() {
        let mut run = RunConfig::default();
        assert_eq!(run.limit(), Some(200));
        run.limit = -1;
        assert_eq!(run.limit(), None);
        run.limit = 0;
        assert_eq!(run.limit(), Some(0));
    }

    #[test]
    fn test_selected_backend_resolves() {
        let mut judge = JudgeConfig::default();
        judge.backend = "anthropic".into();
        let (name, cfg) = judge.selected().unwrap();
        assert_eq!(name, "anthropic");
        assert_eq!(cfg.kind(), "anthropic");
    }

    #[test]
    fn test_selected_backend_unknown() {
        let judge = JudgeConfig {
            backend: "nope".into(),
            ..Default::default()
        };
        match judge.selected() {
            Err(JudgeError::UnknownBackend { name }) => assert_eq!(name, "nope"),
            other => panic!("Expected UnknownBackend, got {:?}", other),
        }
    }

    #[test]
    fn test_output_paths() {
        let output = OutputConfig::default();
        assert_eq!(
            output.audit_path("2_1", 200),
            PathBuf::from("output/results-v2_1-200.txt")
        );
    }

    #[test]
    fn test_effective_threads_never_zero() {
        let local = LocalBackendConfig::default();
        assert!(local.effective_threads() >= 1);
        let pinned = LocalBackendConfig {
            threads: 3,
            ..Default::default()
        };
        assert_eq!(pinned.effective_threads(), 3);
    }

    #[test]
    fn test_load_config_from_workspace_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(WORKSPACE_CONFIG_FILE),
            r#"
[run]
prompt_version = "3_0"
limit = -1

[judge]
backend = "gemma"

[judge.backends.gemma]
kind = "local"
model_path = "/models/gemma-3-27b-it-Q8_0.gguf"
context_size = 4096
"#,
        )
        .unwrap();

        let config = load_config(Some(dir.path()), None).unwrap();
        assert_eq!(config.run.prompt_version, "3_0");
        assert_eq!(config.run.limit(), None);
        let (name, backend) = config.judge.selected().unwrap();
        assert_eq!(name, "gemma");
        match backend {
            BackendConfig::Local(local) => {
                assert_eq!(local.context_size, 4096);
                assert_eq!(local.gpu_layers, 8);
            }
            other => panic!("Expected local backend, got {:?}", other),
        }
        // Built-in backends are still available next to the user-defined one.
        assert!(config.judge.backends.contains_key("openai"));
    }

    #[test]
    fn test_load_config_missing_explicit_file() {
        let result = load_config(None, Some(Path::new("/nonexistent/mtjudge.toml")));
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let config = EvalConfig::default();
        let text = toml::to_string(&config).unwrap();
        let parsed: EvalConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.run.limit, config.run.limit);
        assert_eq!(parsed.judge.backends.len(), 3);
    }
}
