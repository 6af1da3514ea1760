//! Error types for the mtjudge core library.
//!
//! Uses `thiserror` for public API error types with structured error variants
//! covering corpus ingestion, judge backends, configuration, and run records.
//! An unparseable verdict is not an error: it is a `Ternary` value.

use std::path::PathBuf;

/// Top-level error type for the mtjudge core library.
#[derive(Debug, thiserror::Error)]
pub enum MtJudgeError {
    #[error("Corpus error: {0}")]
    Corpus(#[from] CorpusError),

    #[error("Judge error: {0}")]
    Judge(#[from] JudgeError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Run record error: {0}")]
    Record(#[from] RecordError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while reading a bilingual corpus. Always fatal before scoring starts.
#[derive(Debug, thiserror::Error)]
pub enum CorpusError {
    #[error("Corpus file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Failed to read corpus {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported corpus format: {path} (expected .tmx or .po)")]
    UnsupportedFormat { path: PathBuf },

    #[error("Malformed corpus {path}: {message}")]
    Malformed { path: PathBuf, message: String },

    #[error("Translation unit {index} has no segment for language '{lang}'")]
    MissingSegment { index: usize, lang: String },
}

/// Errors from judge backends. Never retried; fatal to the current run.
#[derive(Debug, thiserror::Error)]
pub enum JudgeError {
    #[error("API request failed: {message}")]
    ApiRequest { message: String },

    #[error("API response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Authentication failed for backend {backend}")]
    AuthFailed { backend: String },

    #[error("Rate limited by {backend}: {message}")]
    RateLimited { backend: String, message: String },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Backend connection failed: {message}")]
    Connection { message: String },

    #[error("Unknown judge backend: {name}")]
    UnknownBackend { name: String },

    #[error("Local inference server failed to start: {message}")]
    ServerStart { message: String },
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration parse error: {message}")]
    ParseError { message: String },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Prompt file not found: {path}")]
    PromptNotFound { path: PathBuf },
}

/// Errors writing the run record collection.
///
/// A corrupt *existing* collection is not an error; the recorder logs it and
/// starts a fresh collection.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("Failed to write run records to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read run records from {path}: {message}")]
    Read { path: PathBuf, message: String },
}

/// A type alias for results using the top-level `MtJudgeError`.
pub type Result<T> = std::result::Result<T, MtJudgeError>;
