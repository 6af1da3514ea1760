//! # mtjudge Core
//!
//! Evaluation harness for LLM mistranslation judges.
//! Loads bilingual corpora, asks a judge backend about each sentence pair,
//! scores the verdicts against ground-truth annotations, and records
//! precision/recall/F1 per run.

pub mod audit;
pub mod config;
pub mod corpus;
pub mod error;
pub mod harness;
pub mod judge;
pub mod metrics;
pub mod persistence;
pub mod prompts;
pub mod recorder;
pub mod report;
pub mod verdict;

// Re-export commonly used types at the crate root.
pub use audit::AuditSink;
pub use config::{BackendConfig, EvalConfig, JudgeConfig, LanguageConfig, load_config};
pub use corpus::{CorpusLoader, EvaluationItem};
pub use error::{CorpusError, JudgeError, MtJudgeError, Result};
pub use harness::{RunState, RunSummary, ScoringLoop, classify_outcome, review};
pub use judge::{ChatBackend, JudgeAdapter, ScriptedBackend, create_judge};
pub use metrics::{Metrics, Outcome, RunStatistics};
pub use prompts::{Prompt, PromptStore};
pub use recorder::{RunRecord, RunRecorder};
pub use verdict::{Ternary, Verdict, normalize};
