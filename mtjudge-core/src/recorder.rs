//! Run records.
//!
//! Each completed run appends one [`RunRecord`] to a JSON array on disk, one
//! collection per run size (`stats_<processed>.json`). Existing records are
//! never rewritten; a collection that cannot be read is set aside and a fresh
//! one is started.

use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::RecordError;
use crate::harness::RunSummary;
use crate::metrics::round2;
use crate::persistence::{atomic_write_json, load_json_value};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parameters and results of one completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub timestamp: String,
    pub backend_id: String,
    pub prompt_version: String,
    pub prompt_description: String,
    pub tp: usize,
    pub fp: usize,
    #[serde(rename = "fn")]
    pub fn_: usize,
    pub tn: usize,
    pub unparseable: usize,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub elapsed_seconds: f64,
    pub processed_count: usize,
}

impl RunRecord {
    pub fn from_summary(
        summary: &RunSummary,
        backend_id: &str,
        prompt_version: &str,
        prompt_description: &str,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
            backend_id: backend_id.to_string(),
            prompt_version: prompt_version.to_string(),
            prompt_description: prompt_description.to_string(),
            tp: summary.stats.tp,
            fp: summary.stats.fp,
            fn_: summary.stats.fn_,
            tn: summary.stats.tn,
            unparseable: summary.stats.unparseable,
            precision: round2(summary.metrics.precision),
            recall: round2(summary.metrics.recall),
            f1: round2(summary.metrics.f1),
            elapsed_seconds: round2(summary.elapsed.as_secs_f64()),
            processed_count: summary.stats.processed,
        }
    }
}

/// Appends run records under an output directory.
pub struct RunRecorder {
    dir: PathBuf,
}

impl RunRecorder {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn collection_path(&self, collection_key: usize) -> PathBuf {
        self.dir.join(format!("stats_{}.json", collection_key))
    }

    /// Append `record` to the collection for `collection_key` and return its path.
    pub fn append(&self, record: &RunRecord, collection_key: usize) -> Result<PathBuf, RecordError> {
        let path = self.collection_path(collection_key);
        let mut records = load_collection(&path);

        let value = serde_json::to_value(record).map_err(|e| RecordError::Write {
            path: path.clone(),
            source: std::io::Error::other(e),
        })?;
        records.push(value);

        atomic_write_json(&path, &records).map_err(|source| RecordError::Write {
            path: path.clone(),
            source,
        })?;

        tracing::info!(
            path = %path.display(),
            records = records.len(),
            run_id = %record.run_id,
            "Run record appended"
        );
        Ok(path)
    }
}

/// Existing records at `path`; empty when absent or unreadable.
fn load_collection(path: &Path) -> Vec<Value> {
    match load_json_value(path) {
        Ok(None) => Vec::new(),
        Ok(Some(Value::Array(records))) => records,
        Ok(Some(other)) => {
            tracing::warn!(path = %path.display(), "Run record collection is not an array, wrapping it");
            vec![other]
        }
        Err(e) => {
            let backup = corrupt_backup_path(path);
            tracing::warn!(
                path = %path.display(),
                backup = %backup.display(),
                error = %e,
                "Run record collection unreadable, starting a fresh one"
            );
            if let Err(rename_err) = std::fs::rename(path, &backup) {
                tracing::warn!(error = %rename_err, "Could not set aside unreadable collection");
            }
            Vec::new()
        }
    }
}

/// First free `<name>.corrupt`, `<name>.corrupt.1`, ... next to `path`.
fn corrupt_backup_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let first = path.with_file_name(format!("{}.corrupt", name));
    if !first.exists() {
        return first;
    }
    (1..)
        .map(|n| path.with_file_name(format!("{}.corrupt.{}", name, n)))
        .find(|candidate| !candidate.exists())
        .unwrap_or(first)
}
