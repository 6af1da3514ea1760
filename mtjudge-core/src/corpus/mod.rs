//! Bilingual corpus loading.
//!
//! A corpus is an ordered collection of (source, target, note) triples read
//! from a TMX translation memory or a gettext PO catalog. A non-empty note is
//! the ground-truth signal that the pair is a known mistranslation.

pub mod builder;
pub mod po;
pub mod tmx;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::LanguageConfig;
use crate::error::CorpusError;

/// One sentence pair to be judged, with its optional ground-truth note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationItem {
    pub source: String,
    pub target: String,
    /// Human annotation describing the mistranslation, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl EvaluationItem {
    /// Create an item. An empty note is stored as `None`.
    pub fn new(source: impl Into<String>, target: impl Into<String>, note: Option<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            note: note.filter(|n| !n.is_empty()),
        }
    }

    /// Ground truth: the pair carries an error annotation.
    pub fn has_error(&self) -> bool {
        self.note.as_deref().is_some_and(|n| !n.is_empty())
    }
}

/// On-disk corpus formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorpusFormat {
    Tmx,
    Po,
}

impl CorpusFormat {
    /// Detect the format from the file extension.
    pub fn from_path(path: &Path) -> Result<Self, CorpusError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("tmx") => Ok(Self::Tmx),
            Some("po") | Some("pot") => Ok(Self::Po),
            _ => Err(CorpusError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }
}

/// Error/correct balance of a loaded corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorpusBalance {
    pub total: usize,
    pub with_errors: usize,
}

impl CorpusBalance {
    pub fn of(items: &[EvaluationItem]) -> Self {
        Self {
            total: items.len(),
            with_errors: items.iter().filter(|i| i.has_error()).count(),
        }
    }

    pub fn error_percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.with_errors as f64 * 100.0 / self.total as f64
        }
    }

    pub fn correct_percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            100.0 - self.error_percent()
        }
    }
}

/// Reads a corpus file into evaluation items.
pub struct CorpusLoader<'a> {
    languages: &'a LanguageConfig,
}

impl<'a> CorpusLoader<'a> {
    pub fn new(languages: &'a LanguageConfig) -> Self {
        Self { languages }
    }

    /// Load the first `limit` items of the corpus in file order (`None` = all).
    ///
    /// Logs the corpus balance as a side effect. Loading the same file twice
    /// with the same limit yields the same sequence.
    pub fn load(&self, path: &Path, limit: Option<usize>) -> Result<Vec<EvaluationItem>, CorpusError> {
        let mut items = self.load_all(path)?;
        if let Some(limit) = limit {
            items.truncate(limit);
        }

        let balance = CorpusBalance::of(&items);
        tracing::info!(
            path = %path.display(),
            items = balance.total,
            with_errors = balance.with_errors,
            error_percent = %format!("{:.2}", balance.error_percent()),
            correct_percent = %format!("{:.2}", balance.correct_percent()),
            "Loaded corpus"
        );
        Ok(items)
    }

    /// Load every item of the corpus without logging its balance.
    pub fn load_all(&self, path: &Path) -> Result<Vec<EvaluationItem>, CorpusError> {
        let format = CorpusFormat::from_path(path)?;
        let content = read_corpus(path)?;
        match format {
            CorpusFormat::Tmx => tmx::parse_tmx(&content, path, self.languages),
            CorpusFormat::Po => po::parse_po(&content, path),
        }
    }
}

fn read_corpus(path: &Path) -> Result<String, CorpusError> {
    if !path.exists() {
        return Err(CorpusError::NotFound {
            path: path.to_path_buf(),
        });
    }
    std::fs::read_to_string(path).map_err(|source| CorpusError::Io {
        path: PathBuf::from(path),
        source,
    })
}
