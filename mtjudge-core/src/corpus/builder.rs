//! Evaluation dataset construction.
//!
//! Builds a balanced evaluation corpus from a small translation memory of
//! annotated mistranslations plus larger reference catalogs: each catalog is
//! evenly down-sampled, then merged behind the annotated units with duplicate
//! source sentences discarded, up to a cap of distinct sources.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::{CorpusLoader, EvaluationItem, po, tmx};
use crate::config::LanguageConfig;
use crate::error::{MtJudgeError, Result};
use crate::persistence::atomic_write;

/// Inputs and limits for [`build_dataset`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSpec {
    /// Corpus whose every unit carries an error note.
    pub errors: PathBuf,
    /// Reference corpora assumed to be correctly translated.
    pub references: Vec<PathBuf>,
    /// Items kept from each reference corpus.
    #[serde(default = "default_per_reference_limit")]
    pub per_reference_limit: usize,
    /// Maximum number of distinct source sentences in the result.
    #[serde(default = "default_cap")]
    pub cap: usize,
    /// Output TMX path; a PO copy is written next to it.
    pub output: PathBuf,
}

fn default_per_reference_limit() -> usize {
    500
}

fn default_cap() -> usize {
    1000
}

/// Result of a merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub items: Vec<EvaluationItem>,
    /// Number of annotated units taken from the errors corpus.
    pub annotated: usize,
    /// Reference units dropped because their source was already present.
    pub discarded: usize,
}

/// What [`build_dataset`] wrote.
#[derive(Debug, Clone)]
pub struct DatasetSummary {
    pub tmx_path: PathBuf,
    pub po_path: PathBuf,
    pub total: usize,
    pub annotated: usize,
    pub discarded: usize,
}

/// Evenly sample `limit` entries, keeping order. Returns everything if the
/// input is not larger than `limit`.
pub fn truncate<T: Clone>(entries: &[T], limit: usize) -> Vec<T> {
    if entries.len() <= limit {
        return entries.to_vec();
    }
    let step = entries.len() as f64 / limit as f64;
    (0..limit)
        .map(|i| entries[(i as f64 * step) as usize].clone())
        .collect()
}

/// Merge the annotated errors with reference units.
///
/// Every errors unit is kept. Reference units are appended in order unless
/// their source sentence was already seen; merging stops once `cap` distinct
/// sources are present. Reference notes are cleared: only the errors corpus
/// carries ground truth.
pub fn merge(
    errors: Vec<EvaluationItem>,
    references: Vec<Vec<EvaluationItem>>,
    cap: usize,
) -> MergeOutcome {
    let mut seen: HashSet<String> = HashSet::new();
    let annotated = errors.len();
    let mut items = errors;
    for item in &items {
        seen.insert(item.source.clone());
    }
    tracing::info!(annotated, "Defined errors");

    let mut discarded = 0;
    'outer: for reference in references {
        for mut item in reference {
            if seen.len() >= cap {
                break 'outer;
            }
            if seen.contains(&item.source) {
                tracing::debug!(source = %item.source, "Discard duplicate source");
                discarded += 1;
                continue;
            }
            seen.insert(item.source.clone());
            item.note = None;
            items.push(item);
        }
    }

    MergeOutcome {
        items,
        annotated,
        discarded,
    }
}

/// Build the evaluation dataset described by `spec`.
pub fn build_dataset(spec: &DatasetSpec, languages: &LanguageConfig) -> Result<DatasetSummary> {
    let loader = CorpusLoader::new(languages);

    let errors = loader.load_all(&spec.errors)?;
    let mut references = Vec::with_capacity(spec.references.len());
    for path in &spec.references {
        let all = loader.load_all(path)?;
        let kept = truncate(&all, spec.per_reference_limit);
        tracing::info!(
            path = %path.display(),
            total = all.len(),
            kept = kept.len(),
            "Truncated reference corpus"
        );
        references.push(kept);
    }

    let merged = merge(errors, references, spec.cap);

    let tmx_path = spec.output.clone();
    let po_path = sibling_po_path(&tmx_path);
    write_text(&tmx_path, &tmx::write_tmx(&merged.items, languages))?;

    // The PO copy mirrors the merged units without annotations.
    let plain: Vec<EvaluationItem> = merged
        .items
        .iter()
        .map(|i| EvaluationItem::new(i.source.clone(), i.target.clone(), None))
        .collect();
    write_text(
        &po_path,
        &po::write_po(&plain, "merged-tmx", &languages.target_code),
    )?;

    tracing::info!(
        segments = merged.items.len(),
        tmx = %tmx_path.display(),
        po = %po_path.display(),
        "Merged dataset written"
    );

    Ok(DatasetSummary {
        tmx_path,
        po_path,
        total: merged.items.len(),
        annotated: merged.annotated,
        discarded: merged.discarded,
    })
}

fn sibling_po_path(tmx_path: &Path) -> PathBuf {
    tmx_path.with_extension("po")
}

fn write_text(path: &Path, content: &str) -> Result<()> {
    atomic_write(path, content.as_bytes()).map_err(MtJudgeError::from)
}
