//! Run statistics and the metrics derived from them.
//!
//! [`RunStatistics`] holds the confusion counts accumulated by the scoring
//! loop. [`Metrics`] is a pure function of those counts and may be computed
//! at any point of a run for live telemetry.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The four confusion-matrix buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Tp,
    Fp,
    Fn,
    Tn,
}

impl Outcome {
    /// Status tag written to the audit sink.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Tp => "tp",
            Self::Fp => "fp",
            Self::Fn => "fn",
            Self::Tn => "tn",
        }
    }

    /// True negatives are not written to the audit sink.
    pub fn is_audited(self) -> bool {
        !matches!(self, Self::Tn)
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Running confusion counts for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStatistics {
    pub tp: usize,
    pub fp: usize,
    #[serde(rename = "fn")]
    pub fn_: usize,
    pub tn: usize,
    pub processed: usize,
    /// Verdicts that were neither YES nor NO. Already counted in `tp`/`fp`.
    pub unparseable: usize,
}

impl RunStatistics {
    /// Count one outcome. `processed` moves together with the bucket.
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Tp => self.tp += 1,
            Outcome::Fp => self.fp += 1,
            Outcome::Fn => self.fn_ += 1,
            Outcome::Tn => self.tn += 1,
        }
        self.processed += 1;
    }

    pub fn bucket_total(&self) -> usize {
        self.tp + self.fp + self.fn_ + self.tn
    }

    pub fn metrics(&self) -> Metrics {
        Metrics::from_counts(self)
    }
}

/// Precision, recall and F1 of a set of counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

impl Metrics {
    pub fn from_counts(stats: &RunStatistics) -> Self {
        let precision = ratio(stats.tp, stats.tp + stats.fp);
        let recall = ratio(stats.tp, stats.tp + stats.fn_);
        let f1 = if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        };
        Self {
            precision,
            recall,
            f1,
        }
    }
}

fn ratio(num: usize, denom: usize) -> f64 {
    if denom == 0 {
        0.0
    } else {
        num as f64 / denom as f64
    }
}

/// Items processed per minute over `elapsed`. Zero when no time has passed.
pub fn throughput_per_minute(processed: usize, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        0.0
    } else {
        processed as f64 * 60.0 / secs
    }
}

/// Round to two decimals for persisted records.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
