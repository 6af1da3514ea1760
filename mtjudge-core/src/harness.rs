//! Scoring loop.
//!
//! Drives the judge over a corpus one item at a time, joins each verdict with
//! the item's ground truth into a confusion outcome, writes disagreements and
//! positives to the audit sink, and emits progress telemetry.
//!
//! A run moves `Ready -> Running -> Completed`, or `Running -> Aborted` on the
//! first judge or audit failure. Aborted runs return the error and their
//! partial statistics are dropped.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::time::{Duration, Instant};

use crate::audit::AuditSink;
use crate::corpus::EvaluationItem;
use crate::error::Result;
use crate::judge::JudgeAdapter;
use crate::metrics::{Metrics, Outcome, RunStatistics, throughput_per_minute};
use crate::verdict::{Ternary, normalize};

/// Progress telemetry is emitted every this many items.
pub const PROGRESS_INTERVAL: usize = 10;

/// Lifecycle of one scoring run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Ready,
    Running,
    Completed,
    Aborted,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Ready => write!(f, "ready"),
            RunState::Running => write!(f, "running"),
            RunState::Completed => write!(f, "completed"),
            RunState::Aborted => write!(f, "aborted"),
        }
    }
}

/// Join a verdict with ground truth. Unparseable verdicts count as positives.
pub fn classify_outcome(ternary: Ternary, has_error: bool) -> Outcome {
    match (ternary.flags_error(), has_error) {
        (true, true) => Outcome::Tp,
        (true, false) => Outcome::Fp,
        (false, true) => Outcome::Fn,
        (false, false) => Outcome::Tn,
    }
}

/// Progress is reported every [`PROGRESS_INTERVAL`] items and on the last
/// item allowed by `limit`.
fn is_progress_point(position: usize, limit: Option<usize>) -> bool {
    position % PROGRESS_INTERVAL == 0 || Some(position) == limit
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub state: RunState,
    pub stats: RunStatistics,
    pub metrics: Metrics,
    pub elapsed: Duration,
    /// Blocks written to the audit sink.
    pub audited: usize,
}

/// One scoring run over an ordered corpus.
pub struct ScoringLoop<'a, W: Write> {
    judge: &'a JudgeAdapter,
    system_instruction: &'a str,
    audit: AuditSink<W>,
    limit: Option<usize>,
    state: RunState,
    stats: RunStatistics,
}

impl<'a, W: Write> ScoringLoop<'a, W> {
    /// `limit` of `None` scores the whole corpus.
    pub fn new(
        judge: &'a JudgeAdapter,
        system_instruction: &'a str,
        audit: AuditSink<W>,
        limit: Option<usize>,
    ) -> Self {
        Self {
            judge,
            system_instruction,
            audit,
            limit,
            state: RunState::Ready,
            stats: RunStatistics::default(),
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Score `items` in order until the corpus is exhausted or `limit` items
    /// have been processed.
    pub async fn run(mut self, items: &[EvaluationItem]) -> Result<RunSummary> {
        self.transition(RunState::Running);
        let started = Instant::now();
        let total = self.limit.map_or(items.len(), |limit| items.len().min(limit));

        if self.limit != Some(0) {
            for (idx, item) in items.iter().enumerate() {
                let position = idx + 1;
                if let Err(e) = self.score_item(item).await {
                    self.transition(RunState::Aborted);
                    tracing::error!(
                        item = position,
                        processed = self.stats.processed,
                        error = %e,
                        "Run aborted"
                    );
                    return Err(e);
                }

                if is_progress_point(position, self.limit) {
                    self.report_progress(position, total, started.elapsed());
                }
                if Some(position) == self.limit {
                    break;
                }
            }
        }

        if let Err(e) = self.audit.flush() {
            self.transition(RunState::Aborted);
            return Err(e.into());
        }
        self.transition(RunState::Completed);

        let elapsed = started.elapsed();
        tracing::info!(
            processed = self.stats.processed,
            tp = self.stats.tp,
            fp = self.stats.fp,
            "fn" = self.stats.fn_,
            tn = self.stats.tn,
            unparseable = self.stats.unparseable,
            elapsed_secs = %format!("{:.2}", elapsed.as_secs_f64()),
            "Run completed"
        );

        Ok(RunSummary {
            state: self.state,
            stats: self.stats,
            metrics: self.stats.metrics(),
            elapsed,
            audited: self.audit.blocks_written(),
        })
    }

    async fn score_item(&mut self, item: &EvaluationItem) -> Result<()> {
        let raw = self
            .judge
            .classify(self.system_instruction, &item.source, &item.target)
            .await?;
        let verdict = normalize(&raw);
        let outcome = classify_outcome(verdict.ternary, item.has_error());

        self.stats.record(outcome);
        if verdict.ternary == Ternary::Unparseable {
            self.stats.unparseable += 1;
            tracing::warn!(answer = %verdict.raw, "Judge answer is not YES or NO");
        }
        if outcome.is_audited() {
            self.audit.write_block(item, &verdict, Some(outcome))?;
        }
        Ok(())
    }

    fn report_progress(&self, done: usize, total: usize, elapsed: Duration) {
        let metrics = self.stats.metrics();
        let percent = if total == 0 {
            100.0
        } else {
            done as f64 * 100.0 / total as f64
        };
        tracing::info!(
            done,
            total,
            percent = %format!("{:.2}", percent),
            tp = self.stats.tp,
            fp = self.stats.fp,
            "fn" = self.stats.fn_,
            tn = self.stats.tn,
            precision = %format!("{:.2}", metrics.precision),
            recall = %format!("{:.2}", metrics.recall),
            items_per_min = %format!("{:.2}", throughput_per_minute(self.stats.processed, elapsed)),
            elapsed_secs = %format!("{:.2}", elapsed.as_secs_f64()),
            "Progress"
        );
    }

    fn transition(&mut self, next: RunState) {
        tracing::debug!(from = %self.state, to = %next, "Run state change");
        self.state = next;
    }
}

/// Result of an inference-only review.
#[derive(Debug, Clone)]
pub struct ReviewSummary {
    pub items: usize,
    pub unparseable: usize,
    pub elapsed: Duration,
}

/// Ask the judge about every item and write one status-less block per item.
/// No ground truth is consulted.
pub async fn review<W: Write>(
    judge: &JudgeAdapter,
    system_instruction: &str,
    items: &[EvaluationItem],
    mut audit: AuditSink<W>,
) -> Result<ReviewSummary> {
    let started = Instant::now();
    let mut unparseable = 0;

    for (idx, item) in items.iter().enumerate() {
        let raw = judge
            .classify(system_instruction, &item.source, &item.target)
            .await?;
        let verdict = normalize(&raw);
        if verdict.ternary == Ternary::Unparseable {
            unparseable += 1;
        }
        audit.write_block(item, &verdict, None)?;

        let done = idx + 1;
        if done % PROGRESS_INTERVAL == 0 || done == items.len() {
            tracing::info!(done, total = items.len(), "Review progress");
        }
    }
    audit.finish()?;

    Ok(ReviewSummary {
        items: items.len(),
        unparseable,
        elapsed: started.elapsed(),
    })
}
