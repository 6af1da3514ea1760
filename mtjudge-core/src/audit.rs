//! Human-readable audit output.
//!
//! One block per audited item:
//!
//! ```text
//! English: <source>
//! Catalan: <target>
//! Note: <note>            (only when the item has one)
//! Result: <raw answer>
//! Status: tp|fp|fn        (omitted for inference-only runs)
//!
//! -----------------------
//!
//! ```

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::config::LanguageConfig;
use crate::corpus::EvaluationItem;
use crate::metrics::Outcome;
use crate::verdict::Verdict;

pub const SEPARATOR: &str = "-----------------------";

/// Buffered writer of audit blocks. Flushed on [`AuditSink::finish`]; the
/// underlying writer is also flushed and closed when the sink is dropped.
pub struct AuditSink<W: Write> {
    out: BufWriter<W>,
    source_label: String,
    target_label: String,
    blocks: usize,
}

impl AuditSink<File> {
    /// Create (truncate) the audit file at `path`, creating parent directories.
    pub fn create(path: &Path, languages: &LanguageConfig) -> io::Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        Ok(Self::new(file, languages))
    }
}

impl<W: Write> AuditSink<W> {
    pub fn new(writer: W, languages: &LanguageConfig) -> Self {
        Self {
            out: BufWriter::new(writer),
            source_label: languages.source_label.clone(),
            target_label: languages.target_label.clone(),
            blocks: 0,
        }
    }

    /// Write one block. `status` is `None` for inference-only output.
    pub fn write_block(
        &mut self,
        item: &EvaluationItem,
        verdict: &Verdict,
        status: Option<Outcome>,
    ) -> io::Result<()> {
        writeln!(self.out, "{}: {}", self.source_label, item.source)?;
        writeln!(self.out, "{}: {}", self.target_label, item.target)?;
        if let Some(note) = item.note.as_deref().filter(|n| !n.is_empty()) {
            writeln!(self.out, "Note: {}", note)?;
        }
        writeln!(self.out, "Result: {}", verdict.audit_text())?;
        if let Some(status) = status {
            writeln!(self.out, "Status: {}", status)?;
        }
        write!(self.out, "\n{}\n\n", SEPARATOR)?;
        self.blocks += 1;
        Ok(())
    }

    pub fn blocks_written(&self) -> usize {
        self.blocks
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    /// Flush and return the underlying writer.
    pub fn finish(self) -> io::Result<W> {
        self.out.into_inner().map_err(|e| e.into_error())
    }
}
