//! Run reports and rejection logs

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A line rejected before any insert was attempted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadLine {
    /// 1-based line number in the source file
    pub line_number: usize,
    /// The line as read, without its terminator
    pub line: String,
    pub reason: String,
}

/// A row the database refused even when inserted on its own
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedRow {
    /// Position of the row in the batch
    pub row_index: usize,
    /// 1-based line number in the source file
    pub line_number: usize,
    /// The `VALUES` tuple that was sent
    pub values: String,
    /// Error reported by the database
    pub error: String,
}

/// One entry of a rejection log file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rejection {
    BadLine(BadLine),
    Failed(FailedRow),
}

/// Outcome of one engine run over one feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub feed: String,
    pub table: String,
    /// Lines read from the source, including the header and blank lines
    pub lines_read: usize,
    /// Rows that made it into the batch
    pub rows_batched: usize,
    /// Rows the database accepted
    pub inserted: usize,
    /// INSERT statements sent, successful or not
    pub statements_executed: usize,
    pub bad_lines: Vec<BadLine>,
    pub failed_rows: Vec<FailedRow>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub(crate) fn new(feed: &str, table: &str) -> Self {
        let now = Utc::now();
        Self {
            feed: feed.to_string(),
            table: table.to_string(),
            lines_read: 0,
            rows_batched: 0,
            inserted: 0,
            statements_executed: 0,
            bad_lines: Vec::new(),
            failed_rows: Vec::new(),
            started_at: now,
            finished_at: now,
        }
    }

    /// True when every batched row was inserted and no line was rejected
    pub fn is_clean(&self) -> bool {
        self.bad_lines.is_empty() && self.failed_rows.is_empty()
    }

    /// Number of rejected lines plus rows that failed on their own
    pub fn rejected(&self) -> usize {
        self.bad_lines.len() + self.failed_rows.len()
    }

    /// Path of this feed's rejection log inside `dir`
    pub fn rejection_log_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}.rejected.jsonl", self.feed))
    }

    /// Write bad lines and failed rows as JSON lines
    ///
    /// Returns the file written, or `None` when there was nothing to write.
    pub fn write_rejections(&self, dir: &Path) -> Result<Option<PathBuf>> {
        if self.is_clean() {
            return Ok(None);
        }

        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create report directory {}", dir.display()))?;

        let path = self.rejection_log_path(dir);
        let entries = self
            .bad_lines
            .iter()
            .cloned()
            .map(Rejection::BadLine)
            .chain(self.failed_rows.iter().cloned().map(Rejection::Failed));

        serde_jsonlines::write_json_lines(&path, entries)
            .with_context(|| format!("Failed to write rejection log {}", path.display()))?;

        Ok(Some(path))
    }
}
