//! Fatal ingestion errors
//!
//! Anything that can be recorded against a single line or row is reported
//! through [`crate::report::RunReport`] instead. The variants here end the
//! run for the current feed.

use thiserror::Error;

use crate::sink::SinkError;

pub type IngestResult<T> = Result<T, IngestError>;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Failed to read feed '{feed}' at line {line_number}: {source}")]
    Read {
        feed: String,
        line_number: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("Database unavailable while loading '{feed}': {source}")]
    Sink {
        feed: String,
        #[source]
        source: SinkError,
    },

    #[error("Split factor must be at least 2, got {0}")]
    InvalidSplitFactor(usize),
}
