//! Feed engine
//!
//! Drives one feed from raw lines to inserted rows:
//!
//! 1. Each line is parsed, shape-checked and validated. Rejected lines are
//!    recorded as [`BadLine`]s and never reach the database.
//! 2. Surviving rows are encoded as `VALUES` tuples and collected into a
//!    single batch, in input order.
//! 3. The whole batch is sent as one `INSERT`. If the database rejects it,
//!    the batch is split into `split_factor` chunks, each chunk is retried,
//!    and failing chunks are split again until a failing chunk holds a single
//!    row. That row is recorded as a [`FailedRow`].
//!
//! Every batched row therefore ends up either inserted or reported. A lost
//! connection is not something splitting can fix, so it aborts the run.

use chrono::Utc;
use futures::future::BoxFuture;
use std::io::BufRead;
use std::ops::Range;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{IngestError, IngestResult};
use crate::feeds::FeedDefinition;
use crate::parser::{ParsedLine, RowParser};
use crate::report::{BadLine, FailedRow, RunReport};
use crate::sink::{DatabaseSink, SinkError};
use crate::validator::{InvalidField, Validator};

/// Smallest split factor that still shrinks every chunk
pub const MIN_SPLIT_FACTOR: usize = 2;

/// Lines between progress messages while scanning
const PROGRESS_INTERVAL: usize = 100_000;

pub const REASON_WRONG_FIELD_COUNT: &str = "wrong number of values";
pub const REASON_NOT_UTF8: &str = "line is not valid UTF-8";

/// A validated row waiting to be inserted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRow {
    /// 1-based line number in the source file
    pub line_number: usize,
    /// Encoded `VALUES` tuple, e.g. `(5, "Metro", NULL)`
    pub values: String,
}

/// Rows collected during the scan, plus the columns they fill
#[derive(Debug, Clone, Default)]
pub struct Batch {
    pub columns: Vec<String>,
    pub rows: Vec<BatchRow>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// INSERT statement covering `range` of the batch
    pub fn insert_statement(&self, table: &str, range: Range<usize>) -> String {
        let tuples: Vec<&str> = self.rows[range].iter().map(|r| r.values.as_str()).collect();
        format!(
            "INSERT INTO {} ({}) VALUES {};",
            table,
            self.columns.join(", "),
            tuples.join(", ")
        )
    }
}

/// Loads one feed into its table
#[derive(Debug, Clone)]
pub struct FeedEngine {
    definition: FeedDefinition,
    split_factor: usize,
}

impl FeedEngine {
    pub fn new(definition: FeedDefinition, split_factor: usize) -> IngestResult<Self> {
        if split_factor < MIN_SPLIT_FACTOR {
            return Err(IngestError::InvalidSplitFactor(split_factor));
        }

        Ok(Self {
            definition,
            split_factor,
        })
    }

    pub fn definition(&self) -> &FeedDefinition {
        &self.definition
    }

    /// Parse, validate and insert every line of `reader`
    #[instrument(skip_all, fields(feed = self.definition.name, table = self.definition.table))]
    pub async fn run<R: BufRead>(
        &self,
        sink: &dyn DatabaseSink,
        reader: R,
    ) -> IngestResult<RunReport> {
        let mut report = RunReport::new(self.definition.name, self.definition.table);

        let batch = self.scan(reader, &mut report)?;
        report.rows_batched = batch.len();

        info!(
            lines = report.lines_read,
            rows = batch.len(),
            bad_lines = report.bad_lines.len(),
            "Scan complete"
        );

        if batch.is_empty() {
            info!("Nothing to insert");
        } else {
            self.insert(sink, &batch, &mut report).await?;
        }

        report.finished_at = Utc::now();

        info!(
            inserted = report.inserted,
            bad_lines = report.bad_lines.len(),
            failed_rows = report.failed_rows.len(),
            statements = report.statements_executed,
            "Feed loaded"
        );

        Ok(report)
    }

    /// Turn the input into a batch, recording every rejected line
    pub fn scan<R: BufRead>(&self, reader: R, report: &mut RunReport) -> IngestResult<Batch> {
        let mut parser = self.definition.parser();
        let mut rows = Vec::new();
        let mut warned_unvalidated = false;

        for (index, chunk) in reader.split(b'\n').enumerate() {
            let line_number = index + 1;
            let mut bytes = chunk.map_err(|source| IngestError::Read {
                feed: self.definition.name.to_string(),
                line_number,
                source,
            })?;
            report.lines_read += 1;

            if line_number % PROGRESS_INTERVAL == 0 {
                info!(lines = line_number, rows = rows.len(), "Scanning");
            }

            if bytes.last() == Some(&b'\r') {
                bytes.pop();
            }

            let line = match String::from_utf8(bytes) {
                Ok(line) => line,
                Err(e) => {
                    let lossy = String::from_utf8_lossy(e.as_bytes()).into_owned();
                    record_bad_line(report, line_number, lossy, REASON_NOT_UTF8.to_string());
                    continue;
                },
            };

            if line.trim().is_empty() {
                continue;
            }

            let fields = match parser.parse(&line) {
                Ok(ParsedLine::Header) => {
                    self.check_header(&parser);
                    continue;
                },
                Ok(ParsedLine::Fields(fields)) => fields,
                Err(e) => {
                    record_bad_line(report, line_number, line, format!("unparseable line: {}", e));
                    continue;
                },
            };

            let expected = expected_columns(&parser, &self.definition);
            if fields.len() != expected {
                record_bad_line(report, line_number, line, REASON_WRONG_FIELD_COUNT.to_string());
                continue;
            }

            let values = if self.definition.validators.len() == expected {
                match validate_row(self.definition.validators, &fields) {
                    Ok(values) => values,
                    Err(invalid) => {
                        record_bad_line(report, line_number, line, invalid.to_string());
                        continue;
                    },
                }
            } else {
                if !warned_unvalidated {
                    warn!(
                        columns = expected,
                        validators = self.definition.validators.len(),
                        "Validator count does not match column count; rows are inserted unvalidated"
                    );
                    warned_unvalidated = true;
                }
                fields
            };

            rows.push(BatchRow {
                line_number,
                values: encode_tuple(&values),
            });
        }

        let columns = parser
            .columns()
            .map(<[String]>::to_vec)
            .unwrap_or_else(|| self.definition.column_names());

        Ok(Batch { columns, rows })
    }

    fn check_header(&self, parser: &RowParser) {
        let Some(header) = parser.columns() else {
            return;
        };

        if !header.iter().map(String::as_str).eq(self.definition.columns.iter().copied()) {
            warn!(
                header = ?header,
                declared = ?self.definition.columns,
                "Header differs from declared columns; using the header"
            );
        } else {
            debug!(header = ?header, "Header captured");
        }
    }

    async fn insert(
        &self,
        sink: &dyn DatabaseSink,
        batch: &Batch,
        report: &mut RunReport,
    ) -> IngestResult<()> {
        let full = 0..batch.len();

        match self.execute(sink, batch, full.clone(), report).await {
            Ok(()) => Ok(()),
            Err(err) if err.is_rejection() => {
                warn!(error = %err, rows = batch.len(), "Bulk insert rejected, splitting into smaller inserts");
                self.bisect(sink, batch, full, 1, report).await
            },
            Err(err) => Err(self.fatal(err)),
        }
    }

    /// Retry `range` in `split_factor` chunks, splitting failing chunks again
    fn bisect<'a>(
        &'a self,
        sink: &'a dyn DatabaseSink,
        batch: &'a Batch,
        range: Range<usize>,
        depth: usize,
        report: &'a mut RunReport,
    ) -> BoxFuture<'a, IngestResult<()>> {
        Box::pin(async move {
            for chunk in split_ranges(range, self.split_factor) {
                match self.execute(sink, batch, chunk.clone(), report).await {
                    Ok(()) => {
                        debug!(depth, start = chunk.start, end = chunk.end, "Chunk inserted");
                    },
                    Err(err) if !err.is_rejection() => return Err(self.fatal(err)),
                    Err(err) if chunk.len() == 1 => {
                        let row = &batch.rows[chunk.start];
                        error!(
                            row_index = chunk.start,
                            line_number = row.line_number,
                            error = %err,
                            "FAILED {}: {}",
                            chunk.start,
                            row.values
                        );
                        report.failed_rows.push(FailedRow {
                            row_index: chunk.start,
                            line_number: row.line_number,
                            values: row.values.clone(),
                            error: err.to_string(),
                        });
                    },
                    Err(_) => {
                        debug!(depth, start = chunk.start, end = chunk.end, "Chunk rejected, splitting");
                        self.bisect(sink, batch, chunk, depth + 1, report).await?;
                    },
                }
            }

            Ok(())
        })
    }

    async fn execute(
        &self,
        sink: &dyn DatabaseSink,
        batch: &Batch,
        range: Range<usize>,
        report: &mut RunReport,
    ) -> Result<(), SinkError> {
        let rows = range.len();
        let statement = batch.insert_statement(self.definition.table, range);

        report.statements_executed += 1;
        sink.execute(&statement).await?;
        report.inserted += rows;

        Ok(())
    }

    fn fatal(&self, source: SinkError) -> IngestError {
        error!(error = %source, "Database connection lost, aborting feed");
        IngestError::Sink {
            feed: self.definition.name.to_string(),
            source,
        }
    }
}

/// Split `range` into at most `factor` consecutive chunks of near-equal size
///
/// Every chunk is strictly smaller than `range` when `range` holds two or
/// more rows and `factor >= 2`.
pub fn split_ranges(range: Range<usize>, factor: usize) -> Vec<Range<usize>> {
    let len = range.len();
    if len == 0 {
        return Vec::new();
    }

    let chunk = len.div_ceil(factor.max(MIN_SPLIT_FACTOR));

    (range.start..range.end)
        .step_by(chunk)
        .map(|start| start..(start + chunk).min(range.end))
        .collect()
}

/// Apply validators positionally, stopping at the first rejected field
pub fn validate_row(validators: &[Validator], fields: &[String]) -> Result<Vec<String>, InvalidField> {
    validators
        .iter()
        .zip(fields)
        .map(|(validator, field)| validator.validate(field))
        .collect()
}

/// `["1", "\"A\""]` -> `(1, "A")`
pub fn encode_tuple(values: &[String]) -> String {
    format!("({})", values.join(", "))
}

fn expected_columns(parser: &RowParser, definition: &FeedDefinition) -> usize {
    parser
        .columns()
        .map_or(definition.columns.len(), |columns| columns.len())
}

fn record_bad_line(report: &mut RunReport, line_number: usize, line: String, reason: String) {
    warn!(line_number, reason = %reason, line = %line, "Bad line");
    report.bad_lines.push(BadLine {
        line_number,
        line,
        reason,
    });
}
