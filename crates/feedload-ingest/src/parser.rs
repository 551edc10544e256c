//! Row parsers
//!
//! Turns one raw input line into an ordered list of field strings. Two
//! strategies exist:
//!
//! - **Delimited**: comma-separated text. The first line that parses is the
//!   column header and is reported as [`ParsedLine::Header`] instead of data.
//! - **Record**: one JSON object per line, with fields pulled out in a
//!   predeclared column order.

use serde_json::Value;
use thiserror::Error;

use crate::validator::SQL_NULL;

const DELIMITER: u8 = b',';
const QUOTE: u8 = b'"';

/// Why a line could not be turned into fields
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("malformed delimited line: {0}")]
    Malformed(String),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected a JSON object, found {0}")]
    NotAnObject(&'static str),

    #[error("missing key '{0}'")]
    MissingKey(String),

    #[error("key '{0}' holds a nested value")]
    NestedValue(String),
}

/// Outcome of parsing one line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    /// The line was consumed as the column header; nothing to insert
    Header,
    /// Ordered field values
    Fields(Vec<String>),
}

/// Parser selected by a feed definition
#[derive(Debug, Clone)]
pub enum RowParser {
    Delimited(DelimitedParser),
    Record(RecordParser),
}

impl RowParser {
    /// Parse one line (without its terminator)
    pub fn parse(&mut self, line: &str) -> Result<ParsedLine, ParseError> {
        match self {
            RowParser::Delimited(parser) => parser.parse(line),
            RowParser::Record(parser) => parser.parse(line),
        }
    }

    /// Column names, once known
    ///
    /// Delimited parsers only know their columns after the header line has
    /// been seen; record parsers know them from the start.
    pub fn columns(&self) -> Option<&[String]> {
        match self {
            RowParser::Delimited(parser) => parser.header.as_deref(),
            RowParser::Record(parser) => Some(&parser.columns),
        }
    }
}

/// Comma-separated lines with a leading header line
#[derive(Debug, Clone, Default)]
pub struct DelimitedParser {
    header: Option<Vec<String>>,
}

impl DelimitedParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(&mut self, line: &str) -> Result<ParsedLine, ParseError> {
        let fields = split_delimited(line)?;

        if self.header.is_none() {
            self.header = Some(fields);
            return Ok(ParsedLine::Header);
        }

        Ok(ParsedLine::Fields(fields))
    }

    /// The captured header, if one has been seen
    pub fn header(&self) -> Option<&[String]> {
        self.header.as_deref()
    }
}

/// Split one line: comma delimiter, double-quote quoting, whitespace after
/// a delimiter dropped, unbalanced quotes rejected
fn split_delimited(line: &str) -> Result<Vec<String>, ParseError> {
    if line.bytes().filter(|&b| b == QUOTE).count() % 2 != 0 {
        return Err(ParseError::Malformed("unterminated quoted field".to_string()));
    }

    let line = skip_initial_space(line);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(DELIMITER)
        .quote(QUOTE)
        .double_quote(true)
        .flexible(true)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_reader(line.as_bytes());

    let mut record = csv::StringRecord::new();
    let found = reader
        .read_record(&mut record)
        .map_err(|e| ParseError::Malformed(e.to_string()))?;

    if !found {
        return Ok(Vec::new());
    }

    Ok(record.iter().map(str::to_string).collect())
}

/// Drop spaces and tabs at the start of every field outside quotes
///
/// The csv reader only honours a quote as the first byte of a field, so
/// `7, "Paris, France"` must reach it as `7,"Paris, France"`.
fn skip_initial_space(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut in_quotes = false;
    let mut field_start = true;

    for c in line.chars() {
        if field_start && !in_quotes && (c == ' ' || c == '\t') {
            continue;
        }
        field_start = false;

        if c == QUOTE as char {
            in_quotes = !in_quotes;
        } else if c == DELIMITER as char && !in_quotes {
            field_start = true;
        }
        out.push(c);
    }

    out
}

/// One JSON object per line
#[derive(Debug, Clone)]
pub struct RecordParser {
    columns: Vec<String>,
    optional: Vec<String>,
}

impl RecordParser {
    /// `optional` keys that are absent from a record read as `NULL`
    pub fn new<C, O>(columns: C, optional: O) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        O: IntoIterator,
        O::Item: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            optional: optional.into_iter().map(Into::into).collect(),
        }
    }

    pub fn parse(&self, line: &str) -> Result<ParsedLine, ParseError> {
        let mut object = match serde_json::from_str::<Value>(line)? {
            Value::Object(map) => map,
            other => return Err(ParseError::NotAnObject(json_kind(&other))),
        };

        let fields = self
            .columns
            .iter()
            .map(|column| match object.remove(column) {
                Some(value) => render_json(column, value),
                None if self.optional.contains(column) => Ok(SQL_NULL.to_string()),
                None => Err(ParseError::MissingKey(column.clone())),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ParsedLine::Fields(fields))
    }
}

fn render_json(column: &str, value: Value) -> Result<String, ParseError> {
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(SQL_NULL.to_string()),
        Value::Bool(b) => Ok(if b { "1" } else { "0" }.to_string()),
        Value::Array(_) | Value::Object(_) => Err(ParseError::NestedValue(column.to_string())),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
