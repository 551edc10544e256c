//! Per-column validators
//!
//! A validator takes one raw field and either returns the text to place in
//! the SQL `VALUES` tuple (a number, `NULL`, or a double-quoted literal) or
//! rejects the field. Validators never fail any other way and have no side
//! effects, so the engine is free to stop at the first rejection.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// SQL keyword passed through by nullable columns
pub const SQL_NULL: &str = "NULL";

/// A field that did not pass its column's validator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("value rejected: {value}")]
pub struct InvalidField {
    /// The raw field as it appeared in the input
    pub value: String,
    /// Validator that rejected it
    pub validator: Validator,
}

/// Validation rule for one column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Validator {
    /// Signed integer that fits in 64 bits
    Integer,
    /// Fixed-length code of uppercase ASCII letters (ISO 3166 alpha-2/alpha-3)
    CountryCode { len: usize },
    /// Boolean flag written as "0" or "1"
    Flag,
    /// `NULL` or an integer
    NullableInteger,
    /// Any text, emitted as a double-quoted literal
    Quoted,
}

impl Validator {
    /// Validate `raw` and render it as a SQL literal
    pub fn validate(&self, raw: &str) -> Result<String, InvalidField> {
        let rendered = match self {
            Validator::Integer => integer(raw),
            Validator::CountryCode { len } => country_code(raw, *len),
            Validator::Flag => flag(raw),
            Validator::NullableInteger if raw == SQL_NULL => Some(SQL_NULL.to_string()),
            Validator::NullableInteger => integer(raw),
            Validator::Quoted => Some(quote(raw)),
        };

        rendered.ok_or_else(|| InvalidField {
            value: raw.to_string(),
            validator: *self,
        })
    }
}

impl std::fmt::Display for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Validator::Integer => write!(f, "integer"),
            Validator::CountryCode { len } => write!(f, "country code (alpha-{})", len),
            Validator::Flag => write!(f, "flag"),
            Validator::NullableInteger => write!(f, "nullable integer"),
            Validator::Quoted => write!(f, "quoted string"),
        }
    }
}

fn integer(raw: &str) -> Option<String> {
    raw.trim().parse::<i64>().ok().map(|n| n.to_string())
}

fn country_code(raw: &str, len: usize) -> Option<String> {
    if raw.len() == len && raw.bytes().all(|b| b.is_ascii_uppercase()) {
        Some(quote(raw))
    } else {
        None
    }
}

fn flag(raw: &str) -> Option<String> {
    matches!(raw, "0" | "1").then(|| raw.to_string())
}

/// Wrap in double quotes; the content is not escaped
fn quote(raw: &str) -> String {
    format!("\"{}\"", raw)
}
