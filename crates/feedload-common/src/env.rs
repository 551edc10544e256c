//! Environment variable helpers
//!
//! The batch job is configured entirely from the process environment (plus an
//! optional `.env` file loaded by the binary). These helpers keep the
//! "unset means default, malformed means error" rule in one place.

use crate::error::{FeedloadError, Result};
use std::str::FromStr;

/// Read a variable, falling back to `default` when unset
pub fn var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read a variable, returning `None` when unset or empty
pub fn var_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Parse a variable, returning `None` when unset
///
/// A value that is present but does not parse is an error rather than a
/// silent fallback, so a typo in a deployment does not go unnoticed.
pub fn parse_opt<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var_opt(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| FeedloadError::InvalidEnv {
                key: key.to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            }),
    }
}

/// Parse a variable, falling back to `default` when unset
pub fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    Ok(parse_opt(key)?.unwrap_or(default))
}
