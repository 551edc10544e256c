//! Feedload Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared infrastructure for the feedload workspace members:
//!
//! - **Error Handling**: the shared error and result types
//! - **Environment**: typed access to configuration variables
//! - **Logging**: tracing subscriber bootstrap

pub mod env;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{FeedloadError, Result};
