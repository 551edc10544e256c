//! Feedload Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Loads reference datasets (routes, regions, cities) from object storage
//! into MySQL tables.
//!
//! # Pipeline
//!
//! - **Source**: fetch the feed file, unwrapping gzip by extension
//! - **Parser**: split each line into fields (CSV with a header, or JSON lines)
//! - **Validator**: check and render every field as a SQL literal
//! - **Engine**: batch valid rows into one `INSERT`, splitting the batch
//!   recursively when the database rejects it
//! - **Report**: bad lines and rows that failed on their own
//!
//! # Example
//!
//! ```no_run
//! use feedload_ingest::{engine::FeedEngine, feeds, sink::MySqlSink};
//!
//! # async fn example(sink: MySqlSink) -> anyhow::Result<()> {
//! let engine = FeedEngine::new(feeds::REGIONS, 10)?;
//! let file = std::fs::File::open("regions.csv")?;
//! let report = engine.run(&sink, std::io::BufReader::new(file)).await?;
//! println!("inserted {} rows", report.inserted);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod feeds;
pub mod job;
pub mod parser;
pub mod report;
pub mod sink;
pub mod source;
pub mod validator;

pub use error::{IngestError, IngestResult};
