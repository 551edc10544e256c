//! Feed file sources
//!
//! A source hands back the raw bytes of a named feed file. Whether they came
//! from a bucket or a local directory does not matter to the engine; gzip
//! unwrapping is decided by the file name and happens here.

use anyhow::{Context, Result};
use async_trait::async_trait;
use flate2::read::MultiGzDecoder;
use std::io::{BufRead, BufReader, Cursor};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

pub mod bucket;
pub mod config;

pub use bucket::BucketSource;
pub use config::StorageConfig;

/// Supplier of feed files
#[async_trait]
pub trait FileSource: Send + Sync {
    /// Raw (possibly compressed) content of `name`
    async fn fetch(&self, name: &str) -> Result<Vec<u8>>;

    /// Human-readable location of `name`, for logs
    fn describe(&self, name: &str) -> String;
}

/// Feed files read from a directory on disk
#[derive(Debug, Clone)]
pub struct LocalSource {
    root: PathBuf,
}

impl LocalSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl FileSource for LocalSource {
    #[instrument(skip(self))]
    async fn fetch(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.root.join(name);
        let data = tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read feed file {}", path.display()))?;
        debug!("Read {} bytes from {}", data.len(), path.display());
        Ok(data)
    }

    fn describe(&self, name: &str) -> String {
        self.root.join(name).display().to_string()
    }
}

/// Whether `name` carries a gzip extension
pub fn is_gzip(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("gz") || ext.eq_ignore_ascii_case("gzip"))
        .unwrap_or(false)
}

/// Wrap fetched bytes in a line reader, decompressing gzip transparently
///
/// Decompression is lazy: a corrupt archive surfaces as an I/O error while
/// the lines are being read.
pub fn line_reader(name: &str, data: Vec<u8>) -> Box<dyn BufRead + Send> {
    if is_gzip(name) {
        Box::new(BufReader::new(MultiGzDecoder::new(Cursor::new(data))))
    } else {
        Box::new(Cursor::new(data))
    }
}

/// Fetch `name` from `source` and expose it as lines
pub async fn open_lines(source: &dyn FileSource, name: &str) -> Result<Box<dyn BufRead + Send>> {
    let data = source.fetch(name).await?;
    Ok(line_reader(name, data))
}
