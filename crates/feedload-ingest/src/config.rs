//! Job configuration

use feedload_common::env;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::db::DbConfig;
use crate::engine::MIN_SPLIT_FACTOR;
use crate::source::StorageConfig;

// ============================================================================
// Load Configuration Constants
// ============================================================================

/// Number of chunks a rejected batch is cut into.
pub const DEFAULT_SPLIT_FACTOR: usize = 10;

/// Directory receiving `<feed>.rejected.jsonl` files.
pub const DEFAULT_REPORT_DIR: &str = "./reports";

/// Everything the batch job needs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub database: DbConfig,
    pub storage: StorageConfig,
    pub load: LoadConfig,
}

/// Knobs for the feed engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    pub split_factor: usize,
    pub report_dir: PathBuf,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            split_factor: DEFAULT_SPLIT_FACTOR,
            report_dir: PathBuf::from(DEFAULT_REPORT_DIR),
        }
    }
}

impl LoadConfig {
    pub fn from_env() -> feedload_common::Result<Self> {
        Ok(Self {
            split_factor: env::parse_or("FEEDLOAD_SPLIT_FACTOR", DEFAULT_SPLIT_FACTOR)?,
            report_dir: PathBuf::from(env::var_or("FEEDLOAD_REPORT_DIR", DEFAULT_REPORT_DIR)),
        })
    }
}

impl Config {
    /// Load configuration from `.env`, the environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config {
            database: DbConfig::from_env()?,
            storage: StorageConfig::from_env()?,
            load: LoadConfig::from_env()?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        self.database.validate()?;
        self.storage.validate()?;

        if self.load.split_factor < MIN_SPLIT_FACTOR {
            anyhow::bail!(
                "Split factor must be at least {}, got {}",
                MIN_SPLIT_FACTOR,
                self.load.split_factor
            );
        }

        if self.load.report_dir.as_os_str().is_empty() {
            anyhow::bail!("Report directory cannot be empty");
        }

        Ok(())
    }
}
