//! Database connection bootstrap

use feedload_common::env;
use serde::{Deserialize, Serialize};
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use std::time::Duration;
use thiserror::Error;

/// Default MySQL port.
pub const DEFAULT_DB_PORT: u16 = 3306;

/// Default host for local runs.
pub const DEFAULT_DB_HOST: &str = "localhost";

/// Default schema holding the reference tables.
pub const DEFAULT_DB_NAME: &str = "reference";

/// Feeds load one after another, so a single connection is enough.
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 1;

/// Default connection timeout in seconds.
pub const DEFAULT_DB_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Database bootstrap errors
#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database query failed: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Database configuration error: {0}. Check the FEEDLOAD_DB_* settings.")]
    Config(String),
}

impl From<feedload_common::FeedloadError> for DbError {
    fn from(err: feedload_common::FeedloadError) -> Self {
        DbError::Config(err.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;

#[derive(Clone, Serialize, Deserialize)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub database: String,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

// Password stays out of Debug output
impl std::fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("max_connections", &self.max_connections)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_DB_HOST.to_string(),
            port: DEFAULT_DB_PORT,
            username: "root".to_string(),
            password: String::new(),
            database: DEFAULT_DB_NAME.to_string(),
            max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            connect_timeout_secs: DEFAULT_DB_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl DbConfig {
    /// Load from `FEEDLOAD_DB_*` environment variables
    pub fn from_env() -> DbResult<Self> {
        let defaults = Self::default();

        Ok(Self {
            host: env::var_or("FEEDLOAD_DB_HOST", &defaults.host),
            port: env::parse_or("FEEDLOAD_DB_PORT", defaults.port)?,
            username: env::var_or("FEEDLOAD_DB_USER", &defaults.username),
            password: env::var_or("FEEDLOAD_DB_PASSWORD", &defaults.password),
            database: env::var_or("FEEDLOAD_DB_NAME", &defaults.database),
            max_connections: env::parse_or("FEEDLOAD_DB_MAX_CONNECTIONS", defaults.max_connections)?,
            connect_timeout_secs: env::parse_or(
                "FEEDLOAD_DB_CONNECT_TIMEOUT",
                defaults.connect_timeout_secs,
            )?,
        })
    }

    pub fn validate(&self) -> DbResult<()> {
        if self.host.trim().is_empty() {
            return Err(DbError::Config("database host cannot be empty".to_string()));
        }

        if self.port == 0 {
            return Err(DbError::Config("database port must be greater than 0".to_string()));
        }

        if self.database.trim().is_empty() {
            return Err(DbError::Config("database name cannot be empty".to_string()));
        }

        if self.max_connections == 0 {
            return Err(DbError::Config(
                "max_connections must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn connect_options(&self) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.username)
            .password(&self.password)
            .database(&self.database)
    }
}

pub async fn create_pool(config: &DbConfig) -> DbResult<MySqlPool> {
    config.validate()?;

    let pool = MySqlPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .connect_with(config.connect_options())
        .await?;

    tracing::info!(
        host = %config.host,
        database = %config.database,
        max_connections = config.max_connections,
        "Database connection pool created"
    );

    Ok(pool)
}

pub async fn health_check(pool: &MySqlPool) -> DbResult<()> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map(|_| ())
        .map_err(DbError::from)
}
