//! Database sink
//!
//! The engine hands the sink complete `INSERT` statements and only needs to
//! know whether each one was accepted. Failures come in two flavours: the
//! database refused the statement (worth splitting and retrying), or the
//! connection is gone (nothing left to retry against).

use async_trait::async_trait;
use sqlx::MySqlPool;
use thiserror::Error;
use tracing::{debug, instrument};

/// Why the sink did not apply a statement
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// The database refused the statement (constraint, syntax, type)
    #[error("statement rejected: {0}")]
    Rejected(String),

    /// The database could not be reached
    #[error("database connection failed: {0}")]
    Connection(String),
}

impl SinkError {
    /// Whether splitting the statement can make progress
    pub fn is_rejection(&self) -> bool {
        matches!(self, SinkError::Rejected(_))
    }
}

impl From<sqlx::Error> for SinkError {
    fn from(err: sqlx::Error) -> Self {
        let message = err.to_string();
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Configuration(_) => SinkError::Connection(message),
            _ => SinkError::Rejected(message),
        }
    }
}

/// Something that executes INSERT statements
#[async_trait]
pub trait DatabaseSink: Send + Sync {
    async fn execute(&self, statement: &str) -> Result<(), SinkError>;
}

/// Sink backed by a MySQL connection pool
///
/// Statements are sent as plain text: every value is already a SQL literal
/// and string literals use double quotes, which MySQL accepts unless
/// `ANSI_QUOTES` is enabled on the server.
#[derive(Clone)]
pub struct MySqlSink {
    pool: MySqlPool,
}

impl MySqlSink {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

#[async_trait]
impl DatabaseSink for MySqlSink {
    #[instrument(skip_all, fields(bytes = statement.len()))]
    async fn execute(&self, statement: &str) -> Result<(), SinkError> {
        let result = sqlx::raw_sql(statement).execute(&self.pool).await?;
        debug!(rows_affected = result.rows_affected(), "Statement applied");
        Ok(())
    }
}
