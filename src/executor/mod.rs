//! Database Executor Module
//!
//! The seam between the reconciliation engine and a relational database:
//! catalog reads, row reads and transactional statement batches.

mod statement;
mod postgres;
mod memory;

use std::sync::Arc;
use async_trait::async_trait;

pub use statement::{quote_ident, Statement};
pub use postgres::{PgConnector, PgDatabase};
pub use memory::{MemoryConnector, MemoryDatabase};

use crate::config::RetryConfig;
use crate::data::{Row, TableLayout};
use crate::error::{Error, Result};
use crate::schema::{ColumnRecord, IndexRecord};

/// A connected database
#[async_trait]
pub trait Database: Send + Sync {
    /// Display name used in logs and reports
    fn name(&self) -> &str;

    /// Column catalog of the public schema
    async fn column_catalog(&self) -> Result<Vec<ColumnRecord>>;

    /// Index catalog of the public schema
    async fn index_catalog(&self) -> Result<Vec<IndexRecord>>;

    /// Read every row of a table, laid out by `layout`
    async fn fetch_rows(&self, layout: &Arc<TableLayout>) -> Result<Vec<Row>>;

    /// Execute statements in one transaction
    ///
    /// Returns the identity produced by each statement (for inserts with a
    /// returning column). Any failure rolls the whole batch back.
    async fn execute_batch(&self, statements: &[Statement]) -> Result<Vec<Option<i64>>>;

    /// Release the connection
    async fn close(&self);
}

/// Network location of a database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub name: String,
    pub host: String,
    pub port: u16,
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}:{})", self.name, self.host, self.port)
    }
}

/// Opens connections to targets
#[async_trait]
pub trait Connector: Send + Sync {
    /// Single connection attempt
    async fn connect(&self, target: &Target) -> Result<Arc<dyn Database>>;
}

/// Connect with a bounded number of attempts and a fixed delay
pub async fn connect_with_retry(
    connector: &dyn Connector,
    target: &Target,
    retry: &RetryConfig,
) -> Result<Arc<dyn Database>> {
    let attempts = retry.attempts.max(1);
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        match connector.connect(target).await {
            Ok(db) => {
                tracing::info!("Connected to {}", target);
                return Ok(db);
            }
            Err(e) => {
                tracing::error!(
                    "Attempt {}/{}: unable to connect to {}: {}",
                    attempt,
                    attempts,
                    target,
                    e
                );
                last_error = e.to_string();
                if !e.is_retryable() {
                    return Err(Error::Connectivity {
                        target: target.name.clone(),
                        attempts: attempt,
                        reason: last_error,
                    });
                }
                if attempt < attempts {
                    tokio::time::sleep(retry.backoff()).await;
                }
            }
        }
    }

    Err(Error::Connectivity {
        target: target.name.clone(),
        attempts,
        reason: last_error,
    })
}
