//! PostgreSQL Executor
//!
//! Runs catalog queries, row reads and statement batches against PostgreSQL.

use std::sync::Arc;
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row as _;

use super::{Connector, Database, Statement, Target};
use crate::config::DatabaseConfig;
use crate::data::{Row, TableLayout};
use crate::error::{Error, Result};
use crate::schema::{ColumnRecord, IndexRecord};

const COLUMN_CATALOG_SQL: &str = r#"
SELECT table_name::text AS table_name,
       column_name::text AS column_name,
       ordinal_position::int AS ordinal_position,
       data_type::text AS data_type,
       udt_name::text AS udt_name,
       is_nullable::text AS is_nullable,
       column_default::text AS column_default,
       character_maximum_length::int AS character_maximum_length,
       CASE WHEN data_type LIKE 'time%' OR data_type = 'interval'
            THEN datetime_precision::int
            ELSE numeric_precision::int
       END AS numeric_precision,
       numeric_scale::int AS numeric_scale
FROM information_schema.columns
WHERE table_schema = 'public'
ORDER BY table_name, ordinal_position
"#;

const INDEX_CATALOG_SQL: &str = r#"
SELECT tablename::text AS tablename,
       indexname::text AS indexname,
       indexdef::text AS indexdef
FROM pg_indexes
WHERE schemaname = 'public'
  AND indexname NOT LIKE '%_pkey'
ORDER BY tablename, indexname
"#;

/// PostgreSQL database connection pool
pub struct PgDatabase {
    name: String,
    pool: PgPool,
}

impl PgDatabase {
    /// Connect to a database URL
    pub async fn connect(name: &str, url: &str, config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_size.max(1))
            .acquire_timeout(config.connect_timeout())
            .connect(url)
            .await
            .map_err(|e| connect_error(name, e))?;

        Ok(Self {
            name: name.to_string(),
            pool,
        })
    }

    fn statement_error(&self, sql: &str, e: sqlx::Error) -> Error {
        Error::Statement {
            target: self.name.clone(),
            reason: format!("'{}...': {}", preview(sql, 80), e),
        }
    }
}

/// Transport failures become connectivity errors, which are retried;
/// everything else (bad credentials, unknown database) is not
fn connect_error(name: &str, e: sqlx::Error) -> Error {
    match e {
        sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            Error::Connectivity {
                target: name.to_string(),
                attempts: 1,
                reason: e.to_string(),
            }
        }
        other => Error::Database(other),
    }
}

fn preview(sql: &str, max: usize) -> String {
    sql.chars().take(max).collect()
}

fn column_record(row: &PgRow) -> std::result::Result<ColumnRecord, sqlx::Error> {
    Ok(ColumnRecord {
        table: row.try_get("table_name")?,
        column: row.try_get("column_name")?,
        position: row.try_get("ordinal_position")?,
        data_type: row.try_get("data_type")?,
        udt_name: row.try_get("udt_name")?,
        nullable: row.try_get::<String, _>("is_nullable")? == "YES",
        default: row.try_get("column_default")?,
        char_max_length: row.try_get("character_maximum_length")?,
        numeric_precision: row.try_get("numeric_precision")?,
        numeric_scale: row.try_get("numeric_scale")?,
    })
}

fn returned_identity(row: &PgRow) -> std::result::Result<i64, sqlx::Error> {
    row.try_get::<i64, _>(0)
        .or_else(|_| row.try_get::<i32, _>(0).map(i64::from))
}

#[async_trait]
impl Database for PgDatabase {
    fn name(&self) -> &str {
        &self.name
    }

    async fn column_catalog(&self) -> Result<Vec<ColumnRecord>> {
        let rows = sqlx::query(COLUMN_CATALOG_SQL)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::MetadataQuery {
                target: self.name.clone(),
                reason: e.to_string(),
            })?;

        rows.iter()
            .map(column_record)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::MetadataQuery {
                target: self.name.clone(),
                reason: e.to_string(),
            })
    }

    async fn index_catalog(&self) -> Result<Vec<IndexRecord>> {
        let rows = sqlx::query(INDEX_CATALOG_SQL)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::MetadataQuery {
                target: self.name.clone(),
                reason: e.to_string(),
            })?;

        let indexes = rows
            .iter()
            .filter_map(|row| {
                Some(IndexRecord {
                    table: row.try_get("tablename").ok()?,
                    name: row.try_get("indexname").ok()?,
                    definition: row.try_get("indexdef").ok()?,
                })
            })
            .collect();

        Ok(indexes)
    }

    async fn fetch_rows(&self, layout: &Arc<TableLayout>) -> Result<Vec<Row>> {
        let sql = format!(
            "SELECT to_jsonb(t) AS row FROM {} t",
            super::quote_ident(layout.table())
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        let mut result = Vec::with_capacity(rows.len());
        for row in rows {
            match row.try_get::<serde_json::Value, _>("row")? {
                serde_json::Value::Object(object) => {
                    result.push(Row::from_json_object(Arc::clone(layout), object));
                }
                other => {
                    return Err(Error::Internal(format!(
                        "unexpected row document from {}: {}",
                        layout.table(),
                        other
                    )));
                }
            }
        }

        Ok(result)
    }

    async fn execute_batch(&self, statements: &[Statement]) -> Result<Vec<Option<i64>>> {
        let mut tx = self.pool.begin().await?;
        let mut identities = Vec::with_capacity(statements.len());

        for (i, statement) in statements.iter().enumerate() {
            let sql = statement.to_sql();
            tracing::debug!(
                "Executing {}/{} on {}: {}",
                i + 1,
                statements.len(),
                self.name,
                preview(&sql, 100)
            );

            if statement.returning().is_some() {
                let row = sqlx::query(&sql)
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(|e| self.statement_error(&sql, e))?;
                let id = returned_identity(&row).map_err(|e| self.statement_error(&sql, e))?;
                identities.push(Some(id));
            } else {
                sqlx::query(&sql)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| self.statement_error(&sql, e))?;
                identities.push(None);
            }
        }

        tx.commit().await?;
        Ok(identities)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Connects to PostgreSQL targets with shared credentials
pub struct PgConnector {
    config: DatabaseConfig,
}

impl PgConnector {
    pub fn new(config: DatabaseConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for PgConnector {
    async fn connect(&self, target: &Target) -> Result<Arc<dyn Database>> {
        let url = self.config.url_for(&target.host, target.port);
        let db = PgDatabase::connect(&target.name, &url, &self.config).await?;
        Ok(Arc::new(db))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_failures_are_retryable() {
        let refused = sqlx::Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "connection refused",
        ));
        assert!(connect_error("loot_db_1", refused).is_retryable());
        assert!(connect_error("loot_db_1", sqlx::Error::PoolTimedOut).is_retryable());

        let rejected = sqlx::Error::Protocol("password authentication failed".into());
        assert!(!connect_error("loot_db_1", rejected).is_retryable());
    }

    #[test]
    fn test_catalog_reads_temporal_precision() {
        // information_schema spells temporal types out in full
        assert!(COLUMN_CATALOG_SQL.contains("data_type LIKE 'time%' OR data_type = 'interval'"));
        assert!(COLUMN_CATALOG_SQL.contains("THEN datetime_precision::int"));
    }

    #[test]
    fn test_preview_is_char_safe() {
        assert_eq!(preview("INSERT INTO \"item\" (\"name\") VALUES ('Épée')", 5), "INSER");
        assert_eq!(preview("'Épée'", 3), "'Ép");
    }
}
