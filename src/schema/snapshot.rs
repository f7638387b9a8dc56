//! Schema Snapshot Extractor
//!
//! Reads column and index catalogs into an in-memory snapshot.

use std::collections::BTreeMap;
use std::sync::Arc;
use serde::{Deserialize, Serialize};

use crate::data::TableLayout;
use crate::error::Error;
use crate::executor::Database;

/// Raw column catalog row as returned by a database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnRecord {
    pub table: String,
    pub column: String,
    pub position: i32,
    /// information_schema data type; `ARRAY` for array columns
    pub data_type: String,
    /// Underlying type name, `_int4` style for arrays
    pub udt_name: String,
    pub nullable: bool,
    pub default: Option<String>,
    pub char_max_length: Option<i32>,
    pub numeric_precision: Option<i32>,
    pub numeric_scale: Option<i32>,
}

/// Raw index catalog row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub table: String,
    pub name: String,
    pub definition: String,
}

/// Column definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    /// Resolved type, including qualifiers and array suffix
    pub data_type: String,
    pub nullable: bool,
    pub default: Option<String>,
    pub position: i32,
}

/// Index definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDef {
    pub name: String,
    pub definition: String,
}

/// Structure of one database
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    /// Table name -> columns ordered by position
    pub tables: BTreeMap<String, Vec<ColumnDef>>,
    /// Table name -> non-primary-key indexes
    pub indexes: BTreeMap<String, Vec<IndexDef>>,
}

/// A snapshot plus the metadata error that made it partial, if any
#[derive(Debug)]
pub struct Extraction {
    pub snapshot: SchemaSnapshot,
    pub error: Option<Error>,
}

impl SchemaSnapshot {
    /// Snapshot a live database
    ///
    /// A failing catalog query leaves that part of the snapshot empty and is
    /// reported alongside the partial result.
    pub async fn extract(db: &dyn Database) -> Extraction {
        let mut error = None;

        let columns = match db.column_catalog().await {
            Ok(columns) => columns,
            Err(e) => {
                tracing::error!("Error fetching column catalog from {}: {}", db.name(), e);
                error = Some(metadata_error(db.name(), e));
                Vec::new()
            }
        };

        let indexes = match db.index_catalog().await {
            Ok(indexes) => indexes,
            Err(e) => {
                tracing::error!("Error fetching index catalog from {}: {}", db.name(), e);
                if error.is_none() {
                    error = Some(metadata_error(db.name(), e));
                }
                Vec::new()
            }
        };

        let snapshot = Self::from_records(columns, indexes);
        tracing::debug!(
            "Snapshot of {}: {} tables, fingerprint {}",
            db.name(),
            snapshot.tables.len(),
            snapshot.fingerprint()
        );

        Extraction { snapshot, error }
    }

    /// Build a snapshot from catalog rows
    pub fn from_records(columns: Vec<ColumnRecord>, indexes: Vec<IndexRecord>) -> Self {
        let mut snapshot = Self::default();

        for record in columns {
            let base = if record.data_type == "ARRAY" {
                resolve_array_type(&record.udt_name)
            } else {
                record.data_type.clone()
            };
            let data_type = render_type(
                &base,
                record.char_max_length,
                record.numeric_precision,
                record.numeric_scale,
            );

            snapshot
                .tables
                .entry(record.table)
                .or_default()
                .push(ColumnDef {
                    name: record.column,
                    data_type,
                    nullable: record.nullable,
                    default: record.default,
                    position: record.position,
                });
        }

        for columns in snapshot.tables.values_mut() {
            columns.sort_by_key(|c| c.position);
        }

        for record in indexes {
            if record.name.ends_with("_pkey") {
                continue;
            }
            snapshot
                .indexes
                .entry(record.table)
                .or_default()
                .push(IndexDef {
                    name: record.name,
                    definition: record.definition,
                });
        }

        snapshot
    }

    /// Look up a column definition
    pub fn column(&self, table: &str, column: &str) -> Option<&ColumnDef> {
        self.tables.get(table)?.iter().find(|c| c.name == column)
    }

    /// Indexes of a table
    pub fn indexes_of(&self, table: &str) -> &[IndexDef] {
        self.indexes.get(table).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Row layout of a table in declared column order
    pub fn layout(&self, table: &str) -> Option<Arc<TableLayout>> {
        let columns = self.tables.get(table)?;
        Some(Arc::new(TableLayout::new(
            table,
            columns.iter().map(|c| c.name.clone()).collect(),
        )))
    }

    /// Compute a hash of the structure
    pub fn fingerprint(&self) -> String {
        let mut hasher = crc32fast::Hasher::new();

        for (table, columns) in &self.tables {
            hasher.update(table.as_bytes());
            for col in columns {
                hasher.update(col.name.as_bytes());
                hasher.update(col.data_type.as_bytes());
            }
            for index in self.indexes_of(table) {
                hasher.update(index.name.as_bytes());
            }
        }

        format!("{:08x}", hasher.finalize())
    }
}

fn metadata_error(target: &str, e: Error) -> Error {
    match e {
        e @ Error::MetadataQuery { .. } => e,
        other => Error::MetadataQuery {
            target: target.to_string(),
            reason: other.to_string(),
        },
    }
}

/// Resolve an array column's `_elem` udt name to `base[]`
pub fn resolve_array_type(udt_name: &str) -> String {
    let element = udt_name.strip_prefix('_').unwrap_or(udt_name);
    let base = match element {
        "int2" => "smallint",
        "int4" => "integer",
        "int8" => "bigint",
        "float4" => "real",
        "float8" => "double precision",
        "varchar" => "character varying",
        "bpchar" => "character",
        "bool" => "boolean",
        "timestamptz" => "timestamp with time zone",
        "timestamp" => "timestamp without time zone",
        other => other,
    };
    format!("{}[]", base)
}

/// Append precision, scale or length qualifiers for types that carry them
pub fn render_type(
    data_type: &str,
    char_max_length: Option<i32>,
    numeric_precision: Option<i32>,
    numeric_scale: Option<i32>,
) -> String {
    match data_type {
        "character varying" | "varchar" | "character" | "char" => match char_max_length {
            Some(len) if len > 0 => format!("{}({})", data_type, len),
            _ => data_type.to_string(),
        },
        "numeric" | "decimal" => match (numeric_precision, numeric_scale) {
            (Some(p), Some(s)) if p > 0 && s > 0 => format!("{}({},{})", data_type, p, s),
            (Some(p), _) if p > 0 => format!("{}({})", data_type, p),
            _ => data_type.to_string(),
        },
        "time without time zone"
        | "time with time zone"
        | "timestamp without time zone"
        | "timestamp with time zone"
        | "time"
        | "timestamp"
        | "interval" => match numeric_precision {
            // the qualifier goes before the zone clause: timestamp(3) with time zone
            Some(p) if p >= 0 => match data_type.split_once(' ') {
                Some((base, zone)) => format!("{}({}) {}", base, p, zone),
                None => format!("{}({})", data_type, p),
            },
            _ => data_type.to_string(),
        },
        _ => data_type.to_string(),
    }
}
