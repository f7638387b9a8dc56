//! Schema Module
//!
//! Snapshots a database's tables, columns and indexes, diffs two snapshots
//! and synthesizes idempotent DDL that brings a replica up to the master.

mod snapshot;
mod diff;
mod ddl;

pub use snapshot::{
    render_type, resolve_array_type, ColumnDef, ColumnRecord, Extraction, IndexDef, IndexRecord,
    SchemaSnapshot,
};
pub use diff::{diff_schemas, DifferenceSet, TypeDrift};
pub use ddl::{column_definition, format_default, synthesize, with_if_not_exists};
