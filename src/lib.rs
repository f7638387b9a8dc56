//! dbreconcile - Schema and Data Reconciliation Engine
//!
//! Keeps a set of PostgreSQL replicas consistent with a master database.
//! A pass heals missing structure on every replica, harvests rows that
//! contributing replicas created into master, rewrites references to ids
//! master reassigned, and pushes master's lookup data back out.
//!
//! # Phases
//!
//! DISCOVER, STRUCTURE_SYNC, DATA_HARVEST, REFERENCE_REWRITE,
//! LOOKUP_PROPAGATE, CONFLICT_RESOLVE (on request) and REPORT.
//!
//! Every mutating phase can run as a dry run, which prints the exact
//! statements a real pass would execute.

pub mod backup;
pub mod config;
pub mod data;
pub mod error;
pub mod executor;
pub mod lookup;
pub mod operator;
pub mod orchestrator;
pub mod registry;
pub mod remap;
pub mod schema;

pub use config::ReconcileConfig;
pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::ReconcileConfig;
    pub use crate::data::{Row, RowSnapshot, Value};
    pub use crate::error::{Error, Result};
    pub use crate::executor::{Connector, Database, Statement};
    pub use crate::operator::{AssumeYes, ConsoleOperator, Operator};
    pub use crate::orchestrator::{PassOptions, PassStatus, Reconciler, Report};
    pub use crate::registry::ReplicaRegistry;
    pub use crate::schema::SchemaSnapshot;
}
