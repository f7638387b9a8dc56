//! Lookup Table Synchronization
//!
//! Lookup tables are small reference tables mirrored in every database.
//! Master content is pushed to replicas, and keys whose content disagrees
//! across databases are resolved to a single canonical row.

mod conflict;
mod propagate;

pub use conflict::{canonicalize, find_conflicts, resolution_statement, ConflictGroup, ConflictRecord};
pub use propagate::{propagation_statements, update_statement};
