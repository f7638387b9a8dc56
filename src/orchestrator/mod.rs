//! Reconciliation Orchestrator
//!
//! Sequences snapshotting, structure sync, harvesting, reference rewriting,
//! lookup propagation and conflict resolution across master and replicas.

mod pass;
mod phase;
mod report;

pub use pass::{PassOptions, Reconciler};
pub use phase::{PassStatus, Phase, PhaseStatus};
pub use report::{format_grid, Plan, Report, StaleReference, SummaryGrid};
