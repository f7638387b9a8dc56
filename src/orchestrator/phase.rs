//! Phases and Outcomes

use std::fmt;

/// Phases of a reconciliation pass, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    Discover,
    StructureSync,
    DataHarvest,
    ReferenceRewrite,
    LookupPropagate,
    ConflictResolve,
    Report,
}

impl Phase {
    /// Phases that carry a per-replica outcome
    pub const PER_REPLICA: [Phase; 6] = [
        Phase::Discover,
        Phase::StructureSync,
        Phase::DataHarvest,
        Phase::ReferenceRewrite,
        Phase::LookupPropagate,
        Phase::ConflictResolve,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Phase::Discover => "DISCOVER",
            Phase::StructureSync => "STRUCTURE_SYNC",
            Phase::DataHarvest => "DATA_HARVEST",
            Phase::ReferenceRewrite => "REFERENCE_REWRITE",
            Phase::LookupPropagate => "LOOKUP_PROPAGATE",
            Phase::ConflictResolve => "CONFLICT_RESOLVE",
            Phase::Report => "REPORT",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Outcome of one phase for one replica
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseStatus {
    /// Phase did not reach this replica
    NotRun,
    /// Statements committed
    Succeeded { statements: usize },
    /// Dry run: statements printed, nothing executed
    Planned { statements: usize },
    Failed(String),
    Skipped(String),
}

impl PhaseStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, PhaseStatus::Failed(_))
    }

    /// Combine two outcomes of the same phase; failures stick
    pub fn merge(self, other: PhaseStatus) -> PhaseStatus {
        use PhaseStatus::*;
        match (self, other) {
            (Failed(a), _) => Failed(a),
            (_, Failed(b)) => Failed(b),
            (NotRun, other) => other,
            (this, NotRun) => this,
            (Succeeded { statements: a }, Succeeded { statements: b }) => Succeeded { statements: a + b },
            (Planned { statements: a }, Planned { statements: b }) => Planned { statements: a + b },
            (Skipped(_), other) => other,
            (this, _) => this,
        }
    }
}

impl fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhaseStatus::NotRun => write!(f, "-"),
            PhaseStatus::Succeeded { statements: 0 } => write!(f, "ok"),
            PhaseStatus::Succeeded { statements } => write!(f, "ok ({})", statements),
            PhaseStatus::Planned { statements } => write!(f, "planned ({})", statements),
            PhaseStatus::Failed(_) => write!(f, "FAILED"),
            PhaseStatus::Skipped(reason) => write!(f, "skipped ({})", reason),
        }
    }
}

/// Terminal state of a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassStatus {
    /// Every phase succeeded for every replica
    Complete,
    /// At least one replica failed a phase
    Partial,
    /// Stopped before any mutation
    Aborted(String),
}

impl PassStatus {
    /// Process exit code
    pub fn exit_code(&self) -> u8 {
        match self {
            PassStatus::Complete => 0,
            PassStatus::Partial => 1,
            PassStatus::Aborted(_) => 2,
        }
    }
}

impl fmt::Display for PassStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassStatus::Complete => write!(f, "COMPLETE"),
            PassStatus::Partial => write!(f, "PARTIAL"),
            PassStatus::Aborted(reason) => write!(f, "ABORTED: {}", reason),
        }
    }
}
