//! Pass Report
//!
//! Per-replica phase outcomes, the statement plans of a dry run, change
//! summaries and the replicas left holding stale references.

use std::collections::BTreeMap;
use std::fmt::Write;

use super::{PassStatus, Phase, PhaseStatus};
use crate::executor::Statement;
use crate::remap::Mapping;

/// Statements one phase would run against one database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub phase: Phase,
    pub target: String,
    pub statements: Vec<String>,
}

/// A replica that may still reference pre-remapping ids
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleReference {
    pub replica: String,
    pub reason: String,
}

/// Table x database grid of change descriptions
#[derive(Debug, Clone, Default)]
pub struct SummaryGrid {
    cells: BTreeMap<String, BTreeMap<String, String>>,
}

impl SummaryGrid {
    pub fn set(&mut self, table: &str, database: &str, cell: impl Into<String>) {
        self.cells
            .entry(table.to_string())
            .or_default()
            .insert(database.to_string(), cell.into());
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Render with one column per database; unset cells show `empty`
    pub fn render(&self, databases: &[String], empty: &str) -> String {
        let mut headers = vec!["Table".to_string()];
        headers.extend(databases.iter().cloned());

        let rows: Vec<Vec<String>> = self
            .cells
            .iter()
            .map(|(table, cells)| {
                let mut row = vec![table.clone()];
                row.extend(
                    databases
                        .iter()
                        .map(|db| cells.get(db).cloned().unwrap_or_else(|| empty.to_string())),
                );
                row
            })
            .collect();

        format_grid(&headers, &rows)
    }
}

/// Format rows as a bordered text table
pub fn format_grid(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(widths.len()) {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let separator = format!(
        "+{}+",
        widths
            .iter()
            .map(|w| "-".repeat(w + 2))
            .collect::<Vec<_>>()
            .join("+")
    );
    let line = |cells: &[String]| {
        let padded: Vec<String> = widths
            .iter()
            .enumerate()
            .map(|(i, w)| format!(" {:<width$} ", cells.get(i).map(String::as_str).unwrap_or(""), width = w))
            .collect();
        format!("|{}|", padded.join("|"))
    };

    let mut out = Vec::with_capacity(rows.len() + 4);
    out.push(separator.clone());
    out.push(line(headers));
    out.push(separator.clone());
    for row in rows {
        out.push(line(row));
    }
    out.push(separator);
    out.join("\n")
}

/// Everything a pass did or would do
#[derive(Debug, Clone, Default)]
pub struct Report {
    pub dry_run: bool,
    replicas: Vec<String>,
    phases: BTreeMap<String, BTreeMap<Phase, PhaseStatus>>,
    failures: Vec<(String, Phase, String)>,
    pub errors: Vec<String>,
    pub plans: Vec<Plan>,
    pub stale: Vec<StaleReference>,
    pub structure: SummaryGrid,
    pub harvest: SummaryGrid,
    pub lookup: SummaryGrid,
    pub type_drift: Vec<String>,
    pub remapped: usize,
    pub ambiguous: Vec<Mapping>,
    pub conflicts_found: usize,
    pub conflicts_resolved: usize,
    pub conflicts_skipped: usize,
    aborted: Option<String>,
}

impl Report {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Default::default()
        }
    }

    /// Add a replica row to the phase matrix
    pub fn add_replica(&mut self, name: &str) {
        if !self.replicas.iter().any(|r| r == name) {
            self.replicas.push(name.to_string());
            self.phases.insert(name.to_string(), BTreeMap::new());
        }
    }

    /// Record a phase outcome, merging with any earlier outcome
    pub fn record(&mut self, replica: &str, phase: Phase, status: PhaseStatus) {
        if let PhaseStatus::Failed(reason) = &status {
            tracing::error!("{} failed on {}: {}", phase, replica, reason);
            self.failures.push((replica.to_string(), phase, reason.clone()));
        }
        self.add_replica(replica);
        if let Some(phases) = self.phases.get_mut(replica) {
            let current = phases.remove(&phase).unwrap_or(PhaseStatus::NotRun);
            phases.insert(phase, current.merge(status));
        }
    }

    pub fn status_of(&self, replica: &str, phase: Phase) -> PhaseStatus {
        self.phases
            .get(replica)
            .and_then(|p| p.get(&phase))
            .cloned()
            .unwrap_or(PhaseStatus::NotRun)
    }

    /// Keep the exact statements of a dry-run step
    pub fn plan(&mut self, phase: Phase, target: &str, statements: &[Statement]) {
        if statements.is_empty() {
            return;
        }
        tracing::info!(
            "DRY RUN - Would execute {} {} statement(s) on {}",
            statements.len(),
            phase,
            target
        );
        for (i, statement) in statements.iter().enumerate() {
            tracing::info!("  {}. {}", i + 1, statement);
        }
        self.plans.push(Plan {
            phase,
            target: target.to_string(),
            statements: statements.iter().map(Statement::to_sql).collect(),
        });
    }

    /// Statements planned for one phase and target
    pub fn planned(&self, phase: Phase, target: &str) -> Vec<&str> {
        self.plans
            .iter()
            .filter(|p| p.phase == phase && p.target == target)
            .flat_map(|p| p.statements.iter().map(String::as_str))
            .collect()
    }

    /// A failure outside the per-replica matrix, such as one on master
    pub fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!("{}", message);
        self.errors.push(message);
    }

    pub fn mark_stale(&mut self, replica: &str, reason: impl Into<String>) {
        if !self.stale.iter().any(|s| s.replica == replica) {
            self.stale.push(StaleReference {
                replica: replica.to_string(),
                reason: reason.into(),
            });
        }
    }

    pub fn abort(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::error!("Pass aborted: {}", reason);
        self.aborted = Some(reason);
    }

    /// Terminal state of the pass
    pub fn status(&self) -> PassStatus {
        if let Some(reason) = &self.aborted {
            return PassStatus::Aborted(reason.clone());
        }
        let failed = self
            .phases
            .values()
            .flat_map(|p| p.values())
            .any(PhaseStatus::is_failed);
        if failed || !self.stale.is_empty() || !self.errors.is_empty() {
            PassStatus::Partial
        } else {
            PassStatus::Complete
        }
    }

    /// Human-readable report
    pub fn render(&self) -> String {
        let rule = "=".repeat(80);
        let mut out = String::new();
        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(
            out,
            "{}RECONCILIATION REPORT: {}",
            if self.dry_run { "DRY RUN " } else { "" },
            self.status()
        );
        let _ = writeln!(out, "{}", rule);

        if !self.replicas.is_empty() {
            let mut headers = vec!["Replica".to_string()];
            headers.extend(Phase::PER_REPLICA.iter().map(|p| p.name().to_string()));
            let rows: Vec<Vec<String>> = self
                .replicas
                .iter()
                .map(|replica| {
                    let mut row = vec![replica.clone()];
                    row.extend(
                        Phase::PER_REPLICA
                            .iter()
                            .map(|phase| self.status_of(replica, *phase).to_string()),
                    );
                    row
                })
                .collect();
            let _ = writeln!(out, "\nPHASES:\n{}", format_grid(&headers, &rows));
        }

        if !self.failures.is_empty() || !self.errors.is_empty() {
            let _ = writeln!(out, "\nFAILURES:");
            for (replica, phase, reason) in &self.failures {
                let _ = writeln!(out, "  {} {}: {}", replica, phase, reason);
            }
            for error in &self.errors {
                let _ = writeln!(out, "  {}", error);
            }
        }

        if !self.stale.is_empty() {
            let _ = writeln!(out, "\nREPLICAS WITH STALE REFERENCES:");
            for stale in &self.stale {
                let _ = writeln!(out, "  {}: {}", stale.replica, stale.reason);
            }
        }

        let mut databases = vec!["master".to_string()];
        databases.extend(self.replicas.iter().cloned());

        if self.structure.is_empty() {
            let _ = writeln!(out, "\nSTRUCTURE CHANGES: No structural changes needed");
        } else {
            let _ = writeln!(
                out,
                "\nSTRUCTURE CHANGES:\n{}",
                self.structure.render(&databases, "no changes")
            );
        }
        if !self.harvest.is_empty() {
            let _ = writeln!(
                out,
                "\nDATA CHANGES (Contributing Tables):\n{}",
                self.harvest.render(&databases, "0 rows retrieved")
            );
        }
        if !self.lookup.is_empty() {
            let _ = writeln!(
                out,
                "\nLOOKUP CHANGES:\n{}",
                self.lookup.render(&databases, "no changes")
            );
        }

        if !self.type_drift.is_empty() {
            let _ = writeln!(out, "\nTYPE DRIFT (left unchanged):");
            for drift in &self.type_drift {
                let _ = writeln!(out, "  {}", drift);
            }
        }

        if self.remapped > 0 || !self.ambiguous.is_empty() {
            let _ = writeln!(out, "\nID REMAPPINGS: {}", self.remapped);
            for mapping in &self.ambiguous {
                let _ = writeln!(
                    out,
                    "  ambiguous: {}.{} -> {} applies only to {}",
                    mapping.table, mapping.old_id, mapping.new_id, mapping.origin
                );
            }
        }

        if self.conflicts_found > 0 {
            let _ = writeln!(
                out,
                "\nCONFLICTS: {} found, {} resolved, {} skipped",
                self.conflicts_found, self.conflicts_resolved, self.conflicts_skipped
            );
        }

        if self.dry_run && !self.plans.is_empty() {
            let _ = writeln!(out, "\nPLAN:");
            for plan in &self.plans {
                let _ = writeln!(out, "  [{}] {}", plan.phase, plan.target);
                for (i, statement) in plan.statements.iter().enumerate() {
                    let _ = writeln!(out, "    {}. {}", i + 1, statement);
                }
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_grid() {
        let grid = format_grid(
            &["Table".to_string(), "master".to_string()],
            &[vec!["item".to_string(), "2 rows added".to_string()]],
        );
        assert_eq!(
            grid,
            "+-------+--------------+\n\
             | Table | master       |\n\
             +-------+--------------+\n\
             | item  | 2 rows added |\n\
             +-------+--------------+"
        );
    }

    #[test]
    fn test_status_follows_failures_and_stale_replicas() {
        let mut report = Report::new(false);
        report.record("loot_db_1", Phase::StructureSync, PhaseStatus::Succeeded { statements: 2 });
        assert_eq!(report.status(), PassStatus::Complete);

        report.mark_stale("loot_db_2", "unreachable");
        assert_eq!(report.status(), PassStatus::Partial);

        report.abort("operator declined");
        assert!(matches!(report.status(), PassStatus::Aborted(_)));
    }

    #[test]
    fn test_render_lists_stale_replicas() {
        let mut report = Report::new(false);
        report.record(
            "loot_db_2",
            Phase::ReferenceRewrite,
            PhaseStatus::Failed("relation \"loot\" does not exist".into()),
        );
        report.mark_stale("loot_db_2", "reference rewrite failed");

        let text = report.render();
        assert!(text.contains("RECONCILIATION REPORT: PARTIAL"));
        assert!(text.contains("REPLICAS WITH STALE REFERENCES:"));
        assert!(text.contains("loot_db_2: reference rewrite failed"));
    }
}
