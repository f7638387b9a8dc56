//! Reconciliation Pass
//!
//! DISCOVER -> STRUCTURE_SYNC -> DATA_HARVEST -> REFERENCE_REWRITE ->
//! LOOKUP_PROPAGATE -> CONFLICT_RESOLVE -> REPORT.
//!
//! Snapshots are taken concurrently. Everything that writes runs one
//! database at a time, and every write to master happens inside the
//! sequential harvest loop.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use futures::future::join_all;

use super::{Phase, PhaseStatus, Report};
use crate::backup;
use crate::config::{LookupTableConfig, ReconcileConfig};
use crate::data::{RowSnapshot, TableLayout};
use crate::error::Error;
use crate::executor::{connect_with_retry, Connector, Database, Statement, Target};
use crate::lookup::{find_conflicts, propagation_statements, resolution_statement};
use crate::operator::Operator;
use crate::registry::{Replica, ReplicaRegistry};
use crate::remap::{plan_contribution, resolve_references, rewrite_statements, IdRemapping, PlannedInsert};
use crate::schema::{diff_schemas, synthesize, SchemaSnapshot};

const MASTER: &str = "master";

/// Options of one pass
#[derive(Debug, Clone, Default)]
pub struct PassOptions {
    /// Print every mutating statement instead of running it
    pub dry_run: bool,
    /// Restrict the pass to these tables
    pub tables: Option<Vec<String>>,
    /// Run CONFLICT_RESOLVE after lookup propagation
    pub resolve_conflicts: bool,
    /// Skip the confirmation prompt
    pub assume_yes: bool,
}

impl PassOptions {
    fn selects(&self, table: &str) -> bool {
        match &self.tables {
            Some(tables) => tables.iter().any(|t| t == table),
            None => true,
        }
    }
}

/// A connected replica
struct Session {
    replica: Replica,
    db: Arc<dyn Database>,
    schema: SchemaSnapshot,
    /// Replica structure matches master for the selected tables
    structure_synced: bool,
    structure_failed: bool,
}

impl Session {
    fn name(&self) -> &str {
        &self.replica.name
    }

    /// Layout used to read a table from this replica
    fn layout(&self, master: &SchemaSnapshot, table: &str) -> Option<Arc<TableLayout>> {
        if self.structure_synced {
            master.layout(table)
        } else {
            self.schema.layout(table)
        }
    }
}

/// What discovery found
struct Discovery {
    master: Arc<dyn Database>,
    master_schema: SchemaSnapshot,
    sessions: Vec<Session>,
    unreachable: Vec<String>,
}

/// A lookup table with master's layout and rows
struct TableState<'c> {
    table: &'c LookupTableConfig,
    layout: Arc<TableLayout>,
    rows: RowSnapshot,
}

/// Drives reconciliation passes
pub struct Reconciler<'a> {
    config: &'a ReconcileConfig,
    connector: &'a dyn Connector,
    registry: &'a dyn ReplicaRegistry,
    operator: &'a mut dyn Operator,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        config: &'a ReconcileConfig,
        connector: &'a dyn Connector,
        registry: &'a dyn ReplicaRegistry,
        operator: &'a mut dyn Operator,
    ) -> Self {
        Self {
            config,
            connector,
            registry,
            operator,
        }
    }

    /// Run a full pass
    pub async fn run(&mut self, options: &PassOptions) -> Report {
        let mut report = Report::new(options.dry_run);

        let Some(mut discovery) = self.discover(&mut report).await else {
            return report;
        };

        self.run_phases(options, &mut discovery, &mut report).await;
        close(&discovery).await;

        tracing::info!("=== {} ===", Phase::Report);
        tracing::info!("Pass finished: {}", report.status());
        report
    }

    /// Run only lookup conflict resolution
    pub async fn resolve_only(&mut self, options: &PassOptions) -> Report {
        let mut report = Report::new(options.dry_run);

        let Some(discovery) = self.discover(&mut report).await else {
            return report;
        };

        self.resolve_conflicts(options, &discovery, &mut report).await;
        close(&discovery).await;

        tracing::info!("Conflict resolution finished: {}", report.status());
        report
    }

    async fn run_phases(&mut self, options: &PassOptions, discovery: &mut Discovery, report: &mut Report) {
        let plans = self.plan_structure(options, discovery, report);

        if !options.dry_run {
            if !options.assume_yes {
                let statements: usize = plans.iter().map(Vec::len).sum();
                let prompt = format!(
                    "Apply {} structure statement(s) to {} replica(s), harvest {} table(s) into master and push {} lookup table(s)?",
                    statements,
                    discovery.sessions.len(),
                    self.config.contributing_tables.len(),
                    self.config.lookup_tables.len()
                );
                if !self.operator.confirm(&prompt) {
                    report.abort("operator declined confirmation");
                    return;
                }
            }

            if self.config.backup.enabled {
                if let Err(e) = backup::backup_master(&self.config.master, &self.config.backup).await {
                    report.abort(format!("master backup failed: {}", e));
                    return;
                }
            }
        }

        self.sync_structure(options, discovery, plans, report).await;
        let (remapping, pending) = self.harvest(options, discovery, report).await;
        self.rewrite_references(options, discovery, &remapping, pending, report).await;
        self.propagate_lookups(options, discovery, report).await;

        if options.resolve_conflicts {
            self.resolve_conflicts(options, discovery, report).await;
        }
    }

    /// DISCOVER: connect to master and every replica, snapshot schemas
    async fn discover(&self, report: &mut Report) -> Option<Discovery> {
        tracing::info!("=== {} ===", Phase::Discover);

        let master_target = Target {
            name: MASTER.to_string(),
            host: self.config.master.host.clone(),
            port: self.config.master.port,
        };
        let master = match connect_with_retry(self.connector, &master_target, &self.config.retry).await {
            Ok(db) => db,
            Err(e) => {
                report.abort(format!("master unreachable: {}", e));
                return None;
            }
        };

        let extraction = SchemaSnapshot::extract(master.as_ref()).await;
        if let Some(e) = extraction.error {
            if extraction.snapshot.tables.is_empty() {
                report.abort(format!("master metadata unavailable: {}", e));
                master.close().await;
                return None;
            }
            report.error(format!("{} on master: partial snapshot used: {}", Phase::Discover, e));
        }
        let master_schema = extraction.snapshot;

        let replicas = match self.registry.replicas().await {
            Ok(replicas) => replicas,
            Err(e) => {
                report.abort(e.to_string());
                master.close().await;
                return None;
            }
        };
        if replicas.is_empty() {
            tracing::warn!("No replicas found");
        }

        let mut connected = Vec::new();
        let mut unreachable = Vec::new();
        for replica in replicas {
            report.add_replica(&replica.name);
            let Some(endpoint) = self.registry.endpoint_for(&replica.id).await else {
                report.record(
                    &replica.name,
                    Phase::Discover,
                    PhaseStatus::Failed("endpoint unavailable".into()),
                );
                unreachable.push(replica.name.clone());
                continue;
            };

            let target = Target {
                name: replica.name.clone(),
                host: endpoint.host,
                port: endpoint.port,
            };
            match connect_with_retry(self.connector, &target, &self.config.retry).await {
                Ok(db) => connected.push((replica, db)),
                Err(e) => {
                    report.record(&replica.name, Phase::Discover, PhaseStatus::Failed(e.to_string()));
                    unreachable.push(replica.name.clone());
                }
            }
        }

        let extractions = join_all(
            connected
                .iter()
                .map(|(_, db)| SchemaSnapshot::extract(db.as_ref())),
        )
        .await;

        let mut sessions = Vec::with_capacity(connected.len());
        for ((replica, db), extraction) in connected.into_iter().zip(extractions) {
            let status = match extraction.error {
                Some(e) => PhaseStatus::Failed(format!("partial snapshot: {}", e)),
                None => PhaseStatus::Succeeded { statements: 0 },
            };
            report.record(&replica.name, Phase::Discover, status);
            sessions.push(Session {
                replica,
                db,
                schema: extraction.snapshot,
                structure_synced: false,
                structure_failed: false,
            });
        }

        Some(Discovery {
            master,
            master_schema,
            sessions,
            unreachable,
        })
    }

    /// Diff every replica against master and synthesize its DDL
    fn plan_structure(&self, options: &PassOptions, discovery: &Discovery, report: &mut Report) -> Vec<Vec<Statement>> {
        discovery
            .sessions
            .iter()
            .map(|session| {
                let mut diff = diff_schemas(&discovery.master_schema, &session.schema);
                diff.retain_tables(|t| options.selects(t));

                for (table, drifts) in &diff.type_drift {
                    for drift in drifts {
                        report.type_drift.push(format!(
                            "{}: {}.{} is {} on master, {} on replica",
                            session.name(),
                            table,
                            drift.column,
                            drift.master_type,
                            drift.replica_type
                        ));
                    }
                }
                for table in diff.tables() {
                    report.structure.set(table, session.name(), diff.describe(table));
                }

                synthesize(&diff, &discovery.master_schema)
            })
            .collect()
    }

    /// STRUCTURE_SYNC: one DDL transaction per replica
    async fn sync_structure(
        &self,
        options: &PassOptions,
        discovery: &mut Discovery,
        plans: Vec<Vec<Statement>>,
        report: &mut Report,
    ) {
        tracing::info!("=== {} ===", Phase::StructureSync);

        for (session, statements) in discovery.sessions.iter_mut().zip(plans) {
            if statements.is_empty() {
                tracing::info!("{} structure matches master", session.name());
                session.structure_synced = true;
                report.record(session.name(), Phase::StructureSync, PhaseStatus::Succeeded { statements: 0 });
                continue;
            }

            if options.dry_run {
                report.plan(Phase::StructureSync, session.name(), &statements);
                report.record(
                    session.name(),
                    Phase::StructureSync,
                    PhaseStatus::Planned {
                        statements: statements.len(),
                    },
                );
                continue;
            }

            tracing::info!("Applying {} structure statement(s) to {}", statements.len(), session.name());
            match session.db.execute_batch(&statements).await {
                Ok(_) => {
                    session.structure_synced = true;
                    report.record(
                        session.name(),
                        Phase::StructureSync,
                        PhaseStatus::Succeeded {
                            statements: statements.len(),
                        },
                    );
                }
                Err(e) => {
                    let e = e.into_phase_error(Phase::StructureSync, session.name());
                    session.structure_failed = true;
                    report.record(session.name(), Phase::StructureSync, PhaseStatus::Failed(e.to_string()));
                }
            }
        }
    }

    /// Lookup tables named by `names` that the pass covers and master has
    fn tables_of<'n>(
        &self,
        names: impl Iterator<Item = &'n str>,
        options: &PassOptions,
        master_schema: &SchemaSnapshot,
    ) -> Vec<(&'a LookupTableConfig, Arc<TableLayout>)> {
        let config: &'a ReconcileConfig = self.config;
        names
            .filter(|name| options.selects(name))
            .filter_map(|name| {
                let table = config.lookup_table(name)?;
                match master_schema.layout(name) {
                    Some(layout) => Some((table, layout)),
                    None => {
                        tracing::warn!("Table {} is not in the master schema; skipping", name);
                        None
                    }
                }
            })
            .collect()
    }

    /// Read master's rows for each table; unreadable tables are reported and dropped
    async fn read_master(
        &self,
        phase: Phase,
        master: &dyn Database,
        tables: Vec<(&'a LookupTableConfig, Arc<TableLayout>)>,
        report: &mut Report,
    ) -> Vec<TableState<'a>> {
        let mut states = Vec::with_capacity(tables.len());
        for (table, layout) in tables {
            match master.fetch_rows(&layout).await {
                Ok(rows) => states.push(TableState {
                    table,
                    layout,
                    rows: RowSnapshot::build(table, rows),
                }),
                Err(e) => report.error(format!("{}: reading master.{} failed: {}", phase, table.name, e)),
            }
        }
        states
    }

    /// DATA_HARVEST: insert rows contributed by replicas into master
    ///
    /// Returns the identity remapping and whether a dry run planned inserts
    /// whose new ids are not known yet.
    async fn harvest(&self, options: &PassOptions, discovery: &Discovery, report: &mut Report) -> (IdRemapping, bool) {
        tracing::info!("=== {} ===", Phase::DataHarvest);

        let mut remapping = IdRemapping::new();
        let mut pending = false;

        let tables = self.tables_of(
            self.config.contributing_tables.iter().map(String::as_str),
            options,
            &discovery.master_schema,
        );
        let states = self
            .read_master(Phase::DataHarvest, discovery.master.as_ref(), tables, report)
            .await;

        let mut taken: HashMap<String, HashSet<String>> = HashMap::new();
        let mut added: BTreeMap<String, usize> = BTreeMap::new();

        for session in &discovery.sessions {
            let name = session.name();
            if !session.replica.contributing {
                tracing::info!("Skipping data collection from non-contributing replica {}", name);
                for state in &states {
                    report.harvest.set(&state.table.name, name, "skipped (test)");
                }
                report.record(name, Phase::DataHarvest, PhaseStatus::Skipped("non-contributing".into()));
                continue;
            }
            if session.structure_failed {
                report.record(name, Phase::DataHarvest, PhaseStatus::Skipped("structure sync failed".into()));
                continue;
            }

            let mut inserts: Vec<PlannedInsert> = Vec::new();
            let mut failure = None;
            for state in &states {
                let Some(layout) = session.layout(&discovery.master_schema, &state.table.name) else {
                    report.harvest.set(&state.table.name, name, "table missing");
                    continue;
                };
                match session.db.fetch_rows(&layout).await {
                    Ok(rows) => {
                        let snapshot = RowSnapshot::build(state.table, rows);
                        let empty = HashSet::new();
                        let already = taken.get(&state.table.name).unwrap_or(&empty);
                        let planned = plan_contribution(state.table, &state.layout, &state.rows, &snapshot, already);
                        if !planned.is_empty() {
                            tracing::info!("Found {} new rows in {}.{}", planned.len(), name, state.table.name);
                        }
                        report
                            .harvest
                            .set(&state.table.name, name, format!("{} rows retrieved", planned.len()));
                        inserts.extend(planned);
                    }
                    Err(e) => {
                        failure = Some(Error::DataHarvest {
                            table: state.table.name.clone(),
                            replica: name.to_string(),
                            reason: e.to_string(),
                        });
                        break;
                    }
                }
            }

            if let Some(e) = failure {
                report.record(name, Phase::DataHarvest, PhaseStatus::Failed(e.to_string()));
                continue;
            }
            if inserts.is_empty() {
                report.record(name, Phase::DataHarvest, PhaseStatus::Succeeded { statements: 0 });
                continue;
            }

            let statements: Vec<Statement> = inserts.iter().map(|i| i.statement.clone()).collect();

            if options.dry_run {
                report.plan(Phase::DataHarvest, &format!("{} <- {}", MASTER, name), &statements);
                pending |= inserts.iter().any(|i| i.old_id.is_some());
                claim(&mut taken, &mut added, &inserts);
                report.record(
                    name,
                    Phase::DataHarvest,
                    PhaseStatus::Planned {
                        statements: statements.len(),
                    },
                );
                continue;
            }

            tracing::info!("Adding {} new rows from {} to master", inserts.len(), name);
            match discovery.master.execute_batch(&statements).await {
                Ok(ids) => {
                    for (insert, id) in inserts.iter().zip(ids) {
                        if let (Some(old_id), Some(new_id)) = (insert.old_id, id) {
                            if old_id != new_id {
                                remapping.record(&insert.table, old_id, new_id, name);
                            }
                        }
                    }
                    claim(&mut taken, &mut added, &inserts);
                    report.record(
                        name,
                        Phase::DataHarvest,
                        PhaseStatus::Succeeded {
                            statements: statements.len(),
                        },
                    );
                }
                Err(e) => {
                    let tables: Vec<&str> = states.iter().map(|s| s.table.name.as_str()).collect();
                    let e = Error::DataHarvest {
                        table: tables.join(", "),
                        replica: name.to_string(),
                        reason: e.to_string(),
                    };
                    report.record(name, Phase::DataHarvest, PhaseStatus::Failed(e.to_string()));
                }
            }
        }

        for state in &states {
            let count = added.get(&state.table.name).copied().unwrap_or(0);
            report.harvest.set(&state.table.name, MASTER, format!("{} rows added", count));
        }

        report.remapped = remapping.len();
        report.ambiguous = remapping.ambiguous().into_iter().cloned().collect();
        (remapping, pending)
    }

    /// REFERENCE_REWRITE: rewrite remapped ids in every replica
    async fn rewrite_references(
        &self,
        options: &PassOptions,
        discovery: &Discovery,
        remapping: &IdRemapping,
        pending: bool,
        report: &mut Report,
    ) {
        tracing::info!("=== {} ===", Phase::ReferenceRewrite);

        let references: Vec<_> = resolve_references(&self.config.references, &discovery.master_schema)
            .into_iter()
            .filter(|r| discovery.master_schema.tables.contains_key(&r.table))
            .collect();

        for name in &discovery.unreachable {
            if !remapping.is_empty() {
                report.record(
                    name,
                    Phase::ReferenceRewrite,
                    PhaseStatus::Failed("replica unreachable".into()),
                );
                report.mark_stale(name, "unreachable during the pass; remapped ids were not rewritten");
            }
        }

        for session in &discovery.sessions {
            let name = session.name();

            if remapping.is_empty() {
                let status = if options.dry_run && pending {
                    PhaseStatus::Skipped("ids are assigned at harvest".into())
                } else {
                    PhaseStatus::Succeeded { statements: 0 }
                };
                report.record(name, Phase::ReferenceRewrite, status);
                continue;
            }

            let statements = match rewrite_statements(remapping, &references, name) {
                Ok(statements) => statements,
                Err(e) => {
                    report.record(name, Phase::ReferenceRewrite, PhaseStatus::Failed(e.to_string()));
                    report.mark_stale(name, e.to_string());
                    continue;
                }
            };

            if !statements.is_empty() {
                tracing::info!("Updating {} references in {}", statements.len(), name);
                if let Err(e) = session.db.execute_batch(&statements).await {
                    let e = e.into_phase_error(Phase::ReferenceRewrite, name);
                    report.record(name, Phase::ReferenceRewrite, PhaseStatus::Failed(e.to_string()));
                    report.mark_stale(name, e.to_string());
                    continue;
                }
            }
            report.record(
                name,
                Phase::ReferenceRewrite,
                PhaseStatus::Succeeded {
                    statements: statements.len(),
                },
            );

            let unresolved = remapping.unresolved(name);
            if !unresolved.is_empty() {
                let ids: Vec<String> = unresolved
                    .iter()
                    .map(|(table, old_id)| format!("{}.{}", table, old_id))
                    .collect();
                let reason = format!(
                    "{} claimed by several contributing replicas; references left unchanged",
                    ids.join(", ")
                );
                tracing::warn!("{}: {}", name, reason);
                report.record(name, Phase::ReferenceRewrite, PhaseStatus::Failed(reason.clone()));
                report.mark_stale(name, reason);
            }
        }
    }

    /// LOOKUP_PROPAGATE: push master's lookup rows to every replica
    async fn propagate_lookups(&self, options: &PassOptions, discovery: &Discovery, report: &mut Report) {
        tracing::info!("=== {} ===", Phase::LookupPropagate);

        let tables = self.tables_of(
            self.config.lookup_tables.iter().map(|t| t.name.as_str()),
            options,
            &discovery.master_schema,
        );
        let states = self
            .read_master(Phase::LookupPropagate, discovery.master.as_ref(), tables, report)
            .await;

        for session in &discovery.sessions {
            let name = session.name();
            tracing::info!("Syncing lookup data to {}", name);

            let mut statements = Vec::new();
            let mut failure = None;
            for state in &states {
                let replica_rows = match session.layout(&discovery.master_schema, &state.table.name) {
                    Some(layout) => match session.db.fetch_rows(&layout).await {
                        Ok(rows) => RowSnapshot::build(state.table, rows),
                        Err(e) => {
                            failure = Some(format!("reading {}: {}", state.table.name, e));
                            break;
                        }
                    },
                    None => RowSnapshot::default(),
                };

                let table_statements = propagation_statements(
                    state.table,
                    &state.layout,
                    &state.rows,
                    &replica_rows,
                    &self.config.comparison,
                );
                let cell = if table_statements.is_empty() {
                    "no changes".to_string()
                } else {
                    format!("{} rows synced", table_statements.len())
                };
                report.lookup.set(&state.table.name, name, cell);
                statements.extend(table_statements);
            }

            if let Some(reason) = failure {
                report.record(name, Phase::LookupPropagate, PhaseStatus::Failed(reason));
                continue;
            }
            if statements.is_empty() {
                tracing::info!("No lookup data sync needed for {}", name);
                report.record(name, Phase::LookupPropagate, PhaseStatus::Succeeded { statements: 0 });
                continue;
            }
            if options.dry_run {
                report.plan(Phase::LookupPropagate, name, &statements);
                report.record(
                    name,
                    Phase::LookupPropagate,
                    PhaseStatus::Planned {
                        statements: statements.len(),
                    },
                );
                continue;
            }

            tracing::info!("Syncing {} total rows to {}", statements.len(), name);
            let status = match session.db.execute_batch(&statements).await {
                Ok(_) => PhaseStatus::Succeeded {
                    statements: statements.len(),
                },
                Err(e) => PhaseStatus::Failed(e.to_string()),
            };
            report.record(name, Phase::LookupPropagate, status);
        }
    }

    /// CONFLICT_RESOLVE: let the operator pick one version of each disputed key
    async fn resolve_conflicts(&mut self, options: &PassOptions, discovery: &Discovery, report: &mut Report) {
        tracing::info!("=== {} ===", Phase::ConflictResolve);

        let tables = self.tables_of(
            self.config.lookup_tables.iter().map(|t| t.name.as_str()),
            options,
            &discovery.master_schema,
        );

        let mut targets: Vec<(&str, &dyn Database)> = vec![(MASTER, discovery.master.as_ref())];
        targets.extend(discovery.sessions.iter().map(|s| (s.name(), s.db.as_ref())));

        for (table, layout) in tables {
            let mut snapshots = Vec::with_capacity(targets.len());
            for (name, db) in &targets {
                match db.fetch_rows(&layout).await {
                    Ok(rows) => snapshots.push((name.to_string(), RowSnapshot::build(table, rows))),
                    Err(e) if *name == MASTER => {
                        report.error(format!("{}: reading master.{} failed: {}", Phase::ConflictResolve, table.name, e));
                    }
                    Err(e) => report.record(
                        name,
                        Phase::ConflictResolve,
                        PhaseStatus::Failed(format!("reading {}: {}", table.name, e)),
                    ),
                }
            }

            let conflicts = find_conflicts(table, &snapshots);
            if conflicts.is_empty() {
                tracing::info!("No conflicts in {}", table.name);
                continue;
            }
            tracing::info!("Found {} conflict(s) in {}", conflicts.len(), table.name);
            report.conflicts_found += conflicts.len();

            for record in &conflicts {
                if options.dry_run {
                    for (i, group) in record.groups.iter().enumerate() {
                        tracing::info!(
                            "Conflict {}.{} option {} found in {}: {}",
                            table.name,
                            record.key,
                            i + 1,
                            group.databases.join(", "),
                            group.canonical
                        );
                    }
                    continue;
                }

                let statement = self
                    .operator
                    .choose(record)
                    .and_then(|choice| resolution_statement(table, record, choice));
                let Some(statement) = statement else {
                    tracing::info!("Skipped conflict {}.{}", table.name, record.key);
                    report.conflicts_skipped += 1;
                    continue;
                };

                tracing::info!("Applying update: {}", statement);
                let batch = [statement];
                for (name, db) in &targets {
                    match db.execute_batch(&batch).await {
                        Ok(_) if *name == MASTER => {}
                        Ok(_) => report.record(name, Phase::ConflictResolve, PhaseStatus::Succeeded { statements: 1 }),
                        Err(e) if *name == MASTER => {
                            report.error(format!("{}: update on master failed: {}", Phase::ConflictResolve, e));
                        }
                        Err(e) => report.record(name, Phase::ConflictResolve, PhaseStatus::Failed(e.to_string())),
                    }
                }
                report.conflicts_resolved += 1;
            }
        }

        let done = if options.dry_run {
            PhaseStatus::Planned { statements: 0 }
        } else {
            PhaseStatus::Succeeded { statements: 0 }
        };
        for session in &discovery.sessions {
            report.record(session.name(), Phase::ConflictResolve, done.clone());
        }
    }
}

/// Mark harvested keys as taken and count them per table
fn claim(taken: &mut HashMap<String, HashSet<String>>, added: &mut BTreeMap<String, usize>, inserts: &[PlannedInsert]) {
    for insert in inserts {
        taken
            .entry(insert.table.clone())
            .or_default()
            .insert(insert.key.clone());
        *added.entry(insert.table.clone()).or_default() += 1;
    }
}

async fn close(discovery: &Discovery) {
    for session in &discovery.sessions {
        session.db.close().await;
    }
    discovery.master.close().await;
}
