//! In-Memory Database
//!
//! A small interpreter for `Statement` over in-process tables. Used to run
//! whole reconciliation passes without a PostgreSQL server.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Connector, Database, Statement, Target};
use crate::data::{Row, TableLayout, Value};
use crate::error::{Error, Result};
use crate::schema::{ColumnDef, ColumnRecord, IndexDef, IndexRecord};

type Record = BTreeMap<String, Value>;

#[derive(Debug, Clone, Default)]
struct MemTable {
    columns: Vec<ColumnDef>,
    indexes: Vec<IndexDef>,
    rows: Vec<Record>,
}

#[derive(Debug, Clone, Default)]
struct MemState {
    tables: BTreeMap<String, MemTable>,
    sequences: BTreeSet<String>,
    executed: Vec<String>,
}

/// In-memory database
pub struct MemoryDatabase {
    name: String,
    state: RwLock<MemState>,
    failing_tables: BTreeSet<String>,
    fail_next: AtomicBool,
    catalog_unavailable: bool,
}

impl MemoryDatabase {
    /// Create an empty database
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: RwLock::new(MemState::default()),
            failing_tables: BTreeSet::new(),
            fail_next: AtomicBool::new(false),
            catalog_unavailable: false,
        }
    }

    /// Add a table from `(column, type, nullable)` triples
    pub fn with_table(self, table: &str, columns: &[(&str, &str, bool)]) -> Self {
        let columns = columns
            .iter()
            .enumerate()
            .map(|(i, (name, data_type, nullable))| ColumnDef {
                name: name.to_string(),
                data_type: data_type.to_string(),
                nullable: *nullable,
                default: None,
                position: i as i32 + 1,
            })
            .collect();
        self.with_columns(table, columns)
    }

    /// Add a table from full column definitions
    pub fn with_columns(mut self, table: &str, columns: Vec<ColumnDef>) -> Self {
        self.state.get_mut().tables.insert(
            table.to_string(),
            MemTable {
                columns,
                ..Default::default()
            },
        );
        self
    }

    /// Add an index to an existing table
    pub fn with_index(mut self, table: &str, name: &str, definition: &str) -> Self {
        if let Some(t) = self.state.get_mut().tables.get_mut(table) {
            t.indexes.push(IndexDef {
                name: name.to_string(),
                definition: definition.to_string(),
            });
        }
        self
    }

    /// Add a row; unnamed columns read as NULL
    pub fn with_row(mut self, table: &str, values: &[(&str, Value)]) -> Self {
        if let Some(t) = self.state.get_mut().tables.get_mut(table) {
            t.rows.push(
                values
                    .iter()
                    .map(|(c, v)| (c.to_string(), v.clone()))
                    .collect(),
            );
        }
        self
    }

    /// Make every statement touching `table` fail
    pub fn fail_on(mut self, table: &str) -> Self {
        self.failing_tables.insert(table.to_string());
        self
    }

    /// Make the next batch fail as a whole, then behave normally
    pub fn fail_next_batch(self) -> Self {
        self.fail_next.store(true, Ordering::SeqCst);
        self
    }

    /// Make catalog queries fail
    pub fn without_catalog(mut self) -> Self {
        self.catalog_unavailable = true;
        self
    }

    /// Current rows of a table
    pub async fn rows(&self, table: &str) -> Vec<BTreeMap<String, Value>> {
        let state = self.state.read().await;
        state
            .tables
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    /// Whether a table exists
    pub async fn has_table(&self, table: &str) -> bool {
        self.state.read().await.tables.contains_key(table)
    }

    /// SQL of every committed statement, in order
    pub async fn executed(&self) -> Vec<String> {
        self.state.read().await.executed.clone()
    }

    fn fail(&self, reason: impl Into<String>) -> Error {
        Error::Statement {
            target: self.name.clone(),
            reason: reason.into(),
        }
    }

    fn apply(&self, state: &mut MemState, statement: &Statement) -> Result<Option<i64>> {
        if let Some(table) = statement.table() {
            if self.failing_tables.contains(table) {
                return Err(self.fail(format!("injected failure on {}", table)));
            }
        }

        match statement {
            Statement::CreateSequence { name } => {
                state.sequences.insert(name.clone());
            }

            Statement::CreateTable { table, columns } => {
                state.tables.entry(table.clone()).or_insert_with(|| MemTable {
                    columns: columns.clone(),
                    ..Default::default()
                });
            }

            Statement::AddColumn { table, column } => {
                let t = self.table_mut(state, table)?;
                if !t.columns.iter().any(|c| c.name == column.name) {
                    let mut column = column.clone();
                    column.position = t.columns.len() as i32 + 1;
                    t.columns.push(column);
                }
            }

            Statement::DropIndex { name, .. } => {
                for t in state.tables.values_mut() {
                    t.indexes.retain(|i| &i.name != name);
                }
            }

            Statement::CreateIndex {
                table,
                name,
                definition,
            } => {
                let t = self.table_mut(state, table)?;
                if !t.indexes.iter().any(|i| &i.name == name) {
                    t.indexes.push(IndexDef {
                        name: name.clone(),
                        definition: definition.replacen(" IF NOT EXISTS", "", 1),
                    });
                }
            }

            Statement::Insert {
                table,
                columns,
                values,
                returning,
            } => {
                let name = self.name.clone();
                let t = self.table_mut(state, table)?;
                for column in columns {
                    if !t.columns.iter().any(|c| &c.name == column) {
                        return Err(Error::Statement {
                            target: name,
                            reason: format!("column \"{}\" of relation \"{}\" does not exist", column, table),
                        });
                    }
                }

                let mut record: Record = columns.iter().cloned().zip(values.iter().cloned()).collect();
                let identity = match returning {
                    Some(column) => {
                        let id = match record.get(column).and_then(Value::as_i64) {
                            Some(id) => id,
                            None => {
                                let max = t
                                    .rows
                                    .iter()
                                    .filter_map(|r| r.get(column).and_then(Value::as_i64))
                                    .max()
                                    .unwrap_or(0);
                                max + 1
                            }
                        };
                        record.insert(column.clone(), Value::Int(id));
                        Some(id)
                    }
                    None => None,
                };
                t.rows.push(record);
                return Ok(identity);
            }

            Statement::Update { table, set, key } => {
                let t = self.table_mut(state, table)?;
                for record in t.rows.iter_mut() {
                    let matches = key.iter().all(|(column, value)| {
                        let current = record.get(column).unwrap_or(&Value::Null);
                        match value {
                            Value::Null => current.is_null(),
                            _ => current == value,
                        }
                    });
                    if matches {
                        for (column, value) in set {
                            record.insert(column.clone(), value.clone());
                        }
                    }
                }
            }

            Statement::RewriteScalar {
                table,
                column,
                old,
                new,
            } => {
                let t = self.table_mut(state, table)?;
                for record in t.rows.iter_mut() {
                    if record.get(column).and_then(Value::as_i64) == Some(*old) {
                        record.insert(column.clone(), Value::Int(*new));
                    }
                }
            }

            Statement::RewriteArray {
                table,
                column,
                old,
                new,
            } => {
                let t = self.table_mut(state, table)?;
                for record in t.rows.iter_mut() {
                    if let Some(Value::Array(items)) = record.get_mut(column) {
                        for item in items.iter_mut() {
                            if item.as_i64() == Some(*old) {
                                *item = Value::Int(*new);
                            }
                        }
                    }
                }
            }
        }

        Ok(None)
    }

    fn table_mut<'a>(&self, state: &'a mut MemState, table: &str) -> Result<&'a mut MemTable> {
        state
            .tables
            .get_mut(table)
            .ok_or_else(|| self.fail(format!("relation \"{}\" does not exist", table)))
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    fn name(&self) -> &str {
        &self.name
    }

    async fn column_catalog(&self) -> Result<Vec<ColumnRecord>> {
        if self.catalog_unavailable {
            return Err(Error::MetadataQuery {
                target: self.name.clone(),
                reason: "permission denied for schema information_schema".into(),
            });
        }

        let state = self.state.read().await;
        let mut records = Vec::new();
        for (table, t) in &state.tables {
            for column in &t.columns {
                records.push(ColumnRecord {
                    table: table.clone(),
                    column: column.name.clone(),
                    position: column.position,
                    data_type: column.data_type.clone(),
                    udt_name: String::new(),
                    nullable: column.nullable,
                    default: column.default.clone(),
                    char_max_length: None,
                    numeric_precision: None,
                    numeric_scale: None,
                });
            }
        }
        Ok(records)
    }

    async fn index_catalog(&self) -> Result<Vec<IndexRecord>> {
        if self.catalog_unavailable {
            return Err(Error::MetadataQuery {
                target: self.name.clone(),
                reason: "permission denied for relation pg_indexes".into(),
            });
        }

        let state = self.state.read().await;
        Ok(state
            .tables
            .iter()
            .flat_map(|(table, t)| {
                t.indexes.iter().map(move |i| IndexRecord {
                    table: table.clone(),
                    name: i.name.clone(),
                    definition: i.definition.clone(),
                })
            })
            .collect())
    }

    async fn fetch_rows(&self, layout: &Arc<TableLayout>) -> Result<Vec<Row>> {
        if self.failing_tables.contains(layout.table()) {
            return Err(self.fail(format!("injected failure reading {}", layout.table())));
        }

        let state = self.state.read().await;
        let t = state
            .tables
            .get(layout.table())
            .ok_or_else(|| self.fail(format!("relation \"{}\" does not exist", layout.table())))?;

        t.rows
            .iter()
            .map(|record| {
                let values = layout
                    .columns()
                    .iter()
                    .map(|c| record.get(c).cloned().unwrap_or(Value::Null))
                    .collect();
                Row::new(Arc::clone(layout), values)
            })
            .collect()
    }

    async fn execute_batch(&self, statements: &[Statement]) -> Result<Vec<Option<i64>>> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(self.fail("injected batch failure"));
        }

        let mut state = self.state.write().await;
        let mut working = state.clone();
        let mut identities = Vec::with_capacity(statements.len());

        for statement in statements {
            identities.push(self.apply(&mut working, statement)?);
            working.executed.push(statement.to_sql());
        }

        *state = working;
        Ok(identities)
    }

    async fn close(&self) {}
}

/// Hands out in-memory databases by target name
#[derive(Default)]
pub struct MemoryConnector {
    databases: HashMap<String, Arc<MemoryDatabase>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a database under its own name
    pub fn with(mut self, db: Arc<MemoryDatabase>) -> Self {
        self.databases.insert(db.name.clone(), db);
        self
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, target: &Target) -> Result<Arc<dyn Database>> {
        match self.databases.get(&target.name) {
            Some(db) => Ok(Arc::clone(db) as Arc<dyn Database>),
            None => Err(Error::Connectivity {
                target: target.name.clone(),
                attempts: 1,
                reason: format!("connection refused ({}:{})", target.host, target.port),
            }),
        }
    }
}
