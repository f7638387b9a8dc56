//! Statement Model
//!
//! Every mutation the engine performs is a `Statement`. The SQL adapter runs
//! exactly `to_sql()` and dry-run prints exactly `to_sql()`.

use crate::data::Value;
use crate::schema::{column_definition, ColumnDef};

/// A mutating statement
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// CREATE SEQUENCE IF NOT EXISTS
    CreateSequence { name: String },

    /// CREATE TABLE IF NOT EXISTS
    CreateTable { table: String, columns: Vec<ColumnDef> },

    /// ALTER TABLE ... ADD COLUMN IF NOT EXISTS
    AddColumn { table: String, column: ColumnDef },

    /// DROP INDEX IF EXISTS
    DropIndex { table: String, name: String },

    /// Existence-checked CREATE INDEX
    CreateIndex {
        table: String,
        name: String,
        definition: String,
    },

    /// Insert one row, optionally returning its identity
    Insert {
        table: String,
        columns: Vec<String>,
        values: Vec<Value>,
        returning: Option<String>,
    },

    /// Update rows matching a natural key
    Update {
        table: String,
        set: Vec<(String, Value)>,
        key: Vec<(String, Value)>,
    },

    /// Rewrite a scalar foreign key from `old` to `new`
    RewriteScalar {
        table: String,
        column: String,
        old: i64,
        new: i64,
    },

    /// Replace `old` with `new` inside an array-valued foreign key
    RewriteArray {
        table: String,
        column: String,
        old: i64,
        new: i64,
    },
}

impl Statement {
    /// Table affected by this statement
    pub fn table(&self) -> Option<&str> {
        match self {
            Statement::CreateSequence { .. } => None,
            Statement::CreateTable { table, .. }
            | Statement::AddColumn { table, .. }
            | Statement::DropIndex { table, .. }
            | Statement::CreateIndex { table, .. }
            | Statement::Insert { table, .. }
            | Statement::Update { table, .. }
            | Statement::RewriteScalar { table, .. }
            | Statement::RewriteArray { table, .. } => Some(table),
        }
    }

    /// Column whose value the statement returns
    pub fn returning(&self) -> Option<&str> {
        match self {
            Statement::Insert { returning, .. } => returning.as_deref(),
            _ => None,
        }
    }

    /// Convert to SQL
    pub fn to_sql(&self) -> String {
        match self {
            Statement::CreateSequence { name } => {
                format!("CREATE SEQUENCE IF NOT EXISTS {}", name)
            }

            Statement::CreateTable { table, columns } => {
                let defs: Vec<String> = columns.iter().map(column_definition).collect();
                format!(
                    "CREATE TABLE IF NOT EXISTS {} ({})",
                    quote_ident(table),
                    defs.join(", ")
                )
            }

            Statement::AddColumn { table, column } => format!(
                "ALTER TABLE {} ADD COLUMN IF NOT EXISTS {}",
                quote_ident(table),
                column_definition(column)
            ),

            Statement::DropIndex { name, .. } => {
                format!("DROP INDEX IF EXISTS {}", quote_ident(name))
            }

            Statement::CreateIndex { definition, .. } => definition.clone(),

            Statement::Insert {
                table,
                columns,
                values,
                returning,
            } => {
                let cols = columns
                    .iter()
                    .map(|c| quote_ident(c))
                    .collect::<Vec<_>>()
                    .join(", ");
                let vals = values
                    .iter()
                    .map(|v| v.to_sql())
                    .collect::<Vec<_>>()
                    .join(", ");
                let mut sql = format!("INSERT INTO {} ({}) VALUES ({})", quote_ident(table), cols, vals);
                if let Some(column) = returning {
                    sql.push_str(&format!(" RETURNING {}", quote_ident(column)));
                }
                sql
            }

            Statement::Update { table, set, key } => {
                let sets: Vec<String> = set
                    .iter()
                    .map(|(col, val)| format!("{} = {}", quote_ident(col), val.to_sql()))
                    .collect();
                let wheres: Vec<String> = key
                    .iter()
                    .map(|(col, val)| match val {
                        Value::Null => format!("{} IS NULL", quote_ident(col)),
                        _ => format!("{} = {}", quote_ident(col), val.to_sql()),
                    })
                    .collect();
                format!(
                    "UPDATE {} SET {} WHERE {}",
                    quote_ident(table),
                    sets.join(", "),
                    wheres.join(" AND ")
                )
            }

            Statement::RewriteScalar {
                table,
                column,
                old,
                new,
            } => format!(
                "UPDATE {} SET {} = {} WHERE {} = {}",
                quote_ident(table),
                quote_ident(column),
                new,
                quote_ident(column),
                old
            ),

            Statement::RewriteArray {
                table,
                column,
                old,
                new,
            } => format!(
                "UPDATE {} SET {col} = array_replace({col}, {}, {}) WHERE {} = ANY({col})",
                quote_ident(table),
                old,
                new,
                old,
                col = quote_ident(column)
            ),
        }
    }
}

impl std::fmt::Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_sql())
    }
}

/// Double-quote an identifier
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
