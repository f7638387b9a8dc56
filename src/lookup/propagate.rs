//! Master -> replica propagation of lookup rows

use crate::config::{ComparisonConfig, LookupTableConfig};
use crate::data::{diff_rows, Row, RowSnapshot, TableLayout};
use crate::executor::Statement;
use crate::remap::insert_statement;

/// Statements that bring one replica's copy of a lookup table up to master
///
/// Rows master has and the replica lacks are inserted without their identity.
/// With `propagate_updates`, rows whose content drifted are overwritten
/// with master's content.
pub fn propagation_statements(
    table: &LookupTableConfig,
    master_layout: &TableLayout,
    master: &RowSnapshot,
    replica: &RowSnapshot,
    tolerance: &ComparisonConfig,
) -> Vec<Statement> {
    let diff = diff_rows(table, master, replica, tolerance, table.propagate_updates);

    let mut statements: Vec<Statement> = diff
        .missing
        .iter()
        .map(|row| insert_statement(table, master_layout, row, false))
        .collect();

    for (master_row, replica_row) in &diff.drifted {
        if let Some(statement) = update_statement(table, master_row, Some(replica_row.layout())) {
            statements.push(statement);
        }
    }

    statements
}

/// Overwrite a row's non-key content, keyed by its natural key
///
/// Columns outside `target_layout` are left out. Returns `None` when
/// nothing but key and identity fields remain.
pub fn update_statement(
    table: &LookupTableConfig,
    source: &Row,
    target_layout: Option<&std::sync::Arc<TableLayout>>,
) -> Option<Statement> {
    let set: Vec<_> = source
        .iter()
        .filter(|(column, _)| !crate::data::is_key_or_identity(table, column))
        .filter(|(column, _)| target_layout.map_or(true, |l| l.contains(column)))
        .map(|(column, value)| (column.to_string(), value.clone()))
        .collect();

    if set.is_empty() {
        return None;
    }

    let key = table
        .key_fields
        .iter()
        .map(|field| {
            (
                field.clone(),
                source.get(field).cloned().unwrap_or(crate::data::Value::Null),
            )
        })
        .collect();

    Some(Statement::Update {
        table: table.name.clone(),
        set,
        key,
    })
}
