//! Harvest planning: replica rows whose natural key master lacks become
//! master inserts that return the master-assigned identity.

use std::collections::HashSet;

use crate::config::{ComparisonConfig, LookupTableConfig};
use crate::data::{diff_rows, natural_key, Row, RowSnapshot, TableLayout};
use crate::executor::Statement;

/// An insert into master plus what is needed to record its remapping
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedInsert {
    pub table: String,
    pub key: String,
    /// Identity the row carried in its replica
    pub old_id: Option<i64>,
    pub statement: Statement,
}

/// Plan the inserts one replica contributes to one table
///
/// Keys in `taken` were already harvested from an earlier replica in this
/// pass and are skipped.
pub fn plan_contribution(
    table: &LookupTableConfig,
    master_layout: &TableLayout,
    master: &RowSnapshot,
    replica: &RowSnapshot,
    taken: &HashSet<String>,
) -> Vec<PlannedInsert> {
    let diff = diff_rows(table, replica, master, &ComparisonConfig::default(), false);

    diff.missing
        .into_iter()
        .filter_map(|row| {
            let key = natural_key(table, &row);
            if taken.contains(&key) {
                return None;
            }
            let old_id = table
                .id_field
                .as_deref()
                .and_then(|id| row.get(id))
                .and_then(|v| v.as_i64());
            Some(PlannedInsert {
                table: table.name.clone(),
                key,
                old_id,
                statement: insert_statement(table, master_layout, &row, true),
            })
        })
        .collect()
}

/// Insert a row into another database
///
/// Uses `layout`'s column order, leaves out the identity column so the
/// receiving database assigns it, and drops columns the row does not carry.
pub fn insert_statement(
    table: &LookupTableConfig,
    layout: &TableLayout,
    row: &Row,
    return_identity: bool,
) -> Statement {
    let id_field = table.id_field.as_deref();
    let mut columns = Vec::new();
    let mut values = Vec::new();

    for column in layout.columns() {
        if Some(column.as_str()) == id_field {
            continue;
        }
        if let Some(value) = row.get(column) {
            columns.push(column.clone());
            values.push(value.clone());
        }
    }

    Statement::Insert {
        table: table.name.clone(),
        columns,
        values,
        returning: if return_identity { table.id_field.clone() } else { None },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Value;
    use std::sync::Arc;

    fn item() -> LookupTableConfig {
        LookupTableConfig {
            name: "item".into(),
            key_fields: vec!["name".into(), "type".into()],
            id_field: Some("id".into()),
            propagate_updates: false,
        }
    }

    fn row(layout: &Arc<TableLayout>, id: i64, name: &str) -> Row {
        let mut values = vec![Value::Int(id), Value::Text(name.into()), Value::Text("magic".into())];
        values.truncate(layout.columns().len());
        Row::new(Arc::clone(layout), values).unwrap()
    }

    #[test]
    fn test_plan_excludes_identity_and_known_keys() {
        let master_layout = Arc::new(TableLayout::new(
            "item",
            vec!["id".into(), "name".into(), "type".into(), "value".into()],
        ));
        let replica_layout = Arc::new(TableLayout::new(
            "item",
            vec!["id".into(), "name".into(), "type".into()],
        ));

        let master = RowSnapshot::build(&item(), vec![]);
        let replica = RowSnapshot::build(
            &item(),
            vec![
                row(&replica_layout, 17, "Cloak of Resistance +1"),
                row(&replica_layout, 18, "Bag of Holding"),
            ],
        );
        let taken: HashSet<String> = ["Bag of Holding|magic".to_string()].into_iter().collect();

        let plan = plan_contribution(&item(), &master_layout, &master, &replica, &taken);

        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].old_id, Some(17));
        assert_eq!(plan[0].key, "Cloak of Resistance +1|magic");
        assert_eq!(
            plan[0].statement.to_sql(),
            "INSERT INTO \"item\" (\"name\", \"type\") VALUES ('Cloak of Resistance +1', 'magic') RETURNING \"id\""
        );
    }

    #[test]
    fn test_rows_already_in_master_are_not_planned() {
        let layout = Arc::new(TableLayout::new(
            "item",
            vec!["id".into(), "name".into(), "type".into()],
        ));
        let master = RowSnapshot::build(&item(), vec![row(&layout, 42, "Cloak of Resistance +1")]);
        let replica = RowSnapshot::build(&item(), vec![row(&layout, 17, "Cloak of Resistance +1")]);

        let plan = plan_contribution(&item(), &layout, &master, &replica, &HashSet::new());
        assert!(plan.is_empty());
    }
}
