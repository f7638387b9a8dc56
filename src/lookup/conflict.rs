//! Lookup Conflict Resolution
//!
//! A conflict is a natural key whose rows canonicalize to more than one
//! distinct value across the databases holding that key.

use std::collections::HashMap;

use super::update_statement;
use crate::config::LookupTableConfig;
use crate::data::{Row, RowSnapshot};
use crate::executor::Statement;

/// Databases sharing one canonical row for a key
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictGroup {
    pub row: Row,
    pub canonical: String,
    pub databases: Vec<String>,
}

/// A key held with divergent content
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictRecord {
    pub table: String,
    pub key: String,
    pub groups: Vec<ConflictGroup>,
}

/// Stable rendering of a row's content
///
/// Columns are sorted by name and the identity column is left out, since
/// every database assigns its own.
pub fn canonicalize(table: &LookupTableConfig, row: &Row) -> String {
    let mut fields: Vec<(&str, String)> = row
        .iter()
        .filter(|(column, _)| table.id_field.as_deref() != Some(*column))
        .map(|(column, value)| (column, value.canonical()))
        .collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));

    fields
        .iter()
        .map(|(column, value)| format!("{}={}", column, value))
        .collect::<Vec<_>>()
        .join(";")
}

/// Find conflicting keys across `(database name, snapshot)` pairs
///
/// Keys and groups are reported in the order they are first seen.
pub fn find_conflicts(table: &LookupTableConfig, snapshots: &[(String, RowSnapshot)]) -> Vec<ConflictRecord> {
    let mut order: Vec<&str> = Vec::new();
    let mut groups_by_key: HashMap<&str, Vec<ConflictGroup>> = HashMap::new();

    for (database, snapshot) in snapshots {
        for (key, row) in snapshot.iter() {
            let canonical = canonicalize(table, row);
            let groups = groups_by_key.entry(key).or_insert_with(|| {
                order.push(key);
                Vec::new()
            });

            match groups.iter_mut().find(|g| g.canonical == canonical) {
                Some(group) => group.databases.push(database.clone()),
                None => groups.push(ConflictGroup {
                    row: row.clone(),
                    canonical,
                    databases: vec![database.clone()],
                }),
            }
        }
    }

    order
        .into_iter()
        .filter_map(|key| {
            let groups = groups_by_key.remove(key)?;
            (groups.len() > 1).then(|| ConflictRecord {
                table: table.name.clone(),
                key: key.to_string(),
                groups,
            })
        })
        .collect()
}

/// Update writing the chosen group's content, keyed by natural key
pub fn resolution_statement(
    table: &LookupTableConfig,
    record: &ConflictRecord,
    choice: usize,
) -> Option<Statement> {
    let group = record.groups.get(choice)?;
    update_statement(table, &group.row, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{TableLayout, Value};
    use std::sync::Arc;

    fn min_costs() -> LookupTableConfig {
        LookupTableConfig {
            name: "min_costs".into(),
            key_fields: vec!["spell_level".into(), "item_type".into()],
            id_field: Some("id".into()),
            propagate_updates: false,
        }
    }

    fn snapshot(id: i64, cost: f64) -> RowSnapshot {
        let layout = Arc::new(TableLayout::new(
            "min_costs",
            vec!["id".into(), "spell_level".into(), "item_type".into(), "min_cost".into()],
        ));
        let row = Row::new(
            layout,
            vec![
                Value::Int(id),
                Value::Int(3),
                Value::Text("wand".into()),
                Value::Numeric(cost.to_string()),
            ],
        )
        .unwrap();
        RowSnapshot::build(&min_costs(), vec![row])
    }

    #[test]
    fn test_two_groups_for_divergent_replica() {
        let snapshots = vec![
            ("A".to_string(), snapshot(1, 11250.0)),
            ("B".to_string(), snapshot(7, 11250.0)),
            ("C".to_string(), snapshot(2, 4500.0)),
        ];

        let conflicts = find_conflicts(&min_costs(), &snapshots);

        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].key, "3|wand");
        assert_eq!(conflicts[0].groups.len(), 2);
        assert_eq!(conflicts[0].groups[0].databases, vec!["A", "B"]);
        assert_eq!(conflicts[0].groups[1].databases, vec!["C"]);
    }

    #[test]
    fn test_formatting_differences_are_not_conflicts() {
        let snapshots = vec![
            ("master".to_string(), snapshot(1, 11250.0)),
            ("loot_db_1".to_string(), snapshot(5, 11250.000000001)),
        ];

        assert!(find_conflicts(&min_costs(), &snapshots).is_empty());
    }

    #[test]
    fn test_resolution_excludes_key_fields() {
        let snapshots = vec![
            ("master".to_string(), snapshot(1, 11250.0)),
            ("loot_db_1".to_string(), snapshot(5, 4500.0)),
        ];
        let conflicts = find_conflicts(&min_costs(), &snapshots);

        let statement = resolution_statement(&min_costs(), &conflicts[0], 1).unwrap();
        assert_eq!(
            statement.to_sql(),
            "UPDATE \"min_costs\" SET \"min_cost\" = 4500 WHERE \"spell_level\" = 3 AND \"item_type\" = 'wand'"
        );
        assert!(resolution_statement(&min_costs(), &conflicts[0], 2).is_none());
    }
}
