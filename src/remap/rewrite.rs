//! Reference rewriting: every declared foreign-key column that targets a
//! remapped table gets a targeted update per mapping.

use std::collections::{BTreeMap, HashSet};

use super::{IdRemapping, Mapping};
use crate::config::ReferenceConfig;
use crate::error::{Error, Result};
use crate::executor::Statement;
use crate::schema::SchemaSnapshot;

/// A foreign-key column with its array-ness resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceColumn {
    pub table: String,
    pub column: String,
    pub target: String,
    pub array: bool,
}

/// Resolve declared references against the master snapshot
///
/// Without an explicit `array` flag a column is array-valued when its master
/// type ends in `[]`.
pub fn resolve_references(references: &[ReferenceConfig], master: &SchemaSnapshot) -> Vec<ReferenceColumn> {
    references
        .iter()
        .map(|r| {
            let array = r.array.unwrap_or_else(|| {
                master
                    .column(&r.table, &r.column)
                    .map(|c| c.data_type.ends_with("[]"))
                    .unwrap_or(false)
            });
            if master.column(&r.table, &r.column).is_none() {
                tracing::warn!(
                    "Reference column {}.{} is not in the master schema",
                    r.table,
                    r.column
                );
            }
            ReferenceColumn {
                table: r.table.clone(),
                column: r.column.clone(),
                target: r.target.clone(),
                array,
            }
        })
        .collect()
}

/// Order one table's mappings so no rewritten value is rewritten again
///
/// A mapping whose old id is another mapping's new id must run first.
/// Returns the offending ids when the mappings form a cycle.
pub fn order_mappings<'a>(mappings: &[&'a Mapping]) -> std::result::Result<Vec<&'a Mapping>, Vec<i64>> {
    let by_old: BTreeMap<i64, &Mapping> = mappings.iter().map(|m| (m.old_id, *m)).collect();
    let mut ordered = Vec::with_capacity(mappings.len());
    let mut done: HashSet<i64> = HashSet::new();

    while ordered.len() < by_old.len() {
        let mut progressed = false;
        for (old, mapping) in &by_old {
            if done.contains(old) {
                continue;
            }
            let blocked = by_old.contains_key(&mapping.new_id)
                && mapping.new_id != *old
                && !done.contains(&mapping.new_id);
            if !blocked {
                done.insert(*old);
                ordered.push(*mapping);
                progressed = true;
            }
        }
        if !progressed {
            return Err(by_old
                .keys()
                .filter(|old| !done.contains(old))
                .copied()
                .collect());
        }
    }

    Ok(ordered)
}

/// Build the rewrite statements for one replica
///
/// Ids claimed by several other replicas are left alone; see
/// [`IdRemapping::unresolved`].
pub fn rewrite_statements(
    remapping: &IdRemapping,
    references: &[ReferenceColumn],
    replica: &str,
) -> Result<Vec<Statement>> {
    let mut statements = Vec::new();

    for table in remapping.tables() {
        let columns: Vec<&ReferenceColumn> = references.iter().filter(|r| r.target == table).collect();
        if columns.is_empty() {
            continue;
        }

        let mappings = remapping.for_replica(table, replica);
        let ordered = order_mappings(&mappings).map_err(|ids| Error::ReferenceRewrite {
            replica: replica.to_string(),
            reason: format!("identity remapping for {} is cyclic over ids {:?}", table, ids),
        })?;

        for mapping in ordered {
            if mapping.old_id == mapping.new_id {
                continue;
            }
            for reference in &columns {
                let statement = if reference.array {
                    Statement::RewriteArray {
                        table: reference.table.clone(),
                        column: reference.column.clone(),
                        old: mapping.old_id,
                        new: mapping.new_id,
                    }
                } else {
                    Statement::RewriteScalar {
                        table: reference.table.clone(),
                        column: reference.column.clone(),
                        old: mapping.old_id,
                        new: mapping.new_id,
                    }
                };
                statements.push(statement);
            }
        }
    }

    Ok(statements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Value;
    use crate::executor::{Database, MemoryDatabase};
    use crate::schema::{ColumnRecord, SchemaSnapshot};

    fn references() -> Vec<ReferenceColumn> {
        vec![
            ReferenceColumn {
                table: "loot".into(),
                column: "itemid".into(),
                target: "item".into(),
                array: false,
            },
            ReferenceColumn {
                table: "loot".into(),
                column: "modids".into(),
                target: "item".into(),
                array: true,
            },
        ]
    }

    fn mapping(old_id: i64, new_id: i64) -> Mapping {
        Mapping {
            table: "item".into(),
            old_id,
            new_id,
            origin: "loot_db_1".into(),
        }
    }

    #[test]
    fn test_array_flag_from_master_type() {
        let columns = vec![
            ColumnRecord {
                table: "loot".into(),
                column: "itemid".into(),
                position: 1,
                data_type: "integer".into(),
                udt_name: "int4".into(),
                nullable: true,
                default: None,
                char_max_length: None,
                numeric_precision: None,
                numeric_scale: None,
            },
            ColumnRecord {
                table: "loot".into(),
                column: "modids".into(),
                position: 2,
                data_type: "ARRAY".into(),
                udt_name: "_int4".into(),
                nullable: true,
                default: None,
                char_max_length: None,
                numeric_precision: None,
                numeric_scale: None,
            },
        ];
        let master = SchemaSnapshot::from_records(columns, vec![]);
        let declared = vec![
            ReferenceConfig {
                table: "loot".into(),
                column: "itemid".into(),
                target: "item".into(),
                array: None,
            },
            ReferenceConfig {
                table: "loot".into(),
                column: "modids".into(),
                target: "mod".into(),
                array: None,
            },
        ];

        let resolved = resolve_references(&declared, &master);
        assert!(!resolved[0].array);
        assert!(resolved[1].array);
    }

    #[test]
    fn test_chained_mappings_run_dependents_first() {
        let a = mapping(17, 99);
        let b = mapping(99, 120);
        let ordered = order_mappings(&[&a, &b]).unwrap();

        assert_eq!(ordered[0].old_id, 99);
        assert_eq!(ordered[1].old_id, 17);
    }

    #[test]
    fn test_cycle_is_an_error() {
        let mut remapping = IdRemapping::new();
        remapping.record("item", 17, 99, "loot_db_1");
        remapping.record("item", 99, 17, "loot_db_1");

        let err = rewrite_statements(&remapping, &references(), "loot_db_2").unwrap_err();
        assert!(matches!(err, Error::ReferenceRewrite { .. }));
    }

    #[test]
    fn test_contested_id_is_rewritten_only_on_its_origins() {
        let mut remapping = IdRemapping::new();
        remapping.record("item", 17, 99, "loot_db_1");
        remapping.record("item", 17, 100, "loot_db_2");

        let own = rewrite_statements(&remapping, &references(), "loot_db_2").unwrap();
        assert_eq!(own.len(), 2);
        assert!(own.iter().all(|s| matches!(
            s,
            Statement::RewriteScalar { old: 17, new: 100, .. } | Statement::RewriteArray { old: 17, new: 100, .. }
        )));

        assert!(rewrite_statements(&remapping, &references(), "loot_db_test")
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_rewrite_leaves_no_stale_references() {
        let db = MemoryDatabase::new("loot_db_2")
            .with_table(
                "loot",
                &[("id", "integer", false), ("itemid", "integer", true), ("modids", "integer[]", true)],
            )
            .with_row(
                "loot",
                &[
                    ("id", Value::Int(1)),
                    ("itemid", Value::Int(17)),
                    ("modids", Value::Array(vec![Value::Int(3), Value::Int(17), Value::Int(5)])),
                ],
            )
            .with_row(
                "loot",
                &[
                    ("id", Value::Int(2)),
                    ("itemid", Value::Int(4)),
                    ("modids", Value::Array(vec![])),
                ],
            );

        let mut remapping = IdRemapping::new();
        remapping.record("item", 17, 99, "loot_db_1");

        let statements = rewrite_statements(&remapping, &references(), "loot_db_2").unwrap();
        assert_eq!(statements.len(), 2);
        db.execute_batch(&statements).await.unwrap();

        let rows = db.rows("loot").await;
        assert_eq!(rows[0].get("itemid"), Some(&Value::Int(99)));
        assert_eq!(
            rows[0].get("modids"),
            Some(&Value::Array(vec![Value::Int(3), Value::Int(99), Value::Int(5)]))
        );
        assert_eq!(rows[1].get("itemid"), Some(&Value::Int(4)));
        for row in &rows {
            assert_ne!(row.get("itemid"), Some(&Value::Int(17)));
            if let Some(Value::Array(items)) = row.get("modids") {
                assert!(!items.contains(&Value::Int(17)));
            }
        }
    }
}
