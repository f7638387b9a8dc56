//! Schema Differ
//!
//! Computes what a replica lacks relative to the master. Tables that only
//! exist on the replica are never reported.

use std::collections::{BTreeMap, BTreeSet};

use super::{ColumnDef, IndexDef, SchemaSnapshot};

/// A column present on both sides under the same name but a different type.
/// Informational only; existing columns are never altered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDrift {
    pub column: String,
    pub master_type: String,
    pub replica_type: String,
}

/// Structural difference of a replica relative to the master
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DifferenceSet {
    pub missing_tables: BTreeSet<String>,
    pub missing_columns: BTreeMap<String, Vec<ColumnDef>>,
    pub extra_indexes: BTreeMap<String, Vec<IndexDef>>,
    pub missing_indexes: BTreeMap<String, Vec<IndexDef>>,
    pub type_drift: BTreeMap<String, Vec<TypeDrift>>,
}

impl DifferenceSet {
    /// True when no reconciling action is required
    pub fn is_empty(&self) -> bool {
        self.missing_tables.is_empty()
            && self.missing_columns.is_empty()
            && self.extra_indexes.is_empty()
            && self.missing_indexes.is_empty()
    }

    /// Tables touched by this difference set
    pub fn tables(&self) -> BTreeSet<&str> {
        self.missing_tables
            .iter()
            .chain(self.missing_columns.keys())
            .chain(self.extra_indexes.keys())
            .chain(self.missing_indexes.keys())
            .map(String::as_str)
            .collect()
    }

    /// Keep only the tables `keep` accepts
    pub fn retain_tables(&mut self, keep: impl Fn(&str) -> bool) {
        self.missing_tables.retain(|t| keep(t));
        self.missing_columns.retain(|t, _| keep(t));
        self.extra_indexes.retain(|t, _| keep(t));
        self.missing_indexes.retain(|t, _| keep(t));
        self.type_drift.retain(|t, _| keep(t));
    }

    /// Human-readable change summary for one table
    pub fn describe(&self, table: &str) -> String {
        let mut changes = Vec::new();
        if self.missing_tables.contains(table) {
            changes.push("table missing".to_string());
        }
        if let Some(columns) = self.missing_columns.get(table) {
            changes.push(format!("{} columns added", columns.len()));
        }
        if let Some(indexes) = self.missing_indexes.get(table) {
            changes.push(format!("{} indexes added", indexes.len()));
        }
        if let Some(indexes) = self.extra_indexes.get(table) {
            changes.push(format!("{} indexes removed", indexes.len()));
        }
        if changes.is_empty() {
            "no changes".to_string()
        } else {
            changes.join(", ")
        }
    }
}

/// Diff a replica snapshot against the master snapshot
pub fn diff_schemas(master: &SchemaSnapshot, replica: &SchemaSnapshot) -> DifferenceSet {
    let mut diff = DifferenceSet::default();

    for (table, master_columns) in &master.tables {
        let Some(replica_columns) = replica.tables.get(table) else {
            diff.missing_tables.insert(table.clone());
            let indexes = master.indexes_of(table);
            if !indexes.is_empty() {
                diff.missing_indexes.insert(table.clone(), indexes.to_vec());
            }
            continue;
        };

        let replica_by_name: BTreeMap<&str, &ColumnDef> = replica_columns
            .iter()
            .map(|c| (c.name.as_str(), c))
            .collect();

        let mut missing = Vec::new();
        let mut drift = Vec::new();
        for column in master_columns {
            match replica_by_name.get(column.name.as_str()) {
                None => missing.push(column.clone()),
                Some(existing) if existing.data_type != column.data_type => drift.push(TypeDrift {
                    column: column.name.clone(),
                    master_type: column.data_type.clone(),
                    replica_type: existing.data_type.clone(),
                }),
                Some(_) => {}
            }
        }
        if !missing.is_empty() {
            diff.missing_columns.insert(table.clone(), missing);
        }
        if !drift.is_empty() {
            tracing::warn!(
                "{} column(s) of {} differ in type from master; left unchanged",
                drift.len(),
                table
            );
            diff.type_drift.insert(table.clone(), drift);
        }

        let master_indexes = master.indexes_of(table);
        let replica_indexes = replica.indexes_of(table);
        let master_names: BTreeSet<&str> = master_indexes.iter().map(|i| i.name.as_str()).collect();
        let replica_names: BTreeSet<&str> =
            replica_indexes.iter().map(|i| i.name.as_str()).collect();

        let missing: Vec<IndexDef> = master_indexes
            .iter()
            .filter(|i| !replica_names.contains(i.name.as_str()))
            .cloned()
            .collect();
        if !missing.is_empty() {
            diff.missing_indexes.insert(table.clone(), missing);
        }

        let extra: Vec<IndexDef> = replica_indexes
            .iter()
            .filter(|i| !master_names.contains(i.name.as_str()))
            .cloned()
            .collect();
        if !extra.is_empty() {
            diff.extra_indexes.insert(table.clone(), extra);
        }
    }

    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnRecord, IndexRecord};

    fn column(table: &str, name: &str, position: i32, data_type: &str) -> ColumnRecord {
        ColumnRecord {
            table: table.into(),
            column: name.into(),
            position,
            data_type: data_type.into(),
            udt_name: String::new(),
            nullable: true,
            default: None,
            char_max_length: None,
            numeric_precision: None,
            numeric_scale: None,
        }
    }

    fn index(table: &str, name: &str) -> IndexRecord {
        IndexRecord {
            table: table.into(),
            name: name.into(),
            definition: format!("CREATE INDEX {} ON public.{} USING btree (name)", name, table),
        }
    }

    fn master() -> SchemaSnapshot {
        SchemaSnapshot::from_records(
            vec![
                column("item", "id", 1, "integer"),
                column("item", "name", 2, "text"),
                column("mod", "id", 1, "integer"),
                column("mod", "name", 2, "text"),
                column("mod", "weight", 3, "numeric"),
            ],
            vec![index("item", "idx_item_name"), index("mod", "idx_mod_name")],
        )
    }

    #[test]
    fn test_equal_snapshots_have_empty_diff() {
        let diff = diff_schemas(&master(), &master());
        assert!(diff.is_empty());
        assert!(diff.tables().is_empty());
    }

    #[test]
    fn test_missing_table_and_column() {
        let replica = SchemaSnapshot::from_records(
            vec![column("mod", "id", 1, "integer"), column("mod", "name", 2, "text")],
            vec![index("mod", "idx_mod_name"), index("mod", "idx_mod_local")],
        );

        let diff = diff_schemas(&master(), &replica);
        assert_eq!(diff.missing_tables.iter().collect::<Vec<_>>(), vec!["item"]);
        assert_eq!(diff.missing_columns["mod"][0].name, "weight");
        assert_eq!(diff.missing_indexes["item"][0].name, "idx_item_name");
        assert!(!diff.missing_indexes.contains_key("mod"));
        assert_eq!(diff.extra_indexes["mod"][0].name, "idx_mod_local");
        assert_eq!(diff.describe("mod"), "1 columns added, 1 indexes removed");
        assert_eq!(diff.describe("item"), "table missing, 1 indexes added");

        let mut only_mod = diff.clone();
        only_mod.retain_tables(|t| t == "mod");
        assert_eq!(only_mod.tables().into_iter().collect::<Vec<_>>(), vec!["mod"]);
    }

    #[test]
    fn test_replica_only_tables_are_ignored() {
        let mut records = vec![column("scratch", "id", 1, "integer")];
        records.extend([
            column("item", "id", 1, "integer"),
            column("item", "name", 2, "text"),
            column("mod", "id", 1, "integer"),
            column("mod", "name", 2, "text"),
            column("mod", "weight", 3, "numeric"),
        ]);
        let replica = SchemaSnapshot::from_records(
            records,
            vec![
                index("item", "idx_item_name"),
                index("mod", "idx_mod_name"),
                index("scratch", "idx_scratch"),
            ],
        );

        assert!(diff_schemas(&master(), &replica).is_empty());
    }

    #[test]
    fn test_type_drift_is_reported_not_acted_on() {
        let replica = SchemaSnapshot::from_records(
            vec![
                column("item", "id", 1, "bigint"),
                column("item", "name", 2, "text"),
                column("mod", "id", 1, "integer"),
                column("mod", "name", 2, "text"),
                column("mod", "weight", 3, "numeric"),
            ],
            vec![index("item", "idx_item_name"), index("mod", "idx_mod_name")],
        );

        let diff = diff_schemas(&master(), &replica);
        assert!(diff.is_empty());
        assert_eq!(diff.type_drift["item"][0].replica_type, "bigint");
    }
}
