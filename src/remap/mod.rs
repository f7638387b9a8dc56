//! Identifier Remapping
//!
//! Rows harvested from a replica receive new surrogate ids in master. The
//! old -> new pairs are collected here and then rewritten into every
//! declared reference column of every replica.

mod harvest;
mod rewrite;

use std::collections::{BTreeMap, BTreeSet};

pub use harvest::{insert_statement, plan_contribution, PlannedInsert};
pub use rewrite::{order_mappings, resolve_references, rewrite_statements, ReferenceColumn};

/// One recorded old -> new identity pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    pub table: String,
    pub old_id: i64,
    pub new_id: i64,
    /// Replica the row was harvested from
    pub origin: String,
}

/// Pass-scoped `(table, old_id) -> new_id` map
///
/// Two contributing replicas can hand out the same local id to different
/// rows. Every pair is kept: a replica's own pair always applies to it, and
/// an id claimed by several replicas is unresolved for every other replica.
#[derive(Debug, Clone, Default)]
pub struct IdRemapping {
    mappings: BTreeMap<(String, i64), Vec<Mapping>>,
}

impl IdRemapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a pair
    ///
    /// Returns false when another replica already mapped the same
    /// `(table, old_id)` to a different new id.
    pub fn record(&mut self, table: &str, old_id: i64, new_id: i64, origin: &str) -> bool {
        let candidates = self.mappings.entry((table.to_string(), old_id)).or_default();
        if candidates.iter().any(|m| m.new_id == new_id) {
            return true;
        }

        let contested = !candidates.is_empty();
        if let Some(first) = candidates.first() {
            tracing::warn!(
                "{}.{} already maps to {} (from {}); {} maps it to {}",
                table,
                old_id,
                first.new_id,
                first.origin,
                origin,
                new_id
            );
        }
        candidates.push(Mapping {
            table: table.to_string(),
            old_id,
            new_id,
            origin: origin.to_string(),
        });
        !contested
    }

    /// Mappings of one table that apply to `replica`, by old id
    pub fn for_replica(&self, table: &str, replica: &str) -> Vec<&Mapping> {
        self.mappings
            .iter()
            .filter(|((t, _), _)| t == table)
            .filter_map(|(_, candidates)| match candidates.iter().find(|m| m.origin == replica) {
                Some(own) => Some(own),
                None if candidates.len() == 1 => candidates.first(),
                None => None,
            })
            .collect()
    }

    /// `(table, old_id)` pairs claimed by several replicas, none of them `replica`
    pub fn unresolved(&self, replica: &str) -> Vec<(&str, i64)> {
        self.mappings
            .iter()
            .filter(|(_, candidates)| candidates.len() > 1 && !candidates.iter().any(|m| m.origin == replica))
            .map(|((table, old_id), _)| (table.as_str(), *old_id))
            .collect()
    }

    /// Tables with at least one mapping
    pub fn tables(&self) -> BTreeSet<&str> {
        self.mappings.keys().map(|(table, _)| table.as_str()).collect()
    }

    /// Every mapping of an id claimed by more than one replica
    pub fn ambiguous(&self) -> Vec<&Mapping> {
        self.mappings
            .values()
            .filter(|candidates| candidates.len() > 1)
            .flatten()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.mappings.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_replica_keeps_its_own_mapping() {
        let mut remapping = IdRemapping::new();
        assert!(remapping.record("item", 17, 99, "loot_db_1"));
        assert!(remapping.record("item", 17, 99, "loot_db_1"));
        assert!(!remapping.record("item", 17, 100, "loot_db_2"));

        assert_eq!(remapping.len(), 2);
        assert_eq!(remapping.for_replica("item", "loot_db_1")[0].new_id, 99);
        assert_eq!(remapping.for_replica("item", "loot_db_2")[0].new_id, 100);
        assert!(remapping.for_replica("item", "loot_db_test").is_empty());

        assert!(remapping.unresolved("loot_db_1").is_empty());
        assert_eq!(remapping.unresolved("loot_db_test"), vec![("item", 17)]);

        let origins: Vec<&str> = remapping.ambiguous().iter().map(|m| m.origin.as_str()).collect();
        assert_eq!(origins, vec!["loot_db_1", "loot_db_2"]);
    }

    #[test]
    fn test_tables_and_lookup() {
        let mut remapping = IdRemapping::new();
        remapping.record("item", 17, 99, "loot_db_1");
        remapping.record("mod", 3, 41, "loot_db_1");

        assert_eq!(remapping.tables().into_iter().collect::<Vec<_>>(), vec!["item", "mod"]);
        assert_eq!(remapping.for_replica("mod", "loot_db_test").len(), 1);
        assert!(remapping.unresolved("loot_db_test").is_empty());
    }
}
