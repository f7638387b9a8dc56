//! Natural-Key Data Differ
//!
//! Surrogate ids are assigned independently by every database, so rows are
//! matched on the declared natural key and compared field by field.

use super::{Row, RowSnapshot};
use crate::config::{ComparisonConfig, LookupTableConfig};

/// Result of diffing a source snapshot against a target snapshot
#[derive(Debug, Clone, Default)]
pub struct DataDiff {
    /// Source rows whose natural key is absent from the target
    pub missing: Vec<Row>,
    /// (source row, target row) pairs whose content differs
    pub drifted: Vec<(Row, Row)>,
}

impl DataDiff {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.drifted.is_empty()
    }
}

/// Diff `source` against `target`
///
/// Output order follows the source snapshot. Drift is only computed when
/// `track_drift` is set.
pub fn diff_rows(
    table: &LookupTableConfig,
    source: &RowSnapshot,
    target: &RowSnapshot,
    tolerance: &ComparisonConfig,
    track_drift: bool,
) -> DataDiff {
    let mut diff = DataDiff::default();

    for (key, source_row) in source.iter() {
        match target.get(key) {
            None => diff.missing.push(source_row.clone()),
            Some(target_row) if track_drift => {
                if !rows_identical(table, source_row, target_row, tolerance) {
                    diff.drifted.push((source_row.clone(), target_row.clone()));
                }
            }
            Some(_) => {}
        }
    }

    diff
}

/// Compare every non-key, non-identity field both rows declare
pub fn rows_identical(
    table: &LookupTableConfig,
    a: &Row,
    b: &Row,
    tolerance: &ComparisonConfig,
) -> bool {
    a.iter()
        .filter(|(column, _)| !is_key_or_identity(table, column))
        .all(|(column, value)| match b.get(column) {
            Some(other) => value.approx_eq(other, tolerance),
            None => true,
        })
}

/// Whether a column is part of the natural key or is the identity column
pub fn is_key_or_identity(table: &LookupTableConfig, column: &str) -> bool {
    table.key_fields.iter().any(|k| k == column) || table.id_field.as_deref() == Some(column)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{TableLayout, Value};
    use std::sync::Arc;

    fn spells() -> LookupTableConfig {
        LookupTableConfig {
            name: "spells".into(),
            key_fields: vec!["name".into()],
            id_field: Some("id".into()),
            propagate_updates: true,
        }
    }

    fn snapshot(rows: &[(i64, &str, f64)]) -> RowSnapshot {
        let layout = Arc::new(TableLayout::new(
            "spells",
            vec!["id".into(), "name".into(), "cost".into()],
        ));
        let rows = rows
            .iter()
            .map(|(id, name, cost)| {
                Row::new(
                    Arc::clone(&layout),
                    vec![Value::Int(*id), Value::Text(name.to_string()), Value::Numeric(cost.to_string())],
                )
                .unwrap()
            })
            .collect();
        RowSnapshot::build(&spells(), rows)
    }

    fn names(rows: &[Row]) -> Vec<String> {
        rows.iter().map(|r| r.get("name").unwrap().to_string()).collect()
    }

    #[test]
    fn test_missing_rows_ignore_surrogate_ids() {
        let master = snapshot(&[(1, "Fireball", 750.0), (2, "Haste", 750.0)]);
        let replica = snapshot(&[(10, "Haste", 750.0), (11, "Fly", 750.0), (12, "Light", 5.0)]);
        let tolerance = ComparisonConfig::default();

        let diff = diff_rows(&spells(), &replica, &master, &tolerance, false);
        assert_eq!(names(&diff.missing), vec!["Fly", "Light"]);
        assert!(diff.drifted.is_empty());
    }

    #[test]
    fn test_diff_is_symmetric() {
        let a = snapshot(&[(1, "Fireball", 750.0), (2, "Haste", 750.0)]);
        let b = snapshot(&[(5, "Haste", 750.0), (6, "Fly", 750.0)]);
        let tolerance = ComparisonConfig::default();

        let a_to_b = diff_rows(&spells(), &a, &b, &tolerance, false);
        let b_to_a = diff_rows(&spells(), &b, &a, &tolerance, false);

        assert_eq!(names(&a_to_b.missing), vec!["Fireball"]);
        assert_eq!(names(&b_to_a.missing), vec!["Fly"]);

        // Applying both directions converges on the same key set
        let mut left: Vec<String> = a.keys().map(String::from).collect();
        left.extend(names(&b_to_a.missing));
        let mut right: Vec<String> = b.keys().map(String::from).collect();
        right.extend(names(&a_to_b.missing));
        left.sort();
        right.sort();
        assert_eq!(left, right);
    }

    #[test]
    fn test_drift_uses_tolerance() {
        let master = snapshot(&[(1, "Fireball", 750.0), (2, "Haste", 750.0)]);
        let replica = snapshot(&[(9, "Fireball", 750.0000001), (8, "Haste", 800.0)]);
        let tolerance = ComparisonConfig::default();

        let diff = diff_rows(&spells(), &master, &replica, &tolerance, true);
        assert!(diff.missing.is_empty());
        assert_eq!(diff.drifted.len(), 1);
        assert_eq!(diff.drifted[0].0.get("name"), Some(&Value::Text("Haste".into())));
        assert_eq!(diff.drifted[0].1.get("cost"), Some(&Value::Numeric("800".into())));
    }
}
