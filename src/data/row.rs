//! Table Rows
//!
//! Rows are typed records laid out by the column order of a schema snapshot.
//! Field access goes through the layout, so asking for an undeclared column
//! yields `None` instead of silently reading a stale name.

use std::collections::HashMap;
use std::sync::Arc;

use super::Value;
use crate::config::LookupTableConfig;
use crate::error::{Error, Result};

/// Separator between natural-key components
pub const KEY_DELIMITER: &str = "|";

/// Natural-key component rendered for an absent value
pub const NULL_KEY_TOKEN: &str = "NULL";

/// Declared column order of one table in one database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableLayout {
    table: String,
    columns: Vec<String>,
    positions: HashMap<String, usize>,
}

impl TableLayout {
    /// Create a layout from an ordered column list
    pub fn new(table: impl Into<String>, columns: Vec<String>) -> Self {
        let positions = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.clone(), i))
            .collect();
        Self {
            table: table.into(),
            columns,
            positions,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.positions.get(column).copied()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.positions.contains_key(column)
    }
}

/// One table row
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    layout: Arc<TableLayout>,
    values: Vec<Value>,
}

impl Row {
    /// Create a row, checking the value count against the layout
    pub fn new(layout: Arc<TableLayout>, values: Vec<Value>) -> Result<Self> {
        if values.len() != layout.columns.len() {
            return Err(Error::Internal(format!(
                "row for {} has {} values but {} columns",
                layout.table,
                values.len(),
                layout.columns.len()
            )));
        }
        Ok(Self { layout, values })
    }

    /// Lay out a JSON object by column name; absent fields read as NULL
    pub fn from_json_object(
        layout: Arc<TableLayout>,
        mut object: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        let values = layout
            .columns
            .iter()
            .map(|c| object.remove(c).map(Value::from_json).unwrap_or(Value::Null))
            .collect();
        Self { layout, values }
    }

    /// Value of a declared column
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.layout.position(column).map(|i| &self.values[i])
    }

    pub fn layout(&self) -> &Arc<TableLayout> {
        &self.layout
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// (column, value) pairs in declared order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.layout
            .columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

/// Build the natural-key string of a row
pub fn natural_key(table: &LookupTableConfig, row: &Row) -> String {
    table
        .key_fields
        .iter()
        .map(|field| match row.get(field) {
            Some(value) => value.key_part(),
            None => NULL_KEY_TOKEN.to_string(),
        })
        .collect::<Vec<_>>()
        .join(KEY_DELIMITER)
}

/// Rows of one table in one database, keyed by natural key
///
/// Iteration follows the order rows were read in.
#[derive(Debug, Clone, Default)]
pub struct RowSnapshot {
    entries: Vec<(String, Row)>,
    index: HashMap<String, usize>,
}

impl RowSnapshot {
    /// Key every row; the first row seen for a natural key wins
    pub fn build(table: &LookupTableConfig, rows: Vec<Row>) -> Self {
        let mut snapshot = Self::default();
        for row in rows {
            let key = natural_key(table, &row);
            if snapshot.index.contains_key(&key) {
                tracing::warn!(
                    "Duplicate natural key '{}' in {}; keeping the first row",
                    key,
                    table.name
                );
                continue;
            }
            snapshot.index.insert(key.clone(), snapshot.entries.len());
            snapshot.entries.push((key, row));
        }
        snapshot
    }

    pub fn get(&self, key: &str) -> Option<&Row> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Row)> {
        self.entries.iter().map(|(k, r)| (k.as_str(), r))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item_table() -> LookupTableConfig {
        LookupTableConfig {
            name: "item".into(),
            key_fields: vec!["name".into(), "type".into()],
            id_field: Some("id".into()),
            propagate_updates: false,
        }
    }

    fn layout() -> Arc<TableLayout> {
        Arc::new(TableLayout::new(
            "item",
            vec!["id".into(), "name".into(), "type".into(), "value".into()],
        ))
    }

    #[test]
    fn test_checked_field_access() {
        let row = Row::new(
            layout(),
            vec![
                Value::Int(42),
                Value::Text("Cloak of Resistance +1".into()),
                Value::Text("magic".into()),
                Value::Int(1000),
            ],
        )
        .unwrap();

        assert_eq!(row.get("id"), Some(&Value::Int(42)));
        assert_eq!(row.get("weight"), None);
        assert!(Row::new(layout(), vec![Value::Null]).is_err());
    }

    #[test]
    fn test_natural_key_with_null() {
        let row = Row::new(
            layout(),
            vec![
                Value::Int(1),
                Value::Text("Rope".into()),
                Value::Null,
                Value::Null,
            ],
        )
        .unwrap();

        assert_eq!(natural_key(&item_table(), &row), "Rope|NULL");
    }

    #[test]
    fn test_from_json_object_follows_layout() {
        let object = serde_json::json!({"type": "magic", "name": "Cloak", "id": 7, "extra": 1});
        let row = match object {
            serde_json::Value::Object(map) => Row::from_json_object(layout(), map),
            _ => unreachable!(),
        };

        assert_eq!(
            row.values(),
            &[
                Value::Int(7),
                Value::Text("Cloak".into()),
                Value::Text("magic".into()),
                Value::Null,
            ]
        );
    }

    #[test]
    fn test_snapshot_keeps_first_duplicate() {
        let rows = vec![
            Row::new(
                layout(),
                vec![Value::Int(1), Value::Text("Rope".into()), Value::Text("gear".into()), Value::Int(1)],
            )
            .unwrap(),
            Row::new(
                layout(),
                vec![Value::Int(2), Value::Text("Rope".into()), Value::Text("gear".into()), Value::Int(2)],
            )
            .unwrap(),
        ];

        let snapshot = RowSnapshot::build(&item_table(), rows);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get("Rope|gear").unwrap().get("id"), Some(&Value::Int(1)));
    }
}
