//! Row Data Module
//!
//! Typed values, table-layout-checked rows and the natural-key differ used
//! to compare table contents across independently numbered databases.

pub mod value;
pub mod row;
mod diff;

pub use value::Value;
pub use row::{natural_key, Row, RowSnapshot, TableLayout, NULL_KEY_TOKEN, KEY_DELIMITER};
pub use diff::{diff_rows, is_key_or_identity, rows_identical, DataDiff};
