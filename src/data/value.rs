//! SQL Value Types
//!
//! Values read from a table row, rendered back to SQL literals and compared
//! with numeric tolerance.

use serde::{Deserialize, Serialize};

use crate::config::ComparisonConfig;

/// SQL value representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    /// Non-integral or out-of-range number, kept as its exact decimal text
    Numeric(String),
    Text(String),
    Array(Vec<Value>),
    Json(serde_json::Value),
}

impl Value {
    /// Convert to SQL literal
    pub fn to_sql(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Numeric(n) if is_decimal(n) => n.clone(),
            Value::Numeric(n) => quote_literal(n),
            Value::Text(s) => quote_literal(s),
            Value::Array(items) if items.is_empty() => "'{}'".to_string(),
            Value::Array(items) => {
                let elements: Vec<String> = items.iter().map(|v| v.to_sql()).collect();
                format!("ARRAY[{}]", elements.join(", "))
            }
            Value::Json(j) => quote_literal(&j.to_string()),
        }
    }

    /// Check if value is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Integer view of the value, used for surrogate identities
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Numeric(n) => match n.parse::<f64>() {
                Ok(f) if f.fract() == 0.0 && f.is_finite() => Some(f as i64),
                _ => None,
            },
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Numeric(n) => n.parse().ok(),
            _ => None,
        }
    }

    /// Decode a JSON document as produced by `to_jsonb`
    pub fn from_json(json: serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            // arbitrary_precision keeps the text exactly as postgres wrote it
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Numeric(n.to_string()),
            },
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from_json).collect())
            }
            object @ serde_json::Value::Object(_) => Value::Json(object),
        }
    }

    /// Deterministic, type-tagged rendering used to group equal rows
    ///
    /// Integral numerics render like integers and others are rounded to six
    /// decimals, so values that only differ by display formatting share one
    /// canonical form.
    pub fn canonical(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Numeric(n) => match n.parse::<f64>() {
                Ok(f) => canonical_float(f),
                Err(_) => n.clone(),
            },
            Value::Text(s) => serde_json::Value::String(s.clone()).to_string(),
            Value::Array(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.canonical()).collect();
                format!("[{}]", parts.join(","))
            }
            Value::Json(j) => j.to_string(),
        }
    }

    /// Rendering of one natural-key component
    pub fn key_part(&self) -> String {
        match self {
            Value::Null => super::NULL_KEY_TOKEN.to_string(),
            Value::Text(s) => s.clone(),
            other => other.canonical(),
        }
    }

    /// Equality with absolute/relative tolerance for numeric values
    pub fn approx_eq(&self, other: &Value, tolerance: &ComparisonConfig) -> bool {
        if let (Some(a), Some(b)) = (self.as_f64(), other.as_f64()) {
            if a == b {
                return true;
            }
            let diff = (a - b).abs();
            return diff <= tolerance.absolute_epsilon
                || diff <= tolerance.relative_epsilon * a.abs().max(b.abs());
        }

        match (self, other) {
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.approx_eq(y, tolerance))
            }
            _ => self == other,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Text(s) => write!(f, "{}", s),
            Value::Array(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "ARRAY[{}]", parts.join(", "))
            }
            other => write!(f, "{}", other.to_sql()),
        }
    }
}

/// Single-quote a string literal, doubling embedded quotes
pub fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn is_decimal(s: &str) -> bool {
    s.parse::<f64>().map_or(false, f64::is_finite)
}

fn canonical_float(f: f64) -> String {
    if !f.is_finite() {
        return f.to_string();
    }
    if f.fract() == 0.0 && f.abs() < 1e15 {
        return format!("{}", f as i64);
    }
    let rendered = format!("{:.6}", f);
    let trimmed = rendered.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_sql_literals() {
        assert_eq!(Value::Null.to_sql(), "NULL");
        assert_eq!(Value::Bool(true).to_sql(), "TRUE");
        assert_eq!(Value::Text("Zombie's Hand".into()).to_sql(), "'Zombie''s Hand'");
        assert_eq!(
            Value::Array(vec![Value::Int(3), Value::Int(17)]).to_sql(),
            "ARRAY[3, 17]"
        );
        assert_eq!(Value::Array(vec![]).to_sql(), "'{}'");
        assert_eq!(
            Value::Json(serde_json::json!({"note": "it's"})).to_sql(),
            r#"'{"note":"it''s"}'"#
        );
    }

    #[test]
    fn test_from_json() {
        let json = serde_json::json!([1, 2.5, "x", null, {"a": 1}]);
        let value = Value::from_json(json);
        assert_eq!(
            value,
            Value::Array(vec![
                Value::Int(1),
                Value::Numeric("2.5".into()),
                Value::Text("x".into()),
                Value::Null,
                Value::Json(serde_json::json!({"a": 1})),
            ])
        );
    }

    #[test]
    fn test_numeric_keeps_exact_text() {
        let json: serde_json::Value = serde_json::from_str("[12345678901.123456789, 123456789012345678901234]").unwrap();
        let value = Value::from_json(json);
        assert_eq!(
            value,
            Value::Array(vec![
                Value::Numeric("12345678901.123456789".into()),
                Value::Numeric("123456789012345678901234".into()),
            ])
        );
        assert_eq!(value.to_sql(), "ARRAY[12345678901.123456789, 123456789012345678901234]");
        assert_eq!(Value::Numeric("1; DROP TABLE item".into()).to_sql(), "'1; DROP TABLE item'");
    }

    #[test]
    fn test_numeric_tolerance() {
        let tolerance = ComparisonConfig::default();
        assert!(Value::Numeric("0.30000000000000004".into()).approx_eq(&Value::Numeric("0.3".into()), &tolerance));
        assert!(Value::Int(1500).approx_eq(&Value::Numeric("1500.0".into()), &tolerance));
        assert!(Value::Numeric("1000000.0".into()).approx_eq(&Value::Numeric("1000000.5".into()), &tolerance));
        assert!(!Value::Numeric("2.5".into()).approx_eq(&Value::Numeric("2.6".into()), &tolerance));
        assert!(!Value::Int(1).approx_eq(&Value::Text("1".into()), &tolerance));
    }

    #[test]
    fn test_canonical_forms() {
        assert_eq!(Value::Numeric("5.0".into()).canonical(), Value::Int(5).canonical());
        assert_eq!(Value::Numeric("2.5000000001".into()).canonical(), "2.5");
        assert_ne!(Value::Text("NULL".into()).canonical(), Value::Null.canonical());
        assert_eq!(Value::Null.key_part(), "NULL");
        assert_eq!(Value::Text("Cloak".into()).key_part(), "Cloak");
    }

    #[test]
    fn test_as_i64() {
        assert_eq!(Value::Int(17).as_i64(), Some(17));
        assert_eq!(Value::Numeric("17.0".into()).as_i64(), Some(17));
        assert_eq!(Value::Text(" 42 ".into()).as_i64(), Some(42));
        assert_eq!(Value::Null.as_i64(), None);
    }
}
