//! Dynamically-typed row values.
//!
//! [`Row`] is the transient record passed between parsers, writers, and the
//! import/export orchestrators. Values are a closed tagged union rather than
//! an open `Any`-style map, so every consumer can match exhaustively.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single row of data with named fields.
///
/// Rows exist only inside the import/export pipeline; they are projected
/// into `Example` input/expected-output maps before anything persists.
pub type Row = BTreeMap<String, Value>;

/// A dynamically-typed field value.
///
/// Scalar variants cover what delimited-text inference can produce;
/// `List`/`Map` carry the nested structures JSON-origin rows may contain.
///
/// The `untagged` serde representation makes a `Row` serialize to (and
/// deserialize from) a plain JSON object, which is what the JSON codecs and
/// the sqlite backend's JSON columns store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Absent or JSON null.
    Null,
    /// Boolean.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit float.
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// Ordered list of values.
    List(Vec<Value>),
    /// Nested object.
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Infers the most specific scalar type for a piece of delimited text.
    ///
    /// The order is fixed: integer, then float, then boolean, then string.
    /// `"0"` and `"1"` therefore infer as integers, never booleans, and
    /// `"true"`/`"false"` become booleans only after both numeric parses
    /// fail.
    #[must_use]
    pub fn infer(text: &str) -> Self {
        if let Ok(i) = text.parse::<i64>() {
            return Self::Int(i);
        }
        if let Ok(f) = text.parse::<f64>() {
            return Self::Float(f);
        }
        if let Ok(b) = text.parse::<bool>() {
            return Self::Bool(b);
        }
        Self::String(text.to_string())
    }

    /// Renders the value as a single delimited-text cell.
    ///
    /// Nulls become empty cells; nested structures are rendered as compact
    /// JSON so they survive a round trip as strings.
    #[must_use]
    pub fn render_cell(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::String(s) => s.clone(),
            Self::List(_) | Self::Map(_) => {
                serde_json::to_string(self).unwrap_or_default()
            },
        }
    }

    /// Returns the string contents if this is a `String` value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer contents if this is an `Int` value.
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns `true` for [`Value::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_integers_before_booleans() {
        assert_eq!(Value::infer("0"), Value::Int(0));
        assert_eq!(Value::infer("1"), Value::Int(1));
        assert_eq!(Value::infer("-42"), Value::Int(-42));
    }

    #[test]
    fn test_infer_floats_after_integers() {
        assert_eq!(Value::infer("3.5"), Value::Float(3.5));
        assert_eq!(Value::infer("1e3"), Value::Float(1000.0));
        // An integral literal stays an integer.
        assert_eq!(Value::infer("7"), Value::Int(7));
    }

    #[test]
    fn test_infer_booleans_after_numerics() {
        assert_eq!(Value::infer("true"), Value::Bool(true));
        assert_eq!(Value::infer("false"), Value::Bool(false));
    }

    #[test]
    fn test_infer_falls_back_to_string() {
        assert_eq!(Value::infer("hello"), Value::String("hello".to_string()));
        assert_eq!(Value::infer(""), Value::String(String::new()));
        assert_eq!(Value::infer("True"), Value::String("True".to_string()));
    }

    #[test]
    fn test_render_cell() {
        assert_eq!(Value::Null.render_cell(), "");
        assert_eq!(Value::Int(5).render_cell(), "5");
        assert_eq!(Value::Bool(true).render_cell(), "true");
        assert_eq!(Value::from("x").render_cell(), "x");
        assert_eq!(
            Value::List(vec![Value::Int(1), Value::Int(2)]).render_cell(),
            "[1,2]"
        );
    }

    #[test]
    fn test_row_serde_round_trip() {
        let json = r#"{"a": 1, "b": 2.5, "c": true, "d": "text", "e": null, "f": [1, "x"], "g": {"nested": 1}}"#;
        let row: Row = serde_json::from_str(json).unwrap();

        assert_eq!(row["a"], Value::Int(1));
        assert_eq!(row["b"], Value::Float(2.5));
        assert_eq!(row["c"], Value::Bool(true));
        assert_eq!(row["d"], Value::String("text".to_string()));
        assert_eq!(row["e"], Value::Null);
        assert_eq!(row["f"], Value::List(vec![Value::Int(1), Value::from("x")]));

        let back = serde_json::to_string(&row).unwrap();
        let reparsed: Row = serde_json::from_str(&back).unwrap();
        assert_eq!(row, reparsed);
    }
}
