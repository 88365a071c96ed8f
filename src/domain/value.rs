//! SQL values and the literal codec.
//!
//! Every literal and identifier that ends up in generated SQL is rendered here.
//! Nothing else in the crate quotes or escapes by hand.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value as JsonValue};

/// One result row: column name -> value, in the order the database returned the columns.
pub type Row = Map<String, JsonValue>;

/// A column value as the editor moves it around.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "JsonValue", into = "JsonValue")]
pub enum SqlValue {
    Null,
    Bool(bool),
    Number(Number),
    Text(String),
    /// Structured value (object or array); rendered as a jsonb literal.
    Json(JsonValue),
}

impl SqlValue {
    pub fn text(s: impl Into<String>) -> Self {
        SqlValue::Text(s.into())
    }

    pub fn int(n: i64) -> Self {
        SqlValue::Number(Number::from(n))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }
}

impl From<JsonValue> for SqlValue {
    fn from(v: JsonValue) -> Self {
        match v {
            JsonValue::Null => SqlValue::Null,
            JsonValue::Bool(b) => SqlValue::Bool(b),
            JsonValue::Number(n) => SqlValue::Number(n),
            JsonValue::String(s) => SqlValue::Text(s),
            structured @ (JsonValue::Array(_) | JsonValue::Object(_)) => SqlValue::Json(structured),
        }
    }
}

impl From<SqlValue> for JsonValue {
    fn from(v: SqlValue) -> Self {
        match v {
            SqlValue::Null => JsonValue::Null,
            SqlValue::Bool(b) => JsonValue::Bool(b),
            SqlValue::Number(n) => JsonValue::Number(n),
            SqlValue::Text(s) => JsonValue::String(s),
            SqlValue::Json(j) => j,
        }
    }
}

impl From<&str> for SqlValue {
    fn from(s: &str) -> Self {
        SqlValue::Text(s.to_string())
    }
}

impl From<bool> for SqlValue {
    fn from(b: bool) -> Self {
        SqlValue::Bool(b)
    }
}

impl From<i64> for SqlValue {
    fn from(n: i64) -> Self {
        SqlValue::int(n)
    }
}

/// Column name -> value, iterated in insertion order.
///
/// Insert statements list columns in exactly this order, so it must never be re-sorted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Map<String, JsonValue>", into = "Map<String, JsonValue>")]
pub struct ValueMap {
    entries: Vec<(String, SqlValue)>,
}

impl ValueMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `column`, replacing an existing entry in place.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<SqlValue>) {
        let column = column.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(c, _)| *c == column) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.entries
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(c, _)| c.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.entries.iter().map(|(c, v)| (c.as_str(), v))
    }
}

impl From<Map<String, JsonValue>> for ValueMap {
    fn from(map: Map<String, JsonValue>) -> Self {
        Self {
            entries: map.into_iter().map(|(k, v)| (k, SqlValue::from(v))).collect(),
        }
    }
}

impl From<ValueMap> for Map<String, JsonValue> {
    fn from(map: ValueMap) -> Self {
        map.entries
            .into_iter()
            .map(|(k, v)| (k, JsonValue::from(v)))
            .collect()
    }
}

impl<K: Into<String>, V: Into<SqlValue>> FromIterator<(K, V)> for ValueMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = ValueMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

/// Renders a value as SQL literal text.
///
/// `format_hint` is the column format when known; a `json` column gets a `::json` cast instead of
/// the default `::jsonb`.
pub fn encode_literal(value: &SqlValue, format_hint: Option<&str>) -> String {
    match value {
        SqlValue::Null => "NULL".to_string(),
        SqlValue::Bool(b) => b.to_string(),
        SqlValue::Number(n) => n.to_string(),
        SqlValue::Json(j) => {
            let cast = match format_hint {
                Some("json") => "json",
                _ => "jsonb",
            };
            // serde_json output for a JsonValue is infallible
            format!("{}::{}", quote_text(&j.to_string()), cast)
        }
        SqlValue::Text(s) => quote_text(s),
    }
}

/// Same rules as [`encode_literal`], for the right-hand side of `SET col = ...`.
pub fn encode_for_set(value: &SqlValue) -> String {
    encode_literal(value, None)
}

/// Single-quoted string literal with embedded quotes doubled.
pub fn quote_text(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Double-quoted identifier with embedded double quotes doubled.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Schema names are left bare when they are plain lowercase identifiers (`public`).
pub fn quote_schema(schema: &str) -> String {
    if is_plain_ident(schema) {
        schema.to_string()
    } else {
        quote_ident(schema)
    }
}

fn is_plain_ident(ident: &str) -> bool {
    let mut chars = ident.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalars() {
        assert_eq!(encode_literal(&SqlValue::Null, None), "NULL");
        assert_eq!(encode_literal(&SqlValue::Bool(true), None), "true");
        assert_eq!(encode_literal(&SqlValue::Bool(false), None), "false");
        assert_eq!(encode_literal(&SqlValue::int(-42), None), "-42");
        assert_eq!(encode_literal(&SqlValue::from(json!(1.5)), None), "1.5");
        assert_eq!(encode_literal(&SqlValue::text("abc"), None), "'abc'");
    }

    #[test]
    fn quotes_are_doubled() {
        assert_eq!(encode_literal(&SqlValue::text("O'Brien"), None), "'O''Brien'");
        assert_eq!(
            encode_literal(&SqlValue::text("'; DROP TABLE users; --"), None),
            "'''; DROP TABLE users; --'"
        );
    }

    #[test]
    fn escaped_literal_reads_back_to_original() {
        // Undo Postgres string-literal escaping and compare.
        for original in ["it's", "''", "a'b'c", "no quotes", "trailing'"] {
            let lit = encode_literal(&SqlValue::text(original), None);
            let inner = &lit[1..lit.len() - 1];
            assert!(!inner.replace("''", "").contains('\''));
            assert_eq!(inner.replace("''", "'"), original);
        }
    }

    #[test]
    fn structured_values_get_json_cast() {
        let v = SqlValue::from(json!({"name": "it's", "tags": [1, 2]}));
        assert_eq!(
            encode_literal(&v, None),
            r#"'{"name":"it''s","tags":[1,2]}'::jsonb"#
        );
        assert_eq!(encode_literal(&SqlValue::from(json!([1])), Some("json")), "'[1]'::json");
        assert_eq!(encode_for_set(&SqlValue::from(json!([]))), "'[]'::jsonb");
    }

    #[test]
    fn identifiers() {
        assert_eq!(quote_ident("email"), "\"email\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(quote_schema("public"), "public");
        assert_eq!(quote_schema("Sales"), "\"Sales\"");
        assert_eq!(quote_schema("my-schema"), "\"my-schema\"");
    }

    #[test]
    fn value_map_keeps_insertion_order_and_replaces_in_place() {
        let mut map = ValueMap::new();
        map.insert("zeta", 1i64);
        map.insert("alpha", "a");
        map.insert("zeta", 2i64);
        assert_eq!(map.columns().collect::<Vec<_>>(), vec!["zeta", "alpha"]);
        assert_eq!(map.get("zeta"), Some(&SqlValue::int(2)));

        let parsed: ValueMap = serde_json::from_str(r#"{"b": null, "a": {"x": 1}}"#).unwrap();
        assert_eq!(parsed.columns().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(parsed.get("a"), Some(&SqlValue::Json(json!({"x": 1}))));
    }
}
