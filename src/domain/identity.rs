//! Ephemeral per-row keys for selection state.
//!
//! These keys can collide (32-bit space) and are never sent back to the database.

use crate::domain::value::Row;
use serde_json::Value as JsonValue;

/// `h = h * 31 + unit` over UTF-16 code units, wrapping at 32 bits.
pub fn rolling_hash(s: &str) -> i32 {
    s.encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(i32::from(unit)))
}

/// Identity of `row`, preferring the primary key value when there is one.
pub fn identity_of(row: &Row, primary_key: Option<&str>) -> i32 {
    match primary_key.and_then(|pk| row.get(pk)) {
        Some(JsonValue::Number(n)) => match n.as_i64().and_then(|v| i32::try_from(v).ok()) {
            Some(v) => v,
            None => rolling_hash(&n.to_string()),
        },
        Some(JsonValue::String(s)) => rolling_hash(s),
        Some(JsonValue::Null) | None => rolling_hash(&JsonValue::Object(row.clone()).to_string()),
        Some(other) => rolling_hash(&other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(v: JsonValue) -> Row {
        match v {
            JsonValue::Object(m) => m,
            _ => unreachable!(),
        }
    }

    #[test]
    fn hash_matches_reference_values() {
        assert_eq!(rolling_hash(""), 0);
        assert_eq!(rolling_hash("a"), 97);
        assert_eq!(rolling_hash("ab"), 97 * 31 + 98);
        // same value as the classic 31-multiplier string hash
        assert_eq!(rolling_hash("hello"), 99_162_322);
        // wraps instead of overflowing
        let _ = rolling_hash(&"x".repeat(10_000));
    }

    #[test]
    fn numeric_primary_key_is_used_directly() {
        let r = row(json!({"id": 42, "name": "a"}));
        assert_eq!(identity_of(&r, Some("id")), 42);
        let big = row(json!({"id": 9_000_000_000i64}));
        assert_eq!(identity_of(&big, Some("id")), rolling_hash("9000000000"));
    }

    #[test]
    fn text_primary_key_is_hashed() {
        let r = row(json!({"id": "8f14e45f-ceea-467f-a0e6-0a2f7bd7a7b1"}));
        assert_eq!(
            identity_of(&r, Some("id")),
            rolling_hash("8f14e45f-ceea-467f-a0e6-0a2f7bd7a7b1")
        );
    }

    #[test]
    fn falls_back_to_whole_row() {
        let r = row(json!({"a": 1, "b": "x"}));
        assert_eq!(identity_of(&r, None), rolling_hash(r#"{"a":1,"b":"x"}"#));
        assert_eq!(identity_of(&r, Some("missing")), identity_of(&r, None));
    }

    #[test]
    fn deterministic() {
        let r = row(json!({"email": "a@b.c", "meta": {"k": [1, 2]}}));
        assert_eq!(identity_of(&r, None), identity_of(&r.clone(), None));
    }
}
