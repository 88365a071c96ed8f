//! Default row synthesis for "insert row" from column metadata alone.

use crate::domain::metadata::{Column, Table};
use crate::domain::value::{SqlValue, ValueMap};
use chrono::{DateTime, SecondsFormat, Utc};

const TIMESTAMP_FORMATS: &[&str] = &["timestamp", "timestamptz"];
const INTEGER_FORMATS: &[&str] = &["int", "int2", "int4", "int8", "smallint", "integer", "bigint"];
const BOOLEAN_FORMATS: &[&str] = &["bool", "boolean"];

/// ISO-8601 instant as sent for timestamp columns, e.g. `2024-01-02T03:04:05.000Z`.
pub fn iso_timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// True for defaults the database evaluates itself: `gen_random_uuid()`, `now()`,
/// `nextval('t_id_seq'::regclass)`.
pub fn is_function_default(expr: &str) -> bool {
    let expr = expr.trim();
    if expr.ends_with("()") {
        return true;
    }
    let Some(open) = expr.find('(') else {
        return false;
    };
    let name = &expr[..open];
    !name.is_empty()
        && expr.ends_with(')')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        && name
            .chars()
            .next()
            .map(|c| c.is_ascii_alphabetic() || c == '_')
            .unwrap_or(false)
}

fn default_for(table: &Table, column: &Column, now: DateTime<Utc>) -> Option<SqlValue> {
    if column.is_identity || column.is_generated {
        return None;
    }
    if let Some(expr) = column.default_value.as_deref() {
        if is_function_default(expr) {
            return None;
        }
        if expr.trim().eq_ignore_ascii_case("CURRENT_TIMESTAMP") {
            return Some(SqlValue::Text(iso_timestamp(now)));
        }
        return Some(SqlValue::Text(expr.to_string()));
    }
    if column.is_nullable {
        return Some(SqlValue::Null);
    }

    // Required with no default. Foreign keys are left for the database to reject.
    if table.is_foreign_key(&column.name) {
        return None;
    }
    let format = column.format.as_str();
    let value = if TIMESTAMP_FORMATS.contains(&format) {
        SqlValue::Text(iso_timestamp(now))
    } else if INTEGER_FORMATS.contains(&format) {
        SqlValue::int(0)
    } else if BOOLEAN_FORMATS.contains(&format) {
        SqlValue::Bool(false)
    } else if let Some(first) = column.enum_values.first() {
        SqlValue::Text(first.clone())
    } else {
        SqlValue::text("")
    };
    Some(value)
}

/// One value per insertable column, in column order. Columns the database fills in are omitted.
pub fn synthesize_default_row(table: &Table, now: DateTime<Utc>) -> ValueMap {
    let mut row = ValueMap::new();
    for column in &table.columns {
        if let Some(value) = default_for(table, column, now) {
            row.insert(column.name.clone(), value);
        }
    }
    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::metadata::Relationship;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap()
    }

    #[test]
    fn users_table_default_row() {
        let table = Table::new(
            1,
            "public",
            "users",
            vec![
                Column::new("id", "int4").identity(),
                Column::new("email", "text").not_null(),
                Column::new("created_at", "timestamptz").with_default("CURRENT_TIMESTAMP"),
            ],
        )
        .with_primary_key("id");

        let row = synthesize_default_row(&table, now());
        assert_eq!(row.columns().collect::<Vec<_>>(), vec!["email", "created_at"]);
        assert_eq!(row.get("email"), Some(&SqlValue::text("")));
        assert_eq!(
            row.get("created_at"),
            Some(&SqlValue::text("2024-03-01T12:30:00.000Z"))
        );
    }

    #[test]
    fn decision_order_per_column() {
        let mut table = Table::new(
            1,
            "public",
            "orders",
            vec![
                Column::new("uid", "uuid").not_null().with_default("gen_random_uuid()"),
                Column::new("seq", "int8").not_null().with_default("nextval('orders_seq_seq'::regclass)"),
                Column::new("status", "text").not_null().with_default("'draft'::text"),
                Column::new("created", "timestamptz").with_default("current_timestamp"),
                Column::new("note", "text"),
                Column::new("user_id", "uuid").not_null(),
                Column::new("placed_at", "timestamp").not_null(),
                Column::new("qty", "int2").not_null(),
                Column::new("paid", "bool").not_null(),
                Column::new("kind", "order_kind").not_null().with_enums(&["retail", "wholesale"]),
                Column::new("label", "varchar").not_null(),
            ],
        );
        table.relationships.push(Relationship {
            source_schema: "public".into(),
            source_table: "orders".into(),
            source_column: "user_id".into(),
            target_schema: "public".into(),
            target_table: "users".into(),
            target_column: "id".into(),
        });

        let row = synthesize_default_row(&table, now());
        assert!(!row.contains("uid"));
        assert!(!row.contains("seq"));
        assert!(!row.contains("user_id"));
        assert_eq!(row.get("status"), Some(&SqlValue::text("'draft'::text")));
        assert_eq!(row.get("created"), Some(&SqlValue::text("2024-03-01T12:30:00.000Z")));
        assert_eq!(row.get("note"), Some(&SqlValue::Null));
        assert_eq!(row.get("placed_at"), Some(&SqlValue::text("2024-03-01T12:30:00.000Z")));
        assert_eq!(row.get("qty"), Some(&SqlValue::int(0)));
        assert_eq!(row.get("paid"), Some(&SqlValue::Bool(false)));
        assert_eq!(row.get("kind"), Some(&SqlValue::text("retail")));
        assert_eq!(row.get("label"), Some(&SqlValue::text("")));
    }

    #[test]
    fn nullable_foreign_key_gets_null() {
        let mut table = Table::new(1, "public", "posts", vec![Column::new("author_id", "int8")]);
        table.relationships.push(Relationship {
            source_schema: "public".into(),
            source_table: "posts".into(),
            source_column: "author_id".into(),
            target_schema: "public".into(),
            target_table: "users".into(),
            target_column: "id".into(),
        });
        let row = synthesize_default_row(&table, now());
        assert_eq!(row.get("author_id"), Some(&SqlValue::Null));
    }

    #[test]
    fn function_default_detection() {
        assert!(is_function_default("now()"));
        assert!(is_function_default(" gen_random_uuid() "));
        assert!(is_function_default("nextval('x_id_seq'::regclass)"));
        assert!(is_function_default("extensions.uuid_generate_v4()"));
        assert!(!is_function_default("'(draft)'::text"));
        assert!(!is_function_default("0"));
        assert!(!is_function_default("CURRENT_TIMESTAMP"));
    }
}
