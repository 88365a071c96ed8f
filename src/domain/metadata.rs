//! Read-only table metadata snapshots, in the shape the metadata service returns them.

use crate::domain::value::{quote_ident, quote_schema};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;

/// Schema name prefixes that never show up in user-facing listings.
pub const SYSTEM_SCHEMA_PREFIXES: &[&str] = &["information_schema", "pg_catalog", "pg_toast"];

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, ToSchema)]
pub struct Schema {
    pub id: i64,
    pub name: String,
}

/// Drops system schemas from a discovery listing, keeping the original order.
pub fn user_schemas(schemas: Vec<Schema>) -> Vec<Schema> {
    schemas
        .into_iter()
        .filter(|s| {
            !SYSTEM_SCHEMA_PREFIXES
                .iter()
                .any(|prefix| s.name.starts_with(prefix))
        })
        .collect()
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, ToSchema)]
pub struct Column {
    pub name: String,
    /// Declared type as reported by the catalog (e.g. `integer`, `timestamp with time zone`).
    #[serde(default)]
    pub data_type: String,
    /// Short type name (e.g. `int4`, `timestamptz`, `jsonb`); drives all type decisions.
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub is_nullable: bool,
    #[serde(default)]
    pub is_unique: bool,
    #[serde(default)]
    pub is_identity: bool,
    #[serde(default = "default_true")]
    pub is_updatable: bool,
    #[serde(default)]
    pub is_generated: bool,
    /// Raw default expression, e.g. `gen_random_uuid()` or `'draft'::text`.
    #[serde(default, deserialize_with = "default_expr")]
    pub default_value: Option<String>,
    #[serde(default, rename = "enums", skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<String>,
    #[serde(default)]
    pub ordinal_position: i32,
}

fn default_true() -> bool {
    true
}

// pg-meta reports some defaults as JSON numbers/booleans rather than text.
fn default_expr<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<JsonValue> = Option::deserialize(deserializer)?;
    Ok(match raw {
        None | Some(JsonValue::Null) => None,
        Some(JsonValue::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

impl Column {
    /// Convenience constructor used by tests and fixtures; flags default to a plain nullable column.
    pub fn new(name: &str, format: &str) -> Self {
        Self {
            name: name.to_string(),
            data_type: format.to_string(),
            format: format.to_string(),
            is_nullable: true,
            is_unique: false,
            is_identity: false,
            is_updatable: true,
            is_generated: false,
            default_value: None,
            enum_values: Vec::new(),
            ordinal_position: 0,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.is_nullable = false;
        self
    }

    pub fn identity(mut self) -> Self {
        self.is_identity = true;
        self.is_nullable = false;
        self
    }

    pub fn with_default(mut self, expr: &str) -> Self {
        self.default_value = Some(expr.to_string());
        self
    }

    pub fn with_enums(mut self, values: &[&str]) -> Self {
        self.enum_values = values.iter().map(|v| v.to_string()).collect();
        self
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, ToSchema)]
pub struct PrimaryKey {
    pub name: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, ToSchema)]
pub struct Relationship {
    pub source_schema: String,
    #[serde(rename = "source_table_name")]
    pub source_table: String,
    #[serde(rename = "source_column_name")]
    pub source_column: String,
    #[serde(rename = "target_table_schema")]
    pub target_schema: String,
    #[serde(rename = "target_table_name")]
    pub target_table: String,
    #[serde(rename = "target_column_name")]
    pub target_column: String,
}

/// A table snapshot. Never mutated once handed to the editor.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, ToSchema)]
pub struct Table {
    pub id: i64,
    pub schema: String,
    pub name: String,
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default)]
    pub primary_keys: Vec<PrimaryKey>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

impl Table {
    pub fn new(id: i64, schema: &str, name: &str, columns: Vec<Column>) -> Self {
        Self {
            id,
            schema: schema.to_string(),
            name: name.to_string(),
            columns,
            primary_keys: Vec::new(),
            relationships: Vec::new(),
        }
    }

    pub fn with_primary_key(mut self, column: &str) -> Self {
        self.primary_keys.push(PrimaryKey {
            name: column.to_string(),
        });
        self
    }

    /// First primary key column. Composite keys are addressed by this column only.
    pub fn primary_key(&self) -> Option<&str> {
        self.primary_keys.first().map(|pk| pk.name.as_str())
    }

    pub fn has_composite_key(&self) -> bool {
        self.primary_keys.len() > 1
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn is_foreign_key(&self, column: &str) -> bool {
        self.relationships.iter().any(|rel| {
            rel.source_schema == self.schema
                && rel.source_table == self.name
                && rel.source_column == column
        })
    }

    /// `schema."table"` as used in FROM / INTO clauses.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", quote_schema(&self.schema), quote_ident(&self.name))
    }

    /// `schema.table` without quoting, for log lines and error messages.
    pub fn display_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }
}
