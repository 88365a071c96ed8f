//! Direct PostgreSQL backend over a sqlx pool.
//!
//! Rows come back through `row_to_json`, so every statement yields the same JSON row shape the
//! pg-meta backend returns.

use crate::domain::metadata::{user_schemas, Column, PrimaryKey, Relationship, Schema, Table};
use crate::domain::value::Row;
use crate::error::{EditorError, EditorResult};
use crate::storage::{MetadataSource, QueryExecutor};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row as _};

pub async fn connect(database_url: &str) -> anyhow::Result<PgPool> {
    Ok(PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?)
}

fn starts_with_keyword(sql: &str, keyword: &str) -> bool {
    sql.trim_start()
        .get(..keyword.len())
        .map(|head| head.eq_ignore_ascii_case(keyword))
        .unwrap_or(false)
}

/// Whether a `RETURNING` clause appears outside quoted literals and identifiers.
fn has_returning_clause(sql: &str) -> bool {
    let mut quote: Option<char> = None;
    let mut word = String::new();
    for c in sql.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '\'' || c == '"' => {
                quote = Some(c);
                word.clear();
            }
            None if c.is_ascii_alphanumeric() || c == '_' => word.push(c),
            None => {
                if word.eq_ignore_ascii_case("RETURNING") {
                    return true;
                }
                word.clear();
            }
        }
    }
    quote.is_none() && word.eq_ignore_ascii_case("RETURNING")
}

/// Wraps a statement so each result row arrives as one JSON object in a `record` column.
/// `None` for statements without a result set.
pub(crate) fn wrap_for_json(sql: &str) -> Option<String> {
    let sql = sql.trim().trim_end_matches(';');
    if starts_with_keyword(sql, "SELECT") || starts_with_keyword(sql, "WITH") {
        Some(format!("SELECT row_to_json(t) AS record FROM ({}) t", sql))
    } else if has_returning_clause(sql) {
        Some(format!("WITH t AS ({}) SELECT row_to_json(t) AS record FROM t", sql))
    } else {
        None
    }
}

#[derive(Clone)]
pub struct PgPoolExecutor {
    pool: PgPool,
}

impl PgPoolExecutor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl QueryExecutor for PgPoolExecutor {
    async fn execute(&self, sql: &str) -> EditorResult<Vec<Row>> {
        let Some(wrapped) = wrap_for_json(sql) else {
            sqlx::query(sql).execute(&self.pool).await?;
            return Ok(Vec::new());
        };
        let rows = sqlx::query(&wrapped).fetch_all(&self.pool).await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            match row.try_get::<JsonValue, _>("record")? {
                JsonValue::Object(map) => out.push(map),
                other => {
                    return Err(EditorError::Decode(format!(
                        "expected row object, got {}",
                        other
                    )))
                }
            }
        }
        Ok(out)
    }
}

/// Reads table metadata straight from the catalogs.
#[derive(Clone)]
pub struct PgCatalogDiscovery {
    pool: PgPool,
}

const TABLES_SQL: &str = "SELECT c.oid::int8 AS id, n.nspname AS schema, c.relname AS name
     FROM pg_class c
     JOIN pg_namespace n ON n.oid = c.relnamespace
     WHERE c.relkind IN ('r', 'p')";

impl PgCatalogDiscovery {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_table(&self, id: i64, schema: String, name: String) -> EditorResult<Table> {
        let col_rows = sqlx::query(
            "SELECT c.column_name, c.data_type, c.udt_name, c.is_nullable, c.column_default,
                    c.is_identity, c.is_generated, c.is_updatable, c.ordinal_position::int4 AS ordinal_position,
                    (SELECT array_agg(e.enumlabel::text ORDER BY e.enumsortorder)
                       FROM pg_enum e JOIN pg_type t ON t.oid = e.enumtypid
                      WHERE t.typname = c.udt_name) AS enums,
                    EXISTS (
                      SELECT 1
                      FROM information_schema.table_constraints tc
                      JOIN information_schema.key_column_usage kcu
                        ON tc.constraint_name = kcu.constraint_name
                       AND tc.table_schema = kcu.table_schema
                       AND tc.table_name = kcu.table_name
                      WHERE tc.constraint_type = 'UNIQUE'
                        AND tc.table_schema = c.table_schema
                        AND tc.table_name = c.table_name
                        AND kcu.column_name = c.column_name
                    ) AS is_unique
             FROM information_schema.columns c
             WHERE c.table_schema = $1 AND c.table_name = $2
             ORDER BY c.ordinal_position",
        )
        .bind(&schema)
        .bind(&name)
        .fetch_all(&self.pool)
        .await?;

        let mut columns = Vec::with_capacity(col_rows.len());
        for cr in col_rows {
            let yes = |field: &str| -> EditorResult<bool> {
                let v: String = cr.try_get(field)?;
                Ok(v.eq_ignore_ascii_case("YES") || v.eq_ignore_ascii_case("ALWAYS"))
            };
            columns.push(Column {
                name: cr.try_get("column_name")?,
                data_type: cr.try_get("data_type")?,
                format: cr.try_get("udt_name")?,
                is_nullable: yes("is_nullable")?,
                is_unique: cr.try_get("is_unique")?,
                is_identity: yes("is_identity")?,
                is_updatable: yes("is_updatable")?,
                is_generated: yes("is_generated")?,
                default_value: cr.try_get("column_default")?,
                enum_values: cr
                    .try_get::<Option<Vec<String>>, _>("enums")?
                    .unwrap_or_default(),
                ordinal_position: cr.try_get("ordinal_position")?,
            });
        }

        let pk_rows = sqlx::query(
            "SELECT kcu.column_name
             FROM information_schema.table_constraints tc
             JOIN information_schema.key_column_usage kcu
               ON tc.constraint_name = kcu.constraint_name
              AND tc.table_schema = kcu.table_schema
              AND tc.table_name = kcu.table_name
             WHERE tc.table_schema = $1
               AND tc.table_name = $2
               AND tc.constraint_type = 'PRIMARY KEY'
             ORDER BY kcu.ordinal_position",
        )
        .bind(&schema)
        .bind(&name)
        .fetch_all(&self.pool)
        .await?;
        let primary_keys = pk_rows
            .into_iter()
            .map(|r| r.try_get::<String, _>("column_name").map(|name| PrimaryKey { name }))
            .collect::<Result<Vec<_>, _>>()?;

        let fk_rows = sqlx::query(
            "SELECT kcu.column_name AS source_column,
                    ccu.table_schema AS target_schema,
                    ccu.table_name AS target_table,
                    ccu.column_name AS target_column
             FROM information_schema.table_constraints tc
             JOIN information_schema.key_column_usage kcu
               ON tc.constraint_name = kcu.constraint_name
              AND tc.table_schema = kcu.table_schema
             JOIN information_schema.constraint_column_usage ccu
               ON ccu.constraint_name = tc.constraint_name
              AND ccu.constraint_schema = tc.table_schema
             WHERE tc.constraint_type = 'FOREIGN KEY'
               AND tc.table_schema = $1
               AND tc.table_name = $2",
        )
        .bind(&schema)
        .bind(&name)
        .fetch_all(&self.pool)
        .await?;
        let mut relationships = Vec::with_capacity(fk_rows.len());
        for fr in fk_rows {
            relationships.push(Relationship {
                source_schema: schema.clone(),
                source_table: name.clone(),
                source_column: fr.try_get("source_column")?,
                target_schema: fr.try_get("target_schema")?,
                target_table: fr.try_get("target_table")?,
                target_column: fr.try_get("target_column")?,
            });
        }

        Ok(Table {
            id,
            schema,
            name,
            columns,
            primary_keys,
            relationships,
        })
    }
}

#[async_trait]
impl MetadataSource for PgCatalogDiscovery {
    async fn list_schemas(&self) -> EditorResult<Vec<Schema>> {
        let rows = sqlx::query("SELECT oid::int8 AS id, nspname AS name FROM pg_namespace ORDER BY nspname")
            .fetch_all(&self.pool)
            .await?;
        let schemas = rows
            .into_iter()
            .map(|r| {
                Ok(Schema {
                    id: r.try_get("id")?,
                    name: r.try_get("name")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;
        Ok(user_schemas(schemas))
    }

    async fn list_tables(&self, schema: &str) -> EditorResult<Vec<Table>> {
        let rows = sqlx::query(&format!("{} AND n.nspname = $1 ORDER BY c.relname", TABLES_SQL))
            .bind(schema)
            .fetch_all(&self.pool)
            .await?;
        let mut tables = Vec::with_capacity(rows.len());
        for r in rows {
            tables.push(
                self.load_table(r.try_get("id")?, r.try_get("schema")?, r.try_get("name")?)
                    .await?,
            );
        }
        Ok(tables)
    }

    async fn get_table(&self, id: i64) -> EditorResult<Table> {
        let row = sqlx::query(&format!("{} AND c.oid = $1::int8::oid", TABLES_SQL))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| EditorError::TableNotFound(id.to_string()))?;
        self.load_table(id, row.try_get("schema")?, row.try_get("name")?)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_are_wrapped_in_row_to_json() {
        assert_eq!(
            wrap_for_json("SELECT * FROM public.\"users\" LIMIT 1").as_deref(),
            Some("SELECT row_to_json(t) AS record FROM (SELECT * FROM public.\"users\" LIMIT 1) t")
        );
        assert_eq!(
            wrap_for_json("  select 1;").as_deref(),
            Some("SELECT row_to_json(t) AS record FROM (select 1) t")
        );
    }

    #[test]
    fn returning_statements_use_a_cte() {
        assert_eq!(
            wrap_for_json("INSERT INTO public.\"t\" DEFAULT VALUES RETURNING *").as_deref(),
            Some("WITH t AS (INSERT INTO public.\"t\" DEFAULT VALUES RETURNING *) SELECT row_to_json(t) AS record FROM t")
        );
    }

    #[test]
    fn plain_writes_are_not_wrapped() {
        assert_eq!(wrap_for_json("DELETE FROM public.\"t\" WHERE \"id\" = 1"), None);
        assert_eq!(wrap_for_json("UPDATE public.\"t\" SET \"a\" = 1 WHERE \"id\" = 2"), None);
    }

    #[test]
    fn returning_inside_literals_is_not_a_clause() {
        assert_eq!(
            wrap_for_json(
                "UPDATE public.\"notes\" SET \"body\" = 'free returning customers' WHERE \"id\" = 1"
            ),
            None
        );
        assert_eq!(
            wrap_for_json("DELETE FROM public.\"t\" WHERE \"note\" IN ('x returning *', 'it''s returning ')"),
            None
        );
        assert_eq!(
            wrap_for_json("UPDATE public.\"returning \" SET \"a\" = 1 WHERE \"id\" = 2"),
            None
        );
        assert!(wrap_for_json(
            "INSERT INTO public.\"notes\" (\"body\") VALUES ('returning') RETURNING *"
        )
        .is_some());
    }
}
