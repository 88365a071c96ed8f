//! The table editor service.
//!
//! This module sits between callers (HTTP handlers, tests) and the SQL executor.
//! It is responsible for:
//! 1.  Building SELECT/COUNT statements for a page of rows and running them concurrently.
//! 2.  Attaching a row identity to every returned row.
//! 3.  Building and running INSERT/UPDATE/DELETE statements, once each, never retried.
//! 4.  Applying the read timeout/retry policy.

use crate::app::generation::{Generation, GenerationTracker, RequestSignature};
use crate::domain::defaults::synthesize_default_row;
use crate::domain::filter::Filter;
use crate::domain::identity::identity_of;
use crate::domain::metadata::{Schema, Table};
use crate::domain::query::{
    build_count, build_delete, build_insert, build_select, build_update, DeleteStatement,
    QueryOptions,
};
use crate::domain::value::{Row, SqlValue, ValueMap};
use crate::error::{EditorError, EditorResult};
use crate::infra::config::EditorConfig;
use crate::storage::{MetadataSource, QueryExecutor};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;
use utoipa::ToSchema;

#[derive(Serialize, Debug, Clone, PartialEq, ToSchema)]
pub struct IdentifiedRow {
    /// Selection key; not a database identifier.
    pub key: i32,
    #[schema(value_type = Object)]
    pub row: Row,
}

/// One page of rows plus the total matching the same filters.
#[derive(Serialize, Debug, Clone, PartialEq, ToSchema)]
pub struct RowsPage {
    pub rows: Vec<IdentifiedRow>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

impl RowsPage {
    pub fn find_by_identity(&self, key: i32) -> Option<&Row> {
        self.rows.iter().find(|r| r.key == key).map(|r| &r.row)
    }

    /// Primary-key values of the rows whose identity is in `keys`, in row order.
    /// Rows without a usable key value are skipped.
    pub fn primary_key_values(&self, primary_key: &str, keys: &[i32]) -> Vec<SqlValue> {
        self.rows
            .iter()
            .filter(|r| keys.contains(&r.key))
            .filter_map(|r| r.row.get(primary_key))
            .filter(|v| !v.is_null())
            .map(|v| SqlValue::from(v.clone()))
            .collect()
    }
}

/// Reads the `count` column, which arrives as a number or as numeric text depending on the backend.
fn parse_count(rows: &[Row]) -> EditorResult<u64> {
    let Some(value) = rows.first().and_then(|r| r.get("count")) else {
        return Ok(0);
    };
    match value {
        JsonValue::Number(n) => n
            .as_u64()
            .ok_or_else(|| EditorError::Decode(format!("invalid count {}", n))),
        JsonValue::String(s) => s
            .trim()
            .parse::<u64>()
            .map_err(|_| EditorError::Decode(format!("invalid count '{}'", s))),
        other => Err(EditorError::Decode(format!("invalid count {}", other))),
    }
}

fn check_columns<'a>(
    table: &Table,
    columns: impl IntoIterator<Item = &'a str>,
) -> EditorResult<()> {
    // Tables with no column metadata can't be checked; let the database decide.
    if table.columns.is_empty() {
        return Ok(());
    }
    for column in columns {
        if table.column(column).is_none() {
            return Err(EditorError::UnknownColumn {
                table: table.display_name(),
                column: column.to_string(),
            });
        }
    }
    Ok(())
}

fn warn_composite_key(table: &Table) {
    if table.has_composite_key() {
        tracing::warn!(
            table = %table.display_name(),
            key_columns = table.primary_keys.len(),
            "composite primary key: rows are addressed by the first key column only"
        );
    }
}

pub struct TableEditorService {
    executor: Arc<dyn QueryExecutor>,
    metadata: Arc<dyn MetadataSource>,
    config: EditorConfig,
}

impl TableEditorService {
    pub fn new(
        executor: Arc<dyn QueryExecutor>,
        metadata: Arc<dyn MetadataSource>,
        config: EditorConfig,
    ) -> Self {
        Self {
            executor,
            metadata,
            config,
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub async fn list_schemas(&self) -> EditorResult<Vec<Schema>> {
        self.metadata.list_schemas().await
    }

    pub async fn list_tables(&self, schema: &str) -> EditorResult<Vec<Table>> {
        self.metadata.list_tables(schema).await
    }

    pub async fn get_table(&self, id: i64) -> EditorResult<Table> {
        self.metadata.get_table(id).await
    }

    /// Executor round-trip used by health checks.
    pub async fn ping(&self) -> EditorResult<()> {
        self.read("SELECT 1").await.map(|_| ())
    }

    async fn run_once(&self, sql: &str) -> EditorResult<Vec<Row>> {
        tracing::debug!(%sql, "executing statement");
        match tokio::time::timeout(self.config.query_timeout, self.executor.execute(sql)).await {
            Ok(result) => result,
            Err(_) => Err(EditorError::Timeout(
                self.config.query_timeout.as_millis() as u64,
            )),
        }
    }

    /// Idempotent reads only: retried on transport failures and timeouts.
    async fn read(&self, sql: &str) -> EditorResult<Vec<Row>> {
        let mut attempt: u32 = 0;
        loop {
            match self.run_once(sql).await {
                Err(e) if e.is_retryable() && attempt < self.config.read_retries => {
                    attempt += 1;
                    tracing::warn!(attempt, error = %e, "read failed, retrying");
                    tokio::time::sleep(Duration::from_millis(100 * u64::from(attempt))).await;
                }
                other => return other,
            }
        }
    }

    /// Mutations run exactly once.
    async fn write(&self, sql: &str) -> EditorResult<Vec<Row>> {
        self.run_once(sql).await
    }

    pub async fn count_rows(&self, table: &Table, filters: &[Filter]) -> EditorResult<u64> {
        check_columns(table, filters.iter().map(|f| f.column.as_str()))?;
        let rows = self.read(&build_count(table, filters)).await?;
        parse_count(&rows)
    }

    /// Fetches one page and the matching total. The two reads are independent and run concurrently.
    pub async fn fetch_rows(&self, table: &Table, options: &QueryOptions) -> EditorResult<RowsPage> {
        check_columns(
            table,
            options
                .filters
                .iter()
                .map(|f| f.column.as_str())
                .chain(options.sort_column.as_deref()),
        )?;

        let select_sql = build_select(table, options);
        let count_sql = build_count(table, &options.filters);
        let (rows, count) = tokio::join!(self.read(&select_sql), self.read(&count_sql));
        let rows = rows?;
        let total = parse_count(&count?)?;

        let primary_key = table.primary_key();
        let rows = rows
            .into_iter()
            .map(|row| IdentifiedRow {
                key: identity_of(&row, primary_key),
                row,
            })
            .collect();

        Ok(RowsPage {
            rows,
            total,
            page: options.page(),
            page_size: options.page_size(),
        })
    }

    /// Like [`fetch_rows`](Self::fetch_rows), but returns `None` when a newer request superseded
    /// this one while it was in flight.
    pub async fn fetch_rows_tracked(
        &self,
        tracker: &GenerationTracker,
        table: &Table,
        options: &QueryOptions,
    ) -> EditorResult<Option<RowsPage>> {
        let generation: Generation = tracker.begin(RequestSignature::new(table.id, options));
        let page = self.fetch_rows(table, options).await?;
        if tracker.is_current(&generation) {
            Ok(Some(page))
        } else {
            tracing::debug!(generation = generation.id(), "discarding stale page");
            Ok(None)
        }
    }

    /// Inserts one row and returns it as stored (`RETURNING *`).
    pub async fn insert_row(&self, table: &Table, values: &ValueMap) -> EditorResult<Option<Row>> {
        check_columns(table, values.columns())?;
        let rows = self.write(&build_insert(table, values)).await?;
        tracing::info!(table = %table.display_name(), columns = values.len(), "row inserted");
        Ok(rows.into_iter().next())
    }

    /// Inserts a row made only of synthesized defaults.
    pub async fn insert_default_row(
        &self,
        table: &Table,
        now: DateTime<Utc>,
    ) -> EditorResult<Option<Row>> {
        let values = synthesize_default_row(table, now);
        self.insert_row(table, &values).await
    }

    pub async fn update_row(
        &self,
        table: &Table,
        row_id: &SqlValue,
        updates: &ValueMap,
    ) -> EditorResult<()> {
        check_columns(table, updates.columns())?;
        let sql = build_update(table, row_id, updates)?;
        warn_composite_key(table);
        self.write(&sql).await?;
        tracing::info!(table = %table.display_name(), columns = updates.len(), "row updated");
        Ok(())
    }

    /// Deletes rows by primary-key value. Returns how many ids were targeted; an empty list is a
    /// no-op that never reaches the executor.
    pub async fn delete_rows(&self, table: &Table, ids: &[SqlValue]) -> EditorResult<usize> {
        let sql = match build_delete(table, ids)? {
            DeleteStatement::Nothing => return Ok(0),
            DeleteStatement::Sql(sql) => sql,
        };
        warn_composite_key(table);
        self.write(&sql).await?;
        tracing::info!(table = %table.display_name(), count = ids.len(), "rows deleted");
        Ok(ids.len())
    }

    /// Deletes the rows of `page` selected by identity.
    pub async fn delete_selected(
        &self,
        table: &Table,
        page: &RowsPage,
        selected: &[i32],
    ) -> EditorResult<usize> {
        let Some(primary_key) = table.primary_key() else {
            return Err(EditorError::MissingPrimaryKey {
                schema: table.schema.clone(),
                table: table.name.clone(),
            });
        };
        let ids = page.primary_key_values(primary_key, selected);
        self.delete_rows(table, &ids).await
    }
}
