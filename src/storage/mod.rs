//! Where generated SQL runs and where table metadata comes from.

pub mod pg_meta;
pub mod postgres;

use crate::domain::metadata::{Schema, Table};
use crate::domain::value::Row;
use crate::error::EditorResult;
use async_trait::async_trait;

pub use pg_meta::{PgMetaDiscovery, PgMetaExecutor};
pub use postgres::{PgCatalogDiscovery, PgPoolExecutor};

/// Runs one fully-interpolated SQL statement and returns its rows (empty for statements that
/// return none). A single result-or-error per call; no partial results.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, sql: &str) -> EditorResult<Vec<Row>>;
}

/// Supplies table snapshots and the schemas worth listing.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// User-facing schemas only (system schemas removed).
    async fn list_schemas(&self) -> EditorResult<Vec<Schema>>;

    async fn list_tables(&self, schema: &str) -> EditorResult<Vec<Table>>;

    /// Fails with `EditorError::TableNotFound` when no table has this id.
    async fn get_table(&self, id: i64) -> EditorResult<Table>;
}

/// Turns a JSON array of objects into rows.
pub(crate) fn rows_from_json(value: serde_json::Value) -> EditorResult<Vec<Row>> {
    use crate::error::EditorError;
    use serde_json::Value as JsonValue;

    match value {
        JsonValue::Array(items) => items
            .into_iter()
            .map(|item| match item {
                JsonValue::Object(map) => Ok(map),
                other => Err(EditorError::Decode(format!("expected row object, got {}", other))),
            })
            .collect(),
        // some endpoints answer `{}`/`null` for statements without a result set
        JsonValue::Null => Ok(Vec::new()),
        JsonValue::Object(map) if map.is_empty() => Ok(Vec::new()),
        other => Err(EditorError::Decode(format!("expected array of rows, got {}", other))),
    }
}

/// The executor/metadata pair a service runs against.
pub struct Backend {
    pub executor: std::sync::Arc<dyn QueryExecutor>,
    pub metadata: std::sync::Arc<dyn MetadataSource>,
    /// Human-readable target for startup logs.
    pub description: String,
}

/// Direct Postgres when `DATABASE_URL` is set, otherwise the pg-meta HTTP service.
pub async fn connect_backend() -> anyhow::Result<Backend> {
    use crate::infra::config;
    use std::sync::Arc;

    if let Some(url) = config::database_url() {
        let pool = postgres::connect(&url).await?;
        return Ok(Backend {
            executor: Arc::new(PgPoolExecutor::new(pool.clone())),
            metadata: Arc::new(PgCatalogDiscovery::new(pool)),
            description: "postgres (DATABASE_URL)".to_string(),
        });
    }

    let base = config::pg_meta_url();
    let client = reqwest::Client::new();
    Ok(Backend {
        executor: Arc::new(PgMetaExecutor::new(client.clone(), &base)?),
        metadata: Arc::new(PgMetaDiscovery::new(client, &base)?),
        description: format!("pg-meta at {}", base),
    })
}
