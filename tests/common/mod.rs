//! In-memory executor and metadata source for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use table_editor::domain::metadata::{Column, Schema, Table};
use table_editor::error::{EditorError, EditorResult};
use table_editor::storage::{MetadataSource, QueryExecutor};
use table_editor::Row;

pub fn row(v: JsonValue) -> Row {
    match v {
        JsonValue::Object(m) => m,
        other => panic!("not an object: {}", other),
    }
}

/// Records every statement and answers by statement kind.
#[derive(Default)]
pub struct FakeExecutor {
    pub log: Mutex<Vec<String>>,
    pub rows: Vec<Row>,
    pub total: u64,
    pub delay: Option<Duration>,
    /// The next N calls fail with a transport error.
    pub transport_failures: AtomicU32,
    /// Every call fails with this database message.
    pub database_error: Option<String>,
}

impl FakeExecutor {
    pub fn with_rows(rows: Vec<Row>) -> Self {
        let total = rows.len() as u64;
        Self {
            rows,
            total,
            ..Self::default()
        }
    }

    pub fn statements(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn count_matching(&self, prefix: &str) -> usize {
        self.statements()
            .iter()
            .filter(|s| s.starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl QueryExecutor for FakeExecutor {
    async fn execute(&self, sql: &str) -> EditorResult<Vec<Row>> {
        self.log.lock().unwrap().push(sql.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let failures = self.transport_failures.load(Ordering::SeqCst);
        if failures > 0 {
            self.transport_failures.store(failures - 1, Ordering::SeqCst);
            return Err(EditorError::Transport("connection reset".to_string()));
        }
        if let Some(message) = &self.database_error {
            return Err(EditorError::Database(message.clone()));
        }

        if sql.starts_with("SELECT COUNT(*)") {
            // text on purpose: pg-meta returns bigint counts as strings
            return Ok(vec![row(json!({ "count": self.total.to_string() }))]);
        }
        if sql == "SELECT 1" {
            return Ok(vec![row(json!({ "?column?": 1 }))]);
        }
        if sql.starts_with("SELECT") {
            return Ok(self.rows.clone());
        }
        if sql.starts_with("INSERT") {
            return Ok(vec![row(json!({ "id": 42, "email": "" }))]);
        }
        Ok(Vec::new())
    }
}

pub struct FakeMetadata {
    pub schemas: Vec<Schema>,
    pub tables: Vec<Table>,
}

#[async_trait]
impl MetadataSource for FakeMetadata {
    async fn list_schemas(&self) -> EditorResult<Vec<Schema>> {
        Ok(table_editor::domain::metadata::user_schemas(
            self.schemas.clone(),
        ))
    }

    async fn list_tables(&self, schema: &str) -> EditorResult<Vec<Table>> {
        Ok(self
            .tables
            .iter()
            .filter(|t| t.schema == schema)
            .cloned()
            .collect())
    }

    async fn get_table(&self, id: i64) -> EditorResult<Table> {
        self.tables
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| EditorError::TableNotFound(id.to_string()))
    }
}

pub fn users_table() -> Table {
    Table::new(
        1,
        "public",
        "users",
        vec![
            Column::new("id", "int4").identity(),
            Column::new("email", "text").not_null(),
            Column::new("created_at", "timestamptz").with_default("CURRENT_TIMESTAMP"),
            Column::new("profile", "jsonb"),
        ],
    )
    .with_primary_key("id")
}

pub fn audit_log_table() -> Table {
    Table::new(
        2,
        "public",
        "audit_log",
        vec![
            Column::new("message", "text"),
            Column::new("at", "timestamptz"),
        ],
    )
}

pub fn fake_metadata() -> FakeMetadata {
    FakeMetadata {
        schemas: vec![
            Schema { id: 1, name: "public".to_string() },
            Schema { id: 2, name: "pg_catalog".to_string() },
            Schema { id: 3, name: "information_schema".to_string() },
            Schema { id: 4, name: "pg_toast".to_string() },
            Schema { id: 5, name: "sales".to_string() },
        ],
        tables: vec![users_table(), audit_log_table()],
    }
}

pub fn sample_users() -> Vec<Row> {
    vec![
        row(json!({ "id": 1, "email": "ada@acme.com", "created_at": "2024-01-02T03:04:05Z", "profile": { "tier": "gold" } })),
        row(json!({ "id": 2, "email": "bob@acme.com", "created_at": null, "profile": null })),
    ]
}
