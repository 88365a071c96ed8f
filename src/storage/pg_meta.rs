//! pg-meta HTTP backend: `POST /query` for statements, `GET /schemas` and `GET /tables` for metadata.

use crate::domain::metadata::{user_schemas, Schema, Table};
use crate::domain::value::Row;
use crate::error::{EditorError, EditorResult};
use crate::storage::{rows_from_json, MetadataSource, QueryExecutor};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::Value as JsonValue;
use url::Url;

fn endpoint(base: &Url, path: &str) -> EditorResult<Url> {
    base.join(path)
        .map_err(|e| EditorError::Transport(format!("invalid pg-meta url: {}", e)))
}

fn parse_base(base_url: &str) -> EditorResult<Url> {
    // `join` drops the last path segment unless the base ends with '/'
    let normalized = format!("{}/", base_url.trim_end_matches('/'));
    Url::parse(&normalized).map_err(|e| EditorError::Transport(format!("invalid pg-meta url: {}", e)))
}

/// Pulls the database's own message out of an error body (`{"error": "..."}`, `{"message": "..."}`),
/// otherwise returns the body untouched.
fn error_message(body: &str) -> String {
    if let Ok(JsonValue::Object(map)) = serde_json::from_str::<JsonValue>(body) {
        for key in ["error", "message"] {
            if let Some(JsonValue::String(msg)) = map.get(key) {
                return msg.clone();
            }
        }
    }
    body.to_string()
}

async fn check(response: Response) -> EditorResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body);
    if status.is_client_error() {
        Err(EditorError::Database(message))
    } else {
        Err(EditorError::Transport(format!("{}: {}", status, message)))
    }
}

#[derive(Clone)]
pub struct PgMetaExecutor {
    client: Client,
    query_url: Url,
}

impl PgMetaExecutor {
    pub fn new(client: Client, base_url: &str) -> EditorResult<Self> {
        let base = parse_base(base_url)?;
        Ok(Self {
            client,
            query_url: endpoint(&base, "query")?,
        })
    }
}

#[async_trait]
impl QueryExecutor for PgMetaExecutor {
    async fn execute(&self, sql: &str) -> EditorResult<Vec<Row>> {
        let response = self
            .client
            .post(self.query_url.clone())
            .json(&serde_json::json!({ "query": sql }))
            .send()
            .await?;
        let body: JsonValue = check(response).await?.json().await?;
        rows_from_json(body)
    }
}

#[derive(Clone)]
pub struct PgMetaDiscovery {
    client: Client,
    base: Url,
}

impl PgMetaDiscovery {
    pub fn new(client: Client, base_url: &str) -> EditorResult<Self> {
        Ok(Self {
            client,
            base: parse_base(base_url)?,
        })
    }

    async fn fetch_tables(&self, params: &[(&str, String)]) -> EditorResult<Vec<Table>> {
        let mut url = endpoint(&self.base, "tables")?;
        url.query_pairs_mut().extend_pairs(params);
        let response = self.client.get(url).send().await?;
        Ok(check(response).await?.json().await?)
    }
}

#[async_trait]
impl MetadataSource for PgMetaDiscovery {
    async fn list_schemas(&self) -> EditorResult<Vec<Schema>> {
        let response = self
            .client
            .get(endpoint(&self.base, "schemas")?)
            .send()
            .await?;
        let schemas: Vec<Schema> = check(response).await?.json().await?;
        Ok(user_schemas(schemas))
    }

    async fn list_tables(&self, schema: &str) -> EditorResult<Vec<Table>> {
        self.fetch_tables(&[("included_schemas", schema.to_string())])
            .await
    }

    async fn get_table(&self, id: i64) -> EditorResult<Table> {
        // pg-meta may ignore the id filter and return every table
        self.fetch_tables(&[("id", id.to_string())])
            .await?
            .into_iter()
            .find(|t| t.id == id)
            .ok_or_else(|| EditorError::TableNotFound(id.to_string()))
    }
}
