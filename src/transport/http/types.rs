use crate::app::recent::RecentTables;
use crate::app::table_service::{RowsPage, TableEditorService};
use crate::domain::grid::{CellDisplay, PresentationColumn};
use crate::domain::metadata::Table;
use crate::error::EditorError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use utoipa::ToSchema;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TableEditorService>,
    pub recent: Arc<RwLock<RecentTables>>,
    /// Where the recent-tables list is saved after each visit. `None` keeps it in memory only.
    pub recent_path: Option<PathBuf>,
    /// Serializes writes of the recent-tables file; never held together with `recent`'s write lock.
    pub recent_save: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(service: TableEditorService, recent_path: Option<PathBuf>) -> Self {
        let recent = recent_path
            .as_deref()
            .map(RecentTables::load)
            .unwrap_or_default();
        Self {
            service: Arc::new(service),
            recent: Arc::new(RwLock::new(recent)),
            recent_path,
            recent_save: Arc::new(Mutex::new(())),
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub data: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct TablesQuery {
    /// Defaults to `public`.
    pub schema: Option<String>,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct TableDetail {
    pub table: Table,
    /// Grid columns: identity columns first, then by name.
    pub columns: Vec<PresentationColumn>,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct RowsResponse {
    #[serde(flatten)]
    pub page: RowsPage,
    /// Applied filters as URL tokens (`column:op:value`).
    pub filters: Vec<String>,
    /// Display text per row, keyed by column name, aligned with `rows`.
    pub display: Vec<BTreeMap<String, CellDisplay>>,
}

#[derive(Deserialize, Debug, Default, ToSchema)]
pub struct InsertRowRequest {
    /// Column values. Omitted means "synthesize defaults from column metadata".
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub values: Option<Map<String, JsonValue>>,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct UpdateRowRequest {
    /// Primary-key value of the row to update.
    #[schema(value_type = Object)]
    pub row_id: JsonValue,
    #[schema(value_type = Object)]
    pub updates: Map<String, JsonValue>,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct DeleteRowsRequest {
    /// Primary-key values.
    #[schema(value_type = Vec<Object>)]
    pub ids: Vec<JsonValue>,
}

pub fn status_for(err: &EditorError) -> StatusCode {
    match err {
        EditorError::TableNotFound(_) => StatusCode::NOT_FOUND,
        e if e.is_precondition() => StatusCode::BAD_REQUEST,
        EditorError::Transport(_) => StatusCode::SERVICE_UNAVAILABLE,
        EditorError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::BAD_GATEWAY,
    }
}

pub fn ok(data: JsonValue) -> Response {
    (
        StatusCode::OK,
        Json(ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }),
    )
        .into_response()
}

pub fn ok_serialized<T: Serialize>(data: &T) -> Response {
    match serde_json::to_value(data) {
        Ok(v) => ok(v),
        Err(e) => error_response(&EditorError::Decode(e.to_string())),
    }
}

pub fn error_response(err: &EditorError) -> Response {
    let status = status_for(err);
    if status.is_server_error() {
        tracing::error!(error = %err, status = status.as_u16(), "request failed");
    }
    (
        status,
        Json(ApiResponse {
            success: false,
            data: None,
            error: Some(err.to_string()),
        }),
    )
        .into_response()
}

pub fn json_422(err: JsonRejection, expected: &str) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ApiResponse {
            success: false,
            data: None,
            error: Some(format!("Invalid JSON body: {} (expected: {})", err, expected)),
        }),
    )
        .into_response()
}
