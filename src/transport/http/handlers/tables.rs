use crate::domain::grid::to_presentation_columns;
use crate::transport::http::types::{
    error_response, ok_serialized, AppState, TableDetail, TablesQuery,
};
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;

#[utoipa::path(
    get,
    path = "/api/schemas",
    responses(
        (status = 200, description = "User schemas (system schemas removed)", body = Vec<crate::domain::metadata::Schema>),
        (status = 502, description = "Metadata service error", body = crate::transport::http::types::ApiResponse)
    )
)]
pub async fn list_schemas_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.service.list_schemas().await {
        Ok(schemas) => ok_serialized(&schemas),
        Err(e) => error_response(&e),
    }
}

#[utoipa::path(
    get,
    path = "/api/tables",
    params(
        ("schema" = Option<String>, Query, description = "Schema name (default public)")
    ),
    responses(
        (status = 200, description = "Tables of the schema", body = Vec<crate::domain::metadata::Table>),
        (status = 502, description = "Metadata service error", body = crate::transport::http::types::ApiResponse)
    )
)]
pub async fn list_tables_handler(
    State(state): State<AppState>,
    Query(query): Query<TablesQuery>,
) -> impl IntoResponse {
    let schema = query
        .schema
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("public");
    match state.service.list_tables(schema).await {
        Ok(tables) => ok_serialized(&tables),
        Err(e) => error_response(&e),
    }
}

#[utoipa::path(
    get,
    path = "/api/tables/{id}",
    params(
        ("id" = i64, Path, description = "Table id")
    ),
    responses(
        (status = 200, description = "Table metadata and grid columns", body = TableDetail),
        (status = 404, description = "Table not found", body = crate::transport::http::types::ApiResponse)
    )
)]
pub async fn get_table_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match state.service.get_table(id).await {
        Ok(table) => {
            let columns = to_presentation_columns(&table.columns);
            ok_serialized(&TableDetail { table, columns })
        }
        Err(e) => error_response(&e),
    }
}
