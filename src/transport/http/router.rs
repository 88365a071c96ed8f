use crate::app::recent::RecentTable;
use crate::app::table_service::{IdentifiedRow, RowsPage};
use crate::domain::filter::{Filter, FilterOperator};
use crate::domain::grid::{CellDisplay, CellTag, ColumnClass, PresentationColumn};
use crate::domain::metadata::{Column, PrimaryKey, Relationship, Schema, Table};
use crate::transport::http::handlers::{health, recent, rows, tables};
use crate::transport::http::types::{
    ApiResponse, DeleteRowsRequest, InsertRowRequest, RowsResponse, TableDetail, TablesQuery,
    UpdateRowRequest,
};
use axum::routing::{get, post};
use axum::Router;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::healthcheck_handler,
        tables::list_schemas_handler,
        tables::list_tables_handler,
        tables::get_table_handler,
        rows::list_rows_handler,
        rows::insert_row_handler,
        rows::update_row_handler,
        rows::delete_rows_handler,
        recent::recent_tables_handler
    ),
    components(schemas(
        ApiResponse,
        Schema,
        Table,
        Column,
        PrimaryKey,
        Relationship,
        TablesQuery,
        TableDetail,
        PresentationColumn,
        ColumnClass,
        CellDisplay,
        CellTag,
        Filter,
        FilterOperator,
        IdentifiedRow,
        RowsPage,
        RowsResponse,
        InsertRowRequest,
        UpdateRowRequest,
        DeleteRowsRequest,
        RecentTable
    ))
)]
#[allow(dead_code)]
pub struct ApiDoc;

pub fn create_router(app_state: crate::transport::http::types::AppState) -> Router {
    Router::new()
        .route("/health", get(health::healthcheck_handler))
        .route("/api/schemas", get(tables::list_schemas_handler))
        .route("/api/tables", get(tables::list_tables_handler))
        .route("/api/tables/:id", get(tables::get_table_handler))
        .route(
            "/api/tables/:id/rows",
            get(rows::list_rows_handler)
                .post(rows::insert_row_handler)
                .patch(rows::update_row_handler),
        )
        .route("/api/tables/:id/rows/delete", post(rows::delete_rows_handler))
        .route("/api/recent", get(recent::recent_tables_handler))
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value as JsonValue;

    fn response_schema<'a>(doc: &'a JsonValue, path: &str, method: &str, status: &str) -> &'a JsonValue {
        &doc["paths"][path][method]["responses"][status]["content"]["application/json"]["schema"]
    }

    #[test]
    fn documented_bodies_reference_component_schemas() {
        let doc = serde_json::to_value(ApiDoc::openapi()).unwrap();
        assert_eq!(
            response_schema(&doc, "/api/schemas", "get", "200")["items"]["$ref"],
            "#/components/schemas/Schema"
        );
        assert_eq!(
            response_schema(&doc, "/api/tables", "get", "200")["items"]["$ref"],
            "#/components/schemas/Table"
        );
        assert_eq!(
            response_schema(&doc, "/api/recent", "get", "200")["items"]["$ref"],
            "#/components/schemas/RecentTable"
        );
        assert_eq!(
            response_schema(&doc, "/api/tables/{id}/rows", "get", "502")["$ref"],
            "#/components/schemas/ApiResponse"
        );
        for name in ["ApiResponse", "Schema", "Table", "RecentTable", "RowsResponse"] {
            assert!(doc["components"]["schemas"].get(name).is_some(), "{}", name);
        }
    }
}
