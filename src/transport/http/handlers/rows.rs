use crate::domain::filter::{from_tokens, to_tokens};
use crate::domain::grid::to_presentation_columns;
use crate::domain::metadata::Table;
use crate::domain::query::{QueryOptions, SortDirection};
use crate::domain::value::{SqlValue, ValueMap};
use crate::transport::http::types::{
    error_response, json_422, ok, ok_serialized, AppState, DeleteRowsRequest,
    InsertRowRequest, RowsResponse, UpdateRowRequest,
};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, RawQuery, State};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use std::collections::BTreeMap;

/// Reads `page`, `page_size`, `sort`, `order` and repeated `filter=column:op:value` parameters.
/// Bad numbers fall back to defaults and malformed filter tokens are dropped.
pub fn parse_rows_query(raw: Option<&str>, default_page_size: u32) -> QueryOptions {
    let mut page = None;
    let mut page_size = None;
    let mut sort = None;
    let mut order = None;
    let mut tokens = Vec::new();
    for (key, value) in url::form_urlencoded::parse(raw.unwrap_or("").as_bytes()) {
        match key.as_ref() {
            "page" => page = Some(value.into_owned()),
            "page_size" => page_size = Some(value.into_owned()),
            "sort" => sort = Some(value.into_owned()),
            "order" => order = Some(value.into_owned()),
            "filter" => tokens.push(value.into_owned()),
            _ => {}
        }
    }

    let mut options =
        QueryOptions::from_raw(page.as_deref(), page_size.as_deref(), default_page_size)
            .with_filters(from_tokens(&tokens));
    if let Some(column) = sort.filter(|c| !c.trim().is_empty()) {
        let direction = order
            .as_deref()
            .map(SortDirection::parse)
            .unwrap_or_default();
        options = options.with_sort(column, direction);
    }
    options
}

/// Moves `table` to the front of the recent list and saves the list off the async workers.
async fn record_visit(state: &AppState, table: &Table) {
    state
        .recent
        .write()
        .await
        .visit(table.id, &table.schema, &table.name, Utc::now());

    let Some(path) = state.recent_path.clone() else {
        return;
    };
    // Snapshot under the save lock so the last write to land holds the newest list.
    let _saving = state.recent_save.lock().await;
    let snapshot = state.recent.read().await.clone();
    let target = path.clone();
    match tokio::task::spawn_blocking(move || snapshot.save(&target)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to save recent tables");
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "recent tables save task failed");
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/tables/{id}/rows",
    params(
        ("id" = i64, Path, description = "Table id"),
        ("page" = Option<u32>, Query, description = "1-based page (default 1)"),
        ("page_size" = Option<u32>, Query, description = "Rows per page (default 100, max 1000)"),
        ("sort" = Option<String>, Query, description = "Sort column"),
        ("order" = Option<String>, Query, description = "asc | desc"),
        ("filter" = Option<Vec<String>>, Query, description = "Repeated column:op:value tokens")
    ),
    responses(
        (status = 200, description = "Page of rows with identities and total", body = RowsResponse),
        (status = 400, description = "Unknown sort or filter column", body = crate::transport::http::types::ApiResponse),
        (status = 404, description = "Table not found", body = crate::transport::http::types::ApiResponse),
        (status = 502, description = "Database error", body = crate::transport::http::types::ApiResponse)
    )
)]
pub async fn list_rows_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    RawQuery(raw): RawQuery,
) -> impl IntoResponse {
    let table = match state.service.get_table(id).await {
        Ok(t) => t,
        Err(e) => return error_response(&e),
    };
    let options = parse_rows_query(raw.as_deref(), state.service.config().default_page_size);

    let page = match state.service.fetch_rows(&table, &options).await {
        Ok(p) => p,
        Err(e) => return error_response(&e),
    };

    record_visit(&state, &table).await;

    let columns = to_presentation_columns(&table.columns);
    let display = page
        .rows
        .iter()
        .map(|r| {
            columns
                .iter()
                .map(|c| (c.key.clone(), c.format(&r.row)))
                .collect::<BTreeMap<_, _>>()
        })
        .collect();

    ok_serialized(&RowsResponse {
        filters: to_tokens(&options.filters),
        page,
        display,
    })
}

#[utoipa::path(
    post,
    path = "/api/tables/{id}/rows",
    params(
        ("id" = i64, Path, description = "Table id")
    ),
    request_body = InsertRowRequest,
    responses(
        (status = 200, description = "Inserted row as stored", body = crate::transport::http::types::ApiResponse),
        (status = 400, description = "Unknown column", body = crate::transport::http::types::ApiResponse),
        (status = 422, description = "Unprocessable entity (invalid JSON body)", body = crate::transport::http::types::ApiResponse),
        (status = 502, description = "Database error", body = crate::transport::http::types::ApiResponse)
    )
)]
pub async fn insert_row_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    request: Result<Json<InsertRowRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(request) = match request {
        Ok(v) => v,
        Err(e) => return json_422(e, "{\"values\": {...}} or {}"),
    };
    let table = match state.service.get_table(id).await {
        Ok(t) => t,
        Err(e) => return error_response(&e),
    };

    let result = match request.values {
        Some(values) => {
            state
                .service
                .insert_row(&table, &ValueMap::from(values))
                .await
        }
        None => state.service.insert_default_row(&table, Utc::now()).await,
    };
    match result {
        Ok(row) => ok(row.map(serde_json::Value::Object).unwrap_or_default()),
        Err(e) => error_response(&e),
    }
}

#[utoipa::path(
    patch,
    path = "/api/tables/{id}/rows",
    params(
        ("id" = i64, Path, description = "Table id")
    ),
    request_body = UpdateRowRequest,
    responses(
        (status = 200, description = "Row updated", body = crate::transport::http::types::ApiResponse),
        (status = 400, description = "No primary key, no updates, or unknown column", body = crate::transport::http::types::ApiResponse),
        (status = 422, description = "Unprocessable entity (invalid JSON body)", body = crate::transport::http::types::ApiResponse),
        (status = 502, description = "Database error", body = crate::transport::http::types::ApiResponse)
    )
)]
pub async fn update_row_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    request: Result<Json<UpdateRowRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(request) = match request {
        Ok(v) => v,
        Err(e) => return json_422(e, "{\"row_id\": ..., \"updates\": {...}}"),
    };
    let table = match state.service.get_table(id).await {
        Ok(t) => t,
        Err(e) => return error_response(&e),
    };

    let row_id = SqlValue::from(request.row_id);
    let updates = ValueMap::from(request.updates);
    match state.service.update_row(&table, &row_id, &updates).await {
        Ok(()) => ok(serde_json::json!({ "updated": true })),
        Err(e) => error_response(&e),
    }
}

#[utoipa::path(
    post,
    path = "/api/tables/{id}/rows/delete",
    params(
        ("id" = i64, Path, description = "Table id")
    ),
    request_body = DeleteRowsRequest,
    responses(
        (status = 200, description = "Number of rows targeted", body = crate::transport::http::types::ApiResponse),
        (status = 400, description = "Table has no primary key", body = crate::transport::http::types::ApiResponse),
        (status = 422, description = "Unprocessable entity (invalid JSON body)", body = crate::transport::http::types::ApiResponse),
        (status = 502, description = "Database error", body = crate::transport::http::types::ApiResponse)
    )
)]
pub async fn delete_rows_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    request: Result<Json<DeleteRowsRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(request) = match request {
        Ok(v) => v,
        Err(e) => return json_422(e, "{\"ids\": [...]}"),
    };
    let table = match state.service.get_table(id).await {
        Ok(t) => t,
        Err(e) => return error_response(&e),
    };

    let ids: Vec<SqlValue> = request.ids.into_iter().map(SqlValue::from).collect();
    match state.service.delete_rows(&table, &ids).await {
        Ok(deleted) => ok(serde_json::json!({ "deleted": deleted })),
        Err(e) => error_response(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::filter::FilterOperator;

    #[test]
    fn query_string_with_repeated_filters() {
        let options = parse_rows_query(
            Some("page=2&page_size=25&sort=id&order=DESC&filter=email:ilike:%25%40acme.com&filter=deleted_at:null&filter=bogus"),
            100,
        );
        assert_eq!((options.page(), options.page_size()), (2, 25));
        assert_eq!(options.sort_column.as_deref(), Some("id"));
        assert_eq!(options.sort_direction, SortDirection::Desc);
        assert_eq!(options.filters.len(), 2);
        assert_eq!(options.filters[0].operator, FilterOperator::ILike);
        assert_eq!(options.filters[0].value, "%@acme.com");
        assert_eq!(options.filters[1].operator, FilterOperator::IsNull);
    }

    #[test]
    fn empty_query_uses_defaults() {
        let options = parse_rows_query(None, 40);
        assert_eq!((options.page(), options.page_size()), (1, 40));
        assert!(options.sort_column.is_none());
        assert!(options.filters.is_empty());
    }
}
