use crate::transport::http::types::{ok_serialized, AppState};
use axum::extract::State;
use axum::response::IntoResponse;

#[utoipa::path(
    get,
    path = "/api/recent",
    responses(
        (status = 200, description = "Recently visited tables, newest first", body = Vec<crate::app::recent::RecentTable>)
    )
)]
pub async fn recent_tables_handler(State(state): State<AppState>) -> impl IntoResponse {
    let recent = state.recent.read().await;
    ok_serialized(&recent.entries())
}
