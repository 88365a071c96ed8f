// src/bin/api_server.rs

use table_editor::infra::config::{self, EditorConfig};
use table_editor::storage::connect_backend;
use table_editor::transport;
use table_editor::TableEditorService;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // --- Configuration ---
    let editor_config = EditorConfig::from_env()?;
    tracing::info!(
        timeout_ms = editor_config.query_timeout.as_millis() as u64,
        read_retries = editor_config.read_retries,
        default_page_size = editor_config.default_page_size,
        "configuration loaded"
    );

    // --- Backend ---
    let backend = connect_backend().await?;
    tracing::info!(backend = %backend.description, "executor ready");

    // --- Service Initialization ---
    let service = TableEditorService::new(backend.executor, backend.metadata, editor_config);
    let recent_path = config::recent_tables_path();
    let app_state = transport::http::AppState::new(service, Some(recent_path.clone()));
    tracing::info!(path = %recent_path.display(), "recent tables store");

    // --- API Server Initialization ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let app = transport::http::create_router(app_state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", transport::http::ApiDoc::openapi()))
        .layer(cors);
    let bind_addr = config::bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("API server listening on http://{}", bind_addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui", bind_addr);

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    Ok(())
}
