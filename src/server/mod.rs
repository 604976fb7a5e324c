pub mod routes;

use crate::errors::{PipelineError, PipelineResult};
use crate::schema::SchemaRegistry;
use axum::http::{header, HeaderValue, Method};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

/// Shared, read-only state for request handlers.
pub struct ServerState {
    pub data_path: PathBuf,
    pub registry: SchemaRegistry,
}

pub fn router(state: Arc<ServerState>, serve_dir: PathBuf) -> axum::Router {
    axum::Router::new()
        .route("/api/views", axum::routing::get(routes::get_views))
        .fallback_service(ServeDir::new(serve_dir))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE]),
        )
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache, no-store, must-revalidate"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::PRAGMA,
            HeaderValue::from_static("no-cache"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::EXPIRES,
            HeaderValue::from_static("0"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves until Ctrl+C.
pub async fn serve(state: Arc<ServerState>, serve_dir: PathBuf, port: u16) -> PipelineResult<()> {
    tracing::info!(dir = %serve_dir.display(), "serving dashboard files");
    let app = router(state, serve_dir);

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| PipelineError::Io(format!("bind {addr}: {e}")))?;
    tracing::info!("server listening on http://localhost:{port}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| PipelineError::Io(format!("server error: {e}")))?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("ctrl-c handler error: {e}");
        std::future::pending::<()>().await;
    }
}
