//! HTTP surface (feature `server`).
//!
//! | Method | Path | Success |
//! |--------|------|---------|
//! | GET  | `/` | 200 health message |
//! | POST | `/upload` | 200 `{file_id, message, …}` |
//! | POST | `/check_compliance/:file_id` | 202 `{file_id, message}` |
//! | POST | `/correct_document/:file_id` | 202 `{file_id, message}` |
//! | GET  | `/status/:file_id` | 200 `{file_id, status, compliance_reports, message}` |
//! | GET  | `/download/:file_id` | 200 DOCX attachment |
//!
//! Errors are JSON `{success: false, error, code}`; see [`error::ApiError`].

pub mod error;
pub mod handlers;

use crate::service::DocumentService;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Default upload size limit in bytes.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Build the router. Path params use `:param` syntax (axum 0.7).
pub fn router(service: DocumentService, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/upload", post(handlers::upload))
        .route("/check_compliance/:file_id", post(handlers::check_compliance))
        .route("/correct_document/:file_id", post(handlers::correct_document))
        .route("/status/:file_id", get(handlers::status))
        .route("/download/:file_id", get(handlers::download))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(service)
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(
    service: DocumentService,
    addr: SocketAddr,
    max_upload_bytes: usize,
) -> std::io::Result<()> {
    let app = router(service, max_upload_bytes);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Document Compliance Service listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
}
