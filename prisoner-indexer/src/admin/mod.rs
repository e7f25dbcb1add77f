//! Administrative HTTP surface.
//!
//! Index maintenance (rebuild, mark complete, cancel, switch), single-prisoner
//! indexing and refresh, and dedup retention, served with axum.

pub mod error;
pub mod handlers;
pub mod state;

use std::net::SocketAddr;

use axum::{
    routing::{delete, get, put},
    Router,
};
use tracing::info;

pub use self::error::ApiError;
pub use self::state::AdminState;

/// Create the admin router.
pub fn create_app(state: AdminState) -> Router {
    Router::new()
        .route("/index-status", get(handlers::index_status))
        .route("/maintain-index/build", put(handlers::build))
        .route("/maintain-index/mark-complete", put(handlers::mark_complete))
        .route("/maintain-index/cancel", put(handlers::cancel))
        .route("/maintain-index/switch", put(handlers::switch))
        .route(
            "/maintain-index/index-prisoner/:prisoner_number",
            put(handlers::index_prisoner),
        )
        .route("/maintain-index/refresh", put(handlers::refresh))
        .route(
            "/maintain-index/refresh-prisoner/:prisoner_number",
            put(handlers::refresh_prisoner),
        )
        .route("/maintain-index/hashes", delete(handlers::purge_hashes))
        .route("/health", get(handlers::health_check))
        .with_state(state)
}

/// Serve the admin router on `addr` until the process exits.
pub async fn run_server(app: Router, addr: SocketAddr) -> std::io::Result<()> {
    info!(address = %addr, "Admin server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}
