//! Reference mock backend for Gauntlet.
//!
//! Implements the external backend contract the harness is written
//! against — create-or-login sessions with refresh/CSRF cookies, one-time
//! refresh rotation, item CRUD with 409/404 race semantics, one-time
//! tickets, signed export URLs, and per-identity login rate limiting —
//! entirely in memory. It does not persist anything; it exists so E2E
//! tests and local experimentation can run hermetically where a real
//! backend is unavailable.

mod auth;
mod error;
mod extract;
mod items;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use tokio::task::JoinHandle;
use tracing::{error, info};

pub use auth::{CSRF_COOKIE, CSRF_HEADER, REFRESH_COOKIE};
pub use state::MockApiConfig;

use state::AppState;

/// Build the full router with shared in-memory state.
pub fn build_router(config: MockApiConfig) -> Router {
    let max_body = config.max_body_bytes;
    let state = Arc::new(AppState::new(config));

    Router::new()
        .route("/healthz", get(healthz))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/logout", post(auth::logout))
        .route("/items", post(items::create_item))
        .route(
            "/items/{id}",
            get(items::get_item)
                .put(items::update_item)
                .delete(items::delete_item),
        )
        .route("/items/{id}/export_url", get(items::export_url))
        .route("/items/{id}/export", get(items::export_item))
        .route("/tickets", post(items::create_ticket))
        .route("/tickets/{id}/consume", post(items::consume_ticket))
        .layer(DefaultBodyLimit::max(max_body))
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, axum::Json(serde_json::json!({ "status": "ok" })))
}

/// Serve on an OS-assigned loopback port, for hermetic tests.
///
/// Returns the bound address and the server task handle. The server runs
/// until the handle is aborted or the process exits.
pub async fn spawn(config: MockApiConfig) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = build_router(config);

    let handle = tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            error!(error = %err, "mock backend exited");
        }
    });

    info!(%addr, "mock backend listening");
    Ok((addr, handle))
}

/// Serve on an explicit address until shutdown. Used by the binary.
pub async fn serve(addr: SocketAddr, config: MockApiConfig) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "mock backend listening");
    axum::serve(listener, build_router(config)).await
}
