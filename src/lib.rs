//! Wallet authentication server library
//!
//! Challenge-response sign-in for Ed25519 wallet addresses, with stateless
//! bearer credentials. The binary in `main.rs` wires configuration, storage
//! and background tasks around the router built here.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;
pub mod store;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use state::AppState;

/// Build the application router with its middleware stack
pub fn app(state: AppState) -> Router {
    let rate_limited = routes::auth_routes()
        .merge(routes::identity_routes())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit,
        ));

    Router::new()
        .route("/health", get(health_check))
        .merge(rate_limited)
        .with_state(state)
        .layer(axum::middleware::from_fn(middleware::security_headers))
        .layer(axum::middleware::from_fn(middleware::request_tracing))
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub store: String,
    pub environment: &'static str,
    pub version: &'static str,
}

/// GET /health
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let backend = state.auth_service.store_backend();

    let (status, store) = match state.auth_service.store_health().await {
        Ok(()) => ("healthy", format!("{}: connected", backend)),
        Err(e) => {
            tracing::error!(error = %e, backend, "Store health check failed");
            ("unhealthy", format!("{}: unavailable", backend))
        }
    };

    Json(HealthResponse {
        status,
        store,
        environment: state.environment,
        version: env!("CARGO_PKG_VERSION"),
    })
}
