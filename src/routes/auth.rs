//! Authentication routes

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::auth;
use crate::state::AppState;

/// Challenge, signup and login endpoints plus the current-identity lookup
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/challenge", post(auth::request_challenge))
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::get_current_user))
}

/// Public identity lookups
pub fn identity_routes() -> Router<AppState> {
    Router::new().route("/identities/:address", get(auth::get_identity))
}
