//! Application state shared across handlers

use std::sync::Arc;

use axum::extract::FromRef;

use crate::auth::AuthService;
use crate::middleware::RateLimiter;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<AuthService>,
    pub rate_limiter: RateLimiter,
    pub environment: &'static str,
}

impl AppState {
    pub fn new(
        auth_service: Arc<AuthService>,
        rate_limiter: RateLimiter,
        environment: &'static str,
    ) -> Self {
        Self {
            auth_service,
            rate_limiter,
            environment,
        }
    }
}

impl FromRef<AppState> for Arc<AuthService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.auth_service.clone()
    }
}

impl FromRef<AppState> for RateLimiter {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.rate_limiter.clone()
    }
}
