//! API handlers

pub mod auth;

pub use auth::*;

// Re-export AuthenticatedUser from middleware for handler use
pub use crate::middleware::auth::AuthenticatedUser;
