//! Route definitions

mod auth;

pub use auth::{auth_routes, identity_routes};
