//! Persistence for challenges and identities
//!
//! The core talks to storage only through [`AuthStore`]. Two backends are
//! provided:
//!
//! - [`MemoryStore`]: process-local maps behind a lock, for tests and
//!   single-instance development
//! - [`PgStore`]: PostgreSQL via `sqlx`
//!
//! Both provide the two atomic primitives the protocol relies on: marking a
//! challenge used exactly once, and inserting an identity only if its address
//! is not yet registered.

mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Challenge, Identity};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Storage errors. These are infrastructure failures, never "not found".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store operation timed out after {0} ms")]
    Timeout(u64),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(e.to_string())
            }
            _ => StoreError::Database(e.to_string()),
        }
    }
}

/// Storage backend for the authentication core
#[async_trait]
pub trait AuthStore: Send + Sync {
    /// Persist a newly issued challenge.
    async fn insert_challenge(&self, challenge: &Challenge) -> Result<(), StoreError>;

    /// Fetch a challenge by id.
    async fn get_challenge(&self, id: Uuid) -> Result<Option<Challenge>, StoreError>;

    /// Atomically flip `used` from false to true.
    ///
    /// Returns `true` only for the single caller that performed the
    /// transition; every other caller observes `false`.
    async fn mark_challenge_used(
        &self,
        id: Uuid,
        used_at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Delete challenges that expired before `before`. Returns the count.
    async fn purge_expired_challenges(&self, before: DateTime<Utc>) -> Result<u64, StoreError>;

    /// Insert an identity unless its address is already registered.
    ///
    /// Returns `false` when the address was taken.
    async fn insert_identity_if_absent(&self, identity: &Identity) -> Result<bool, StoreError>;

    async fn get_identity_by_address(&self, address: &str)
        -> Result<Option<Identity>, StoreError>;

    async fn get_identity_by_id(&self, id: Uuid) -> Result<Option<Identity>, StoreError>;

    /// Check connectivity (for health checks)
    async fn health_check(&self) -> Result<(), StoreError>;

    /// Short backend name for logs and health output
    fn backend_name(&self) -> &'static str;
}

/// Run a store operation with an upper bound on how long it may take.
pub async fn bounded<T, F>(timeout: std::time::Duration, operation: F) -> Result<T, StoreError>
where
    F: std::future::Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(timeout, operation).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(timeout.as_millis() as u64)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_bounded_passes_result_through() {
        let result = bounded(Duration::from_millis(100), async { Ok::<_, StoreError>(7) }).await;
        assert_eq!(result, Ok(7));
    }

    #[tokio::test]
    async fn test_bounded_times_out() {
        let result = bounded(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, StoreError>(())
        })
        .await;
        assert_eq!(result, Err(StoreError::Timeout(10)));
    }
}
