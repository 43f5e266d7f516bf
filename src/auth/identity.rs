//! Identity registry, keyed by wallet address

use std::sync::Arc;

use uuid::Uuid;

use super::address::Address;
use super::clock::Clock;
use super::error::AuthError;
use crate::models::{Identity, Role};
use crate::store::{bounded, AuthStore};

const MAX_DISPLAY_NAME_CHARS: usize = 64;

/// Creates and looks up identities
#[derive(Clone)]
pub struct IdentityRegistry {
    store: Arc<dyn AuthStore>,
    clock: Arc<dyn Clock>,
    store_timeout: std::time::Duration,
}

impl IdentityRegistry {
    pub fn new(
        store: Arc<dyn AuthStore>,
        clock: Arc<dyn Clock>,
        store_timeout: std::time::Duration,
    ) -> Self {
        Self {
            store,
            clock,
            store_timeout,
        }
    }

    /// Register a new identity. Each address may register once.
    pub async fn register(
        &self,
        address: &str,
        display_name: &str,
        role: &str,
    ) -> Result<Identity, AuthError> {
        let role: Role = role.parse()?;
        let address = Address::parse(address)?;
        validate_display_name(display_name)?;

        let identity = Identity {
            id: Uuid::new_v4(),
            address: address.to_string(),
            display_name: display_name.to_string(),
            role,
            created_at: self.clock.now(),
        };

        let inserted = bounded(
            self.store_timeout,
            self.store.insert_identity_if_absent(&identity),
        )
        .await?;

        if !inserted {
            return Err(AuthError::AddressAlreadyRegistered);
        }

        Ok(identity)
    }

    pub async fn lookup_by_address(&self, address: &str) -> Result<Option<Identity>, AuthError> {
        let identity = bounded(
            self.store_timeout,
            self.store.get_identity_by_address(address),
        )
        .await?;
        Ok(identity)
    }

    pub async fn lookup_by_id(&self, id: Uuid) -> Result<Option<Identity>, AuthError> {
        let identity = bounded(self.store_timeout, self.store.get_identity_by_id(id)).await?;
        Ok(identity)
    }
}

/// Display names are stored as given but must contain something visible.
pub fn validate_display_name(display_name: &str) -> Result<(), AuthError> {
    if display_name.trim().is_empty() {
        return Err(AuthError::InvalidDisplayName(
            "display name must not be blank".to_string(),
        ));
    }

    if display_name.chars().count() > MAX_DISPLAY_NAME_CHARS {
        return Err(AuthError::InvalidDisplayName(format!(
            "display name must be at most {} characters",
            MAX_DISPLAY_NAME_CHARS
        )));
    }

    Ok(())
}
