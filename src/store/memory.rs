//! In-memory store

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{AuthStore, StoreError};
use crate::models::{Challenge, Identity};

#[derive(Debug, Default)]
struct IdentityTables {
    by_address: HashMap<String, Identity>,
    /// Secondary index: identity id -> address
    address_by_id: HashMap<Uuid, String>,
}

/// Thread-safe in-memory store.
///
/// Both identity indexes live under one lock so insert-if-absent updates
/// them together.
#[derive(Debug)]
pub struct MemoryStore {
    challenges: RwLock<HashMap<Uuid, Challenge>>,
    identities: RwLock<IdentityTables>,
    available: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            challenges: RwLock::new(HashMap::new()),
            identities: RwLock::new(IdentityTables::default()),
            available: AtomicBool::new(true),
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: while unavailable every operation fails with
    /// `StoreError::Unavailable`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub async fn challenge_count(&self) -> usize {
        self.challenges.read().await.len()
    }

    pub async fn identity_count(&self) -> usize {
        self.identities.read().await.by_address.len()
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store offline".to_string()))
        }
    }
}

#[async_trait]
impl AuthStore for MemoryStore {
    async fn insert_challenge(&self, challenge: &Challenge) -> Result<(), StoreError> {
        self.ensure_available()?;
        self.challenges
            .write()
            .await
            .insert(challenge.id, challenge.clone());
        Ok(())
    }

    async fn get_challenge(&self, id: Uuid) -> Result<Option<Challenge>, StoreError> {
        self.ensure_available()?;
        Ok(self.challenges.read().await.get(&id).cloned())
    }

    async fn mark_challenge_used(
        &self,
        id: Uuid,
        used_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.ensure_available()?;
        let mut challenges = self.challenges.write().await;

        match challenges.get_mut(&id) {
            Some(challenge) if !challenge.used => {
                challenge.used = true;
                challenge.used_at = Some(used_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn purge_expired_challenges(&self, before: DateTime<Utc>) -> Result<u64, StoreError> {
        self.ensure_available()?;
        let mut challenges = self.challenges.write().await;
        let initial = challenges.len();
        challenges.retain(|_, c| c.expires_at >= before);
        Ok((initial - challenges.len()) as u64)
    }

    async fn insert_identity_if_absent(&self, identity: &Identity) -> Result<bool, StoreError> {
        self.ensure_available()?;
        let mut tables = self.identities.write().await;

        if tables.by_address.contains_key(&identity.address)
            || tables.address_by_id.contains_key(&identity.id)
        {
            return Ok(false);
        }

        tables
            .address_by_id
            .insert(identity.id, identity.address.clone());
        tables
            .by_address
            .insert(identity.address.clone(), identity.clone());
        Ok(true)
    }

    async fn get_identity_by_address(
        &self,
        address: &str,
    ) -> Result<Option<Identity>, StoreError> {
        self.ensure_available()?;
        Ok(self.identities.read().await.by_address.get(address).cloned())
    }

    async fn get_identity_by_id(&self, id: Uuid) -> Result<Option<Identity>, StoreError> {
        self.ensure_available()?;
        let tables = self.identities.read().await;
        Ok(tables
            .address_by_id
            .get(&id)
            .and_then(|address| tables.by_address.get(address))
            .cloned())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.ensure_available()
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
