//! Authentication service
//!
//! Composes challenges, signature verification, identities and credentials
//! into the wallet sign-in protocol:
//!
//! 1. `request_challenge` issues a one-time message for an address
//! 2. the wallet signs the message
//! 3. `complete_signup` / `complete_login` redeem the challenge and return a
//!    bearer credential
//! 4. `authenticate` resolves a bearer credential to its identity

use std::sync::Arc;

use chrono::Duration;
use uuid::Uuid;

use super::challenge::ChallengeStore;
use super::clock::Clock;
use super::crypto::{DevBypass, SignatureVerifier};
use super::error::{AuthError, UnauthenticatedReason};
use super::identity::{validate_display_name, IdentityRegistry};
use super::jwt::{Credential, CredentialIssuer};
use crate::models::{ChallengeResponse, Identity, Role};
use crate::store::{bounded, AuthStore, StoreError};

/// Settings for the authentication service
#[derive(Clone)]
pub struct AuthSettings {
    pub jwt_secret: Vec<u8>,
    pub access_token_ttl: Duration,
    pub challenge_ttl: Duration,
    pub store_timeout: std::time::Duration,
    pub signing_prefix: Vec<u8>,
    pub dev_bypass: Option<DevBypass>,
}

/// Result of a successful signup or login
#[derive(Debug, Clone)]
pub struct AuthOutcome {
    pub credential: Credential,
    pub identity: Identity,
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn AuthStore>,
    challenges: ChallengeStore,
    identities: IdentityRegistry,
    credentials: CredentialIssuer,
    access_token_ttl: Duration,
    store_timeout: std::time::Duration,
}

impl AuthService {
    /// Create a new AuthService
    pub fn new(store: Arc<dyn AuthStore>, clock: Arc<dyn Clock>, settings: AuthSettings) -> Self {
        let verifier =
            SignatureVerifier::new(settings.signing_prefix).with_dev_bypass(settings.dev_bypass);
        if verifier.bypass_enabled() {
            tracing::warn!("Development signature bypass is ACTIVE; do not use this build in production");
        }

        Self {
            challenges: ChallengeStore::new(
                store.clone(),
                verifier,
                clock.clone(),
                settings.challenge_ttl,
                settings.store_timeout,
            ),
            identities: IdentityRegistry::new(store.clone(), clock.clone(), settings.store_timeout),
            credentials: CredentialIssuer::new(&settings.jwt_secret, clock),
            access_token_ttl: settings.access_token_ttl,
            store_timeout: settings.store_timeout,
            store,
        }
    }

    /// Generate a challenge for wallet authentication
    pub async fn request_challenge(&self, address: &str) -> Result<ChallengeResponse, AuthError> {
        let challenge = self.challenges.issue(address).await?;

        Ok(ChallengeResponse {
            message: challenge.message,
            challenge_id: challenge.id,
            expires_at: challenge.expires_at,
        })
    }

    /// Redeem a challenge and create the identity for its address
    pub async fn complete_signup(
        &self,
        challenge_id: Uuid,
        address: &str,
        message: &str,
        signature: &str,
        display_name: &str,
        role: &str,
    ) -> Result<AuthOutcome, AuthError> {
        // Reject malformed profile data before the challenge is consumed
        role.parse::<Role>()?;
        validate_display_name(display_name)?;

        self.challenges
            .redeem(challenge_id, address, message, signature)
            .await?;

        let identity = self
            .identities
            .register(address, display_name, role)
            .await?;

        let credential = self.issue_credential(&identity)?;
        Ok(AuthOutcome {
            credential,
            identity,
        })
    }

    /// Redeem a challenge and log in the identity for its address
    pub async fn complete_login(
        &self,
        challenge_id: Uuid,
        address: &str,
        message: &str,
        signature: &str,
    ) -> Result<AuthOutcome, AuthError> {
        self.challenges
            .redeem(challenge_id, address, message, signature)
            .await?;

        let identity = self
            .identities
            .lookup_by_address(address)
            .await?
            .ok_or(AuthError::NotRegistered)?;

        let credential = self.issue_credential(&identity)?;
        Ok(AuthOutcome {
            credential,
            identity,
        })
    }

    /// Resolve a bearer credential to its identity
    pub async fn authenticate(&self, token: &str) -> Result<Identity, AuthError> {
        let subject = self.credentials.validate(token)?;

        self.identities
            .lookup_by_id(subject)
            .await?
            .ok_or(AuthError::Unauthenticated(
                UnauthenticatedReason::UnknownIdentity,
            ))
    }

    /// Public identity lookup by wallet address
    pub async fn get_identity_by_address(&self, address: &str) -> Result<Identity, AuthError> {
        self.identities
            .lookup_by_address(address)
            .await?
            .ok_or(AuthError::IdentityNotFound)
    }

    /// Remove challenges that expired more than `grace` ago
    pub async fn purge_expired_challenges(&self, grace: Duration) -> Result<u64, AuthError> {
        self.challenges.purge_expired(grace).await
    }

    /// Check the backing store (for health checks)
    pub async fn store_health(&self) -> Result<(), StoreError> {
        bounded(self.store_timeout, self.store.health_check()).await
    }

    pub fn store_backend(&self) -> &'static str {
        self.store.backend_name()
    }

    /// Access token lifetime in seconds
    pub fn access_token_ttl_seconds(&self) -> i64 {
        self.access_token_ttl.num_seconds()
    }

    /// Bytes a wallet must sign for a challenge message
    pub fn signing_payload(&self, message: &str) -> Vec<u8> {
        self.challenges.verifier().signing_payload(message)
    }

    fn issue_credential(&self, identity: &Identity) -> Result<Credential, AuthError> {
        Ok(self
            .credentials
            .issue(identity.id, self.access_token_ttl)?)
    }
}
