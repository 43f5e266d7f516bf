//! One-time challenge lifecycle
//!
//! A challenge binds a server-chosen message to one wallet address for a
//! limited time. It can be redeemed at most once, and only with a valid
//! signature over its exact message bytes.

use std::sync::Arc;

use chrono::{Duration, SecondsFormat};
use rand::RngCore;
use uuid::Uuid;

use super::address::Address;
use super::clock::Clock;
use super::crypto::SignatureVerifier;
use super::error::AuthError;
use crate::models::Challenge;
use crate::store::{bounded, AuthStore};

/// Issues and redeems challenges
#[derive(Clone)]
pub struct ChallengeStore {
    store: Arc<dyn AuthStore>,
    verifier: SignatureVerifier,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    store_timeout: std::time::Duration,
}

impl ChallengeStore {
    pub fn new(
        store: Arc<dyn AuthStore>,
        verifier: SignatureVerifier,
        clock: Arc<dyn Clock>,
        ttl: Duration,
        store_timeout: std::time::Duration,
    ) -> Self {
        Self {
            store,
            verifier,
            clock,
            ttl,
            store_timeout,
        }
    }

    pub fn verifier(&self) -> &SignatureVerifier {
        &self.verifier
    }

    /// Create and persist a fresh challenge for `address`
    pub async fn issue(&self, address: &str) -> Result<Challenge, AuthError> {
        let address = Address::parse(address)?;

        let now = self.clock.now();
        let message = format!(
            "Sign this message to verify ownership of {}.\n\nNonce: {}\nTimestamp: {}",
            address,
            generate_secure_nonce(),
            now.to_rfc3339_opts(SecondsFormat::Nanos, true)
        );

        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| AuthError::Internal("challenge expiry out of range".to_string()))?;

        let challenge = Challenge {
            id: Uuid::new_v4(),
            address: address.to_string(),
            message,
            created_at: now,
            expires_at,
            used: false,
            used_at: None,
        };

        bounded(self.store_timeout, self.store.insert_challenge(&challenge)).await?;

        Ok(challenge)
    }

    /// Consume a challenge with a signature over its exact message.
    ///
    /// Returns the redeemed challenge. Under concurrent redemption of the
    /// same id exactly one caller succeeds; the rest get
    /// `ChallengeAlreadyUsed`.
    pub async fn redeem(
        &self,
        id: Uuid,
        address: &str,
        raw_message: &str,
        signature: &str,
    ) -> Result<Challenge, AuthError> {
        let mut challenge = bounded(self.store_timeout, self.store.get_challenge(id))
            .await?
            .ok_or(AuthError::ChallengeNotFound)?;

        if challenge.is_expired_at(self.clock.now()) {
            return Err(AuthError::ChallengeExpired);
        }

        if challenge.used {
            return Err(AuthError::ChallengeAlreadyUsed);
        }

        if challenge.address != address {
            return Err(AuthError::ChallengeAddressMismatch);
        }

        if challenge.message.as_bytes() != raw_message.as_bytes() {
            return Err(AuthError::ChallengeMessageMismatch);
        }

        self.verifier
            .verify(&challenge.address, &challenge.message, signature)?;

        let used_at = self.clock.now();
        let won = bounded(
            self.store_timeout,
            self.store.mark_challenge_used(challenge.id, used_at),
        )
        .await?;

        if !won {
            return Err(AuthError::ChallengeAlreadyUsed);
        }

        challenge.used = true;
        challenge.used_at = Some(used_at);
        Ok(challenge)
    }

    /// Delete challenges that expired more than `grace` ago
    pub async fn purge_expired(&self, grace: Duration) -> Result<u64, AuthError> {
        let cutoff = self.clock.now() - grace;
        let purged = bounded(
            self.store_timeout,
            self.store.purge_expired_challenges(cutoff),
        )
        .await?;
        Ok(purged)
    }
}

/// Generate a cryptographically secure nonce
fn generate_secure_nonce() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::clock::ManualClock;
    use crate::store::MemoryStore;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use chrono::Utc;
    use ed25519_dalek::{Signer, SigningKey};

    struct Fixture {
        challenges: ChallengeStore,
        clock: Arc<ManualClock>,
        key: SigningKey,
        address: String,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let challenges = ChallengeStore::new(
            Arc::new(MemoryStore::new()),
            SignatureVerifier::new("MX"),
            clock.clone(),
            Duration::minutes(5),
            std::time::Duration::from_secs(2),
        );
        let key = SigningKey::generate(&mut rand::rngs::OsRng);
        let address = Address::from_public_key(key.verifying_key().as_bytes()).to_string();

        Fixture {
            challenges,
            clock,
            key,
            address,
        }
    }

    fn sign(f: &Fixture, message: &str) -> String {
        let payload = f.challenges.verifier().signing_payload(message);
        STANDARD.encode(f.key.sign(&payload).to_bytes())
    }

    #[tokio::test]
    async fn test_issue_embeds_address_and_expiry() {
        let f = fixture();
        let challenge = f.challenges.issue(&f.address).await.unwrap();

        assert!(challenge.message.contains(&f.address));
        assert!(challenge.message.contains("Nonce: "));
        assert!(challenge.message.contains("Timestamp: "));
        assert_eq!(challenge.expires_at - challenge.created_at, Duration::minutes(5));
        assert!(!challenge.used);
    }

    #[tokio::test]
    async fn test_issue_messages_are_unique() {
        let f = fixture();
        // Same instant on the manual clock; the nonce alone must differ
        let a = f.challenges.issue(&f.address).await.unwrap();
        let b = f.challenges.issue(&f.address).await.unwrap();

        assert_ne!(a.id, b.id);
        assert_ne!(a.message, b.message);
    }

    #[tokio::test]
    async fn test_issue_rejects_bad_address() {
        let f = fixture();
        let result = f.challenges.issue("GABC").await;
        assert!(matches!(result, Err(AuthError::InvalidAddress(_))));
    }

    #[tokio::test]
    async fn test_issue_with_out_of_range_ttl_fails() {
        let f = fixture();
        let challenges = ChallengeStore::new(
            Arc::new(MemoryStore::new()),
            SignatureVerifier::new("MX"),
            f.clock.clone(),
            Duration::days(365 * 300_000),
            std::time::Duration::from_secs(2),
        );

        let result = challenges.issue(&f.address).await;
        assert!(matches!(result, Err(AuthError::Internal(_))));
    }

    #[tokio::test]
    async fn test_redeem_once() {
        let f = fixture();
        let challenge = f.challenges.issue(&f.address).await.unwrap();
        let signature = sign(&f, &challenge.message);

        let redeemed = f
            .challenges
            .redeem(challenge.id, &f.address, &challenge.message, &signature)
            .await
            .unwrap();
        assert!(redeemed.used);

        let again = f
            .challenges
            .redeem(challenge.id, &f.address, &challenge.message, &signature)
            .await;
        assert_eq!(again, Err(AuthError::ChallengeAlreadyUsed));
    }

    #[tokio::test]
    async fn test_redeem_unknown_id() {
        let f = fixture();
        let result = f
            .challenges
            .redeem(Uuid::new_v4(), &f.address, "msg", "sig")
            .await;
        assert_eq!(result, Err(AuthError::ChallengeNotFound));
    }

    #[tokio::test]
    async fn test_redeem_after_expiry_with_valid_signature() {
        let f = fixture();
        let challenge = f.challenges.issue(&f.address).await.unwrap();
        let signature = sign(&f, &challenge.message);

        f.clock.advance(Duration::minutes(5) + Duration::seconds(1));

        let result = f
            .challenges
            .redeem(challenge.id, &f.address, &challenge.message, &signature)
            .await;
        assert_eq!(result, Err(AuthError::ChallengeExpired));
    }

    #[tokio::test]
    async fn test_redeem_altered_message() {
        let f = fixture();
        let challenge = f.challenges.issue(&f.address).await.unwrap();

        let mut altered = challenge.message.clone();
        altered.pop();
        altered.push('#');
        let signature = sign(&f, &altered);

        let result = f
            .challenges
            .redeem(challenge.id, &f.address, &altered, &signature)
            .await;
        assert_eq!(result, Err(AuthError::ChallengeMessageMismatch));
    }

    #[tokio::test]
    async fn test_redeem_for_other_address() {
        let f = fixture();
        let other = fixture();
        let challenge = f.challenges.issue(&f.address).await.unwrap();
        let signature = sign(&f, &challenge.message);

        let result = f
            .challenges
            .redeem(challenge.id, &other.address, &challenge.message, &signature)
            .await;
        assert_eq!(result, Err(AuthError::ChallengeAddressMismatch));
    }

    #[tokio::test]
    async fn test_failed_signature_does_not_consume() {
        let f = fixture();
        let challenge = f.challenges.issue(&f.address).await.unwrap();
        let wrong = STANDARD.encode(f.key.sign(b"something else").to_bytes());

        let result = f
            .challenges
            .redeem(challenge.id, &f.address, &challenge.message, &wrong)
            .await;
        assert_eq!(result, Err(AuthError::SignatureMismatch));

        let signature = sign(&f, &challenge.message);
        assert!(f
            .challenges
            .redeem(challenge.id, &f.address, &challenge.message, &signature)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_redeem_single_winner() {
        let f = fixture();
        let challenge = f.challenges.issue(&f.address).await.unwrap();
        let signature = sign(&f, &challenge.message);

        let attempts = (0..8).map(|_| {
            f.challenges
                .redeem(challenge.id, &f.address, &challenge.message, &signature)
        });
        let results = futures_util::future::join_all(attempts).await;

        let successes = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1);
        assert!(results
            .iter()
            .filter(|r| r.is_err())
            .all(|r| r == &Err(AuthError::ChallengeAlreadyUsed)));
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let f = fixture();
        let challenge = f.challenges.issue(&f.address).await.unwrap();

        assert_eq!(f.challenges.purge_expired(Duration::zero()).await, Ok(0));

        f.clock.advance(Duration::minutes(10));
        assert_eq!(f.challenges.purge_expired(Duration::minutes(1)).await, Ok(1));

        let result = f
            .challenges
            .redeem(challenge.id, &f.address, &challenge.message, "sig")
            .await;
        assert_eq!(result, Err(AuthError::ChallengeNotFound));
    }
}
