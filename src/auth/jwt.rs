//! Session credential issuing and validation
//!
//! Credentials are HS256 JWTs whose payload is exactly `{sub, exp}`. The
//! algorithm is fixed on the server; tokens carrying any other `alg` header
//! are rejected before their claims are looked at.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::clock::Clock;

const ALGORITHM: Algorithm = Algorithm::HS256;

/// Credential-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token expired")]
    TokenExpired,

    #[error("Malformed token: {0}")]
    TokenMalformed(String),

    #[error("Token signature is invalid")]
    TokenSignatureInvalid,

    #[error("Token lifetime must be positive")]
    InvalidTtl,

    #[error("Token encoding failed: {0}")]
    EncodingFailed(String),
}

/// JWT claims carried by a credential
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (identity ID)
    pub sub: String,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

/// A freshly issued credential
#[derive(Debug, Clone)]
pub struct Credential {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Mints and validates bearer credentials
#[derive(Clone)]
pub struct CredentialIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for CredentialIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialIssuer")
            .field("algorithm", &ALGORITHM)
            .finish_non_exhaustive()
    }
}

impl CredentialIssuer {
    pub fn new(secret: &[u8], clock: Arc<dyn Clock>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            clock,
        }
    }

    /// Issue a credential for `subject` valid for `ttl`
    pub fn issue(&self, subject: Uuid, ttl: Duration) -> Result<Credential, TokenError> {
        if ttl <= Duration::zero() {
            return Err(TokenError::InvalidTtl);
        }

        let expires_at = self
            .clock
            .now()
            .checked_add_signed(ttl)
            .ok_or(TokenError::InvalidTtl)?;
        let claims = Claims {
            sub: subject.to_string(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| TokenError::EncodingFailed(e.to_string()))?;

        Ok(Credential { token, expires_at })
    }

    /// Validate a credential and return its subject
    pub fn validate(&self, token: &str) -> Result<Uuid, TokenError> {
        let claims = self.verified_claims(token)?;

        let now = self.clock.now().timestamp();
        if now > claims.exp {
            return Err(TokenError::TokenExpired);
        }

        Uuid::parse_str(&claims.sub).map_err(|e| TokenError::TokenMalformed(e.to_string()))
    }

    /// Decode claims after the signature has been checked. Expiry is
    /// compared separately against the injected clock.
    fn verified_claims(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(ALGORITHM);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let token_data =
            decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
                match e.kind() {
                    ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                        TokenError::TokenSignatureInvalid
                    }
                    _ => TokenError::TokenMalformed(e.to_string()),
                }
            })?;

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::clock::ManualClock;

    const SECRET: &[u8] = b"test-secret-key-with-enough-bytes!!";

    fn issuer_with_clock() -> (CredentialIssuer, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        (CredentialIssuer::new(SECRET, clock.clone()), clock)
    }

    #[test]
    fn test_issue_and_validate() {
        let (issuer, _) = issuer_with_clock();
        let subject = Uuid::new_v4();

        let credential = issuer.issue(subject, Duration::minutes(30)).unwrap();
        assert!(!credential.token.is_empty());
        assert_eq!(issuer.validate(&credential.token), Ok(subject));
    }

    #[test]
    fn test_payload_is_subject_and_expiry_only() {
        let (issuer, _) = issuer_with_clock();
        let credential = issuer.issue(Uuid::new_v4(), Duration::minutes(5)).unwrap();

        let payload = credential.token.split('.').nth(1).unwrap();
        let bytes = base64::Engine::decode(
            &base64::engine::general_purpose::URL_SAFE_NO_PAD,
            payload,
        )
        .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        let mut keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["exp".to_string(), "sub".to_string()]);
    }

    #[test]
    fn test_expiry_boundary() {
        let (issuer, clock) = issuer_with_clock();
        let subject = Uuid::new_v4();
        let credential = issuer.issue(subject, Duration::seconds(1800)).unwrap();

        clock.advance(Duration::seconds(1799));
        assert_eq!(issuer.validate(&credential.token), Ok(subject));

        clock.advance(Duration::seconds(2));
        assert_eq!(
            issuer.validate(&credential.token),
            Err(TokenError::TokenExpired)
        );
    }

    #[test]
    fn test_non_positive_ttl_rejected() {
        let (issuer, _) = issuer_with_clock();
        assert!(matches!(
            issuer.issue(Uuid::new_v4(), Duration::zero()),
            Err(TokenError::InvalidTtl)
        ));
    }

    #[test]
    fn test_ttl_past_calendar_range_rejected() {
        let (issuer, _) = issuer_with_clock();
        assert!(matches!(
            issuer.issue(Uuid::new_v4(), Duration::days(365 * 300_000)),
            Err(TokenError::InvalidTtl)
        ));
    }

    #[test]
    fn test_malformed_token() {
        let (issuer, _) = issuer_with_clock();
        assert!(matches!(
            issuer.validate("invalid.token.here"),
            Err(TokenError::TokenMalformed(_))
        ));
        assert!(matches!(
            issuer.validate(""),
            Err(TokenError::TokenMalformed(_))
        ));
    }

    #[test]
    fn test_wrong_secret() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let issuer_a = CredentialIssuer::new(b"secret-one-secret-one-secret-one!", clock.clone());
        let issuer_b = CredentialIssuer::new(b"secret-two-secret-two-secret-two!", clock);

        let credential = issuer_a.issue(Uuid::new_v4(), Duration::minutes(5)).unwrap();
        assert_eq!(
            issuer_b.validate(&credential.token),
            Err(TokenError::TokenSignatureInvalid)
        );
    }

    #[test]
    fn test_other_algorithm_rejected() {
        let (issuer, clock) = issuer_with_clock();
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            exp: (clock.now() + Duration::minutes(5)).timestamp(),
        };
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();

        assert_eq!(
            issuer.validate(&token),
            Err(TokenError::TokenSignatureInvalid)
        );
    }

    #[test]
    fn test_non_uuid_subject_is_malformed() {
        let (issuer, clock) = issuer_with_clock();
        let claims = Claims {
            sub: "user_ABC".to_string(),
            exp: (clock.now() + Duration::minutes(5)).timestamp(),
        };
        let token = encode(&Header::new(ALGORITHM), &claims, &EncodingKey::from_secret(SECRET))
            .unwrap();

        assert!(matches!(
            issuer.validate(&token),
            Err(TokenError::TokenMalformed(_))
        ));
    }
}
