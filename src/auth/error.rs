//! Authentication errors

use thiserror::Error;

use super::address::AddressError;
use super::crypto::CryptoError;
use super::jwt::TokenError;
use crate::models::UnknownRole;
use crate::store::StoreError;

/// Why a bearer credential was not accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnauthenticatedReason {
    TokenExpired,
    InvalidToken,
    UnknownIdentity,
}

impl UnauthenticatedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnauthenticatedReason::TokenExpired => "token expired",
            UnauthenticatedReason::InvalidToken => "invalid token",
            UnauthenticatedReason::UnknownIdentity => "identity no longer exists",
        }
    }
}

/// Broad error classes, used by the transport to pick status codes and by
/// callers to decide whether a retry makes sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input; do not retry.
    InputValidation,
    /// Challenge state forbids the request; restart at RequestChallenge.
    ProtocolState,
    /// Proof or credential rejected; retry only with new proof.
    Authentication,
    /// Duplicate registration; the caller may log in instead.
    Conflict,
    NotFound,
    /// Storage failure; may be retried with backoff.
    Infrastructure,
    Internal,
}

/// Auth service errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid wallet address: {0}")]
    InvalidAddress(String),

    #[error("Invalid signature format: {0}")]
    InvalidSignatureFormat(String),

    #[error("Invalid signature length: expected 64 bytes, got {0}")]
    InvalidSignatureLength(usize),

    #[error("Invalid role: {0}")]
    InvalidRole(String),

    #[error("Invalid display name: {0}")]
    InvalidDisplayName(String),

    #[error("Challenge not found")]
    ChallengeNotFound,

    #[error("Challenge expired")]
    ChallengeExpired,

    #[error("Challenge already used")]
    ChallengeAlreadyUsed,

    #[error("Challenge was issued for a different wallet address")]
    ChallengeAddressMismatch,

    #[error("Message does not match the issued challenge")]
    ChallengeMessageMismatch,

    #[error("Invalid signature: does not match wallet address")]
    SignatureMismatch,

    #[error("Unauthenticated: {}", .0.as_str())]
    Unauthenticated(UnauthenticatedReason),

    #[error("Wallet already registered")]
    AddressAlreadyRegistered,

    #[error("Wallet not registered. Please sign up first.")]
    NotRegistered,

    #[error("Identity not found")]
    IdentityNotFound,

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::InvalidAddress(_)
            | AuthError::InvalidSignatureFormat(_)
            | AuthError::InvalidSignatureLength(_)
            | AuthError::InvalidRole(_)
            | AuthError::InvalidDisplayName(_) => ErrorKind::InputValidation,

            AuthError::ChallengeNotFound
            | AuthError::ChallengeExpired
            | AuthError::ChallengeAlreadyUsed
            | AuthError::ChallengeAddressMismatch
            | AuthError::ChallengeMessageMismatch => ErrorKind::ProtocolState,

            AuthError::SignatureMismatch
            | AuthError::Unauthenticated(_)
            | AuthError::NotRegistered => ErrorKind::Authentication,

            AuthError::AddressAlreadyRegistered => ErrorKind::Conflict,
            AuthError::IdentityNotFound => ErrorKind::NotFound,
            AuthError::Store(_) => ErrorKind::Infrastructure,
            AuthError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Stable machine-readable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidAddress(_) => "INVALID_ADDRESS",
            AuthError::InvalidSignatureFormat(_) => "INVALID_SIGNATURE_FORMAT",
            AuthError::InvalidSignatureLength(_) => "INVALID_SIGNATURE_LENGTH",
            AuthError::InvalidRole(_) => "INVALID_ROLE",
            AuthError::InvalidDisplayName(_) => "INVALID_DISPLAY_NAME",
            AuthError::ChallengeNotFound => "CHALLENGE_NOT_FOUND",
            AuthError::ChallengeExpired => "CHALLENGE_EXPIRED",
            AuthError::ChallengeAlreadyUsed => "CHALLENGE_ALREADY_USED",
            AuthError::ChallengeAddressMismatch => "CHALLENGE_ADDRESS_MISMATCH",
            AuthError::ChallengeMessageMismatch => "CHALLENGE_MESSAGE_MISMATCH",
            AuthError::SignatureMismatch => "SIGNATURE_MISMATCH",
            AuthError::Unauthenticated(UnauthenticatedReason::TokenExpired) => "TOKEN_EXPIRED",
            AuthError::Unauthenticated(_) => "INVALID_TOKEN",
            AuthError::AddressAlreadyRegistered => "ADDRESS_ALREADY_REGISTERED",
            AuthError::NotRegistered => "NOT_REGISTERED",
            AuthError::IdentityNotFound => "IDENTITY_NOT_FOUND",
            AuthError::Store(_) => "SERVICE_UNAVAILABLE",
            AuthError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<AddressError> for AuthError {
    fn from(e: AddressError) -> Self {
        AuthError::InvalidAddress(e.to_string())
    }
}

impl From<CryptoError> for AuthError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::InvalidSignatureFormat(msg) => AuthError::InvalidSignatureFormat(msg),
            CryptoError::InvalidSignatureLength(len) => AuthError::InvalidSignatureLength(len),
            CryptoError::InvalidAddress(msg) => AuthError::InvalidAddress(msg),
            CryptoError::SignatureMismatch => AuthError::SignatureMismatch,
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::TokenExpired => {
                AuthError::Unauthenticated(UnauthenticatedReason::TokenExpired)
            }
            TokenError::TokenMalformed(_) | TokenError::TokenSignatureInvalid => {
                AuthError::Unauthenticated(UnauthenticatedReason::InvalidToken)
            }
            TokenError::InvalidTtl | TokenError::EncodingFailed(_) => {
                AuthError::Internal(e.to_string())
            }
        }
    }
}

impl From<UnknownRole> for AuthError {
    fn from(e: UnknownRole) -> Self {
        AuthError::InvalidRole(e.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crypto_errors_keep_their_class() {
        let err: AuthError = CryptoError::InvalidSignatureLength(10).into();
        assert_eq!(err, AuthError::InvalidSignatureLength(10));
        assert_eq!(err.kind(), ErrorKind::InputValidation);

        let err: AuthError = CryptoError::SignatureMismatch.into();
        assert_eq!(err.kind(), ErrorKind::Authentication);
    }

    #[test]
    fn test_token_errors_become_unauthenticated() {
        let err: AuthError = TokenError::TokenExpired.into();
        assert_eq!(
            err,
            AuthError::Unauthenticated(UnauthenticatedReason::TokenExpired)
        );
        assert_eq!(err.code(), "TOKEN_EXPIRED");

        let err: AuthError = TokenError::TokenSignatureInvalid.into();
        assert_eq!(err.code(), "INVALID_TOKEN");

        let err: AuthError = TokenError::InvalidTtl.into();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_store_errors_are_infrastructure() {
        let err: AuthError = StoreError::Timeout(2000).into();
        assert_eq!(err.kind(), ErrorKind::Infrastructure);
        assert_ne!(err, AuthError::NotRegistered);
    }
}
