//! Authentication module
//!
//! Provides wallet-based authentication using ed25519 wallet addresses.
//! - Challenge-response authentication with single-use nonces
//! - Signature verification bound to the exact challenge bytes
//! - Stateless JWT credentials

pub mod address;
mod challenge;
pub mod clock;
mod crypto;
mod error;
mod identity;
mod jwt;
mod service;

pub use address::{Address, AddressError, ADDRESS_LENGTH};
pub use challenge::ChallengeStore;
pub use clock::{Clock, ManualClock, SystemClock};
pub use crypto::{CryptoError, DevBypass, SignatureVerifier};
pub use error::{AuthError, ErrorKind, UnauthenticatedReason};
pub use identity::IdentityRegistry;
pub use jwt::{Claims, Credential, CredentialIssuer, TokenError};
pub use service::{AuthOutcome, AuthService, AuthSettings};
