//! Wallet signature verification
//!
//! Verifies ed25519 signatures produced by wallets over challenge messages.

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine as _;
use ed25519_dalek::{Signature, VerifyingKey, SIGNATURE_LENGTH};
use thiserror::Error;

use super::address::{Address, AddressError};

/// Errors that can occur during signature verification
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Invalid signature format: {0}")]
    InvalidSignatureFormat(String),

    #[error("Invalid signature length: expected 64 bytes, got {0}")]
    InvalidSignatureLength(usize),

    #[error("Invalid wallet address: {0}")]
    InvalidAddress(String),

    #[error("Signature does not match wallet address")]
    SignatureMismatch,
}

impl From<AddressError> for CryptoError {
    fn from(e: AddressError) -> Self {
        CryptoError::InvalidAddress(e.to_string())
    }
}

/// Development-only signature bypass.
///
/// SECURITY: when active, any signature starting with `prefix` is accepted
/// without verification. It is only constructible when the crate is built
/// with the `dev-signature-bypass` feature, and configuration refuses to
/// enable it in production.
#[derive(Debug, Clone)]
pub struct DevBypass {
    prefix: String,
}

impl DevBypass {
    #[cfg(feature = "dev-signature-bypass")]
    pub fn new(prefix: impl Into<String>) -> Option<Self> {
        let prefix = prefix.into();
        if prefix.is_empty() {
            return None;
        }
        Some(Self { prefix })
    }

    #[cfg(not(feature = "dev-signature-bypass"))]
    pub fn new(_prefix: impl Into<String>) -> Option<Self> {
        None
    }
}

/// Verifies wallet signatures over challenge messages.
///
/// The verified bytes are `signing_prefix || message`; the message is used
/// exactly as given and never normalized.
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    signing_prefix: Vec<u8>,
    dev_bypass: Option<DevBypass>,
}

impl SignatureVerifier {
    pub fn new(signing_prefix: impl Into<Vec<u8>>) -> Self {
        Self {
            signing_prefix: signing_prefix.into(),
            dev_bypass: None,
        }
    }

    /// Attach a development bypass. Has no effect unless `DevBypass` could be
    /// constructed, which requires the `dev-signature-bypass` feature.
    pub fn with_dev_bypass(mut self, bypass: Option<DevBypass>) -> Self {
        self.dev_bypass = bypass;
        self
    }

    pub fn bypass_enabled(&self) -> bool {
        self.dev_bypass.is_some()
    }

    /// Bytes a wallet must sign for `message`.
    pub fn signing_payload(&self, message: &str) -> Vec<u8> {
        let mut payload = Vec::with_capacity(self.signing_prefix.len() + message.len());
        payload.extend_from_slice(&self.signing_prefix);
        payload.extend_from_slice(message.as_bytes());
        payload
    }

    /// Verify a wallet signature
    ///
    /// # Arguments
    /// * `address` - 58-character wallet address
    /// * `message` - The exact message that was signed
    /// * `signature_base64` - Base64-encoded 64-byte ed25519 signature
    ///
    /// # Returns
    /// * `Ok(true)` if signature is valid
    /// * `Err(CryptoError)` otherwise
    pub fn verify(
        &self,
        address: &str,
        message: &str,
        signature_base64: &str,
    ) -> Result<bool, CryptoError> {
        if let Some(bypass) = &self.dev_bypass {
            if signature_base64.starts_with(&bypass.prefix) {
                tracing::warn!(
                    wallet = %address,
                    "Development signature accepted without verification"
                );
                return Ok(true);
            }
        }

        let signature_bytes = decode_signature(signature_base64)?;
        if signature_bytes.len() != SIGNATURE_LENGTH {
            return Err(CryptoError::InvalidSignatureLength(signature_bytes.len()));
        }

        let address = Address::parse(address)?;
        let verifying_key = VerifyingKey::from_bytes(address.public_key())
            .map_err(|e| CryptoError::InvalidAddress(e.to_string()))?;

        let signature = Signature::from_slice(&signature_bytes)
            .map_err(|e| CryptoError::InvalidSignatureFormat(e.to_string()))?;

        match verifying_key.verify_strict(&self.signing_payload(message), &signature) {
            Ok(()) => Ok(true),
            Err(_) => Err(CryptoError::SignatureMismatch),
        }
    }
}

/// Decode base64, accepting padded and unpadded standard encodings
fn decode_signature(encoded: &str) -> Result<Vec<u8>, CryptoError> {
    STANDARD
        .decode(encoded)
        .or_else(|_| STANDARD_NO_PAD.decode(encoded))
        .map_err(|e| CryptoError::InvalidSignatureFormat(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};

    fn test_wallet() -> (SigningKey, String) {
        let signing_key = SigningKey::generate(&mut rand::rngs::OsRng);
        let address = Address::from_public_key(signing_key.verifying_key().as_bytes());
        (signing_key, address.to_string())
    }

    fn sign(verifier: &SignatureVerifier, key: &SigningKey, message: &str) -> String {
        STANDARD.encode(key.sign(&verifier.signing_payload(message)).to_bytes())
    }

    #[test]
    fn test_valid_signature() {
        let verifier = SignatureVerifier::new("MX");
        let (key, address) = test_wallet();
        let message = "Sign this message to verify ownership";

        let signature = sign(&verifier, &key, message);
        assert_eq!(verifier.verify(&address, message, &signature), Ok(true));
    }

    #[test]
    fn test_signature_bound_to_exact_message() {
        let verifier = SignatureVerifier::new("MX");
        let (key, address) = test_wallet();
        let signature = sign(&verifier, &key, "Timestamp: 1");

        assert_eq!(
            verifier.verify(&address, "Timestamp: 2", &signature),
            Err(CryptoError::SignatureMismatch)
        );
        // Whitespace is significant
        assert_eq!(
            verifier.verify(&address, "Timestamp: 1 ", &signature),
            Err(CryptoError::SignatureMismatch)
        );
    }

    #[test]
    fn test_signing_prefix_is_part_of_payload() {
        let prefixed = SignatureVerifier::new("MX");
        let raw = SignatureVerifier::new(Vec::new());
        let (key, address) = test_wallet();

        let raw_signature = sign(&raw, &key, "hello");
        assert_eq!(raw.verify(&address, "hello", &raw_signature), Ok(true));
        assert_eq!(
            prefixed.verify(&address, "hello", &raw_signature),
            Err(CryptoError::SignatureMismatch)
        );
    }

    #[test]
    fn test_signature_from_other_wallet() {
        let verifier = SignatureVerifier::new("MX");
        let (key_a, _) = test_wallet();
        let (_, address_b) = test_wallet();

        let signature = sign(&verifier, &key_a, "hello");
        assert_eq!(
            verifier.verify(&address_b, "hello", &signature),
            Err(CryptoError::SignatureMismatch)
        );
    }

    #[test]
    fn test_invalid_signature_format() {
        let verifier = SignatureVerifier::new("MX");
        let (_, address) = test_wallet();

        let result = verifier.verify(&address, "hello", "not base64!!");
        assert!(matches!(result, Err(CryptoError::InvalidSignatureFormat(_))));
    }

    #[test]
    fn test_invalid_signature_length() {
        let verifier = SignatureVerifier::new("MX");
        let (_, address) = test_wallet();

        let short = STANDARD.encode([1u8; 32]);
        assert_eq!(
            verifier.verify(&address, "hello", &short),
            Err(CryptoError::InvalidSignatureLength(32))
        );
    }

    #[test]
    fn test_invalid_address() {
        let verifier = SignatureVerifier::new("MX");
        let signature = STANDARD.encode([0u8; 64]);

        let result = verifier.verify("NOT-AN-ADDRESS", "hello", &signature);
        assert!(matches!(result, Err(CryptoError::InvalidAddress(_))));
    }

    #[test]
    fn test_unpadded_signature_accepted() {
        let verifier = SignatureVerifier::new("MX");
        let (key, address) = test_wallet();
        let signature = STANDARD_NO_PAD.encode(key.sign(&verifier.signing_payload("hi")).to_bytes());

        assert_eq!(verifier.verify(&address, "hi", &signature), Ok(true));
    }

    #[cfg(not(feature = "dev-signature-bypass"))]
    #[test]
    fn test_dev_signatures_rejected_without_feature() {
        assert!(DevBypass::new("dev_sig_").is_none());

        let verifier = SignatureVerifier::new("MX").with_dev_bypass(DevBypass::new("dev_sig_"));
        let (_, address) = test_wallet();

        assert!(!verifier.bypass_enabled());
        assert!(verifier.verify(&address, "hello", "dev_sig_abc").is_err());
    }

    #[cfg(feature = "dev-signature-bypass")]
    #[test]
    fn test_dev_signatures_accepted_with_feature() {
        let verifier = SignatureVerifier::new("MX").with_dev_bypass(DevBypass::new("dev_sig_"));
        let (_, address) = test_wallet();

        assert!(verifier.bypass_enabled());
        assert_eq!(verifier.verify(&address, "hello", "dev_sig_abc"), Ok(true));
    }
}
