//! Wallet address encoding
//!
//! Addresses are the RFC 4648 base32 encoding (no padding) of a 32-byte
//! ed25519 public key followed by a 4-byte checksum. The checksum is the last
//! four bytes of the SHA-512/256 digest of the public key, giving a fixed
//! 58-character string.

use std::fmt;
use std::str::FromStr;

use base32::Alphabet;
use sha2::{Digest, Sha512_256};
use thiserror::Error;

/// Length of an encoded address in characters
pub const ADDRESS_LENGTH: usize = 58;

const PUBLIC_KEY_LENGTH: usize = 32;
const CHECKSUM_LENGTH: usize = 4;
const ALPHABET: Alphabet = Alphabet::Rfc4648 { padding: false };

/// Errors that can occur while decoding an address
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("Expected 58 characters, got {0}")]
    InvalidLength(usize),

    #[error("Invalid base32 encoding")]
    InvalidEncoding,

    #[error("Invalid address checksum")]
    InvalidChecksum,
}

/// A decoded wallet address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    encoded: String,
    public_key: [u8; PUBLIC_KEY_LENGTH],
}

impl Address {
    /// Parse and checksum-verify an encoded address.
    pub fn parse(address: &str) -> Result<Self, AddressError> {
        let char_count = address.chars().count();
        if char_count != ADDRESS_LENGTH {
            return Err(AddressError::InvalidLength(char_count));
        }

        // The base32 crate is case-insensitive; addresses are upper case only.
        if !address
            .bytes()
            .all(|b| b.is_ascii_uppercase() || (b'2'..=b'7').contains(&b))
        {
            return Err(AddressError::InvalidEncoding);
        }

        let decoded = base32::decode(ALPHABET, address).ok_or(AddressError::InvalidEncoding)?;
        if decoded.len() != PUBLIC_KEY_LENGTH + CHECKSUM_LENGTH {
            return Err(AddressError::InvalidEncoding);
        }

        let mut public_key = [0u8; PUBLIC_KEY_LENGTH];
        public_key.copy_from_slice(&decoded[..PUBLIC_KEY_LENGTH]);

        if decoded[PUBLIC_KEY_LENGTH..] != checksum(&public_key) {
            return Err(AddressError::InvalidChecksum);
        }

        // Trailing pad bits must be zero so every key has exactly one encoding
        let canonical = Self::from_public_key(&public_key);
        if canonical.encoded != address {
            return Err(AddressError::InvalidEncoding);
        }

        Ok(canonical)
    }

    /// Encode a public key as an address.
    pub fn from_public_key(public_key: &[u8; PUBLIC_KEY_LENGTH]) -> Self {
        let mut bytes = Vec::with_capacity(PUBLIC_KEY_LENGTH + CHECKSUM_LENGTH);
        bytes.extend_from_slice(public_key);
        bytes.extend_from_slice(&checksum(public_key));

        Self {
            encoded: base32::encode(ALPHABET, &bytes),
            public_key: *public_key,
        }
    }

    pub fn public_key(&self) -> &[u8; PUBLIC_KEY_LENGTH] {
        &self.public_key
    }

    pub fn as_str(&self) -> &str {
        &self.encoded
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encoded)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::parse(s)
    }
}

fn checksum(public_key: &[u8; PUBLIC_KEY_LENGTH]) -> [u8; CHECKSUM_LENGTH] {
    let digest = Sha512_256::digest(public_key);
    let mut out = [0u8; CHECKSUM_LENGTH];
    out.copy_from_slice(&digest[digest.len() - CHECKSUM_LENGTH..]);
    out
}
