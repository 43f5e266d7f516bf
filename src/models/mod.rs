//! Data models for the wallet authentication server

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod auth;
pub use auth::*;

/// Identity record, one per wallet address
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: Uuid,
    pub address: String,
    pub display_name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl From<Identity> for IdentityResponse {
    fn from(identity: Identity) -> Self {
        Self {
            id: identity.id,
            wallet_address: identity.address,
            display_name: identity.display_name,
            role: identity.role,
            created_at: identity.created_at,
        }
    }
}

/// Identity roles
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq, Hash)]
#[sqlx(type_name = "identity_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Creator,
    Viewer,
    Advertiser,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Creator => "creator",
            Role::Viewer => "viewer",
            Role::Advertiser => "advertiser",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a role string is not one of the enumerated roles.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role '{0}', expected creator, viewer or advertiser")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "creator" => Ok(Role::Creator),
            "viewer" => Ok(Role::Viewer),
            "advertiser" => Ok(Role::Advertiser),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// One-time authentication challenge
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub id: Uuid,
    pub address: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub used_at: Option<DateTime<Utc>>,
}

impl Challenge {
    /// A challenge is expired strictly after its expiry instant.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}
