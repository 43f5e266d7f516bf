//! Authentication request and response DTOs

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

use super::Role;

/// Request for authentication challenge
#[derive(Debug, Deserialize, Validate)]
pub struct ChallengeRequest {
    #[validate(length(equal = 58, message = "wallet address must be 58 characters"))]
    pub wallet_address: String,
}

/// Response containing the authentication challenge
#[derive(Debug, Serialize, Deserialize)]
pub struct ChallengeResponse {
    pub message: String,
    pub challenge_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// Request to create an identity with a signed challenge
#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    pub challenge_id: Uuid,
    #[validate(length(equal = 58, message = "wallet address must be 58 characters"))]
    pub wallet_address: String,
    pub message: String,
    pub signature: String, // Base64-encoded signature
    #[serde(alias = "username")]
    #[validate(length(min = 1, max = 64))]
    pub display_name: String,
    // Parsed by the service so unknown roles map to InvalidRole
    pub role: String,
}

/// Request to log in with a signed challenge
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    pub challenge_id: Uuid,
    #[validate(length(equal = 58, message = "wallet address must be 58 characters"))]
    pub wallet_address: String,
    pub message: String,
    pub signature: String,
}

/// Auth token response
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthTokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: IdentityResponse,
}

/// Identity response (sanitized for API)
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct IdentityResponse {
    pub id: Uuid,
    pub wallet_address: String,
    pub display_name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}
