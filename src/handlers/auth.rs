//! Authentication HTTP handlers
//!
//! Endpoints for wallet challenge-response sign-in.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use validator::Validate;

use super::AuthenticatedUser;
use crate::auth::AuthOutcome;
use crate::error::ApiError;
use crate::models::{
    AuthTokenResponse, ChallengeRequest, ChallengeResponse, IdentityResponse, LoginRequest,
    SignupRequest,
};
use crate::state::AppState;

/// POST /auth/challenge - Request a one-time message to sign
pub async fn request_challenge(
    State(state): State<AppState>,
    body: Result<Json<ChallengeRequest>, JsonRejection>,
) -> Result<Json<ChallengeResponse>, ApiError> {
    let Json(req) = body?;
    req.validate()?;

    let challenge = state
        .auth_service
        .request_challenge(&req.wallet_address)
        .await?;

    tracing::debug!(
        challenge_id = %challenge.challenge_id,
        wallet = %req.wallet_address,
        "Challenge issued"
    );

    Ok(Json(challenge))
}

/// POST /auth/signup - Redeem a signed challenge and create an identity
pub async fn signup(
    State(state): State<AppState>,
    body: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<Json<AuthTokenResponse>, ApiError> {
    let Json(req) = body?;
    req.validate()?;

    let outcome = state
        .auth_service
        .complete_signup(
            req.challenge_id,
            &req.wallet_address,
            &req.message,
            &req.signature,
            &req.display_name,
            &req.role,
        )
        .await
        .map_err(|e| {
            tracing::info!(wallet = %req.wallet_address, code = e.code(), "Signup rejected");
            e
        })?;

    tracing::info!(
        identity_id = %outcome.identity.id,
        role = %outcome.identity.role,
        "Identity registered"
    );

    Ok(Json(token_response(&state, outcome)))
}

/// POST /auth/login - Redeem a signed challenge for an existing identity
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthTokenResponse>, ApiError> {
    let Json(req) = body?;
    req.validate()?;

    let outcome = state
        .auth_service
        .complete_login(
            req.challenge_id,
            &req.wallet_address,
            &req.message,
            &req.signature,
        )
        .await
        .map_err(|e| {
            tracing::info!(wallet = %req.wallet_address, code = e.code(), "Login rejected");
            e
        })?;

    tracing::info!(identity_id = %outcome.identity.id, "Login succeeded");

    Ok(Json(token_response(&state, outcome)))
}

/// GET /auth/me - Identity behind the bearer credential
pub async fn get_current_user(user: AuthenticatedUser) -> Json<IdentityResponse> {
    Json(user.identity.into())
}

/// GET /identities/:address - Public identity lookup
pub async fn get_identity(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<IdentityResponse>, ApiError> {
    let identity = state.auth_service.get_identity_by_address(&address).await?;

    Ok(Json(identity.into()))
}

fn token_response(state: &AppState, outcome: AuthOutcome) -> AuthTokenResponse {
    AuthTokenResponse {
        access_token: outcome.credential.token,
        token_type: "Bearer".to_string(),
        expires_in: state.auth_service.access_token_ttl_seconds(),
        user: outcome.identity.into(),
    }
}
