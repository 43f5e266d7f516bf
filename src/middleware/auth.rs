//! Bearer credential extraction
//!
//! Resolves `Authorization: Bearer <token>` to the identity it was issued for.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use std::sync::Arc;

use crate::auth::AuthService;
use crate::error::{ApiError, ErrorDetails, ErrorResponse};
use crate::models::Identity;

/// Identity resolved from a valid bearer credential
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub identity: Identity,
}

/// Rejection for requests without a usable bearer credential
#[derive(Debug)]
pub enum AuthRejection {
    MissingToken,
    Api(ApiError),
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            AuthRejection::MissingToken => {
                let body = ErrorResponse {
                    error: ErrorDetails {
                        code: "MISSING_TOKEN".to_string(),
                        message: "Authorization header with Bearer token required".to_string(),
                        details: None,
                    },
                };
                (StatusCode::UNAUTHORIZED, Json(body)).into_response()
            }
            AuthRejection::Api(err) => err.into_response(),
        }
    }
}

/// Extractor for authenticated identities
///
/// ```rust,ignore
/// async fn protected_handler(user: AuthenticatedUser) -> impl IntoResponse {
///     format!("Hello, {}", user.identity.display_name)
/// }
/// ```
#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<AuthService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AuthRejection::MissingToken)?;

        let auth_service = Arc::<AuthService>::from_ref(state);

        let identity = auth_service
            .authenticate(bearer.token())
            .await
            .map_err(|e| AuthRejection::Api(e.into()))?;

        Ok(AuthenticatedUser { identity })
    }
}
