//! Access guards as Axum extractors
//!
//! - [`AuthedUser`] rejects requests without a valid bearer access token.
//! - [`OptionalUser`] never rejects; it carries the identity when one was proven.
//! - [`VerifiedUser`] additionally requires the account's email to be verified,
//!   read from the store on every request.

use async_trait::async_trait;
use axum::{
    extract::{Extension, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use std::sync::Arc;
use tracing::{debug, warn};

use super::service::{AuthError, AuthService};
use super::token::TokenError;
use crate::common::{safe_email_log, ApiError, SharedState};

/// Authenticated caller, taken from the access token claims
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthedUser {
    pub id: String,
    pub email: String,
}

async fn auth_service_from_parts<S>(parts: &mut Parts, state: &S) -> Result<Arc<AuthService>, ApiError>
where
    S: Send + Sync,
{
    let Extension(state_lock): Extension<SharedState> =
        Extension::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::InternalServer("missing app state".to_string()))?;

    let auth_service = state_lock.read().await.auth_service.clone();
    Ok(auth_service)
}

/// Bearer credential from the Authorization header, if well-formed
fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn authenticate(service: &AuthService, token: &str) -> Result<AuthedUser, ApiError> {
    match service.tokens().verify(token) {
        Ok(claims) => {
            debug!(
                user_id = %claims.user_id,
                email = %safe_email_log(&claims.email),
                "Access token accepted"
            );
            Ok(AuthedUser {
                id: claims.user_id,
                email: claims.email,
            })
        }
        Err(TokenError::Expired) => {
            debug!("Access token expired");
            Err(ApiError::Unauthorized("Token expired".to_string()))
        }
        Err(e) => {
            warn!(error = %e, "Access token rejected");
            Err(ApiError::Unauthorized("Invalid token".to_string()))
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_service = auth_service_from_parts(parts, state).await?;

        let Some(token) = bearer_token(parts) else {
            debug!("Authentication failed: missing or malformed Authorization header");
            return Err(ApiError::Unauthorized("Unauthorized".to_string()));
        };

        authenticate(&auth_service, token)
    }
}

/// Identity when a valid bearer token was presented, `None` otherwise
#[derive(Debug, Clone)]
pub struct OptionalUser(pub Option<AuthedUser>);

#[async_trait]
impl<S> FromRequestParts<S> for OptionalUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_service = auth_service_from_parts(parts, state).await?;

        let user = bearer_token(parts).and_then(|token| authenticate(&auth_service, token).ok());
        Ok(OptionalUser(user))
    }
}

/// Authenticated caller whose email address has been verified
#[derive(Debug, Clone)]
pub struct VerifiedUser(pub AuthedUser);

#[async_trait]
impl<S> FromRequestParts<S> for VerifiedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthedUser::from_request_parts(parts, state).await?;
        let auth_service = auth_service_from_parts(parts, state).await?;

        match auth_service.is_email_verified(&user.id).await {
            Ok(true) => Ok(VerifiedUser(user)),
            Ok(false) => {
                debug!(user_id = %user.id, "Rejected request from unverified account");
                Err(ApiError::Forbidden("Email not verified".to_string()))
            }
            Err(AuthError::UserNotFound) => {
                warn!(user_id = %user.id, "Token subject no longer exists");
                Err(ApiError::Unauthorized("Unauthorized".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
