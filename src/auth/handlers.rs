//! Authentication handlers

use axum::{
    extract::{rejection::JsonRejection, Extension, Json, Query},
    http::{header::LOCATION, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::{debug, error, info, warn};

use super::extractors::AuthedUser;
use super::models::{
    AuthSession, MessageResponse, OAuthCallbackQuery, OAuthExchangeRequest, OAuthUrlResponse,
    RefreshRequest, SignInRequest, SignUpRequest, TokenPair, UpdateProfileRequest, UserEnvelope,
    VerifyEmailQuery,
};
use super::validators::{SignInValidator, SignUpValidator, UpdateProfileValidator};
use crate::common::{safe_email_log, safe_token_log, ApiError, SharedState, Validator};

/// 302 to `location`
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(LOCATION, location.to_string())]).into_response()
}

/// POST /auth/sign-up
///
/// Creates a password account and attempts to send the verification email.
/// Responds 201 with `{ "user": { ... } }`.
pub async fn sign_up(
    Extension(state_lock): Extension<SharedState>,
    payload: Result<Json<SignUpRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserEnvelope>), ApiError> {
    let Json(request) = payload?;

    let validation = SignUpValidator.validate(&request);
    if !validation.is_valid {
        debug!(errors = ?validation.errors, "Sign-up validation failed");
        return Err(ApiError::from(validation));
    }

    let auth_service = state_lock.read().await.auth_service.clone();
    let user = auth_service.sign_up(&request).await?;

    Ok((StatusCode::CREATED, Json(UserEnvelope { user })))
}

/// POST /auth/sign-in
pub async fn sign_in(
    Extension(state_lock): Extension<SharedState>,
    payload: Result<Json<SignInRequest>, JsonRejection>,
) -> Result<Json<AuthSession>, ApiError> {
    let Json(request) = payload?;
    SignInValidator.validate(&request).into_result()?;

    let auth_service = state_lock.read().await.auth_service.clone();
    let session = auth_service.sign_in(&request).await.map_err(|e| {
        debug!(email = %safe_email_log(&request.email), error = %e, "Sign-in failed");
        e
    })?;

    Ok(Json(session))
}

/// POST /auth/sign-out
///
/// An absent or unknown refresh token is not an error; only a store failure
/// turns into a 500.
pub async fn sign_out(
    Extension(state_lock): Extension<SharedState>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let request = payload.map(|Json(r)| r).unwrap_or_default();

    if !request.refresh_token.is_empty() {
        let auth_service = state_lock.read().await.auth_service.clone();
        auth_service
            .sign_out(&request.refresh_token)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to revoke refresh token on sign-out");
                ApiError::from(e)
            })?;
    }

    Ok(Json(MessageResponse {
        message: "Signed out successfully".to_string(),
    }))
}

/// POST /auth/refresh
pub async fn refresh(
    Extension(state_lock): Extension<SharedState>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<TokenPair>, ApiError> {
    let Json(request) = payload?;
    if request.refresh_token.is_empty() {
        return Err(ApiError::BadRequest("Refresh token is required".to_string()));
    }

    let auth_service = state_lock.read().await.auth_service.clone();
    let tokens = auth_service
        .refresh_access_token(&request.refresh_token)
        .await?;

    Ok(Json(tokens))
}

/// GET /auth/me
pub async fn me(
    Extension(state_lock): Extension<SharedState>,
    authed: AuthedUser,
) -> Result<Json<UserEnvelope>, ApiError> {
    let auth_service = state_lock.read().await.auth_service.clone();
    let user = auth_service.get_user(&authed.id).await?;
    Ok(Json(UserEnvelope { user }))
}

/// PUT /auth/me
pub async fn update_me(
    Extension(state_lock): Extension<SharedState>,
    authed: AuthedUser,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<Json<UserEnvelope>, ApiError> {
    let Json(request) = payload?;
    UpdateProfileValidator.validate(&request).into_result()?;

    let auth_service = state_lock.read().await.auth_service.clone();
    let user = auth_service.update_profile(&authed.id, &request).await?;

    info!(user_id = %authed.id, "Profile updated");
    Ok(Json(UserEnvelope { user }))
}

/// POST /auth/send-verification
pub async fn send_verification(
    Extension(state_lock): Extension<SharedState>,
    authed: AuthedUser,
) -> Result<Json<MessageResponse>, ApiError> {
    let auth_service = state_lock.read().await.auth_service.clone();
    auth_service.send_verification_email(&authed.id).await?;

    Ok(Json(MessageResponse {
        message: "Verification email sent".to_string(),
    }))
}

/// GET /auth/verify-email?token=
///
/// Consumes the token and redirects the browser to the frontend.
pub async fn verify_email(
    Extension(state_lock): Extension<SharedState>,
    Query(query): Query<VerifyEmailQuery>,
) -> Result<Response, ApiError> {
    let token = query
        .token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Token required".to_string()))?;

    let (auth_service, config) = {
        let state = state_lock.read().await;
        (state.auth_service.clone(), state.config.clone())
    };

    auth_service.verify_email(&token).await?;

    Ok(found(&config.email_verified_redirect()))
}

/// GET /auth/oauth/google
///
/// Mints a correlation state and returns the provider authorization URL.
pub async fn google_oauth_start(
    Extension(state_lock): Extension<SharedState>,
) -> Result<Json<OAuthUrlResponse>, ApiError> {
    let (auth_service, handshake) = {
        let state = state_lock.read().await;
        (state.auth_service.clone(), state.handshake.clone())
    };

    let oauth_state = handshake.issue_state().await;
    let auth_url = auth_service.provider().authorization_url(&oauth_state);

    debug!("Starting Google OAuth flow");
    Ok(Json(OAuthUrlResponse { auth_url }))
}

/// GET /auth/oauth/google/callback
///
/// Provider redirect target. Every failure lands on the frontend sign-in page;
/// success parks the login behind a single-use exchange code.
pub async fn google_oauth_callback(
    Extension(state_lock): Extension<SharedState>,
    Query(query): Query<OAuthCallbackQuery>,
) -> Response {
    let (auth_service, handshake, config) = {
        let state = state_lock.read().await;
        (
            state.auth_service.clone(),
            state.handshake.clone(),
            state.config.clone(),
        )
    };

    // The state is spent by any callback that presents it, successful or not
    let state_valid = match query.state.as_deref() {
        Some(state) => handshake.consume_state(state).await,
        None => false,
    };

    if let Some(provider_error) = query.error.as_deref() {
        warn!(error = %provider_error, "Provider reported OAuth error");
        return found(&config.oauth_failure_redirect());
    }

    if !state_valid {
        warn!("OAuth callback with unknown or expired state");
        return found(&config.oauth_failure_redirect());
    }

    let Some(code) = query.code.as_deref().filter(|c| !c.is_empty()) else {
        warn!("OAuth callback without authorization code");
        return found(&config.oauth_failure_redirect());
    };

    match auth_service.handle_google_oauth(code).await {
        Ok(session) => {
            let exchange_code = handshake.issue_exchange_code(session).await;
            found(&config.oauth_success_redirect(&exchange_code))
        }
        Err(e) => {
            error!(error = %e, "Google OAuth login failed");
            found(&config.oauth_failure_redirect())
        }
    }
}

/// POST /auth/oauth/google/exchange
pub async fn google_oauth_exchange(
    Extension(state_lock): Extension<SharedState>,
    payload: Result<Json<OAuthExchangeRequest>, JsonRejection>,
) -> Result<Json<AuthSession>, ApiError> {
    let Json(request) = payload?;
    if request.code.is_empty() {
        return Err(ApiError::BadRequest("Code is required".to_string()));
    }

    let handshake = state_lock.read().await.handshake.clone();
    let session = handshake
        .redeem_exchange_code(&request.code)
        .await
        .ok_or_else(|| {
            debug!(code = %safe_token_log(&request.code), "Exchange code unknown, used or expired");
            ApiError::Unauthorized("Invalid or expired code".to_string())
        })?;

    info!(user_id = %session.user.id, "OAuth exchange code redeemed");
    Ok(Json(session))
}
