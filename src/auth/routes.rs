//! Authentication routes

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers;

/// Creates and returns the authentication router
///
/// # Routes
/// - `POST /auth/sign-up`, `POST /auth/sign-in`, `POST /auth/sign-out`
/// - `POST /auth/refresh` - rotate the refresh token
/// - `GET|PUT /auth/me` - current profile (bearer token required)
/// - `POST /auth/send-verification` - (re)send verification email (bearer token required)
/// - `GET /auth/verify-email?token=` - consume verification token, redirect
/// - `GET /auth/oauth/google` - begin Google login
/// - `GET /auth/oauth/google/callback` - provider redirect target
/// - `POST /auth/oauth/google/exchange` - trade exchange code for tokens
pub fn auth_routes() -> Router {
    Router::new()
        .route("/auth/sign-up", post(handlers::sign_up))
        .route("/auth/sign-in", post(handlers::sign_in))
        .route("/auth/sign-out", post(handlers::sign_out))
        .route("/auth/refresh", post(handlers::refresh))
        .route("/auth/me", get(handlers::me).put(handlers::update_me))
        .route("/auth/send-verification", post(handlers::send_verification))
        .route("/auth/verify-email", get(handlers::verify_email))
        .route("/auth/oauth/google", get(handlers::google_oauth_start))
        .route(
            "/auth/oauth/google/callback",
            get(handlers::google_oauth_callback),
        )
        .route(
            "/auth/oauth/google/exchange",
            post(handlers::google_oauth_exchange),
        )
}
