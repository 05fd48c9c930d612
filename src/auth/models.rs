//! Authentication data models

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Identity claims carried inside an access token
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub email: String,
    pub exp: i64,
    pub iat: i64,
}

/// User database model
#[derive(FromRow, Debug, Clone)]
pub struct User {
    pub id: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub name: String,
    pub email_verified: bool,
    pub image: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub created_at: String,
}

/// Public view of a user, never exposes the password hash
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub name: String,
    pub email_verified: bool,
    pub image: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            email_verified: user.email_verified,
            image: user.image,
            region: user.region,
            city: user.city,
            created_at: user.created_at,
        }
    }
}

/// Fields needed to insert a user row
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: Option<String>,
    pub name: String,
    pub email_verified: bool,
    pub image: Option<String>,
}

/// Link between a provider account and a local user
#[derive(FromRow, Debug, Clone)]
pub struct OAuthAccount {
    pub id: String,
    pub user_id: String,
    pub provider: String,
    pub provider_user_id: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<i64>,
}

/// Fields needed to insert an OAuth linkage row
#[derive(Debug, Clone)]
pub struct NewOAuthAccount {
    pub provider: String,
    pub provider_user_id: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<i64>,
}

/// Persisted refresh token record; only the hash of the token is stored
#[derive(FromRow, Debug, Clone)]
pub struct RefreshTokenRecord {
    pub id: String,
    pub user_id: String,
    pub token_hash: String,
    pub expires_at: i64,
}

/// Access + refresh token pair as returned to clients
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Result of a successful login
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub user: UserResponse,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

// ---- Request DTOs ----

#[derive(Deserialize, Debug)]
pub struct SignUpRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Deserialize, Debug)]
pub struct SignInRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: String,
}

#[derive(Deserialize, Debug)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub name: String,
    pub image: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct OAuthExchangeRequest {
    #[serde(default)]
    pub code: String,
}

#[derive(Deserialize, Debug)]
pub struct VerifyEmailQuery {
    pub token: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct OAuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

// ---- Response DTOs ----

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct OAuthUrlResponse {
    pub auth_url: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct UserEnvelope {
    pub user: UserResponse,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct MessageResponse {
    pub message: String,
}
