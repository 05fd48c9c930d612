//! Authentication service
//!
//! Orchestrates sign-up, sign-in, refresh rotation, sign-out, OAuth login and
//! email verification over the identity store, the refresh token store, the
//! access token codec and the external provider / email clients.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::models::{
    AuthSession, NewOAuthAccount, NewUser, SignInRequest, SignUpRequest, TokenPair,
    UpdateProfileRequest, User, UserResponse,
};
use super::password::{hash_password, verify_dummy_password, verify_password};
use super::refresh::{generate_refresh_token, hash_token, RefreshStore};
use super::store::UserStore;
use super::token::{TokenCodec, TokenError};
use crate::common::config::{AuthConfig, VERIFICATION_TOKEN_TTL_HOURS};
use crate::common::id_generator::generate_verification_token;
use crate::common::{safe_email_log, ApiError};
use crate::services::{EmailSender, GoogleError, OAuthProvider};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("user already exists")]
    UserExists,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("invalid token")]
    InvalidToken,

    #[error("user not found")]
    UserNotFound,

    #[error("invalid or expired token")]
    InvalidVerificationToken,

    #[error("email already verified")]
    EmailAlreadyVerified,

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Provider(#[from] GoogleError),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::UserExists => ApiError::Conflict("User already exists".to_string()),
            AuthError::InvalidCredentials => {
                ApiError::Unauthorized("Invalid credentials".to_string())
            }
            AuthError::InvalidToken => ApiError::Unauthorized("Invalid token".to_string()),
            AuthError::UserNotFound => ApiError::NotFound("User not found".to_string()),
            AuthError::InvalidVerificationToken => {
                ApiError::BadRequest("Invalid or expired token".to_string())
            }
            AuthError::EmailAlreadyVerified => {
                ApiError::BadRequest("Email already verified".to_string())
            }
            AuthError::Database(e) => ApiError::DatabaseError(e),
            other => {
                error!(error = %other, "Authentication dependency failure");
                ApiError::InternalServer("Internal server error".to_string())
            }
        }
    }
}

pub struct AuthService {
    users: UserStore,
    refresh_tokens: RefreshStore,
    tokens: TokenCodec,
    provider: Arc<dyn OAuthProvider>,
    email: Arc<dyn EmailSender>,
    config: Arc<AuthConfig>,
}

impl AuthService {
    pub fn new(
        users: UserStore,
        refresh_tokens: RefreshStore,
        provider: Arc<dyn OAuthProvider>,
        email: Arc<dyn EmailSender>,
        config: Arc<AuthConfig>,
    ) -> Self {
        let tokens = TokenCodec::new(&config.jwt_secret, config.access_token_ttl());
        Self {
            users,
            refresh_tokens,
            tokens,
            provider,
            email,
            config,
        }
    }

    pub fn tokens(&self) -> &TokenCodec {
        &self.tokens
    }

    pub fn provider(&self) -> &dyn OAuthProvider {
        self.provider.as_ref()
    }

    /// Register a password account and kick off email verification
    pub async fn sign_up(&self, req: &SignUpRequest) -> Result<UserResponse, AuthError> {
        let email = normalize_email(&req.email);

        if self.users.get_user_by_email(&email).await?.is_some() {
            debug!(email = %safe_email_log(&email), "Sign-up rejected, email taken");
            return Err(AuthError::UserExists);
        }

        let password_hash = hash_password(&req.password)
            .await
            .map_err(AuthError::Hashing)?;

        let user = self
            .users
            .create_user(&NewUser {
                email,
                password_hash: Some(password_hash),
                name: req.name.trim().to_string(),
                email_verified: false,
                image: None,
            })
            .await
            .map_err(|e| {
                // Lost a race with a concurrent sign-up for the same email
                if matches!(&e, sqlx::Error::Database(db) if db.is_unique_violation()) {
                    AuthError::UserExists
                } else {
                    AuthError::Database(e)
                }
            })?;

        info!(user_id = %user.id, email = %safe_email_log(&user.email), "User signed up");

        if let Err(e) = self.send_verification_email(&user.id).await {
            warn!(error = %e, user_id = %user.id, "Failed to send verification email after sign-up");
        }

        Ok(user.into())
    }

    pub async fn sign_in(&self, req: &SignInRequest) -> Result<AuthSession, AuthError> {
        let email = normalize_email(&req.email);

        let user = match self.users.get_user_by_email(&email).await? {
            Some(user) => user,
            None => {
                debug!(email = %safe_email_log(&email), "Sign-in for unknown email");
                verify_dummy_password(&req.password).await;
                return Err(AuthError::InvalidCredentials);
            }
        };

        let Some(stored_hash) = user.password_hash.as_deref() else {
            debug!(user_id = %user.id, "Sign-in attempted on account without password");
            verify_dummy_password(&req.password).await;
            return Err(AuthError::InvalidCredentials);
        };

        let matches = verify_password(&req.password, stored_hash)
            .await
            .map_err(AuthError::Hashing)?;
        if !matches {
            debug!(user_id = %user.id, "Sign-in with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        let session = self.start_session(user).await?;
        info!(user_id = %session.user.id, "User signed in");
        Ok(session)
    }

    /// Rotate: the presented refresh token is revoked and replaced
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let token_hash = hash_token(refresh_token);

        let record = self
            .refresh_tokens
            .lookup(&token_hash)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        let user = self
            .users
            .get_user_by_id(&record.user_id)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        let access_token = self.tokens.issue(&user.id, &user.email)?;

        // A concurrent rotation that deleted the row first wins
        if !self.refresh_tokens.revoke(&token_hash).await? {
            warn!(user_id = %user.id, "Refresh token already rotated by a concurrent request");
            return Err(AuthError::InvalidToken);
        }

        let new_refresh_token = self.issue_refresh_token(&user.id).await?;

        debug!(user_id = %user.id, "Refresh token rotated");
        Ok(TokenPair {
            access_token,
            refresh_token: new_refresh_token,
        })
    }

    /// Revoke a refresh token; unknown tokens are ignored
    pub async fn sign_out(&self, refresh_token: &str) -> Result<(), AuthError> {
        let revoked = self.refresh_tokens.revoke(&hash_token(refresh_token)).await?;
        debug!(revoked, "Sign-out processed");
        Ok(())
    }

    pub async fn get_user(&self, user_id: &str) -> Result<UserResponse, AuthError> {
        self.users
            .get_user_by_id(user_id)
            .await?
            .map(UserResponse::from)
            .ok_or(AuthError::UserNotFound)
    }

    pub async fn update_profile(
        &self,
        user_id: &str,
        req: &UpdateProfileRequest,
    ) -> Result<UserResponse, AuthError> {
        self.users
            .update_profile(
                user_id,
                req.name.trim(),
                req.image.as_deref(),
                req.region.as_deref(),
                req.city.as_deref(),
            )
            .await?
            .map(UserResponse::from)
            .ok_or(AuthError::UserNotFound)
    }

    /// Current verified flag straight from the store, not from token claims
    pub async fn is_email_verified(&self, user_id: &str) -> Result<bool, AuthError> {
        self.users
            .get_user_by_id(user_id)
            .await?
            .map(|u| u.email_verified)
            .ok_or(AuthError::UserNotFound)
    }

    /// Complete a provider login: resolve or create the local user and issue tokens
    pub async fn handle_google_oauth(&self, code: &str) -> Result<AuthSession, AuthError> {
        let provider_tokens = self.provider.exchange_code(code).await?;
        let profile = self
            .provider
            .fetch_user_profile(&provider_tokens.access_token)
            .await?;
        let provider_name = self.provider.name();

        let linkage = NewOAuthAccount {
            provider: provider_name.to_string(),
            provider_user_id: profile.id.clone(),
            access_token: Some(provider_tokens.access_token.clone()),
            refresh_token: provider_tokens.refresh_token.clone(),
            expires_at: provider_tokens.expires_at,
        };

        let user = match self
            .users
            .get_oauth_account(provider_name, &profile.id)
            .await?
        {
            Some(account) => self
                .users
                .get_user_by_id(&account.user_id)
                .await?
                .ok_or(AuthError::UserNotFound)?,
            None => {
                let email = normalize_email(&profile.email);
                match self.users.get_user_by_email(&email).await? {
                    Some(mut existing) => {
                        if existing.image.as_deref().map_or(true, str::is_empty)
                            && !profile.picture.is_empty()
                        {
                            match self
                                .users
                                .update_user_image(&existing.id, &profile.picture)
                                .await
                            {
                                Ok(()) => existing.image = Some(profile.picture.clone()),
                                Err(e) => {
                                    warn!(error = %e, user_id = %existing.id, "Failed to backfill avatar from provider")
                                }
                            }
                        }

                        self.users
                            .create_oauth_account(&existing.id, &linkage)
                            .await?;
                        info!(
                            user_id = %existing.id,
                            provider = provider_name,
                            "Linked provider account to existing user"
                        );
                        existing
                    }
                    None => {
                        let name = if profile.name.trim().is_empty() {
                            email.split('@').next().unwrap_or_default().to_string()
                        } else {
                            profile.name.clone()
                        };
                        let image = Some(profile.picture.clone()).filter(|p| !p.is_empty());

                        self.users
                            .create_user_with_oauth(
                                &NewUser {
                                    email,
                                    password_hash: None,
                                    name,
                                    email_verified: profile.verified_email,
                                    image,
                                },
                                &linkage,
                            )
                            .await?
                    }
                }
            }
        };

        let session = self.start_session(user).await?;
        info!(
            user_id = %session.user.id,
            provider = provider_name,
            "User authenticated via OAuth"
        );
        Ok(session)
    }

    /// Consume a verification token and mark its user verified
    pub async fn verify_email(&self, token: &str) -> Result<String, AuthError> {
        let user_id = self
            .users
            .consume_verification_token(token, Utc::now())
            .await?
            .ok_or(AuthError::InvalidVerificationToken)?;

        info!(user_id = %user_id, "Email verified");
        Ok(user_id)
    }

    /// Mint a verification token and mail the link; delivery failure is only logged
    pub async fn send_verification_email(&self, user_id: &str) -> Result<(), AuthError> {
        let user = self
            .users
            .get_user_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if user.email_verified {
            return Err(AuthError::EmailAlreadyVerified);
        }

        let token = generate_verification_token();
        self.users
            .create_verification_token(
                &user.id,
                &token,
                Utc::now() + Duration::hours(VERIFICATION_TOKEN_TTL_HOURS),
            )
            .await?;

        let link = self.config.verification_link(&token);
        if let Err(e) = self
            .email
            .send_verification_email(&user.email, &user.name, &link)
            .await
        {
            warn!(
                error = %e,
                user_id = %user.id,
                email = %safe_email_log(&user.email),
                "Verification email not delivered, token remains valid for retry"
            );
        }

        Ok(())
    }

    async fn start_session(&self, user: User) -> Result<AuthSession, AuthError> {
        let access_token = self.tokens.issue(&user.id, &user.email)?;
        let refresh_token = self.issue_refresh_token(&user.id).await?;

        Ok(AuthSession {
            user: user.into(),
            tokens: TokenPair {
                access_token,
                refresh_token,
            },
        })
    }

    async fn issue_refresh_token(&self, user_id: &str) -> Result<String, AuthError> {
        let raw = generate_refresh_token();
        self.refresh_tokens
            .create(user_id, &hash_token(&raw), self.refresh_expiry(Utc::now()))
            .await?;
        Ok(raw)
    }

    fn refresh_expiry(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + self.config.refresh_token_ttl()
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
