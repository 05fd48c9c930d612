//! Authentication configuration loaded from the environment

use chrono::Duration;
use std::env;
use thiserror::Error;
use tracing::warn;

/// Lifetime of an OAuth correlation state
pub const OAUTH_STATE_TTL_MINUTES: i64 = 10;
/// Lifetime of an OAuth exchange code
pub const OAUTH_EXCHANGE_TTL_MINUTES: i64 = 2;
/// Lifetime of an email verification token
pub const VERIFICATION_TOKEN_TTL_HOURS: i64 = 24;
/// How often expired OAuth states and exchange codes are swept
pub const HANDSHAKE_SWEEP_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("{name} must be a positive integer, got '{value}'")]
    InvalidNumber { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub frontend_url: String,
    pub backend_url: String,
    pub google_client_id: Option<String>,
    pub google_client_secret: Option<String>,
    pub google_redirect_url: String,
    /// Access token lifetime in minutes
    pub access_token_minutes: i64,
    /// Refresh token lifetime in days
    pub refresh_token_days: i64,
}

impl AuthConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let jwt_secret = env::var("JWT_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let frontend_url = env_or_default("FRONTEND_URL", "http://localhost:5173");
        let backend_url = env_or_default("BACKEND_URL", "http://localhost:8080");

        let google_client_id = env::var("GOOGLE_CLIENT_ID").ok().filter(|s| !s.is_empty());
        let google_client_secret = env::var("GOOGLE_CLIENT_SECRET")
            .ok()
            .filter(|s| !s.is_empty());

        if google_client_id.is_none() {
            warn!("GOOGLE_CLIENT_ID not set, Google OAuth will not work");
        }

        let access_token_minutes = positive_env("ACCESS_TOKEN_MINUTES", 15)?;
        let refresh_token_days = positive_env("REFRESH_TOKEN_DAYS", 7)?;

        Ok(Self::new(
            jwt_secret,
            frontend_url,
            backend_url,
            google_client_id,
            google_client_secret,
            access_token_minutes,
            refresh_token_days,
        ))
    }

    pub fn new(
        jwt_secret: String,
        frontend_url: String,
        backend_url: String,
        google_client_id: Option<String>,
        google_client_secret: Option<String>,
        access_token_minutes: i64,
        refresh_token_days: i64,
    ) -> Self {
        let frontend_url = frontend_url.trim_end_matches('/').to_string();
        let backend_url = backend_url.trim_end_matches('/').to_string();
        let google_redirect_url = format!("{}/auth/oauth/google/callback", backend_url);

        Self {
            jwt_secret,
            frontend_url,
            backend_url,
            google_client_id,
            google_client_secret,
            google_redirect_url,
            access_token_minutes,
            refresh_token_days,
        }
    }

    pub fn access_token_ttl(&self) -> Duration {
        Duration::minutes(self.access_token_minutes)
    }

    pub fn refresh_token_ttl(&self) -> Duration {
        Duration::days(self.refresh_token_days)
    }

    pub fn verification_link(&self, token: &str) -> String {
        format!(
            "{}/auth/verify-email?token={}",
            self.backend_url,
            urlencoding::encode(token)
        )
    }

    pub fn oauth_failure_redirect(&self) -> String {
        format!("{}/sign-in?error=oauth_failed", self.frontend_url)
    }

    pub fn oauth_success_redirect(&self, exchange_code: &str) -> String {
        format!(
            "{}/auth/google/callback?auth_code={}",
            self.frontend_url,
            urlencoding::encode(exchange_code)
        )
    }

    pub fn email_verified_redirect(&self) -> String {
        format!("{}/email-verified", self.frontend_url)
    }
}

fn env_or_default(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn positive_env(name: &'static str, default: i64) -> Result<i64, ConfigError> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => match raw.trim().parse::<i64>() {
            Ok(v) if v >= 1 => Ok(v),
            _ => Err(ConfigError::InvalidNumber { name, value: raw }),
        },
        _ => Ok(default),
    }
}
