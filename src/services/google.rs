// src/services/google.rs
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::common::config::AuthConfig;

const AUTHORIZE_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const USERINFO_ENDPOINT: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

const SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/userinfo.email",
    "https://www.googleapis.com/auth/userinfo.profile",
];

#[derive(Debug, Error)]
pub enum GoogleError {
    #[error("Google OAuth not configured")]
    NotConfigured,

    #[error("OAuth flow failed: {0}")]
    OAuthFailed(String),

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Tokens the provider hands back for a user; stored as-is, never used for
/// local authorization decisions
#[derive(Debug, Clone, Default)]
pub struct ProviderTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Unix seconds
    pub expires_at: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GoogleUserInfo {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub verified_email: bool,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub picture: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

/// Third-party identity provider used for redirect-based login
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Provider name as stored in the linkage table
    fn name(&self) -> &'static str;

    /// Authorization URL the browser is sent to, annotated with `state`
    fn authorization_url(&self, state: &str) -> String;

    async fn exchange_code(&self, code: &str) -> Result<ProviderTokens, GoogleError>;

    async fn fetch_user_profile(&self, access_token: &str) -> Result<GoogleUserInfo, GoogleError>;
}

#[derive(Debug, Clone)]
pub struct GoogleService {
    client: Client,
    client_id: Option<String>,
    client_secret: Option<String>,
    redirect_url: String,
}

impl GoogleService {
    pub fn new(config: &AuthConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            client_id: config.google_client_id.clone(),
            client_secret: config.google_client_secret.clone(),
            redirect_url: config.google_redirect_url.clone(),
        }
    }

    fn credentials(&self) -> Result<(&str, &str), GoogleError> {
        match (&self.client_id, &self.client_secret) {
            (Some(id), Some(secret)) => Ok((id.as_str(), secret.as_str())),
            _ => Err(GoogleError::NotConfigured),
        }
    }
}

#[async_trait]
impl OAuthProvider for GoogleService {
    fn name(&self) -> &'static str {
        "google"
    }

    fn authorization_url(&self, state: &str) -> String {
        let client_id = self.client_id.as_deref().unwrap_or_default();
        let scope_param = SCOPES.join(" ");

        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&state={}",
            AUTHORIZE_ENDPOINT,
            urlencoding::encode(client_id),
            urlencoding::encode(&self.redirect_url),
            urlencoding::encode(&scope_param),
            urlencoding::encode(state)
        )
    }

    /// Exchange authorization code for tokens
    async fn exchange_code(&self, code: &str) -> Result<ProviderTokens, GoogleError> {
        let (client_id, client_secret) = self.credentials()?;

        let params = [
            ("code", code),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("redirect_uri", self.redirect_url.as_str()),
            ("grant_type", "authorization_code"),
        ];

        debug!("Exchanging authorization code for tokens");

        let response = self
            .client
            .post(TOKEN_ENDPOINT)
            .form(&params)
            .send()
            .await
            .map_err(|e| GoogleError::RequestFailed(e.to_string()))?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!(status = %status, error = %error_text, "Token exchange failed");
            return Err(GoogleError::OAuthFailed(format!("HTTP {}", status)));
        }

        let token_response = response
            .json::<TokenResponse>()
            .await
            .map_err(|e| GoogleError::SerializationError(e.to_string()))?;

        info!(
            has_refresh_token = token_response.refresh_token.is_some(),
            "Exchanged authorization code for provider tokens"
        );

        Ok(ProviderTokens {
            access_token: token_response.access_token,
            refresh_token: token_response.refresh_token,
            expires_at: token_response
                .expires_in
                .map(|secs| Utc::now().timestamp() + secs),
        })
    }

    async fn fetch_user_profile(&self, access_token: &str) -> Result<GoogleUserInfo, GoogleError> {
        let response = self
            .client
            .get(USERINFO_ENDPOINT)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| GoogleError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            error!(status = %response.status(), "Userinfo request failed");
            return Err(GoogleError::RequestFailed(
                "failed to get user info from Google".to_string(),
            ));
        }

        response
            .json::<GoogleUserInfo>()
            .await
            .map_err(|e| GoogleError::SerializationError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(client_id: Option<&str>) -> AuthConfig {
        AuthConfig::new(
            "secret".to_string(),
            "http://localhost:5173".to_string(),
            "http://localhost:8080".to_string(),
            client_id.map(str::to_string),
            client_id.map(|_| "client-secret".to_string()),
            15,
            7,
        )
    }

    #[test]
    fn test_authorization_url_carries_state_and_redirect() {
        let google = GoogleService::new(&config(Some("client-123")));
        let url = google.authorization_url("state-abc");

        assert!(url.starts_with(AUTHORIZE_ENDPOINT));
        assert!(url.contains("client_id=client-123"));
        assert!(url.contains("state=state-abc"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains(&format!(
            "redirect_uri={}",
            urlencoding::encode("http://localhost:8080/auth/oauth/google/callback")
        )));
    }

    #[tokio::test]
    async fn test_exchange_without_credentials_is_not_configured() {
        let google = GoogleService::new(&config(None));
        let result = google.exchange_code("code").await;
        assert!(matches!(result, Err(GoogleError::NotConfigured)));
    }

    #[test]
    fn test_user_info_tolerates_missing_optional_fields() {
        let info: GoogleUserInfo =
            serde_json::from_str(r#"{"id":"g-1","email":"g@x.com"}"#).unwrap();
        assert_eq!(info.id, "g-1");
        assert!(!info.verified_email);
        assert!(info.picture.is_empty());
    }

    #[test]
    fn test_user_info_ignores_unused_profile_fields() {
        let info: GoogleUserInfo = serde_json::from_str(
            r#"{"id":"g-1","email":"g@x.com","verified_email":true,"name":"Gee Ex",
                "given_name":"Gee","family_name":"Ex","picture":"https://lh3/p.png","locale":"en"}"#,
        )
        .unwrap();
        assert_eq!(info.name, "Gee Ex");
        assert!(info.verified_email);
        assert_eq!(info.picture, "https://lh3/p.png");
    }
}
