// src/main.rs
use axum::{extract::Extension, middleware, Router};
use dotenv::dotenv;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::env;
use std::path::PathBuf;
use std::{net::SocketAddr, str::FromStr, sync::Arc};
use tokio::{net::TcpListener, sync::RwLock};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

// ============================================================================
// MODULE IMPORTS
// ============================================================================

mod auth;
mod common;
mod logging_middleware;
mod services;

// ============================================================================
// COMMON IMPORTS
// ============================================================================

use auth::{AuthService, OAuthHandshake, RefreshStore, UserStore};
use common::{AppState, AuthConfig, SharedState};
use services::{GoogleService, SesEmailSender};

const DEFAULT_CORS_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";

// ============================================================================
// MAIN APPLICATION ENTRY POINT
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // ========================================================================
    // ENVIRONMENT CONFIGURATION
    // ========================================================================

    let database_url =
        env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://identity.db".to_string());
    let config = Arc::new(AuthConfig::from_env()?);

    info!(
        frontend_url = %config.frontend_url,
        backend_url = %config.backend_url,
        access_token_minutes = config.access_token_minutes,
        refresh_token_days = config.refresh_token_days,
        "Configuration loaded"
    );

    // ========================================================================
    // DATABASE SETUP
    // ========================================================================

    if let Some(path_part) = database_url.strip_prefix("sqlite://") {
        let path_without_params = path_part.split('?').next().unwrap_or("");
        if !path_without_params.is_empty() && !path_without_params.starts_with(':') {
            let db_path = PathBuf::from(path_without_params);
            if let Some(parent) = db_path.parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
        }
    }

    let connect_options = SqliteConnectOptions::from_str(&database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .connect_with(connect_options)
        .await?;

    common::migrations::ensure_schema(&pool).await?;

    // ========================================================================
    // SERVICE INITIALIZATION
    // ========================================================================

    let google_service = Arc::new(GoogleService::new(&config));
    info!("GoogleService initialized");

    let email_sender = Arc::new(SesEmailSender::from_env().await);

    let auth_service = Arc::new(AuthService::new(
        UserStore::new(pool.clone()),
        RefreshStore::new(pool),
        google_service,
        email_sender,
        config.clone(),
    ));
    info!("AuthService initialized");

    let handshake = OAuthHandshake::default();
    handshake.start_cleanup_task();
    info!("OAuth handshake cleanup task started");

    // ========================================================================
    // APPLICATION STATE
    // ========================================================================

    let shared = Arc::new(RwLock::new(AppState {
        config,
        auth_service,
        handshake,
    }));

    let cors_origins =
        env::var("CORS_ORIGINS").unwrap_or_else(|_| DEFAULT_CORS_ORIGINS.to_string());
    let app = build_router(shared).layer(cors_layer(&cors_origins));

    // ========================================================================
    // SERVER STARTUP
    // ========================================================================

    let port = env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

/// Routes plus the layers every request goes through
pub(crate) fn build_router(shared: SharedState) -> Router {
    Router::new()
        .merge(auth::auth_routes())
        // Add request/response body logging in debug mode
        .layer(middleware::from_fn(logging_middleware::log_request_response))
        .layer(Extension(shared))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(cors_origins: &str) -> CorsLayer {
    let origins: Vec<axum::http::HeaderValue> = cors_origins
        .split(',')
        .filter_map(|origin| origin.trim().parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
        ])
        .allow_credentials(true)
}
