// Application state shared across all modules

use std::sync::Arc;
use tokio::sync::RwLock;

use crate::auth::{AuthService, OAuthHandshake};
use crate::common::config::AuthConfig;

/// Application state containing configuration, services and handshake storage
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AuthConfig>,
    pub auth_service: Arc<AuthService>,
    pub handshake: OAuthHandshake,
}

/// State as handed to handlers through the `Extension` layer
pub type SharedState = Arc<RwLock<AppState>>;
