//! OAuth handshake state
//!
//! Two short-lived, single-use maps bridge the browser redirect flow into an
//! API token exchange:
//!
//! - **states** correlate an authorization request with its callback (CSRF).
//! - **exchange codes** carry a finished login from the callback redirect to
//!   the frontend, which trades the code for tokens with a POST. Tokens never
//!   appear in a URL.
//!
//! Each map sits behind its own mutex. Consuming an entry removes it and
//! checks expiry inside one critical section, so two concurrent callers can
//! never both see the same entry as valid.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use super::models::AuthSession;
use crate::common::config::{
    HANDSHAKE_SWEEP_INTERVAL_SECS, OAUTH_EXCHANGE_TTL_MINUTES, OAUTH_STATE_TTL_MINUTES,
};
use crate::common::id_generator::{generate_opaque_token, SECRET_BYTES, STATE_BYTES};

#[derive(Debug, Clone)]
struct ExchangeEntry {
    session: AuthSession,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct OAuthHandshake {
    states: Arc<Mutex<HashMap<String, DateTime<Utc>>>>,
    exchange_codes: Arc<Mutex<HashMap<String, ExchangeEntry>>>,
    state_ttl: Duration,
    exchange_ttl: Duration,
}

impl Default for OAuthHandshake {
    fn default() -> Self {
        Self::new(
            Duration::minutes(OAUTH_STATE_TTL_MINUTES),
            Duration::minutes(OAUTH_EXCHANGE_TTL_MINUTES),
        )
    }
}

impl OAuthHandshake {
    pub fn new(state_ttl: Duration, exchange_ttl: Duration) -> Self {
        Self {
            states: Arc::new(Mutex::new(HashMap::new())),
            exchange_codes: Arc::new(Mutex::new(HashMap::new())),
            state_ttl,
            exchange_ttl,
        }
    }

    /// Mint and remember a new correlation state
    pub async fn issue_state(&self) -> String {
        self.issue_state_at(Utc::now()).await
    }

    pub async fn issue_state_at(&self, now: DateTime<Utc>) -> String {
        let state = generate_opaque_token(STATE_BYTES);
        self.states
            .lock()
            .await
            .insert(state.clone(), now + self.state_ttl);
        state
    }

    /// Remove `state` and report whether it was known and unexpired
    pub async fn consume_state(&self, state: &str) -> bool {
        self.consume_state_at(state, Utc::now()).await
    }

    pub async fn consume_state_at(&self, state: &str, now: DateTime<Utc>) -> bool {
        let mut states = self.states.lock().await;
        match states.remove(state) {
            Some(expires_at) => now <= expires_at,
            None => false,
        }
    }

    /// Park a finished login behind a fresh exchange code
    pub async fn issue_exchange_code(&self, session: AuthSession) -> String {
        self.issue_exchange_code_at(session, Utc::now()).await
    }

    pub async fn issue_exchange_code_at(&self, session: AuthSession, now: DateTime<Utc>) -> String {
        let code = generate_opaque_token(SECRET_BYTES);
        self.exchange_codes.lock().await.insert(
            code.clone(),
            ExchangeEntry {
                session,
                expires_at: now + self.exchange_ttl,
            },
        );
        code
    }

    /// Trade an exchange code for its login, at most once
    pub async fn redeem_exchange_code(&self, code: &str) -> Option<AuthSession> {
        self.redeem_exchange_code_at(code, Utc::now()).await
    }

    pub async fn redeem_exchange_code_at(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Option<AuthSession> {
        let mut codes = self.exchange_codes.lock().await;
        let entry = codes.remove(code)?;
        if now > entry.expires_at {
            return None;
        }
        Some(entry.session)
    }

    /// Drop every expired state and exchange code
    pub async fn sweep_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut removed = 0;

        {
            let mut states = self.states.lock().await;
            let before = states.len();
            states.retain(|_, expires_at| now <= *expires_at);
            removed += before - states.len();
        }

        {
            let mut codes = self.exchange_codes.lock().await;
            let before = codes.len();
            codes.retain(|_, entry| now <= entry.expires_at);
            removed += before - codes.len();
        }

        removed
    }

    pub async fn pending(&self) -> (usize, usize) {
        let states = self.states.lock().await.len();
        let codes = self.exchange_codes.lock().await.len();
        (states, codes)
    }

    /// Periodically purge expired entries so abandoned logins don't accumulate
    pub fn start_cleanup_task(&self) {
        let handshake = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(
                HANDSHAKE_SWEEP_INTERVAL_SECS,
            ));
            loop {
                interval.tick().await;
                let removed = handshake.sweep_expired_at(Utc::now()).await;
                if removed > 0 {
                    let (states, codes) = handshake.pending().await;
                    debug!(
                        removed,
                        pending_states = states,
                        pending_codes = codes,
                        "Swept expired OAuth handshake entries"
                    );
                }
            }
        });
    }
}
