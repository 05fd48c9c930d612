//! # Auth Module
//!
//! Identity and session handling:
//! - password sign-up / sign-in with Argon2 hashes
//! - short-lived signed access tokens and rotated opaque refresh tokens
//! - Google OAuth login bridged to the frontend through single-use exchange codes
//! - email verification
//! - `AuthedUser`, `OptionalUser` and `VerifiedUser` extractors for protected routes

pub mod extractors;
pub mod handlers;
pub mod models;
pub mod oauth;
pub mod password;
pub mod refresh;
pub mod routes;
pub mod service;
pub mod store;
pub mod token;
pub mod validators;


pub use extractors::{AuthedUser, OptionalUser, VerifiedUser};
pub use oauth::OAuthHandshake;
pub use refresh::RefreshStore;
pub use routes::auth_routes;
pub use service::{AuthError, AuthService};
pub use store::UserStore;
