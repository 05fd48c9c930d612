// src/common/id_generator.rs
//! Identifier and opaque secret generation
//!
//! - User ids and verification tokens are UUID v4 strings.
//! - Opaque secrets (refresh tokens, OAuth states, exchange codes) are raw
//!   bytes from the OS CSPRNG encoded as URL-safe base64 without padding, so
//!   they can travel in query strings untouched.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use uuid::Uuid;

/// Entropy for refresh tokens and exchange codes
pub const SECRET_BYTES: usize = 32;
/// Entropy for OAuth correlation states
pub const STATE_BYTES: usize = 16;

/// Generate a new user id
pub fn generate_user_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generate a row id for auxiliary tables (oauth accounts, refresh tokens)
pub fn generate_row_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Generate an email verification token
pub fn generate_verification_token() -> String {
    Uuid::new_v4().to_string()
}

/// Generate an opaque URL-safe secret carrying `byte_len` random bytes
pub fn generate_opaque_token(byte_len: usize) -> String {
    let mut bytes = vec![0u8; byte_len];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
