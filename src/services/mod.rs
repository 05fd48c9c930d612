// src/services/mod.rs
//
// Clients for the external collaborators of the auth layer

pub mod email;
pub mod google;

// Re-export commonly used types for convenience
pub use email::{EmailError, EmailSender, SesEmailSender};
pub use google::{GoogleError, GoogleService, GoogleUserInfo, OAuthProvider, ProviderTokens};
