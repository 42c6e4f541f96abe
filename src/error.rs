//! Component error types. The route layer maps these onto
//! `{error: <kind>, message: <human>}` JSON bodies; internal details
//! (credentials, connection strings) stay in server-side logs only.

use thiserror::Error;

/// Authentication and authorization failures. All of these are terminal for
/// the request; the responses distinguish missing/malformed input from a bad
/// token but never describe the secret itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Password required")]
    MissingCredential,
    #[error("Invalid password")]
    InvalidCredential,
    #[error("Missing or malformed Authorization header")]
    MalformedHeader,
    #[error("Token expired or invalid")]
    InvalidOrExpiredToken,
    /// Token signing failed. Cannot happen with an HS256 secret key in
    /// practice, but the signing call is fallible and the error must not be
    /// swallowed.
    #[error("Failed to create token")]
    Signing,
}

impl AuthError {
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::MissingCredential => "missing_credential",
            AuthError::InvalidCredential => "invalid_credential",
            AuthError::MalformedHeader => "malformed_header",
            AuthError::InvalidOrExpiredToken => "invalid_or_expired_token",
            AuthError::Signing => "token_error",
        }
    }
}

/// Content-store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A message operation referenced an id that does not exist.
    #[error("Message not found")]
    NotFound,
    #[error("storage backend error: {0}")]
    Backend(#[from] sqlx::Error),
}

impl StoreError {
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::NotFound => "not_found",
            StoreError::Backend(_) => "storage_unavailable",
        }
    }
}

/// A notification email could not be delivered. By the time this surfaces
/// the message is already saved, so callers treat it as partial success.
#[derive(Debug, Error)]
#[error("notification delivery failed: {0}")]
pub struct DeliveryError(pub String);

/// Startup configuration problems. Fatal: the process refuses to serve.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} missing in environment")]
    MissingVar(&'static str),
    #[error("invalid value for {0}")]
    InvalidVar(&'static str),
}
