//! Auth gate: verifies the shared admin credential and issues/validates
//! bearer tokens. Stateless - validity is entirely signature + expiry, no
//! session storage.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::error::AuthError;

/// Access token validity window.
pub const TOKEN_TTL_HOURS: i64 = 2;

/// JWT claims: a single implicit admin role, nothing else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

/// Time source for token issuance. Injected so expiry behavior is testable.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Clone)]
pub struct AuthGate {
    password_digest: [u8; 32],
    encoding: EncodingKey,
    decoding: DecodingKey,
    clock: Clock,
}

impl AuthGate {
    pub fn new(admin_password: &str, jwt_secret: &str) -> Self {
        Self::with_clock(admin_password, jwt_secret, Arc::new(Utc::now))
    }

    pub fn with_clock(admin_password: &str, jwt_secret: &str, clock: Clock) -> Self {
        Self {
            password_digest: digest(admin_password),
            encoding: EncodingKey::from_secret(jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(jwt_secret.as_bytes()),
            clock,
        }
    }

    /// Check the supplied password against the configured admin secret and
    /// issue a signed 2-hour token on match. The comparison runs over
    /// fixed-length SHA-256 digests rather than the raw strings, so it does
    /// not short-circuit on the first differing byte.
    pub fn issue_token(&self, supplied: &str) -> Result<String, AuthError> {
        if supplied.is_empty() {
            return Err(AuthError::MissingCredential);
        }
        if digest(supplied) != self.password_digest {
            return Err(AuthError::InvalidCredential);
        }

        let now = (self.clock)();
        let claims = Claims {
            role: "admin".to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(TOKEN_TTL_HOURS)).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding).map_err(|e| {
            tracing::error!("failed to sign access token: {}", e);
            AuthError::Signing
        })
    }

    /// Validate a raw `Authorization` header value. The header must be
    /// present and whitespace-split into exactly two parts with a literal
    /// `Bearer` first; then the token's signature and expiry are verified.
    pub fn authorize(&self, header: Option<&str>) -> Result<(), AuthError> {
        let header = header.ok_or(AuthError::MalformedHeader)?;
        let parts: Vec<&str> = header.split_whitespace().collect();
        if parts.len() != 2 || parts[0] != "Bearer" {
            return Err(AuthError::MalformedHeader);
        }
        self.verify_token(parts[1]).map(|_| ())
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|_| AuthError::InvalidOrExpiredToken)
    }
}

fn digest(value: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    hasher.finalize().into()
}
