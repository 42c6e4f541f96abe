//! Application configuration - built once at startup and passed into the
//! components, so nothing reads the environment after boot.

use std::path::PathBuf;

use crate::error::ConfigError;

/// Default legacy data directory (flat JSON files from the pre-database era).
const DEFAULT_DATA_DIR: &str = "data";

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3001;
const DEFAULT_SENDER_NAME: &str = "bndlabs";

/// Transactional-email credentials. Only present when both the API key and
/// the sender address are configured.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub api_key: String,
    pub sender_email: String,
    pub sender_name: String,
    /// Recipient of the admin notice; defaults to the sender address.
    pub admin_email: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Shared admin secret checked at login.
    pub admin_password: String,
    /// HS256 signing key for access tokens.
    pub jwt_secret: String,
    /// Primary backend. When unset the server runs on the in-memory backend
    /// (local development without PostgreSQL).
    pub database_url: Option<String>,
    /// Directory holding the legacy flat-file documents.
    pub data_dir: PathBuf,
    pub mail: Option<MailConfig>,
    pub host: String,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary lookup function. Tests feed
    /// a map through here instead of mutating the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let require = |key: &'static str| -> Result<String, ConfigError> {
            match lookup(key) {
                Some(v) if !v.trim().is_empty() => Ok(v),
                _ => Err(ConfigError::MissingVar(key)),
            }
        };

        let admin_password = require("ADMIN_PASSWORD")?;
        let jwt_secret = require("JWT_SECRET")?;

        let database_url = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty());
        let data_dir = lookup("DATA_DIR")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string())
            .into();

        let host = lookup("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match lookup("PORT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidVar("PORT"))?,
            None => DEFAULT_PORT,
        };

        let mail = match (lookup("BREVO_API_KEY"), lookup("BREVO_SENDER_EMAIL")) {
            (Some(api_key), Some(sender_email))
                if !api_key.trim().is_empty() && !sender_email.trim().is_empty() =>
            {
                Some(MailConfig {
                    api_key,
                    admin_email: lookup("ADMIN_EMAIL")
                        .filter(|v| !v.trim().is_empty())
                        .unwrap_or_else(|| sender_email.clone()),
                    sender_name: lookup("BREVO_SENDER_NAME")
                        .filter(|v| !v.trim().is_empty())
                        .unwrap_or_else(|| DEFAULT_SENDER_NAME.to_string()),
                    sender_email,
                })
            }
            _ => None,
        };

        Ok(Self {
            admin_password,
            jwt_secret,
            database_url,
            data_dir,
            mail,
            host,
            port,
        })
    }
}
