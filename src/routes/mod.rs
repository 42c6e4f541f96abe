//! HTTP route handlers. All semantics live in the components; handlers only
//! parse input, run the auth gate, and map component errors onto JSON.

pub mod auth;
pub mod content;
pub mod health;
pub mod messages;

use std::time::Instant;

use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::auth::AuthGate;
use crate::error::{AuthError, StoreError};
use crate::notify::Notifier;
use crate::store::Store;

/// Shared application state, built once in `run` and handed to every
/// handler through axum's `State` extractor - no module-level globals.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub auth: AuthGate,
    pub notifier: Notifier,
    pub started_at: Instant,
}

/// Error body: a machine-readable kind plus a human-readable message.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub ok: bool,
}

impl SuccessResponse {
    pub fn ok() -> Json<Self> {
        Json(Self { ok: true })
    }
}

/// Request-terminal errors, mapped uniformly onto status + `ErrorResponse`.
#[derive(Debug)]
pub enum ApiError {
    Auth(AuthError),
    Store(StoreError),
    Validation(&'static str),
    UnknownKey,
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        ApiError::Auth(e)
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Store(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            ApiError::Auth(e) => {
                let status = match e {
                    AuthError::MissingCredential => StatusCode::BAD_REQUEST,
                    AuthError::Signing => StatusCode::INTERNAL_SERVER_ERROR,
                    _ => StatusCode::UNAUTHORIZED,
                };
                (status, e.kind(), e.to_string())
            }
            ApiError::Store(StoreError::NotFound) => (
                StatusCode::NOT_FOUND,
                StoreError::NotFound.kind(),
                "Message not found".to_string(),
            ),
            ApiError::Store(e) => {
                // Backend details go to the log, never into the response.
                tracing::error!("storage error: {}", e);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    e.kind(),
                    "Storage backend unavailable".to_string(),
                )
            }
            ApiError::Validation(message) => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                message.to_string(),
            ),
            ApiError::UnknownKey => (
                StatusCode::NOT_FOUND,
                "unknown_key",
                "Unknown content key".to_string(),
            ),
        };

        (
            status,
            Json(ErrorResponse {
                error: kind.to_string(),
                message: Some(message),
            }),
        )
            .into_response()
    }
}

/// Run the auth gate over the request's Authorization header. Every
/// mutating route calls this before touching the store.
pub fn require_admin(auth: &AuthGate, headers: &HeaderMap) -> Result<(), ApiError> {
    let header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    auth.authorize(header).map_err(|e| {
        tracing::warn!(kind = e.kind(), "rejected unauthorized request");
        ApiError::Auth(e)
    })
}
