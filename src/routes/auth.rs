//! Admin login: exchanges the shared secret for a bearer token.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::{ApiError, AppState};

#[derive(Debug, Deserialize, Serialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub ok: bool,
    pub token: String,
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let token = state.auth.issue_token(&payload.password).map_err(|e| {
        tracing::warn!(kind = e.kind(), "admin login rejected");
        ApiError::Auth(e)
    })?;

    tracing::info!("admin login succeeded");
    Ok(Json(LoginResponse { ok: true, token }))
}
