//! Named content documents: public reads, token-gated whole-value writes.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde_json::Value;

use super::{require_admin, ApiError, AppState, SuccessResponse};
use crate::store::ContentKey;

/// GET /api/content/{key}
pub async fn get_content(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let key = ContentKey::parse(&key).ok_or(ApiError::UnknownKey)?;
    let value = state.store.get_document(key).await?;
    Ok(Json(value))
}

/// POST /api/content/{key} - full replacement of the stored value.
pub async fn put_content(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(key): Path<String>,
    Json(value): Json<Value>,
) -> Result<Json<SuccessResponse>, ApiError> {
    require_admin(&state.auth, &headers)?;
    let key = ContentKey::parse(&key).ok_or(ApiError::UnknownKey)?;
    state.store.put_document(key, value).await?;
    tracing::info!(key = %key, "content document updated");
    Ok(SuccessResponse::ok())
}
