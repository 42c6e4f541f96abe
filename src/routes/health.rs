//! Health endpoints for load balancers and deploy checks.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::AppState;

/// Single service check result.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceCheck {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Ready check response.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadyResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub uptime: u64,
    pub checks: ReadyChecks,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReadyChecks {
    pub storage: ServiceCheck,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SimpleHealthResponse {
    pub status: String,
}

/// GET /health - liveness ping, no dependencies touched.
pub async fn health_ping() -> impl IntoResponse {
    Json(SimpleHealthResponse {
        status: "ok".to_string(),
    })
}

/// GET /health/ready - readiness including a storage round trip. Returns
/// 503 when the backend cannot be reached so orchestrators hold traffic.
pub async fn health_ready(State(state): State<AppState>) -> impl IntoResponse {
    let uptime = state.started_at.elapsed().as_secs();

    let (status_code, status, storage) = match state.store.ping().await {
        Ok(duration) => (
            StatusCode::OK,
            "ready",
            ServiceCheck {
                status: "healthy".to_string(),
                response_time: Some(duration.as_millis() as u64),
                error: None,
            },
        ),
        Err(e) => {
            tracing::error!("readiness check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "not ready",
                ServiceCheck {
                    status: "unhealthy".to_string(),
                    response_time: None,
                    error: Some("storage unreachable".to_string()),
                },
            )
        }
    };

    (
        status_code,
        Json(ReadyResponse {
            status: status.to_string(),
            timestamp: Utc::now(),
            uptime,
            checks: ReadyChecks { storage },
        }),
    )
}
