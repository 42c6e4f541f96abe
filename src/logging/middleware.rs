//! Per-request structured logging. Each request runs inside a tracing span
//! carrying the x-request-id, so every event emitted while handling it is
//! correlated without repeating the id field.

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;
use tower_http::request_id::{
    MakeRequestUuid, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tracing::Instrument;

pub async fn log_request(request: Request, next: Next) -> Response {
    let req_id: String = request
        .extensions()
        .get::<RequestId>()
        .and_then(|id| id.header_value().to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let span = tracing::info_span!(
        "request",
        id = %req_id,
        method = %request.method(),
        uri = %request.uri(),
    );

    async move {
        let start = Instant::now();
        let response = next.run(request).await;

        let status = response.status();
        let duration_ms = start.elapsed().as_millis() as u64;

        if status.is_server_error() {
            tracing::error!(%status, duration_ms, "request failed");
        } else if status.is_client_error() {
            tracing::warn!(%status, duration_ms, "request rejected");
        } else {
            tracing::info!(%status, duration_ms, "request completed");
        }

        response
    }
    .instrument(span)
    .await
}

pub fn request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::x_request_id(MakeRequestUuid)
}

pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::x_request_id()
}
