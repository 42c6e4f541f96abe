//! Visitor-message inbox routes plus the contact form with email
//! notification. The message is always persisted before any email is
//! attempted; a delivery failure downgrades the response to a
//! saved-but-not-notified outcome instead of failing the request.

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::{require_admin, ApiError, AppState, SuccessResponse};
use crate::store::Message;

#[derive(Debug, Deserialize, Serialize)]
pub struct SubmitMessageRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct SubmitMessageResponse {
    pub ok: bool,
    pub item: Message,
}

#[derive(Debug, Deserialize)]
pub struct PaginationQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    10
}

#[derive(Debug, Serialize)]
pub struct PaginatedResponse {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub messages: Vec<Message>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct MessageIdRequest {
    pub id: i64,
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub ok: bool,
    pub item: Message,
    pub delivered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn validate(payload: &SubmitMessageRequest) -> Result<(), ApiError> {
    if payload.name.trim().is_empty()
        || payload.email.trim().is_empty()
        || payload.message.trim().is_empty()
    {
        return Err(ApiError::Validation("Missing required fields"));
    }
    Ok(())
}

/// GET /api/messages - the whole inbox, newest-first.
pub async fn list_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Message>>, ApiError> {
    require_admin(&state.auth, &headers)?;
    Ok(Json(state.store.all_messages().await?))
}

/// GET /api/messages/paginated?page=&limit=
pub async fn paginated_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PaginatedResponse>, ApiError> {
    require_admin(&state.auth, &headers)?;
    let page = state.store.list_messages(query.page, query.limit).await?;
    Ok(Json(PaginatedResponse {
        page: page.page,
        limit: page.page_size,
        total: page.total,
        messages: page.items,
    }))
}

/// POST /api/messages - visitor submission, no notification email.
pub async fn submit_message(
    State(state): State<AppState>,
    Json(payload): Json<SubmitMessageRequest>,
) -> Result<Json<SubmitMessageResponse>, ApiError> {
    validate(&payload)?;
    let item = state
        .store
        .append_message(&payload.name, &payload.email, &payload.message)
        .await?;
    tracing::info!(id = item.id, "visitor message stored");
    Ok(Json(SubmitMessageResponse { ok: true, item }))
}

/// POST /api/messages/mark-read
pub async fn mark_read(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<MessageIdRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    require_admin(&state.auth, &headers)?;
    state.store.mark_read(payload.id).await?;
    Ok(SuccessResponse::ok())
}

/// POST /api/messages/delete - idempotent, succeeds for unknown ids too.
pub async fn delete_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<MessageIdRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    require_admin(&state.auth, &headers)?;
    state.store.delete_message(payload.id).await?;
    Ok(SuccessResponse::ok())
}

/// POST /api/send-message - persist first, then notify.
pub async fn send_message(
    State(state): State<AppState>,
    Json(payload): Json<SubmitMessageRequest>,
) -> Result<Json<SendMessageResponse>, ApiError> {
    validate(&payload)?;

    let item = state
        .store
        .append_message(&payload.name, &payload.email, &payload.message)
        .await?;

    match state
        .notifier
        .notify_contact(&item.name, &item.email, &item.message)
        .await
    {
        Ok(()) => {
            tracing::info!(id = item.id, "contact message stored and notified");
            Ok(Json(SendMessageResponse {
                ok: true,
                item,
                delivered: true,
                error: None,
            }))
        }
        Err(e) => {
            // The message is already durable; report partial success.
            tracing::error!(id = item.id, error = %e, "notification failed after save");
            Ok(Json(SendMessageResponse {
                ok: true,
                item,
                delivered: false,
                error: Some("delivery_error".to_string()),
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeliveryError;
    use crate::notify::Mailer;
    use crate::routes::testing::{
        app, get, get_auth, login, post_json, post_json_auth, send, state, state_with_mailer,
    };
    use async_trait::async_trait;
    use axum::http::StatusCode;
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, recipient: &str, subject: &str, _: &str) -> Result<(), DeliveryError> {
            self.sent
                .lock()
                .await
                .push((recipient.to_string(), subject.to_string()));
            Ok(())
        }
    }

    struct FailingMailer;

    #[async_trait]
    impl Mailer for FailingMailer {
        async fn send(&self, _: &str, _: &str, _: &str) -> Result<(), DeliveryError> {
            Err(DeliveryError("smtp relay down".to_string()))
        }
    }

    fn visitor_body() -> serde_json::Value {
        json!({"name": "A", "email": "a@x.com", "message": "hi"})
    }

    #[tokio::test]
    async fn test_submit_message_returns_item_with_id() {
        let app = app(state());
        let (status, bytes) = send(app, post_json("/api/messages", &visitor_body())).await;
        assert_eq!(status, StatusCode::OK);
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["ok"], true);
        assert!(body["item"]["id"].as_i64().unwrap() > 0);
        assert_eq!(body["item"]["read"], false);
        assert_eq!(body["item"]["name"], "A");
    }

    #[tokio::test]
    async fn test_submit_message_missing_fields_returns_bad_request() {
        let app = app(state());
        let (status, bytes) = send(
            app,
            post_json("/api/messages", &json!({"name": "A", "email": "a@x.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "validation_error");
    }

    #[tokio::test]
    async fn test_inbox_routes_require_token() {
        let app = app(state());
        for req in [
            get("/api/messages"),
            get("/api/messages/paginated?page=1&limit=10"),
            post_json("/api/messages/mark-read", &json!({"id": 1})),
            post_json("/api/messages/delete", &json!({"id": 1})),
        ] {
            let (status, _) = send(app.clone(), req).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
        }
    }

    #[tokio::test]
    async fn test_paginated_lists_latest_submission_first() {
        let app = app(state());
        let token = login(&app).await;

        for i in 1..=3 {
            let (status, _) = send(
                app.clone(),
                post_json(
                    "/api/messages",
                    &json!({"name": format!("v{i}"), "email": "v@x.com", "message": "hi"}),
                ),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }

        let (status, bytes) = send(
            app,
            get_auth("/api/messages/paginated?page=1&limit=10", &token),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["page"], 1);
        assert_eq!(body["limit"], 10);
        assert_eq!(body["total"], 3);
        assert_eq!(body["messages"][0]["name"], "v3");
        assert_eq!(body["messages"][2]["name"], "v1");
    }

    #[tokio::test]
    async fn test_mark_read_flow() {
        let app = app(state());
        let token = login(&app).await;

        let (_, bytes) = send(app.clone(), post_json("/api/messages", &visitor_body())).await;
        let created: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        let id = created["item"]["id"].as_i64().unwrap();

        let (status, _) = send(
            app.clone(),
            post_json_auth("/api/messages/mark-read", &token, &json!({"id": id})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        // Idempotent second mark.
        let (status, _) = send(
            app.clone(),
            post_json_auth("/api/messages/mark-read", &token, &json!({"id": id})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, bytes) = send(
            app.clone(),
            post_json_auth("/api/messages/mark-read", &token, &json!({"id": 999_999})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "not_found");

        let (_, bytes) = send(app, get_auth("/api/messages", &token)).await;
        let listed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(listed[0]["read"], true);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent_over_http() {
        let app = app(state());
        let token = login(&app).await;

        let (_, bytes) = send(app.clone(), post_json("/api/messages", &visitor_body())).await;
        let created: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        let id = created["item"]["id"].as_i64().unwrap();

        for _ in 0..2 {
            let (status, bytes) = send(
                app.clone(),
                post_json_auth("/api/messages/delete", &token, &json!({"id": id})),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(body["ok"], true);
        }

        let (_, bytes) = send(app, get_auth("/api/messages", &token)).await;
        let listed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(listed.as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_send_message_delivers_both_emails() {
        let mailer = Arc::new(RecordingMailer::default());
        let app = app(state_with_mailer(mailer.clone()));

        let (status, bytes) = send(app, post_json("/api/send-message", &visitor_body())).await;
        assert_eq!(status, StatusCode::OK);
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["ok"], true);
        assert_eq!(body["delivered"], true);

        let sent = mailer.sent.lock().await;
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0, "admin@bndlabs.dev");
        assert_eq!(sent[0].1, "New message from A");
        assert_eq!(sent[1].0, "a@x.com");
    }

    #[tokio::test]
    async fn test_send_message_saves_even_when_delivery_fails() {
        let app = app(state_with_mailer(Arc::new(FailingMailer)));
        let token = login(&app).await;

        let (status, bytes) = send(
            app.clone(),
            post_json("/api/send-message", &visitor_body()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["ok"], true);
        assert_eq!(body["delivered"], false);
        assert_eq!(body["error"], "delivery_error");

        // The failed notification did not lose the message.
        let (_, bytes) = send(app, get_auth("/api/messages", &token)).await;
        let listed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(listed.as_array().unwrap().len(), 1);
        assert_eq!(listed[0]["name"], "A");
    }

    #[tokio::test]
    async fn test_send_message_missing_fields_is_not_saved() {
        let app = app(state());
        let token = login(&app).await;

        let (status, _) = send(
            app.clone(),
            post_json("/api/send-message", &json!({"name": "A"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, bytes) = send(app, get_auth("/api/messages", &token)).await;
        let listed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(listed.as_array().unwrap().len(), 0);
    }
}
