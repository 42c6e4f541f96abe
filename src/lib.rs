//! Content backend - library for app logic and testing.

pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod notify;
pub mod routes;
pub mod store;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    http::{HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer,
};

use crate::auth::AuthGate;
use crate::config::AppConfig;
use crate::notify::{BrevoMailer, Mailer, Notifier, UnconfiguredMailer};
use crate::store::Store;
pub use routes::AppState;

/// Configure CORS from environment variables.
/// Uses ALLOWED_ORIGINS (comma-separated) or FRONTEND_ORIGIN.
/// Falls back to the local dev frontend.
pub fn configure_cors() -> CorsLayer {
    let allowed_origins = std::env::var("ALLOWED_ORIGINS")
        .ok()
        .and_then(|s| {
            let origins: Vec<HeaderValue> = s
                .split(',')
                .filter_map(|origin| origin.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                None
            } else {
                Some(origins)
            }
        })
        .or_else(|| {
            std::env::var("FRONTEND_ORIGIN")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(|origin| vec![origin])
        })
        .unwrap_or_else(|| {
            vec![
                "http://localhost:3000".parse().unwrap(),
                "http://127.0.0.1:3000".parse().unwrap(),
            ]
        });

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
        ])
        .allow_credentials(true)
}

/// Create and configure the application router.
pub fn create_app(state: AppState) -> Router {
    let cors = configure_cors();

    Router::new()
        .route("/api/auth/login", post(routes::auth::login))
        .route(
            "/api/content/{key}",
            get(routes::content::get_content).post(routes::content::put_content),
        )
        .route(
            "/api/messages",
            get(routes::messages::list_messages).post(routes::messages::submit_message),
        )
        .route(
            "/api/messages/paginated",
            get(routes::messages::paginated_messages),
        )
        .route("/api/messages/mark-read", post(routes::messages::mark_read))
        .route("/api/messages/delete", post(routes::messages::delete_message))
        .route("/api/send-message", post(routes::messages::send_message))
        .route("/health", get(routes::health::health_ping))
        .route("/health/ready", get(routes::health::health_ready))
        .layer(logging::middleware::propagate_request_id_layer())
        .layer(middleware::from_fn(logging::middleware::log_request))
        .layer(logging::middleware::request_id_layer())
        .layer(TraceLayer::new_for_http())
        // Compress responses with gzip/br/zstd automatically
        .layer(CompressionLayer::new())
        // Global 2 MB request body cap - prevents unbounded buffering
        .layer(RequestBodyLimitLayer::new(2 * 1024 * 1024))
        .layer(cors)
        .with_state(state)
}

/// Run the server (used by main).
pub async fn run() {
    dotenvy::dotenv().ok();

    // Guards MUST be held for the programme's lifetime; dropping them early
    // shuts down background log-writer threads and loses buffered log lines.
    let _log_guards = logging::init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => panic!("FATAL: invalid configuration: {e}"),
    };

    let store = match Store::connect(&config).await {
        Ok(store) => store,
        Err(e) => panic!("FATAL: storage backend initialization failed: {e}"),
    };

    // Legacy inbox seeding runs before the server accepts traffic; a
    // storage failure here means the backend is unusable anyway.
    match store.seed_legacy_messages().await {
        Ok(0) => {}
        Ok(count) => tracing::info!(count, "seeded messages from legacy inbox file"),
        Err(e) => panic!("FATAL: legacy message seeding failed: {e}"),
    }

    let auth = AuthGate::new(&config.admin_password, &config.jwt_secret);

    let notifier = match &config.mail {
        Some(mail) => Notifier::new(
            Arc::new(BrevoMailer::new(mail)),
            mail.admin_email.clone(),
            mail.sender_name.clone(),
        ),
        None => {
            tracing::warn!(
                "mail credentials not configured; contact notifications will not be delivered"
            );
            let mailer: Arc<dyn Mailer> = Arc::new(UnconfiguredMailer);
            Notifier::new(mailer, String::new(), String::new())
        }
    };

    let state = AppState {
        store,
        auth,
        notifier,
        started_at: Instant::now(),
    };

    let app = create_app(state);

    let addr: SocketAddr = match format!("{}:{}", config.host, config.port).parse() {
        Ok(addr) => addr,
        Err(e) => panic!("FATAL: invalid HOST/PORT configuration: {e}"),
    };
    tracing::info!("Starting server on {}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => panic!("FATAL: failed to bind {addr}: {e}"),
    };

    if let Err(e) = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    {
        panic!("FATAL: server error: {e}");
    }
}
