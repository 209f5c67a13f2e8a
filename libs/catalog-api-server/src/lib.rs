//! Read-only HTTP API над сохранёнными продуктами.

mod http;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::get;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use ingest_api::DocumentStore;

/// Максимум документов в ответе `GET /products`.
pub const PRODUCT_PAGE_LIMIT: usize = 100;

fn default_enabled() -> bool {
    true
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout_ms() -> u64 {
    15_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Таймаут на обращение к store в рамках одного запроса.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            port: default_port(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

#[derive(Clone)]
pub(crate) struct AppState {
    store: Arc<dyn DocumentStore>,
    collection: String,
    timeout: Duration,
}

/// Собрать router без привязки к сокету.
pub fn router(store: Arc<dyn DocumentStore>, collection: impl Into<String>, timeout: Duration) -> Router {
    let state = AppState {
        store,
        collection: collection.into(),
        timeout,
    };

    Router::new()
        .route("/healthz", get(http::handle_health))
        .route("/products", get(http::handle_list_products))
        .route("/products/{id}", get(http::handle_get_product))
        .with_state(state)
}

/// Поднять API на `0.0.0.0:{port}` и обслуживать до отмены `shutdown`.
pub async fn run(
    config: &ApiConfig,
    store: Arc<dyn DocumentStore>,
    collection: &str,
    shutdown: CancellationToken,
) -> Result<(), String> {
    let app = router(store, collection, Duration::from_millis(config.request_timeout_ms));

    let port = config.port;
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .map_err(|e| format!("bind api :{port}: {e}"))?;

    tracing::info!(port, "catalog api listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| format!("axum serve: {e}"))?;

    Ok(())
}
