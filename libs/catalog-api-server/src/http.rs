use std::future::Future;
use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use ingest_api::{DocumentQuery, IngestError};

use super::{AppState, PRODUCT_PAGE_LIMIT};

#[derive(Debug, Serialize)]
pub(crate) struct Durations {
    pub query_ms: u64,
    pub total_ms: u64,
}

#[derive(Serialize)]
struct ProductList {
    products: Vec<serde_json::Value>,
    total: u64,
    durations: Durations,
}

#[derive(Serialize)]
struct ProductItem {
    product: serde_json::Value,
    durations: Durations,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, axum::Json(serde_json::json!({ "error": message.into() }))).into_response()
}

fn elapsed_ms(since: Instant) -> u64 {
    u64::try_from(since.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Вызов store с таймаутом запроса. Ошибка уже готова к отправке.
async fn with_timeout<T>(
    state: &AppState,
    fut: impl Future<Output = Result<T, IngestError>>,
) -> Result<T, Response> {
    match tokio::time::timeout(state.timeout, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            tracing::error!(collection = %state.collection, error = %e, "store query failed");
            Err(error_response(StatusCode::INTERNAL_SERVER_ERROR, e.message()))
        }
        Err(_) => {
            tracing::warn!(collection = %state.collection, timeout_ms = state.timeout.as_millis() as u64, "store query timed out");
            Err(error_response(StatusCode::GATEWAY_TIMEOUT, "request timed out"))
        }
    }
}

/// `<scheme>://<host>` запроса: scheme из `X-Forwarded-Proto`, иначе http.
pub(crate) fn base_url(headers: &HeaderMap) -> Option<String> {
    let host = headers.get(header::HOST)?.to_str().ok()?;
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");
    Some(format!("{scheme}://{host}"))
}

fn attach_href(product: &mut serde_json::Value, base: &str) {
    let Some(id) = product.get("id").and_then(|v| v.as_str()).map(str::to_string) else {
        return;
    };
    if let Some(obj) = product.as_object_mut() {
        obj.insert("href".into(), serde_json::Value::String(format!("{base}/products/{id}")));
    }
}

// ═══════════════════════════════════════════════════════════════
//  GET /healthz
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn handle_health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

// ═══════════════════════════════════════════════════════════════
//  GET /products?fields=a,b
// ═══════════════════════════════════════════════════════════════

#[derive(Deserialize)]
pub(crate) struct ProductListParams {
    fields: Option<String>,
}

pub(crate) async fn handle_list_products(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ProductListParams>,
) -> Response {
    let started = Instant::now();
    let query = DocumentQuery {
        fields: params.fields.as_deref().map(ingest_api::split_list).unwrap_or_default(),
        exclude_deleted: true,
        limit: Some(PRODUCT_PAGE_LIMIT),
    };

    let query_started = Instant::now();
    let mut products = match with_timeout(&state, state.store.find(&state.collection, &query)).await {
        Ok(products) => products,
        Err(resp) => return resp,
    };
    // `total` считает все неудалённые документы, не только страницу.
    let total = match with_timeout(&state, state.store.count(&state.collection, &query)).await {
        Ok(total) => total,
        Err(resp) => return resp,
    };
    let query_ms = elapsed_ms(query_started);

    if let Some(base) = base_url(&headers) {
        for product in &mut products {
            attach_href(product, &base);
        }
    }

    axum::Json(ProductList {
        products,
        total,
        durations: Durations {
            query_ms,
            total_ms: elapsed_ms(started),
        },
    })
    .into_response()
}

// ═══════════════════════════════════════════════════════════════
//  GET /products/{id}
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn handle_get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    let started = Instant::now();
    let product = match with_timeout(&state, state.store.find_one(&state.collection, &id)).await {
        Ok(Some(product)) => product,
        Ok(None) => return error_response(StatusCode::NOT_FOUND, format!("product {id} not found")),
        Err(resp) => return resp,
    };
    let query_ms = elapsed_ms(started);

    axum::Json(ProductItem {
        product,
        durations: Durations {
            query_ms,
            total_ms: elapsed_ms(started),
        },
    })
    .into_response()
}
