//! HTTP request handlers
//!
//! Thin adapters between axum extractors and [`crate::store::UrlStore`]:
//! - Creating short URLs with custom or random codes
//! - Redirecting short codes to their long URLs while recording clicks
//! - Listing and inspecting records
//! - Deleting records

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{debug, error, warn};

use crate::error::StoreError;
use crate::model::{ClickParams, CreateRequest};
use crate::store::AppState;

const DEFAULT_SOURCE: &str = "direct";

/// Creates a new short URL
///
/// # Request Body
///
/// ```json
/// {
///   "longURL": "https://example.com/very/long/url",
///   "validityMinutes": 30,
///   "shortCode": "my-link"
/// }
/// ```
///
/// # Response
///
/// - **201 Created** - `{ "shortURL": ..., "record": {...} }`
/// - **400 Bad Request** - Malformed body, URL, code or validity
/// - **409 Conflict** - Custom code already used by a live record
pub async fn create_short_url(
    State(state): State<AppState>,
    payload: Result<Json<CreateRequest>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "Rejected create request");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": rejection.body_text(),
                    "code": "invalid_request"
                })),
            )
                .into_response();
        }
    };

    // An empty custom code means "pick one for me"
    let custom_code = payload.short_code.as_deref().filter(|code| !code.is_empty());

    match state
        .store
        .create(&payload.long_url, payload.validity_minutes, custom_code)
        .await
    {
        Ok(created) => (StatusCode::CREATED, Json(created)).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Redirects a short code to its long URL
///
/// Records a click with the `source` query parameter, or the `Referer`
/// header, or "direct". Answers **302 Found** for live codes and
/// **404 Not Found** for unknown or expired ones.
///
/// A malformed query string or a click that cannot be persisted does not
/// block the redirect.
pub async fn redirect_url(
    Path(code): Path<String>,
    params: Result<Query<ClickParams>, QueryRejection>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Response {
    let params = match params {
        Ok(Query(params)) => params,
        Err(rejection) => {
            debug!(short_code = %code, error = %rejection.body_text(), "Ignoring unparsable query");
            ClickParams::default()
        }
    };

    let source = params
        .source
        .filter(|source| !source.is_empty())
        .or_else(|| {
            headers
                .get(header::REFERER)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        })
        .unwrap_or_else(|| DEFAULT_SOURCE.to_string());

    let long_url = match state.store.record_click(&code, &source).await {
        Ok(Some(long_url)) => long_url,
        Ok(None) => return StoreError::NotFound(code).into_response(),
        Err(err) => {
            error!(short_code = %code, error = %err, "Click not recorded");
            match state.store.resolve(&code).await {
                Some(record) => record.long_url,
                None => return StoreError::NotFound(code).into_response(),
            }
        }
    };

    (StatusCode::FOUND, [(header::LOCATION, long_url)]).into_response()
}

/// Lists every stored record
///
/// Whether stale (expired, not yet purged) records appear depends on the
/// store's `ExpiredListing` setting.
pub async fn list_urls(State(state): State<AppState>) -> Response {
    Json(state.store.list_all().await).into_response()
}

/// Returns one live record with its click history
pub async fn get_url(Path(code): Path<String>, State(state): State<AppState>) -> Response {
    match state.store.resolve(&code).await {
        Some(record) => Json(record).into_response(),
        None => StoreError::NotFound(code).into_response(),
    }
}

/// Deletes a short URL
///
/// - **204 No Content** - Removed
/// - **404 Not Found** - Nothing stored under this code
pub async fn delete_short_url(
    Path(code): Path<String>,
    State(state): State<AppState>,
) -> Response {
    match state.store.delete(&code).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => StoreError::NotFound(code).into_response(),
        Err(err) => err.into_response(),
    }
}
