//! Route definitions for the URL shortener API

use axum::routing::{get, post};
use axum::Router;

use crate::handler::{create_short_url, delete_short_url, get_url, list_urls, redirect_url};
use crate::store::AppState;

/// Creates the application router
///
/// # Route Definitions
///
/// - `POST /shorten` - Creates a short URL
/// - `GET /urls` - Lists stored records
/// - `GET /urls/{code}` - Shows one live record with its clicks
/// - `DELETE /urls/{code}` - Deletes a record
/// - `GET /{code}` - Redirects to the long URL and records a click
///
/// ```no_run
/// # use std::sync::Arc;
/// # use ttl_shortener::storage::RedbStorage;
/// # use ttl_shortener::store::{AppState, StoreOptions, UrlStore};
/// # use ttl_shortener::route::create_app;
/// let storage = Arc::new(RedbStorage::open("data.db").unwrap());
/// let state = AppState::new(UrlStore::open(storage, StoreOptions::default()));
/// let app = create_app(state);
/// // axum::serve(listener, app).await.unwrap();
/// ```
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/shorten", post(create_short_url))
        .route("/urls", get(list_urls))
        .route("/urls/{code}", get(get_url).delete(delete_short_url))
        .route("/{code}", get(redirect_url))
        .with_state(state)
}
