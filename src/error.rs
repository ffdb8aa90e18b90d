//! Error types for the store and its persistence layer
//!
//! `StoreError` is what callers of [`crate::store::UrlStore`] see. It also
//! renders itself as an HTTP response so handlers can return it directly.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Failures of the backing storage
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] redb::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

macro_rules! impl_from_redb {
    ($($source:ty),* $(,)?) => {
        $(
            impl From<$source> for StorageError {
                fn from(err: $source) -> Self {
                    StorageError::Database(err.into())
                }
            }
        )*
    };
}

impl_from_redb!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("invalid short code: {0}")]
    InvalidShortCode(String),

    #[error("short code already in use: {0}")]
    ShortCodeInUse(String),

    #[error("invalid validity: {0}")]
    InvalidValidity(String),

    #[error("short url not found: {0}")]
    NotFound(String),

    #[error("persistence failure: {0}")]
    Persistence(#[from] StorageError),

    #[error("no free short code after {0} attempts")]
    CodeSpaceExhausted(usize),
}

impl StoreError {
    /// Stable machine-readable tag used in API error bodies
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::InvalidUrl(_) => "invalid_url",
            StoreError::InvalidShortCode(_) => "invalid_short_code",
            StoreError::ShortCodeInUse(_) => "short_code_in_use",
            StoreError::InvalidValidity(_) => "invalid_validity",
            StoreError::NotFound(_) => "not_found",
            StoreError::Persistence(_) => "persistence_failure",
            StoreError::CodeSpaceExhausted(_) => "code_space_exhausted",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            StoreError::InvalidUrl(_)
            | StoreError::InvalidShortCode(_)
            | StoreError::InvalidValidity(_) => StatusCode::BAD_REQUEST,
            StoreError::ShortCodeInUse(_) => StatusCode::CONFLICT,
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            StoreError::Persistence(_) | StoreError::CodeSpaceExhausted(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Internal details stay in the logs
        let message = match &self {
            StoreError::Persistence(_) | StoreError::CodeSpaceExhausted(_) => {
                "An unexpected error occurred".to_string()
            }
            other => other.to_string(),
        };

        (
            status,
            Json(json!({
                "error": message,
                "code": self.code(),
            })),
        )
            .into_response()
    }
}
