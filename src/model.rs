//! Data models for the URL shortener
//!
//! Stored records, click events and the request/response payloads of the HTTP API.
//! Field names are camelCase on the wire for JSON compatibility.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A shortened URL as held by the store
///
/// A record is live while `now <= expiry`. Clicks are append-only and kept
/// in the order they were recorded.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UrlRecord {
    /// The absolute URL the short code points to
    #[serde(rename = "longURL")]
    pub long_url: String,

    /// Public token, unique among live records
    pub short_code: String,

    pub created_at: DateTime<Utc>,

    /// Always strictly after `created_at`
    pub expiry: DateTime<Utc>,

    #[serde(default)]
    pub clicks: Vec<ClickEvent>,
}

impl UrlRecord {
    /// Whether the record is past its expiry at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expiry
    }
}

/// One recorded visit of a short URL
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ClickEvent {
    pub timestamp: DateTime<Utc>,

    /// Free-form tag describing where the click came from (e.g. "direct")
    pub source: String,

    /// Coarse geographic label from the configured location provider
    pub location: String,
}

/// Request payload for `POST /shorten`
///
/// # Example
/// ```json
/// {
///   "longURL": "https://example.com/very/long/url",
///   "validityMinutes": 60,
///   "shortCode": "my-link"
/// }
/// ```
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequest {
    #[serde(rename = "longURL")]
    pub long_url: String,

    /// Minutes until expiry; the configured default applies when absent
    pub validity_minutes: Option<i64>,

    /// Optional custom code; a random 8-character code is drawn when absent
    pub short_code: Option<String>,
}

/// Result of a successful create, also the `201` response body
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CreatedUrl {
    /// Fully qualified short URL (public base + short code)
    #[serde(rename = "shortURL")]
    pub short_url: String,

    pub record: UrlRecord,
}

/// Query parameters accepted by the redirect endpoint
#[derive(Deserialize, Debug, Default)]
pub struct ClickParams {
    /// Click source tag; falls back to the `Referer` header, then "direct"
    pub source: Option<String>,
}
