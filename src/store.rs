//! The shortened-URL store
//!
//! Owns the short code to record mapping, assigns codes, enforces expiry and
//! records clicks. All operations run under one async mutex, so check-then-insert
//! and check-then-expire sequences are atomic with respect to other callers.
//!
//! Expiry is lazy: an expired record is purged the next time `resolve`,
//! `record_click` or a create for the same code touches it. `purge_expired`
//! and [`spawn_expiry_sweeper`] remove them proactively.

use chrono::{DateTime, TimeDelta, Utc};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::clock::{Clock, SystemClock};
use crate::error::{StorageError, StoreError};
use crate::location::{LocationProvider, StaticLocation};
use crate::model::{ClickEvent, CreatedUrl, UrlRecord};
use crate::shortcode;
use crate::storage::{RecordMap, Storage};

pub const DEFAULT_VALIDITY_MINUTES: i64 = 30;
pub const DEFAULT_MAX_GENERATION_ATTEMPTS: usize = 1000;
pub const DEFAULT_PERSIST_ATTEMPTS: usize = 3;

/// Whether `list_all` includes records that expired but were not purged yet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpiredListing {
    /// Return everything physically stored
    #[default]
    Show,
    /// Filter out expired records (without purging them)
    Hide,
}

impl FromStr for ExpiredListing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "show" => Ok(Self::Show),
            "hide" => Ok(Self::Hide),
            other => Err(format!("expected 'show' or 'hide', got '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Public prefix of short URLs, e.g. "http://localhost:8080"
    pub base_url: String,
    pub default_validity_minutes: i64,
    pub expired_listing: ExpiredListing,
    /// Random draws before code generation gives up
    pub max_generation_attempts: usize,
    /// Save attempts before a mutation is reported as not committed
    pub persist_attempts: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            default_validity_minutes: DEFAULT_VALIDITY_MINUTES,
            expired_listing: ExpiredListing::Show,
            max_generation_attempts: DEFAULT_MAX_GENERATION_ATTEMPTS,
            persist_attempts: DEFAULT_PERSIST_ATTEMPTS,
        }
    }
}

pub struct UrlStore {
    records: Mutex<RecordMap>,
    storage: Arc<dyn Storage>,
    locator: Arc<dyn LocationProvider>,
    clock: Arc<dyn Clock>,
    options: StoreOptions,
}

impl UrlStore {
    /// Loads the persisted records and builds a store around them.
    ///
    /// A backend that fails to load (missing or corrupt data) yields an empty
    /// store; the failure is logged, not returned.
    pub fn open(storage: Arc<dyn Storage>, options: StoreOptions) -> Self {
        let records = match storage.load() {
            Ok(records) => {
                info!(count = records.len(), "URLs loaded from storage");
                records
            }
            Err(err) => {
                error!(error = %err, "Failed to load URLs from storage, starting empty");
                RecordMap::new()
            }
        };

        Self {
            records: Mutex::new(records),
            storage,
            locator: Arc::new(StaticLocation::default()),
            clock: Arc::new(SystemClock),
            options,
        }
    }

    pub fn with_location_provider(mut self, locator: Arc<dyn LocationProvider>) -> Self {
        self.locator = locator;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Fully qualified short URL for `code`
    pub fn short_url(&self, code: &str) -> String {
        format!("{}/{}", self.options.base_url.trim_end_matches('/'), code)
    }

    /// Creates a short URL.
    ///
    /// Validation happens before anything is touched. With a custom code the
    /// call fails if a live record already uses it; otherwise random codes are
    /// drawn until a free one turns up. An expired record occupying the chosen
    /// code is evicted by the same write.
    pub async fn create(
        &self,
        long_url: &str,
        validity_minutes: Option<i64>,
        custom_code: Option<&str>,
    ) -> Result<CreatedUrl, StoreError> {
        if let Err(err) = Url::parse(long_url) {
            warn!(long_url, error = %err, "Invalid URL provided");
            return Err(StoreError::InvalidUrl(format!("{}: {}", long_url, err)));
        }

        let validity = validity_minutes.unwrap_or(self.options.default_validity_minutes);
        let validity = match TimeDelta::try_minutes(validity).filter(|_| validity > 0) {
            Some(delta) => delta,
            None => {
                warn!(validity, "Invalid validity provided");
                return Err(StoreError::InvalidValidity(format!(
                    "validity must be a positive number of minutes, got {}",
                    validity
                )));
            }
        };

        if let Some(code) = custom_code {
            if let Err(err) = shortcode::validate(code) {
                warn!(short_code = code, "Invalid short code provided");
                return Err(err);
            }
        }

        let mut records = self.records.lock().await;
        let now = self.clock.now();

        let expiry = now.checked_add_signed(validity).ok_or_else(|| {
            StoreError::InvalidValidity(format!("{} minutes is out of range", validity.num_minutes()))
        })?;

        let code = match custom_code {
            Some(code) => {
                if is_taken(&records, code, now) {
                    warn!(short_code = code, "Short code already exists");
                    return Err(StoreError::ShortCodeInUse(code.to_string()));
                }
                code.to_string()
            }
            None => self.generate_free_code(&records, now)?,
        };

        let record = UrlRecord {
            long_url: long_url.to_string(),
            short_code: code.clone(),
            created_at: now,
            expiry,
            clicks: Vec::new(),
        };

        let evicted = records.insert(code.clone(), record.clone());
        if let Err(err) = self.persist(&records) {
            match evicted {
                Some(previous) => records.insert(code.clone(), previous),
                None => records.remove(&code),
            };
            return Err(err.into());
        }

        if let Some(previous) = evicted {
            info!(short_code = %code, expiry = %previous.expiry, "Short URL expired");
        }
        info!(short_code = %code, long_url, expiry = %expiry, "Short URL created");

        Ok(CreatedUrl {
            short_url: self.short_url(&code),
            record,
        })
    }

    /// Returns the live record for `code`, purging it if it has expired
    pub async fn resolve(&self, code: &str) -> Option<UrlRecord> {
        let mut records = self.records.lock().await;
        let now = self.clock.now();
        self.live_entry(&mut records, code, now).cloned()
    }

    /// Appends a click to a live record and returns its long URL.
    ///
    /// `Ok(None)` means the code is unknown or expired. An error means the
    /// click could not be persisted and was not recorded.
    pub async fn record_click(
        &self,
        code: &str,
        source: &str,
    ) -> Result<Option<String>, StoreError> {
        let mut records = self.records.lock().await;
        let now = self.clock.now();

        if self.live_entry(&mut records, code, now).is_none() {
            return Ok(None);
        }

        let click = ClickEvent {
            timestamp: now,
            source: source.to_string(),
            location: self.locator.locate(source),
        };

        let long_url = match records.get_mut(code) {
            Some(record) => {
                record.clicks.push(click.clone());
                record.long_url.clone()
            }
            None => return Ok(None),
        };

        if let Err(err) = self.persist(&records) {
            if let Some(record) = records.get_mut(code) {
                record.clicks.pop();
            }
            return Err(err.into());
        }

        info!(
            short_code = code,
            source = %click.source,
            location = %click.location,
            "Click recorded"
        );
        Ok(Some(long_url))
    }

    /// Removes `code` if present, expired or not. Returns whether anything
    /// was removed.
    pub async fn delete(&self, code: &str) -> Result<bool, StoreError> {
        let mut records = self.records.lock().await;

        let Some(removed) = records.remove(code) else {
            debug!(short_code = code, "Delete of unknown short code");
            return Ok(false);
        };

        if let Err(err) = self.persist(&records) {
            records.insert(code.to_string(), removed);
            return Err(err.into());
        }

        info!(short_code = code, "URL deleted");
        Ok(true)
    }

    /// Every stored record, in no particular order.
    ///
    /// With [`ExpiredListing::Show`] this includes records that expired but
    /// have not been purged yet. Nothing is purged here either way.
    pub async fn list_all(&self) -> Vec<UrlRecord> {
        let records = self.records.lock().await;
        let now = self.clock.now();

        records
            .values()
            .filter(|record| match self.options.expired_listing {
                ExpiredListing::Show => true,
                ExpiredListing::Hide => !record.is_expired_at(now),
            })
            .cloned()
            .collect()
    }

    /// Removes every expired record in one write. Returns how many went.
    pub async fn purge_expired(&self) -> Result<usize, StoreError> {
        let mut records = self.records.lock().await;
        let now = self.clock.now();

        let expired: Vec<String> = records
            .iter()
            .filter(|(_, record)| record.is_expired_at(now))
            .map(|(code, _)| code.clone())
            .collect();

        if expired.is_empty() {
            return Ok(0);
        }

        for code in &expired {
            records.remove(code);
        }
        self.persist(&records)?;

        info!(count = expired.len(), "Expired URLs purged");
        Ok(expired.len())
    }

    /// Looks `code` up, purging it first if it has expired
    fn live_entry<'a>(
        &self,
        records: &'a mut RecordMap,
        code: &str,
        now: DateTime<Utc>,
    ) -> Option<&'a UrlRecord> {
        let expired = match records.get(code) {
            None => {
                warn!(short_code = code, "Short URL not found");
                return None;
            }
            Some(record) => record.is_expired_at(now),
        };

        if expired {
            if let Some(record) = records.remove(code) {
                info!(short_code = code, expiry = %record.expiry, "Short URL expired");
            }
            // The record stays gone even if this flush fails; the next
            // successful save carries the removal.
            if let Err(err) = self.persist(records) {
                warn!(short_code = code, error = %err, "Failed to persist expiry purge");
            }
            return None;
        }

        records.get(code)
    }

    fn generate_free_code(
        &self,
        records: &RecordMap,
        now: DateTime<Utc>,
    ) -> Result<String, StoreError> {
        for attempt in 1..=self.options.max_generation_attempts {
            let code = shortcode::generate();
            if !is_taken(records, &code, now) {
                if attempt > 1 {
                    debug!(attempt, "Short code collision resolved");
                }
                return Ok(code);
            }
        }

        error!(
            attempts = self.options.max_generation_attempts,
            "No free short code found"
        );
        Err(StoreError::CodeSpaceExhausted(
            self.options.max_generation_attempts,
        ))
    }

    fn persist(&self, records: &RecordMap) -> Result<(), StorageError> {
        let attempts = self.options.persist_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.storage.save(records) {
                Ok(()) => {
                    debug!(count = records.len(), "URLs saved to storage");
                    return Ok(());
                }
                Err(err) if attempt < attempts => {
                    warn!(attempt, error = %err, "Failed to save URLs, retrying");
                    attempt += 1;
                }
                Err(err) => {
                    error!(attempt, error = %err, "Failed to save URLs to storage");
                    return Err(err);
                }
            }
        }
    }
}

/// A code is taken while a live record holds it
fn is_taken(records: &RecordMap, code: &str, now: DateTime<Utc>) -> bool {
    records
        .get(code)
        .is_some_and(|record| !record.is_expired_at(now))
}

/// Application state shared across all request handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<UrlStore>,
}

impl AppState {
    pub fn new(store: UrlStore) -> Self {
        Self {
            store: Arc::new(store),
        }
    }
}

/// Periodically purges expired records until the runtime shuts down
pub fn spawn_expiry_sweeper(
    store: Arc<UrlStore>,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match store.purge_expired().await {
                Ok(0) => {}
                Ok(count) => debug!(count, "Expiry sweep finished"),
                Err(err) => warn!(error = %err, "Expiry sweep failed"),
            }
        }
    })
}
