//! Environment-driven configuration
//!
//! Every setting has a default. A value that does not parse logs a warning
//! and falls back to the default rather than aborting startup.

use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::location::{LocationProvider, MockLocation, StaticLocation};
use crate::store::{
    ExpiredListing, StoreOptions, DEFAULT_MAX_GENERATION_ATTEMPTS, DEFAULT_PERSIST_ATTEMPTS,
    DEFAULT_VALIDITY_MINUTES,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LocationKind {
    #[default]
    Static,
    Mock,
}

impl FromStr for LocationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "static" => Ok(Self::Static),
            "mock" => Ok(Self::Mock),
            other => Err(format!("expected 'static' or 'mock', got '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// `PORT` (default: 8080)
    pub port: u16,
    /// `DATABASE_URL` - redb file path (default: "data.db")
    pub database_path: String,
    /// `BASE_URL` (default: "http://localhost:{PORT}")
    pub base_url: String,
    /// `DEFAULT_VALIDITY_MINUTES` (default: 30)
    pub default_validity_minutes: i64,
    /// `LIST_EXPIRED` - "show" or "hide" (default: show)
    pub expired_listing: ExpiredListing,
    /// `SWEEP_INTERVAL_SECS` - background purge period, off when unset or 0
    pub sweep_interval: Option<Duration>,
    /// `LOCATION_PROVIDER` - "static" or "mock" (default: static)
    pub location: LocationKind,
    /// `PERSIST_ATTEMPTS` (default: 3)
    pub persist_attempts: usize,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = parse_or(&lookup, "PORT", 8080u16);
        let base_url = lookup("BASE_URL")
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| format!("http://localhost:{}", port));

        let default_validity_minutes = match parse_or(
            &lookup,
            "DEFAULT_VALIDITY_MINUTES",
            DEFAULT_VALIDITY_MINUTES,
        ) {
            minutes if minutes > 0 => minutes,
            minutes => {
                warn!(minutes, "DEFAULT_VALIDITY_MINUTES must be positive, using default");
                DEFAULT_VALIDITY_MINUTES
            }
        };

        let sweep_interval = match parse_or(&lookup, "SWEEP_INTERVAL_SECS", 0u64) {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Self {
            port,
            database_path: lookup("DATABASE_URL").unwrap_or_else(|| "data.db".to_string()),
            base_url,
            default_validity_minutes,
            expired_listing: parse_or(&lookup, "LIST_EXPIRED", ExpiredListing::default()),
            sweep_interval,
            location: parse_or(&lookup, "LOCATION_PROVIDER", LocationKind::default()),
            persist_attempts: parse_or(&lookup, "PERSIST_ATTEMPTS", DEFAULT_PERSIST_ATTEMPTS)
                .max(1),
        }
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            base_url: self.base_url.clone(),
            default_validity_minutes: self.default_validity_minutes,
            expired_listing: self.expired_listing,
            max_generation_attempts: DEFAULT_MAX_GENERATION_ATTEMPTS,
            persist_attempts: self.persist_attempts,
        }
    }

    pub fn location_provider(&self) -> Arc<dyn LocationProvider> {
        match self.location {
            LocationKind::Static => Arc::new(StaticLocation::default()),
            LocationKind::Mock => Arc::new(MockLocation),
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|err| {
            warn!(key, value = %raw, error = %err, "Invalid config value, using default");
            default
        }),
    }
}
