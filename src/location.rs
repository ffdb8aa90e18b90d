//! Coarse location lookup for click events
//!
//! The store only needs a synchronous label per click. Real geolocation is
//! left to whoever implements [`LocationProvider`]; the two providers here are
//! a fixed label and a random pick used for demos.

use rand::seq::IndexedRandom;

pub const UNKNOWN_LOCATION: &str = "Unknown";

const MOCK_LOCATIONS: &[&str] = &[
    "United States",
    "United Kingdom",
    "Canada",
    "Australia",
    "Germany",
    "India",
    "Brazil",
];

pub trait LocationProvider: Send + Sync {
    /// Returns a coarse location label for a click from `source`
    fn locate(&self, source: &str) -> String;

    /// Provider name (for logs)
    fn name(&self) -> &'static str;
}

/// Always answers with the same label
#[derive(Debug, Clone)]
pub struct StaticLocation {
    label: String,
}

impl StaticLocation {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl Default for StaticLocation {
    fn default() -> Self {
        Self::new(UNKNOWN_LOCATION)
    }
}

impl LocationProvider for StaticLocation {
    fn locate(&self, _source: &str) -> String {
        self.label.clone()
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

/// Picks a country uniformly at random
#[derive(Debug, Clone, Default)]
pub struct MockLocation;

impl LocationProvider for MockLocation {
    fn locate(&self, _source: &str) -> String {
        MOCK_LOCATIONS
            .choose(&mut rand::rng())
            .copied()
            .unwrap_or(UNKNOWN_LOCATION)
            .to_string()
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
