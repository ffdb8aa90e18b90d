//! Library exports for the URL shortener
//!
//! The store and its collaborators are public so they can be embedded and
//! tested without the HTTP layer.

pub mod clock;
pub mod config;
pub mod error;
pub mod handler;
pub mod location;
pub mod model;
pub mod route;
pub mod shortcode;
pub mod storage;
pub mod store;
