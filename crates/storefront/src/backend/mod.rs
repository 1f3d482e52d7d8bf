//! Hosted backend (PostgREST-style REST API) client.
//!
//! # Architecture
//!
//! - The hosted database is the source of truth - no local copy, direct API calls
//! - Reads are memoized by [`crate::cache::ReadThroughCache`] in the catalog
//!   service, not here
//! - Every request carries an explicit timeout
//!
//! # Tables
//!
//! - `products` - Catalog
//! - `discounts` - Discount rules
//! - `orders` - Orders, updated by payment webhooks

mod client;

pub use client::BackendClient;

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when talking to the hosted backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("Backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Invalid request URL.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// The request did not complete in time.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
}
