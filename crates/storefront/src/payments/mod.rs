//! Payment processor API client.
//!
//! Webhook notifications only carry a payment ID; the payment itself (status,
//! amount, the order it belongs to) is fetched from the processor's REST API.

mod client;
pub mod types;

pub use client::PaymentsClient;
pub use types::Payment;

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when talking to the payment processor.
#[derive(Debug, Error)]
pub enum PaymentsError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The processor answered with a non-success status.
    #[error("Payment API returned HTTP {status}: {body}")]
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
