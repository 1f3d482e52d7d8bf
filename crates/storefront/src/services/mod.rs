//! Business logic services for storefront.
//!
//! # Services
//!
//! - `catalog` - Cached catalog reads, discounted listings and cart quotes
//! - `payment_sync` - Order updates driven by payment notifications

pub mod catalog;
pub mod payment_sync;

pub use catalog::{CatalogService, ProductListing, Quote, QuoteError, QuoteLine};
pub use payment_sync::{PaymentSyncService, SyncError, SyncOutcome};
