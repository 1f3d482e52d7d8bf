//! Bodega Core - Shared types and pricing rules.
//!
//! This crate provides common types used across all Bodega components:
//! - `storefront` - Public storefront API and payment webhook intake
//! - `cli` - Developer tools for signing webhooks and quoting carts
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no
//! database access, no HTTP clients. This keeps it lightweight and allows it
//! to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, prices, products, line items, discount rules and statuses
//! - [`pricing`] - Discount rule evaluation and line item pricing

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod pricing;
pub mod types;

pub use pricing::{apply_discounts, is_currently_valid, quote_totals};
pub use types::*;
