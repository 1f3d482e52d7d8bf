//! Core types for Bodega.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod discount;
pub mod id;
pub mod line_item;
pub mod price;
pub mod product;
pub mod status;

pub use discount::{DiscountKind, DiscountRule, DiscountScope, DiscountValue};
pub use id::*;
pub use line_item::{CartTotals, LineItem, PricedLineItem};
pub use price::{CurrencyCode, Price};
pub use product::Product;
pub use status::*;
