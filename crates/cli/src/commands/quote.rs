//! Price a cart offline from JSON files.
//!
//! `items` is a JSON array of line items
//! (`{"product_id", "unit_price", "quantity", "category"?}`) and `rules` a
//! JSON array of discount rules in the backend's `discounts` row format.

use std::path::Path;

use bodega_core::{
    CartTotals, DiscountRule, LineItem, PricedLineItem, apply_discounts, quote_totals,
};
use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use tracing::info;

use bodega_storefront::config::parse_utc_offset;

/// Inputs to an offline quote.
#[derive(Debug)]
pub struct QuoteArgs<'a> {
    pub items: &'a Path,
    pub rules: &'a Path,
    /// Instant to price at, RFC 3339; defaults to now.
    pub at: Option<&'a str>,
    /// Store UTC offset used for weekday rules.
    pub offset: &'a str,
}

/// A priced cart.
#[derive(Debug, Serialize)]
pub struct OfflineQuote {
    pub priced_at: DateTime<FixedOffset>,
    pub items: Vec<PricedLineItem>,
    #[serde(flatten)]
    pub totals: CartTotals,
}

/// Price the items in `args.items` against the rules in `args.rules`.
///
/// # Errors
///
/// Returns an error if a file cannot be read or parsed, or if `at` or
/// `offset` are malformed.
pub async fn run(args: &QuoteArgs<'_>) -> Result<OfflineQuote, Box<dyn std::error::Error>> {
    let items: Vec<LineItem> = read_json(args.items).await?;
    let rules: Vec<DiscountRule> = read_json(args.rules).await?;

    let offset = parse_utc_offset(args.offset).map_err(|e| format!("--offset: {e}"))?;
    let now = match args.at {
        Some(at) => DateTime::parse_from_rfc3339(at)
            .map_err(|e| format!("--at: {e}"))?
            .with_timezone(&offset),
        None => Utc::now().with_timezone(&offset),
    };

    info!(items = items.len(), rules = rules.len(), at = %now, "Quoting cart");
    Ok(price(&items, &rules, now))
}

fn price(items: &[LineItem], rules: &[DiscountRule], now: DateTime<FixedOffset>) -> OfflineQuote {
    let items = apply_discounts(items, rules, &now);
    let totals = quote_totals(&items);
    OfflineQuote {
        priced_at: now,
        items,
        totals,
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(
    path: &Path,
) -> Result<T, Box<dyn std::error::Error>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| format!("{}: {e}", path.display()))?;
    Ok(serde_json::from_str(&content).map_err(|e| format!("{}: {e}", path.display()))?)
}
