//! Catalog reads and pricing.
//!
//! Every backend read goes through the shared [`ReadThroughCache`]:
//!
//! | Key                | Value                    |
//! |--------------------|--------------------------|
//! | `products:all`     | active products          |
//! | `product:{id}`     | a single product         |
//! | `discounts:active` | rules active at fetch    |
//!
//! Cached rules are re-validated at pricing time, so a rule whose window
//! closes while cached stops applying immediately.

use std::sync::Arc;

use bodega_core::{
    CartTotals, DiscountRule, DiscountRuleId, PricedLineItem, Product, ProductId, apply_discounts,
    quote_totals,
};
use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::backend::{BackendClient, BackendError};
use crate::cache::ReadThroughCache;

const PRODUCTS_KEY: &str = "products:all";
const DISCOUNTS_KEY: &str = "discounts:active";

fn product_key(id: &ProductId) -> String {
    format!("product:{id}")
}

/// Reasons a cart cannot be quoted.
#[derive(Debug, Error)]
pub enum QuoteError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("cart is empty")]
    EmptyCart,

    #[error("unknown product: {0}")]
    UnknownProduct(ProductId),

    #[error("quantity must be at least 1 for product {0}")]
    InvalidQuantity(ProductId),
}

/// A product with its price after discounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductListing {
    #[serde(flatten)]
    pub product: Product,
    pub effective_price: Decimal,
    pub applied_rules: Vec<DiscountRuleId>,
}

impl ProductListing {
    /// Whether any discount lowered the price.
    #[must_use]
    pub fn on_sale(&self) -> bool {
        self.effective_price < self.product.price
    }
}

/// One requested cart line. Prices are never taken from the client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QuoteLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// A priced cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quote {
    pub items: Vec<PricedLineItem>,
    #[serde(flatten)]
    pub totals: CartTotals,
    pub priced_at: DateTime<FixedOffset>,
}

/// Cached catalog access plus discount pricing.
#[derive(Debug, Clone)]
pub struct CatalogService {
    backend: BackendClient,
    cache: ReadThroughCache,
    store_offset: FixedOffset,
}

impl CatalogService {
    #[must_use]
    pub const fn new(
        backend: BackendClient,
        cache: ReadThroughCache,
        store_offset: FixedOffset,
    ) -> Self {
        Self {
            backend,
            cache,
            store_offset,
        }
    }

    /// Current time in the store's timezone.
    #[must_use]
    pub fn store_now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.store_offset)
    }

    /// Active products.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend read fails.
    pub async fn products(&self) -> Result<Arc<Vec<Product>>, BackendError> {
        let backend = self.backend.clone();
        let products = self
            .cache
            .get(
                PRODUCTS_KEY,
                || async move { backend.list_products().await.map(|p| Some(Arc::new(p))) },
                None,
            )
            .await?;
        Ok(products.unwrap_or_default())
    }

    /// A single product, `None` if the backend has no such row.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend read fails.
    pub async fn product(&self, id: &ProductId) -> Result<Option<Product>, BackendError> {
        let backend = self.backend.clone();
        let lookup = id.clone();
        self.cache
            .get(
                &product_key(id),
                || async move { backend.get_product(&lookup).await },
                None,
            )
            .await
    }

    /// Discount rules the backend reports as active.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend read fails.
    pub async fn active_rules(&self) -> Result<Arc<Vec<DiscountRule>>, BackendError> {
        let backend = self.backend.clone();
        let rules = self
            .cache
            .get(
                DISCOUNTS_KEY,
                || async move {
                    backend
                        .active_discount_rules(Utc::now())
                        .await
                        .map(|r| Some(Arc::new(r)))
                },
                None,
            )
            .await?;
        Ok(rules.unwrap_or_default())
    }

    /// Active products with discounted prices.
    ///
    /// # Errors
    ///
    /// Returns an error if a backend read fails.
    #[instrument(skip(self))]
    pub async fn priced_products(&self) -> Result<Vec<ProductListing>, BackendError> {
        let products = self.products().await?;
        let rules = self.active_rules().await?;
        Ok(price_listings(&products, &rules, &self.store_now()))
    }

    /// One product with its discounted price.
    ///
    /// # Errors
    ///
    /// Returns an error if a backend read fails.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn priced_product(
        &self,
        id: &ProductId,
    ) -> Result<Option<ProductListing>, BackendError> {
        let Some(product) = self.product(id).await? else {
            return Ok(None);
        };
        let rules = self.active_rules().await?;
        Ok(price_listings(std::slice::from_ref(&product), &rules, &self.store_now()).pop())
    }

    /// Price a cart from catalog prices and active discounts.
    ///
    /// # Errors
    ///
    /// Returns [`QuoteError`] for an empty cart, a zero quantity, a product
    /// that is not in the active catalog, or a failed backend read.
    #[instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn quote(&self, lines: &[QuoteLine]) -> Result<Quote, QuoteError> {
        validate_lines(lines)?;

        let products = self.products().await?;
        let rules = self.active_rules().await?;

        let items = lines
            .iter()
            .map(|line| {
                products
                    .iter()
                    .find(|product| product.id == line.product_id)
                    .map(|product| product.line_item(line.quantity))
                    .ok_or_else(|| QuoteError::UnknownProduct(line.product_id.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let now = self.store_now();
        let items = apply_discounts(&items, &rules, &now);
        let totals = quote_totals(&items);
        debug!(total = %totals.total, discount = %totals.discount, "Cart quoted");

        Ok(Quote {
            items,
            totals,
            priced_at: now,
        })
    }
}

fn validate_lines(lines: &[QuoteLine]) -> Result<(), QuoteError> {
    if lines.is_empty() {
        return Err(QuoteError::EmptyCart);
    }
    if let Some(line) = lines.iter().find(|line| line.quantity == 0) {
        return Err(QuoteError::InvalidQuantity(line.product_id.clone()));
    }
    Ok(())
}

/// Price one unit of each product.
fn price_listings(
    products: &[Product],
    rules: &[DiscountRule],
    now: &DateTime<FixedOffset>,
) -> Vec<ProductListing> {
    let items: Vec<_> = products.iter().map(|product| product.line_item(1)).collect();

    products
        .iter()
        .zip(apply_discounts(&items, rules, now))
        .map(|(product, priced)| ProductListing {
            product: product.clone(),
            effective_price: priced.effective_price,
            applied_rules: priced.applied_rules,
        })
        .collect()
}
