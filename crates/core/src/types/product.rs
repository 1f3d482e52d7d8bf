//! Catalog products.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::line_item::LineItem;
use super::price::{CurrencyCode, Price};

/// A product row from the hosted backend's `products` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub varietal: Option<String>,
    #[serde(default)]
    pub vintage: Option<i32>,
    pub price: Decimal,
    #[serde(default)]
    pub currency: CurrencyCode,
    #[serde(default)]
    pub stock: i32,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl Product {
    /// List price with currency.
    #[must_use]
    pub const fn list_price(&self) -> Price {
        Price::new(self.price, self.currency)
    }

    /// Whether at least one unit is available.
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock > 0
    }

    /// A line item for `quantity` units at the list price.
    #[must_use]
    pub fn line_item(&self, quantity: u32) -> LineItem {
        LineItem {
            product_id: self.id.clone(),
            category: self.category.clone(),
            unit_price: self.price,
            quantity,
        }
    }
}
