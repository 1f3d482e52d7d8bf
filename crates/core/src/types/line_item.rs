//! Cart and catalog line items.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{DiscountRuleId, ProductId};

/// An item to be priced: a product at its list price and a quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ProductId,
    #[serde(default)]
    pub category: Option<String>,
    pub unit_price: Decimal,
    pub quantity: u32,
}

impl LineItem {
    /// Create a line item with no category.
    #[must_use]
    pub fn new(product_id: impl Into<ProductId>, unit_price: Decimal, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            category: None,
            unit_price,
            quantity,
        }
    }

    /// Set the item's category.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// A line item after discounts. The list price is kept alongside the
/// effective price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedLineItem {
    pub product_id: ProductId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub unit_price: Decimal,
    pub effective_price: Decimal,
    pub quantity: u32,
    /// Rules that were applied, in application order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub applied_rules: Vec<DiscountRuleId>,
}

impl PricedLineItem {
    /// Effective price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.effective_price * Decimal::from(self.quantity)
    }

    /// List price times quantity.
    #[must_use]
    pub fn list_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }

    /// Amount saved on this line.
    #[must_use]
    pub fn savings(&self) -> Decimal {
        self.list_total() - self.line_total()
    }

    /// Whether any discount changed the price.
    #[must_use]
    pub fn is_discounted(&self) -> bool {
        self.effective_price < self.unit_price
    }
}

/// Totals for a priced cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CartTotals {
    /// Sum of list prices.
    pub subtotal: Decimal,
    /// Sum of savings.
    pub discount: Decimal,
    /// Amount due.
    pub total: Decimal,
}
