//! Discount rules as stored in the hosted backend.
//!
//! Rules arrive as loosely-typed rows: optional date bounds (timestamps or
//! plain dates), an optional weekday list and a scope that is either a bare
//! product ID or a tagged object. `null` is accepted wherever a field is
//! optional, so a missing value never prevents the rest of the catalog from
//! pricing.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use super::id::{DiscountRuleId, ProductId};

/// A discount rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountRule {
    pub id: DiscountRuleId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_active: bool,
    /// Inclusive lower bound. `None` means no lower bound. A plain date
    /// starts at midnight UTC.
    #[serde(default, deserialize_with = "start_bound")]
    pub start_date: Option<DateTime<Utc>>,
    /// Inclusive upper bound. `None` means no upper bound. A plain date
    /// covers the whole day (UTC).
    #[serde(default, deserialize_with = "end_bound")]
    pub end_date: Option<DateTime<Utc>>,
    /// Weekdays the rule applies on, `0` = Sunday through `6` = Saturday.
    /// Empty means every day.
    #[serde(default, deserialize_with = "null_as_default")]
    pub days_of_week: Vec<u8>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub scope: DiscountScope,
    #[serde(default, deserialize_with = "null_as_default")]
    pub discount_type: DiscountKind,
    pub discount_value: Decimal,
}

impl DiscountRule {
    /// The typed discount this rule grants.
    #[must_use]
    pub const fn value(&self) -> DiscountValue {
        match self.discount_type {
            DiscountKind::Percentage => DiscountValue::Percentage(self.discount_value),
            DiscountKind::Fixed => DiscountValue::Fixed(self.discount_value),
        }
    }
}

/// How a rule's `discount_value` is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    /// Fraction of the running price, `0.2` is 20% off.
    #[default]
    Percentage,
    /// Currency amount off each unit.
    Fixed,
}

/// A discount amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscountValue {
    Percentage(Decimal),
    Fixed(Decimal),
}

/// Which line items a rule affects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case", from = "ScopeRepr")]
pub enum DiscountScope {
    /// Every item.
    #[default]
    All,
    /// Items whose product ID is listed.
    Products { ids: Vec<ProductId> },
    /// Items whose category is listed (case-insensitive).
    Categories { names: Vec<String> },
}

impl DiscountScope {
    /// Whether an item with this product ID and category is in scope.
    #[must_use]
    pub fn matches(&self, product_id: &ProductId, category: Option<&str>) -> bool {
        match self {
            Self::All => true,
            Self::Products { ids } => ids.contains(product_id),
            Self::Categories { names } => category.is_some_and(|category| {
                names
                    .iter()
                    .any(|name| name.trim().eq_ignore_ascii_case(category.trim()))
            }),
        }
    }
}

/// Wire forms accepted for a scope: a bare product ID or the tagged object.
#[derive(Deserialize)]
#[serde(untagged)]
enum ScopeRepr {
    Product(ProductId),
    Tagged(TaggedScope),
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum TaggedScope {
    All,
    Products { ids: Vec<ProductId> },
    Categories { names: Vec<String> },
}

impl From<ScopeRepr> for DiscountScope {
    fn from(repr: ScopeRepr) -> Self {
        match repr {
            ScopeRepr::Product(id) => Self::Products { ids: vec![id] },
            ScopeRepr::Tagged(TaggedScope::All) => Self::All,
            ScopeRepr::Tagged(TaggedScope::Products { ids }) => Self::Products { ids },
            ScopeRepr::Tagged(TaggedScope::Categories { names }) => Self::Categories { names },
        }
    }
}

/// Treat `null` like an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Wire forms accepted for a date bound, most specific first.
#[derive(Deserialize)]
#[serde(untagged)]
enum BoundRepr {
    Instant(DateTime<Utc>),
    Naive(NaiveDateTime),
    Date(NaiveDate),
}

fn start_bound<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<BoundRepr>::deserialize(deserializer)?
        .map(|bound| match bound {
            BoundRepr::Instant(at) => Some(at),
            BoundRepr::Naive(at) => Some(at.and_utc()),
            BoundRepr::Date(day) => day.and_hms_opt(0, 0, 0).map(|at| at.and_utc()),
        })
        .map(|at| at.ok_or_else(|| D::Error::custom("invalid start_date")))
        .transpose()
}

fn end_bound<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<BoundRepr>::deserialize(deserializer)?
        .map(|bound| match bound {
            BoundRepr::Instant(at) => Some(at),
            BoundRepr::Naive(at) => Some(at.and_utc()),
            BoundRepr::Date(day) => day
                .and_hms_nano_opt(23, 59, 59, 999_999_999)
                .map(|at| at.and_utc()),
        })
        .map(|at| at.ok_or_else(|| D::Error::custom("invalid end_date")))
        .transpose()
}
