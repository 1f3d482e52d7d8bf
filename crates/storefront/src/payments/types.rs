//! Payment processor API types.

use bodega_core::{OrderId, PaymentId, PaymentStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

/// A payment as returned by `GET /v1/payments/{id}`.
///
/// Only the fields the storefront acts on are modelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    #[serde(deserialize_with = "payment_id")]
    pub id: PaymentId,
    pub status: PaymentStatus,
    #[serde(default)]
    pub status_detail: Option<String>,
    /// The order ID the checkout was created with.
    #[serde(default, deserialize_with = "blank_as_none")]
    pub external_reference: Option<OrderId>,
    #[serde(default)]
    pub transaction_amount: Option<Decimal>,
    #[serde(default)]
    pub currency_id: Option<String>,
}

fn payment_id<'de, D>(deserializer: D) -> Result<PaymentId, D::Error>
where
    D: Deserializer<'de>,
{
    crate::webhooks::string_or_number(deserializer).map(PaymentId::from)
}

/// The processor sends `""` or `null` when no reference was set.
fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<OrderId>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value
        .map(|reference| reference.trim().to_owned())
        .filter(|reference| !reference.is_empty())
        .map(OrderId::from))
}
