//! Inbound payment webhooks.
//!
//! - [`signature`] - HMAC verification of the `x-signature` header
//! - [`PaymentNotification`] - the notification body

pub mod signature;

pub use signature::{SIGNATURE_HEADER, SignatureError, SignatureHeader, SignatureVerifier};

use serde::{Deserialize, Deserializer, Serialize};

/// Notification topic for payment events.
pub const PAYMENT_TOPIC: &str = "payment";

/// Webhook body sent by the payment processor.
///
/// ```json
/// { "type": "payment", "action": "payment.updated", "data": { "id": "123" } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentNotification {
    #[serde(default, rename = "type", alias = "topic")]
    pub topic: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub live_mode: Option<bool>,
    #[serde(default)]
    pub data: Option<NotificationData>,
}

/// The resource a notification refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationData {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
}

impl PaymentNotification {
    /// The referenced resource ID (`data.id`).
    #[must_use]
    pub fn resource_id(&self) -> Option<&str> {
        self.data.as_ref().map(|data| data.id.as_str())
    }

    /// Whether this notification is about a payment.
    #[must_use]
    pub fn is_payment(&self) -> bool {
        self.topic.as_deref() == Some(PAYMENT_TOPIC)
            || self
                .action
                .as_deref()
                .is_some_and(|action| action.starts_with("payment."))
    }
}

/// Accept IDs sent either as JSON strings or JSON numbers.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(text) => text,
        Id::Number(number) => number.to_string(),
    })
}
