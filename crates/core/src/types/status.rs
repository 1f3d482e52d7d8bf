//! Status enums for orders and payments.

use serde::{Deserialize, Serialize};

/// Order status as stored in the hosted backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    /// The backend's column value for this status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        }
    }
}

/// Payment status reported by the payment processor.
///
/// Unrecognized values deserialize to [`PaymentStatus::Unknown`] so a new
/// processor status never fails a webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Approved,
    Authorized,
    Pending,
    InProcess,
    InMediation,
    Rejected,
    Cancelled,
    Refunded,
    ChargedBack,
    #[serde(other)]
    Unknown,
}

impl PaymentStatus {
    /// Order status implied by this payment status.
    ///
    /// Returns `None` when the payment status carries no order transition.
    #[must_use]
    pub const fn order_status(&self) -> Option<OrderStatus> {
        match self {
            Self::Approved => Some(OrderStatus::Paid),
            Self::Authorized | Self::Pending | Self::InProcess | Self::InMediation => {
                Some(OrderStatus::Pending)
            }
            Self::Rejected => Some(OrderStatus::Failed),
            Self::Cancelled => Some(OrderStatus::Cancelled),
            Self::Refunded | Self::ChargedBack => Some(OrderStatus::Refunded),
            Self::Unknown => None,
        }
    }
}
