//! Settles orders from verified payment notifications.
//!
//! The notification only names a payment. Its status and the order it
//! belongs to (`external_reference`) are read from the processor, never
//! from the webhook body.

use bodega_core::{OrderId, OrderStatus, PaymentId};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::backend::{BackendClient, BackendError};
use crate::error::add_breadcrumb;
use crate::payments::{PaymentsClient, PaymentsError};
use crate::webhooks::PaymentNotification;

/// Errors while settling a payment.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Payments(#[from] PaymentsError),

    #[error("payment notification has no resource id")]
    MissingResourceId,
}

/// What a notification led to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Not a payment notification.
    Ignored,
    /// The payment does not reference an order.
    NoOrderReference { payment_id: PaymentId },
    /// The payment status has no order status counterpart.
    NoTransition { payment_id: PaymentId },
    /// The order was updated.
    Updated {
        order_id: OrderId,
        status: OrderStatus,
    },
}

/// Applies payment notifications to orders.
#[derive(Debug, Clone)]
pub struct PaymentSyncService {
    backend: BackendClient,
    payments: PaymentsClient,
}

impl PaymentSyncService {
    #[must_use]
    pub const fn new(backend: BackendClient, payments: PaymentsClient) -> Self {
        Self { backend, payments }
    }

    /// Handle a verified notification.
    ///
    /// `fallback_id` is used when the body carries no `data.id` (the
    /// processor also sends it as a query parameter).
    ///
    /// # Errors
    ///
    /// Returns an error if a payment notification has no resource ID, or if
    /// the processor or backend call fails.
    #[instrument(skip(self, notification), fields(topic = ?notification.topic))]
    pub async fn handle(
        &self,
        notification: &PaymentNotification,
        fallback_id: Option<&str>,
    ) -> Result<SyncOutcome, SyncError> {
        if !notification.is_payment() {
            return Ok(SyncOutcome::Ignored);
        }

        let payment_id = notification
            .resource_id()
            .or(fallback_id)
            .map(PaymentId::new)
            .ok_or(SyncError::MissingResourceId)?;

        let payment = self.payments.get_payment(&payment_id).await?;
        add_breadcrumb(
            "webhook",
            "Payment fetched",
            Some(&[("payment_id", payment.id.as_str())]),
        );

        let Some(order_id) = payment.external_reference.clone() else {
            warn!(payment_id = %payment.id, "Payment has no order reference");
            return Ok(SyncOutcome::NoOrderReference {
                payment_id: payment.id,
            });
        };

        let Some(status) = payment.status.order_status() else {
            warn!(
                payment_id = %payment.id,
                payment_status = ?payment.status,
                "Payment status does not map to an order status"
            );
            return Ok(SyncOutcome::NoTransition {
                payment_id: payment.id,
            });
        };

        self.backend
            .update_order_payment(&order_id, &payment.id, status, payment.status)
            .await?;

        info!(
            order_id = %order_id,
            payment_id = %payment.id,
            status = status.as_str(),
            "Order payment status updated"
        );
        Ok(SyncOutcome::Updated { order_id, status })
    }
}
