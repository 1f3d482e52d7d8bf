//! Payment processor REST client.

use std::sync::Arc;
use std::time::Duration;

use bodega_core::PaymentId;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, error, instrument};
use url::Url;

use super::{Payment, PaymentsError};
use crate::config::PaymentsConfig;

/// Client for the payment processor API.
#[derive(Clone)]
pub struct PaymentsClient {
    inner: Arc<PaymentsClientInner>,
}

struct PaymentsClientInner {
    client: reqwest::Client,
    api_url: Url,
    access_token: SecretString,
    timeout: Duration,
}

impl std::fmt::Debug for PaymentsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentsClient")
            .field("api_url", &self.inner.api_url.as_str())
            .field("access_token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl PaymentsClient {
    /// Create a new payments client.
    #[must_use]
    pub fn new(config: &PaymentsConfig) -> Self {
        Self {
            inner: Arc::new(PaymentsClientInner {
                client: reqwest::Client::new(),
                api_url: config.api_url.clone(),
                access_token: config.access_token.clone(),
                timeout: config.timeout,
            }),
        }
    }

    /// Fetch a payment by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, times out, or the response
    /// cannot be parsed.
    #[instrument(skip(self), fields(payment_id = %id))]
    pub async fn get_payment(&self, id: &PaymentId) -> Result<Payment, PaymentsError> {
        let url = self.payment_url(id)?;
        let request = self
            .inner
            .client
            .get(url)
            .bearer_auth(self.inner.access_token.expose_secret());

        let exchange = async {
            let response = request.send().await?;
            let status = response.status();
            let body = response.text().await?;

            if !status.is_success() {
                error!(
                    status = %status,
                    body = %body.chars().take(500).collect::<String>(),
                    "Payment API returned non-success status"
                );
                return Err(PaymentsError::Status {
                    status: status.as_u16(),
                    body: body.chars().take(200).collect(),
                });
            }

            let payment: Payment = serde_json::from_str(&body)?;
            Ok(payment)
        };

        let payment = tokio::time::timeout(self.inner.timeout, exchange)
            .await
            .map_err(|_| PaymentsError::Timeout(self.inner.timeout))??;

        debug!(status = ?payment.status, "Fetched payment");
        Ok(payment)
    }

    fn payment_url(&self, id: &PaymentId) -> Result<Url, PaymentsError> {
        let mut url = self.inner.api_url.clone();
        url.path_segments_mut()
            .map_err(|()| PaymentsError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(["v1", "payments", id.as_str()]);
        Ok(url)
    }
}
