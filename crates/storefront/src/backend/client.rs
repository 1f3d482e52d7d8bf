//! REST client for the hosted backend.

use std::sync::Arc;
use std::time::Duration;

use bodega_core::{
    DiscountRule, OrderId, OrderStatus, PaymentId, PaymentStatus, Product, ProductId,
};
use chrono::{DateTime, SecondsFormat, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, instrument, warn};
use url::Url;

use super::BackendError;
use crate::config::BackendConfig;

/// Path of the REST API below the backend base URL.
const REST_PATH: &str = "rest/v1/";

/// Client for the hosted backend's REST API.
///
/// Cheap to clone; clones share the HTTP connection pool.
#[derive(Clone)]
pub struct BackendClient {
    inner: Arc<BackendClientInner>,
}

struct BackendClientInner {
    client: reqwest::Client,
    rest_url: Url,
    service_key: SecretString,
    timeout: Duration,
}

impl std::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendClient")
            .field("rest_url", &self.inner.rest_url.as_str())
            .field("service_key", &"[REDACTED]")
            .field("timeout", &self.inner.timeout)
            .finish()
    }
}

/// Columns written when a payment webhook settles an order.
#[derive(Debug, Serialize)]
struct OrderPaymentUpdate<'a> {
    status: OrderStatus,
    payment_id: &'a PaymentId,
    payment_status: PaymentStatus,
    updated_at: DateTime<Utc>,
}

impl BackendClient {
    /// Create a new backend client.
    ///
    /// # Errors
    ///
    /// Returns an error if the REST URL cannot be derived from the base URL.
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let mut base = config.url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let rest_url = base.join(REST_PATH)?;

        Ok(Self {
            inner: Arc::new(BackendClientInner {
                client: reqwest::Client::new(),
                rest_url,
                service_key: config.service_key.clone(),
                timeout: config.timeout,
            }),
        })
    }

    /// List active products, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, times out, or the response
    /// cannot be parsed.
    #[instrument(skip(self))]
    pub async fn list_products(&self) -> Result<Vec<Product>, BackendError> {
        let products: Vec<Product> = self.get_json(self.products_url()?).await?;
        debug!(count = products.len(), "Fetched products");
        Ok(products)
    }

    /// Get a single product by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, times out, or the response
    /// cannot be parsed.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn get_product(&self, id: &ProductId) -> Result<Option<Product>, BackendError> {
        let rows: Vec<Product> = self.get_json(self.product_url(id)?).await?;
        Ok(rows.into_iter().next())
    }

    /// Discount rules the backend considers active at `now`.
    ///
    /// The backend filters on the active flag and date window; weekday
    /// restrictions are left to the pricing step. Rows that do not parse as
    /// a rule are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, times out, or the response is
    /// not a JSON array.
    #[instrument(skip(self))]
    pub async fn active_discount_rules(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<DiscountRule>, BackendError> {
        let rows: Vec<Value> = self.get_json(self.discounts_url(now)?).await?;
        let rules = parse_rules(rows);
        debug!(count = rules.len(), "Fetched discount rules");
        Ok(rules)
    }

    /// Record a payment outcome on an order.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or times out.
    #[instrument(skip(self), fields(order_id = %order_id, payment_id = %payment_id))]
    pub async fn update_order_payment(
        &self,
        order_id: &OrderId,
        payment_id: &PaymentId,
        status: OrderStatus,
        payment_status: PaymentStatus,
    ) -> Result<(), BackendError> {
        let update = OrderPaymentUpdate {
            status,
            payment_id,
            payment_status,
            updated_at: Utc::now(),
        };

        let request = self
            .inner
            .client
            .patch(self.order_url(order_id)?)
            .header("Prefer", "return=minimal")
            .json(&update);
        self.send(request).await?;

        debug!(status = status.as_str(), "Order payment recorded");
        Ok(())
    }

    // =========================================================================
    // URLs
    // =========================================================================

    fn table_url(&self, table: &str) -> Result<Url, BackendError> {
        Ok(self.inner.rest_url.join(table)?)
    }

    fn products_url(&self) -> Result<Url, BackendError> {
        let mut url = self.table_url("products")?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("is_active", "eq.true")
            .append_pair("order", "name.asc");
        Ok(url)
    }

    fn product_url(&self, id: &ProductId) -> Result<Url, BackendError> {
        let mut url = self.table_url("products")?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("id", &format!("eq.{id}"))
            .append_pair("limit", "1");
        Ok(url)
    }

    fn discounts_url(&self, now: DateTime<Utc>) -> Result<Url, BackendError> {
        let ts = now.to_rfc3339_opts(SecondsFormat::Secs, true);
        let window = format!(
            "(or(start_date.is.null,start_date.lte.{ts}),or(end_date.is.null,end_date.gte.{ts}))"
        );

        let mut url = self.table_url("discounts")?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("is_active", "eq.true")
            .append_pair("and", &window)
            .append_pair("order", "id.asc");
        Ok(url)
    }

    fn order_url(&self, id: &OrderId) -> Result<Url, BackendError> {
        let mut url = self.table_url("orders")?;
        url.query_pairs_mut().append_pair("id", &format!("eq.{id}"));
        Ok(url)
    }

    // =========================================================================
    // Transport
    // =========================================================================

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, BackendError> {
        let body = self.send(self.inner.client.get(url)).await?;

        serde_json::from_str(&body).map_err(|e| {
            error!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to parse backend response"
            );
            BackendError::Parse(e)
        })
    }

    /// Authenticate, send, and return the body of a successful response.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<String, BackendError> {
        let key = self.inner.service_key.expose_secret();
        let request = request.header("apikey", key).bearer_auth(key);

        let exchange = async {
            let response = request.send().await?;
            let status = response.status();
            let body = response.text().await?;

            if !status.is_success() {
                error!(
                    status = %status,
                    body = %body.chars().take(500).collect::<String>(),
                    "Backend returned non-success status"
                );
                return Err(BackendError::Status {
                    status: status.as_u16(),
                    body: body.chars().take(200).collect(),
                });
            }

            Ok(body)
        };

        tokio::time::timeout(self.inner.timeout, exchange)
            .await
            .map_err(|_| BackendError::Timeout(self.inner.timeout))?
    }
}

/// Parse discount rows one at a time so a bad row only loses itself.
fn parse_rules(rows: Vec<Value>) -> Vec<DiscountRule> {
    rows.into_iter()
        .filter_map(|row| {
            let id = row.get("id").cloned();
            serde_json::from_value::<DiscountRule>(row)
                .map_err(|e| warn!(error = %e, rule_id = ?id, "Skipping unreadable discount rule"))
                .ok()
        })
        .collect()
}
