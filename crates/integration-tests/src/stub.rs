//! In-process stand-ins for the hosted backend and the payment processor.
//!
//! [`StubServer`] serves canned rows on an ephemeral local port and records
//! the writes it receives, so tests can drive successful backend reads and
//! order updates without network access.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use url::Url;

/// Service key the stub backend expects in `apikey`.
pub const STUB_SERVICE_KEY: &str = "test-service-key";

/// Access token the stub processor expects as a bearer token.
pub const STUB_ACCESS_TOKEN: &str = "test-access-token";

/// Rows served by a [`StubServer`].
#[derive(Debug, Clone)]
pub struct StubData {
    pub products: Vec<Value>,
    pub discounts: Vec<Value>,
    /// Payments by ID.
    pub payments: HashMap<String, Value>,
}

impl Default for StubData {
    /// A small wine catalog with two working rules and one unreadable row.
    ///
    /// | Product          | List  | Rule                           | Effective |
    /// |------------------|-------|--------------------------------|-----------|
    /// | `malbec-2019`    | 100   | 1: 20% off this product        | 80        |
    /// | `torrontes-2022` | 50    | 3: 5 off category `Blancos`    | 45        |
    ///
    /// Payments: `1001` approved for `order-42`, `1002` approved with no
    /// order reference, `1003` in a status with no order counterpart.
    fn default() -> Self {
        let products = vec![
            json!({
                "id": "malbec-2019", "name": "Malbec Reserva", "category": "Tintos",
                "price": "100.00", "currency": "ARS", "stock": 12, "is_active": true
            }),
            json!({
                "id": "torrontes-2022", "name": "Torrontés", "category": "Blancos",
                "price": "50", "currency": "ARS", "stock": 3, "is_active": true
            }),
        ];

        let discounts = vec![
            json!({
                "id": 1, "name": "Malbec week", "is_active": true,
                "start_date": "2020-01-01", "end_date": null, "days_of_week": [],
                "scope": {"type": "products", "ids": ["malbec-2019"]},
                "discount_type": "percentage", "discount_value": "0.2"
            }),
            json!({
                "id": 2, "is_active": true, "start_date": "some day soon",
                "discount_value": 0.5
            }),
            json!({
                "id": 3, "is_active": true, "end_date": "2999-12-31", "days_of_week": null,
                "scope": {"type": "categories", "names": ["blancos"]},
                "discount_type": "fixed", "discount_value": "5"
            }),
        ];

        let payments = HashMap::from([
            (
                "1001".to_owned(),
                json!({"id": 1001, "status": "approved", "external_reference": "order-42",
                       "transaction_amount": 205, "currency_id": "ARS"}),
            ),
            (
                "1002".to_owned(),
                json!({"id": 1002, "status": "approved", "external_reference": ""}),
            ),
            (
                "1003".to_owned(),
                json!({"id": 1003, "status": "awaiting_review", "external_reference": "order-43"}),
            ),
        ]);

        Self {
            products,
            discounts,
            payments,
        }
    }
}

/// A `PATCH /rest/v1/orders` the stub received.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderUpdate {
    /// The `id` query filter, e.g. `eq.order-42`.
    pub filter: Option<String>,
    pub body: Value,
}

#[derive(Debug, Default)]
struct Recorded {
    order_updates: Vec<OrderUpdate>,
    product_list_fetches: usize,
    discount_fetches: usize,
}

#[derive(Clone)]
struct StubState {
    data: Arc<StubData>,
    recorded: Arc<Mutex<Recorded>>,
}

impl StubState {
    fn record<R>(&self, f: impl FnOnce(&mut Recorded) -> R) -> R {
        let mut recorded = self
            .recorded
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut recorded)
    }
}

/// Backend and processor stub listening on `127.0.0.1`.
///
/// The server task is aborted on drop.
pub struct StubServer {
    url: Url,
    state: StubState,
    task: JoinHandle<()>,
}

impl StubServer {
    /// Serve [`StubData::default`].
    ///
    /// # Panics
    ///
    /// Panics if no local port can be bound.
    pub async fn start() -> Self {
        Self::with_data(StubData::default()).await
    }

    /// Serve the given rows.
    ///
    /// # Panics
    ///
    /// Panics if no local port can be bound.
    pub async fn with_data(data: StubData) -> Self {
        let state = StubState {
            data: Arc::new(data),
            recorded: Arc::default(),
        };

        let router = Router::new()
            .route("/rest/v1/products", get(products))
            .route("/rest/v1/discounts", get(discounts))
            .route("/rest/v1/orders", axum::routing::patch(update_order))
            .route("/v1/payments/{id}", get(payment))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stub server");
        let addr = listener.local_addr().expect("stub server address");
        let task = tokio::spawn(async move {
            axum::serve(listener, router).await.ok();
        });

        Self {
            url: Url::parse(&format!("http://{addr}")).expect("valid stub URL"),
            state,
            task,
        }
    }

    /// Base URL for both the backend and the processor.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Order updates received so far, oldest first.
    #[must_use]
    pub fn order_updates(&self) -> Vec<OrderUpdate> {
        self.state.record(|r| r.order_updates.clone())
    }

    /// How many times the full product list was requested.
    #[must_use]
    pub fn product_list_fetches(&self) -> usize {
        self.state.record(|r| r.product_list_fetches)
    }

    /// How many times the discount rules were requested.
    #[must_use]
    pub fn discount_fetches(&self) -> usize {
        self.state.record(|r| r.discount_fetches)
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// =============================================================================
// Handlers
// =============================================================================

fn backend_authorized(headers: &HeaderMap) -> bool {
    headers
        .get("apikey")
        .is_some_and(|key| key == STUB_SERVICE_KEY)
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"message": "invalid credentials"})),
    )
        .into_response()
}

async fn products(
    State(state): State<StubState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if !backend_authorized(&headers) {
        return unauthorized();
    }

    let rows: Vec<Value> = match query.get("id").and_then(|f| f.strip_prefix("eq.")) {
        Some(id) => state
            .data
            .products
            .iter()
            .filter(|row| row["id"] == id)
            .cloned()
            .collect(),
        None => {
            state.record(|r| r.product_list_fetches += 1);
            state.data.products.clone()
        }
    };
    Json(rows).into_response()
}

async fn discounts(State(state): State<StubState>, headers: HeaderMap) -> Response {
    if !backend_authorized(&headers) {
        return unauthorized();
    }

    state.record(|r| r.discount_fetches += 1);
    Json(state.data.discounts.clone()).into_response()
}

async fn update_order(
    State(state): State<StubState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !backend_authorized(&headers) {
        return unauthorized();
    }

    state.record(|r| {
        r.order_updates.push(OrderUpdate {
            filter: query.get("id").cloned(),
            body,
        });
    });
    StatusCode::NO_CONTENT.into_response()
}

async fn payment(
    State(state): State<StubState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let expected = format!("Bearer {STUB_ACCESS_TOKEN}");
    if headers
        .get("authorization")
        .is_none_or(|value| value != expected.as_str())
    {
        return unauthorized();
    }

    match state.data.payments.get(&id) {
        Some(payment) => Json(payment.clone()).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"message": "Payment not found", "status": 404})),
        )
            .into_response(),
    }
}
