//! Integration tests against a stubbed backend and payment processor.
//!
//! These cover the paths that need upstream calls to succeed: cached catalog
//! reads with discounts applied, and payment notifications settling orders.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::{Value, json};

use bodega_core::{OrderId, OrderStatus, PaymentId};
use bodega_integration_tests::{StubServer, TestContext, WEBHOOK_SECRET, json_body};
use bodega_storefront::services::SyncOutcome;
use bodega_storefront::webhooks::{PaymentNotification, SignatureVerifier};

const WEBHOOK_PATH: &str = "/api/webhooks/payments";

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("valid request")
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("valid request")
}

fn signed_webhook(uri: &str, body: &Value, data_id: &str) -> Request<Body> {
    let signature = SignatureVerifier::new(Some(SecretString::from(WEBHOOK_SECRET)))
        .sign("1704908010", Some("req-1"), Some(data_id))
        .expect("secret configured");

    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-request-id", "req-1")
        .header("x-signature", signature)
        .body(Body::from(body.to_string()))
        .expect("valid request")
}

/// Decimal fields are serialized as strings.
fn decimal(value: &Value) -> Decimal {
    value
        .as_str()
        .expect("decimal string")
        .parse()
        .expect("valid decimal")
}

fn listing<'a>(listings: &'a Value, id: &str) -> &'a Value {
    listings
        .as_array()
        .expect("listing array")
        .iter()
        .find(|listing| listing["id"] == id)
        .expect("listed product")
}

fn notification(json: &Value) -> PaymentNotification {
    serde_json::from_value(json.clone()).expect("valid notification")
}

// =============================================================================
// Catalog
// =============================================================================

#[tokio::test]
async fn test_products_are_listed_with_discounts() {
    let stub = StubServer::start().await;
    let ctx = TestContext::with_stub(&stub);

    let response = ctx.send(get("/api/products")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let listings = json_body(response).await;
    assert_eq!(listings.as_array().map(Vec::len), Some(2));

    let malbec = listing(&listings, "malbec-2019");
    assert_eq!(decimal(&malbec["price"]), Decimal::new(100, 0));
    assert_eq!(decimal(&malbec["effective_price"]), Decimal::new(80, 0));
    assert_eq!(malbec["applied_rules"], json!([1]));

    // Rule 2 has an unreadable date and is skipped; rule 3 still applies
    let torrontes = listing(&listings, "torrontes-2022");
    assert_eq!(decimal(&torrontes["effective_price"]), Decimal::new(45, 0));
    assert_eq!(torrontes["applied_rules"], json!([3]));
}

#[tokio::test]
async fn test_catalog_reads_are_cached() {
    let stub = StubServer::start().await;
    let ctx = TestContext::with_stub(&stub);

    for _ in 0..3 {
        let response = ctx.send(get("/api/products")).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(stub.product_list_fetches(), 1);
    assert_eq!(stub.discount_fetches(), 1);
}

#[tokio::test]
async fn test_single_product_with_discount() {
    let stub = StubServer::start().await;
    let ctx = TestContext::with_stub(&stub);

    let response = ctx.send(get("/api/products/malbec-2019")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["name"], "Malbec Reserva");
    assert_eq!(decimal(&json["effective_price"]), Decimal::new(80, 0));

    let response = ctx.send(get("/api/products/cabernet-2015")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_quote_uses_catalog_prices_and_discounts() {
    let stub = StubServer::start().await;
    let ctx = TestContext::with_stub(&stub);

    // Client-sent prices are not part of the request and would be ignored
    let body = json!({ "items": [
        { "product_id": "malbec-2019", "quantity": 2 },
        { "product_id": "torrontes-2022", "quantity": 1 },
    ]});
    let response = ctx.send(post_json("/api/cart/quote", &body)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let quote = json_body(response).await;
    assert_eq!(decimal(&quote["subtotal"]), Decimal::new(250, 0));
    assert_eq!(decimal(&quote["discount"]), Decimal::new(45, 0));
    assert_eq!(decimal(&quote["total"]), Decimal::new(205, 0));

    let items = quote["items"].as_array().expect("priced items");
    assert_eq!(items.len(), 2);
    let first = items.first().expect("first item");
    assert_eq!(first["product_id"], "malbec-2019");
    assert_eq!(decimal(&first["effective_price"]), Decimal::new(80, 0));
    assert_eq!(first["quantity"], 2);
}

#[tokio::test]
async fn test_quote_unknown_product_is_bad_request() {
    let stub = StubServer::start().await;
    let ctx = TestContext::with_stub(&stub);

    let body = json!({ "items": [{ "product_id": "cabernet-2015", "quantity": 1 }] });
    let response = ctx.send(post_json("/api/cart/quote", &body)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Payment sync
// =============================================================================

#[tokio::test]
async fn test_approved_payment_marks_order_paid() {
    let stub = StubServer::start().await;
    let ctx = TestContext::with_stub(&stub);

    let outcome = ctx
        .state
        .payment_sync()
        .handle(
            &notification(&json!({"type": "payment", "data": {"id": "1001"}})),
            None,
        )
        .await
        .expect("payment settled");

    assert_eq!(
        outcome,
        SyncOutcome::Updated {
            order_id: OrderId::new("order-42"),
            status: OrderStatus::Paid,
        }
    );

    let updates = stub.order_updates();
    assert_eq!(updates.len(), 1);
    let update = updates.first().expect("order update");
    assert_eq!(update.filter.as_deref(), Some("eq.order-42"));
    assert_eq!(update.body["status"], "paid");
    assert_eq!(update.body["payment_id"], "1001");
    assert_eq!(update.body["payment_status"], "approved");
    assert!(update.body["updated_at"].is_string());
}

#[tokio::test]
async fn test_payment_without_order_reference_changes_nothing() {
    let stub = StubServer::start().await;
    let ctx = TestContext::with_stub(&stub);

    let outcome = ctx
        .state
        .payment_sync()
        .handle(&notification(&json!({"type": "payment"})), Some("1002"))
        .await
        .expect("payment read");

    assert_eq!(
        outcome,
        SyncOutcome::NoOrderReference {
            payment_id: PaymentId::new("1002")
        }
    );
    assert!(stub.order_updates().is_empty());
}

#[tokio::test]
async fn test_unmapped_payment_status_changes_nothing() {
    let stub = StubServer::start().await;
    let ctx = TestContext::with_stub(&stub);

    let outcome = ctx
        .state
        .payment_sync()
        .handle(
            &notification(&json!({"action": "payment.updated", "data": {"id": 1003}})),
            None,
        )
        .await
        .expect("payment read");

    assert_eq!(
        outcome,
        SyncOutcome::NoTransition {
            payment_id: PaymentId::new("1003")
        }
    );
    assert!(stub.order_updates().is_empty());
}

// =============================================================================
// Webhook endpoint
// =============================================================================

#[tokio::test]
async fn test_signed_payment_webhook_updates_order() {
    let stub = StubServer::start().await;
    let ctx = TestContext::with_stub(&stub);

    let body = json!({"type": "payment", "action": "payment.updated", "data": {"id": 1001}});
    let response = ctx.send(signed_webhook(WEBHOOK_PATH, &body, "1001")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["received"], true);
    assert_eq!(json["result"], "updated");
    assert_eq!(stub.order_updates().len(), 1);
}

#[tokio::test]
async fn test_webhook_payment_id_from_query() {
    let stub = StubServer::start().await;
    let ctx = TestContext::with_stub(&stub);

    let uri = format!("{WEBHOOK_PATH}?data.id=1001&type=payment");
    let response = ctx.send(signed_webhook(&uri, &json!({}), "1001")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["result"], "updated");
    let updates = stub.order_updates();
    assert_eq!(
        updates.first().and_then(|update| update.filter.as_deref()),
        Some("eq.order-42")
    );
}

#[tokio::test]
async fn test_webhook_results_without_update() {
    let stub = StubServer::start().await;
    let ctx = TestContext::with_stub(&stub);

    for (id, result) in [("1002", "no_order_reference"), ("1003", "no_transition")] {
        let body = json!({"type": "payment", "data": {"id": id}});
        let response = ctx.send(signed_webhook(WEBHOOK_PATH, &body, id)).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["result"], result);
    }
    assert!(stub.order_updates().is_empty());
}

#[tokio::test]
async fn test_webhook_for_unknown_payment_is_bad_gateway() {
    let stub = StubServer::start().await;
    let ctx = TestContext::with_stub(&stub);

    let body = json!({"type": "payment", "data": {"id": "9999"}});
    let response = ctx.send(signed_webhook(WEBHOOK_PATH, &body, "9999")).await;

    // The processor answers 404; redelivery is requested with a 502
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(stub.order_updates().is_empty());
}
