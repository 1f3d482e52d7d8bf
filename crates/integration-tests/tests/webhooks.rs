//! Integration tests for the payment webhook endpoint.
//!
//! Signature checks run before any outbound call, so rejections and
//! non-payment acknowledgements are fully testable offline. Verified payment
//! notifications reach the (unreachable) processor and surface as 502.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use secrecy::SecretString;

use bodega_integration_tests::{TestContext, WEBHOOK_SECRET, json_body};
use bodega_storefront::webhooks::SignatureVerifier;

const PATH: &str = "/api/webhooks/payments";

fn sign(request_id: &str, data_id: Option<&str>) -> String {
    SignatureVerifier::new(Some(SecretString::from(WEBHOOK_SECRET)))
        .sign("1704908010", Some(request_id), data_id)
        .expect("secret configured")
}

fn webhook(uri: &str, body: &str, signature: Option<&str>, request_id: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-request-id", request_id);
    if let Some(signature) = signature {
        builder = builder.header("x-signature", signature);
    }
    builder.body(Body::from(body.to_owned())).expect("valid request")
}

// =============================================================================
// Rejections
// =============================================================================

#[tokio::test]
async fn test_unsigned_webhook_is_unauthorized() {
    let ctx = TestContext::with_secret();
    let body = r#"{"type": "payment", "data": {"id": "123"}}"#;

    let response = ctx.send(webhook(PATH, body, None, "req-1")).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["error"], "Unauthorized");
}

#[tokio::test]
async fn test_wrong_signature_is_unauthorized() {
    let ctx = TestContext::with_secret();
    let body = r#"{"type": "payment", "data": {"id": "123"}}"#;
    // Signed for a different payment
    let signature = sign("req-1", Some("124"));

    let response = ctx.send(webhook(PATH, body, Some(&signature), "req-1")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_signature_bound_to_request_id() {
    let ctx = TestContext::with_secret();
    let body = r#"{"type": "merchant_order", "data": {"id": "123"}}"#;
    let signature = sign("req-1", Some("123"));

    let response = ctx.send(webhook(PATH, body, Some(&signature), "req-2")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_malformed_signature_header_is_unauthorized() {
    let ctx = TestContext::with_secret();
    let body = r#"{"type": "payment", "data": {"id": "123"}}"#;

    let response = ctx.send(webhook(PATH, body, Some("v1=deadbeef"), "req-1")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_no_secret_rejects_everything() {
    let ctx = TestContext::new();
    let body = r#"{"type": "merchant_order", "data": {"id": "123"}}"#;
    let signature = sign("req-1", Some("123"));

    let response = ctx.send(webhook(PATH, body, Some(&signature), "req-1")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Verified notifications
// =============================================================================

#[tokio::test]
async fn test_signed_non_payment_is_acknowledged() {
    let ctx = TestContext::with_secret();
    let body = r#"{"type": "merchant_order", "data": {"id": "123"}}"#;
    let signature = sign("req-1", Some("123"));

    let response = ctx.send(webhook(PATH, body, Some(&signature), "req-1")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["received"], true);
    assert_eq!(json["result"], "ignored");
}

#[tokio::test]
async fn test_data_id_from_query_is_signed() {
    let ctx = TestContext::with_secret();
    let body = r#"{"type": "merchant_order"}"#;
    let signature = sign("req-1", Some("555"));

    let uri = format!("{PATH}?data.id=555&type=merchant_order");
    let response = ctx.send(webhook(&uri, body, Some(&signature), "req-1")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_signed_payment_with_processor_down_is_bad_gateway() {
    let ctx = TestContext::with_secret();
    let body = r#"{"type": "payment", "action": "payment.updated", "data": {"id": 123}}"#;
    let signature = sign("req-1", Some("123"));

    let response = ctx.send(webhook(PATH, body, Some(&signature), "req-1")).await;

    // 502 makes the processor redeliver
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(json_body(response).await["error"], "External service error");
}

#[tokio::test]
async fn test_signed_payment_without_id_is_bad_request() {
    let ctx = TestContext::with_secret();
    let body = r#"{"type": "payment"}"#;
    let signature = sign("req-1", None);

    let response = ctx.send(webhook(PATH, body, Some(&signature), "req-1")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let ctx = TestContext::with_secret();
    let body = r#"{"type": "merchant_order", "data": {"id": "1"}}"#;
    let signature = sign("mp-req-9", Some("1"));

    let response = ctx
        .send(webhook(PATH, body, Some(&signature), "mp-req-9"))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-request-id"], "mp-req-9");
}
