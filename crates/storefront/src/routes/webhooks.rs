//! Payment webhook handler.
//!
//! Any failure to verify is a 401. Once verified, processor or backend
//! failures are 502 so the processor redelivers; everything else is
//! acknowledged with 200.

use axum::{
    Json,
    extract::{Query, State},
    http::HeaderMap,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::error::{AppError, Result};
use crate::middleware::REQUEST_ID_HEADER;
use crate::services::SyncOutcome;
use crate::state::AppState;
use crate::webhooks::{PaymentNotification, SIGNATURE_HEADER};

/// Query parameters the processor appends to the notification URL.
#[derive(Debug, Default, Deserialize)]
pub struct WebhookQuery {
    #[serde(rename = "data.id")]
    pub data_id: Option<String>,
    #[serde(rename = "type")]
    pub topic: Option<String>,
}

/// Handle a payment notification.
#[instrument(skip(state, query, headers, body), fields(topic = ?query.topic))]
pub async fn payment_notification(
    State(state): State<AppState>,
    Query(query): Query<WebhookQuery>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<Value>> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    let notification: Option<PaymentNotification> = serde_json::from_str(&body).ok();
    let resource_id = notification
        .as_ref()
        .and_then(PaymentNotification::resource_id)
        .or(query.data_id.as_deref());

    if !state.verifier().verify(
        &body,
        header(SIGNATURE_HEADER),
        header(REQUEST_ID_HEADER),
        resource_id,
    ) {
        return Err(AppError::Unauthorized("invalid webhook signature".into()));
    }

    let mut notification = notification
        .ok_or_else(|| AppError::BadRequest("invalid notification body".into()))?;
    if notification.topic.is_none() {
        notification.topic = query.topic.clone();
    }

    let outcome = state
        .payment_sync()
        .handle(&notification, query.data_id.as_deref())
        .await?;
    debug!(?outcome, "Webhook processed");

    let result = match outcome {
        SyncOutcome::Ignored => "ignored",
        SyncOutcome::NoOrderReference { .. } => "no_order_reference",
        SyncOutcome::NoTransition { .. } => "no_transition",
        SyncOutcome::Updated { .. } => "updated",
    };
    Ok(Json(json!({ "received": true, "result": result })))
}
