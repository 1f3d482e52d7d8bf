//! Cart route handlers.
//!
//! The storefront keeps no cart state; clients send their lines and get
//! back catalog prices with discounts applied.

use axum::{Json, extract::State};
use serde::Deserialize;
use tracing::instrument;

use crate::error::Result;
use crate::services::{Quote, QuoteLine};
use crate::state::AppState;

/// Quote request body.
#[derive(Debug, Deserialize)]
pub struct QuoteRequest {
    #[serde(default)]
    pub items: Vec<QuoteLine>,
}

/// Price a cart.
#[instrument(skip(state, request), fields(lines = request.items.len()))]
pub async fn quote(
    State(state): State<AppState>,
    Json(request): Json<QuoteRequest>,
) -> Result<Json<Quote>> {
    Ok(Json(state.catalog().quote(&request.items).await?))
}
