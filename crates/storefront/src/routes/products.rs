//! Product route handlers.

use axum::{
    Json,
    extract::{Path, State},
};
use bodega_core::ProductId;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::services::ProductListing;
use crate::state::AppState;

/// List active products with discounted prices.
#[instrument(skip(state))]
pub async fn index(State(state): State<AppState>) -> Result<Json<Vec<ProductListing>>> {
    Ok(Json(state.catalog().priced_products().await?))
}

/// Show one product with its discounted price.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ProductListing>> {
    let id = ProductId::new(id);
    state
        .catalog()
        .priced_product(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))
}
