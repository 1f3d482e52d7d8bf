//! Application state shared across handlers.

use std::sync::Arc;

use crate::backend::{BackendClient, BackendError};
use crate::cache::ReadThroughCache;
use crate::config::StorefrontConfig;
use crate::payments::PaymentsClient;
use crate::services::{CatalogService, PaymentSyncService};
use crate::webhooks::SignatureVerifier;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the backend clients, the read-through cache and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    cache: ReadThroughCache,
    catalog: CatalogService,
    payment_sync: PaymentSyncService,
    verifier: SignatureVerifier,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend client cannot be built from the
    /// configured URL.
    pub fn new(config: StorefrontConfig) -> Result<Self, BackendError> {
        let backend = BackendClient::new(&config.backend)?;
        let payments = PaymentsClient::new(&config.payments);
        let cache = ReadThroughCache::from_config(&config.cache);

        let catalog = CatalogService::new(backend.clone(), cache.clone(), config.store_offset);
        let payment_sync = PaymentSyncService::new(backend, payments);
        let verifier = SignatureVerifier::new(config.payments.webhook_secret.clone());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                cache,
                catalog,
                payment_sync,
                verifier,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the shared read-through cache.
    #[must_use]
    pub fn cache(&self) -> &ReadThroughCache {
        &self.inner.cache
    }

    /// Get a reference to the catalog service.
    #[must_use]
    pub fn catalog(&self) -> &CatalogService {
        &self.inner.catalog
    }

    /// Get a reference to the payment sync service.
    #[must_use]
    pub fn payment_sync(&self) -> &PaymentSyncService {
        &self.inner.payment_sync
    }

    /// Get a reference to the webhook signature verifier.
    #[must_use]
    pub fn verifier(&self) -> &SignatureVerifier {
        &self.inner.verifier
    }
}
