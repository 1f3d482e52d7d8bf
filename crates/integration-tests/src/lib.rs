//! Integration tests for Bodega.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p bodega-integration-tests
//! ```
//!
//! Tests drive the full storefront router in-process with
//! `tower::ServiceExt::oneshot`. By default the backend and payment
//! processor point at a closed local port, so anything that reaches them
//! fails fast with a 502. [`TestContext::with_stub`] points both at a
//! [`StubServer`] instead, for tests that need successful reads and writes.

pub mod stub;

use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response};
use chrono::FixedOffset;
use secrecy::SecretString;
use tower::ServiceExt;
use url::Url;

use bodega_storefront::config::{
    BackendConfig, CacheConfig, LogFormat, PaymentsConfig, StorefrontConfig,
};
use bodega_storefront::state::AppState;

pub use stub::{OrderUpdate, StubData, StubServer};

/// Webhook secret used by [`TestContext::with_secret`].
pub const WEBHOOK_SECRET: &str = "c2e8a1f94b7d30e65fa9d1c84b2e7f03";

/// Address nothing listens on.
const UNREACHABLE: &str = "http://127.0.0.1:9";

/// A storefront router with offline dependencies.
pub struct TestContext {
    pub state: AppState,
}

impl TestContext {
    /// Storefront with no webhook secret configured.
    ///
    /// # Panics
    ///
    /// Panics if the test configuration is invalid.
    #[must_use]
    pub fn new() -> Self {
        Self::build(None, &unreachable())
    }

    /// Storefront with [`WEBHOOK_SECRET`] configured.
    ///
    /// # Panics
    ///
    /// Panics if the test configuration is invalid.
    #[must_use]
    pub fn with_secret() -> Self {
        Self::build(Some(SecretString::from(WEBHOOK_SECRET)), &unreachable())
    }

    /// Storefront with [`WEBHOOK_SECRET`] configured, talking to `stub` for
    /// both the backend and the payment processor.
    ///
    /// # Panics
    ///
    /// Panics if the test configuration is invalid.
    #[must_use]
    pub fn with_stub(stub: &StubServer) -> Self {
        Self::build(Some(SecretString::from(WEBHOOK_SECRET)), stub.url())
    }

    fn build(webhook_secret: Option<SecretString>, upstream: &Url) -> Self {
        let timeout = Duration::from_secs(2);

        let config = StorefrontConfig {
            host: [127, 0, 0, 1].into(),
            port: 0,
            backend: BackendConfig {
                url: upstream.clone(),
                service_key: SecretString::from(stub::STUB_SERVICE_KEY),
                timeout,
            },
            payments: PaymentsConfig {
                api_url: upstream.clone(),
                access_token: SecretString::from(stub::STUB_ACCESS_TOKEN),
                webhook_secret,
                timeout,
            },
            cache: CacheConfig::default(),
            store_offset: FixedOffset::west_opt(3 * 3600).expect("valid offset"),
            log_format: LogFormat::Text,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 0.0,
            sentry_traces_sample_rate: 0.0,
        };

        Self {
            state: AppState::new(config).expect("valid test state"),
        }
    }

    /// The full storefront router.
    #[must_use]
    pub fn app(&self) -> Router {
        bodega_storefront::app(self.state.clone())
    }

    /// Send one request through a fresh router.
    ///
    /// # Panics
    ///
    /// Panics if the router itself fails, which axum routers never do.
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }
}

fn unreachable() -> Url {
    Url::parse(UNREACHABLE).expect("valid test URL")
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Read a response body as JSON.
///
/// # Panics
///
/// Panics if the body cannot be read or is not JSON.
pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("readable body");
    serde_json::from_slice(&bytes).expect("JSON body")
}
