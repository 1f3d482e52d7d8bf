//! Sign a payment webhook for local testing.

use chrono::Utc;
use secrecy::SecretString;
use tracing::info;

use bodega_storefront::webhooks::SignatureVerifier;

/// Inputs to the signed manifest.
#[derive(Debug, Default)]
pub struct SignArgs {
    pub data_id: Option<String>,
    pub request_id: Option<String>,
    pub ts: Option<String>,
}

/// Produce an `x-signature` header value.
///
/// Reads `MP_WEBHOOK_SECRET` from the environment (or `.env`). The timestamp
/// defaults to the current Unix time.
///
/// # Errors
///
/// Returns an error if the secret is not set or empty.
pub fn header(args: &SignArgs) -> Result<String, Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let secret = std::env::var("MP_WEBHOOK_SECRET")
        .map(SecretString::from)
        .map_err(|_| "MP_WEBHOOK_SECRET not set")?;

    signed_header(secret, args)
}

fn signed_header(
    secret: SecretString,
    args: &SignArgs,
) -> Result<String, Box<dyn std::error::Error>> {
    let ts = args
        .ts
        .clone()
        .unwrap_or_else(|| Utc::now().timestamp().to_string());

    let header = SignatureVerifier::new(Some(secret))
        .sign(&ts, args.request_id.as_deref(), args.data_id.as_deref())
        .ok_or("MP_WEBHOOK_SECRET is empty")?;

    info!(ts = %ts, data_id = ?args.data_id, request_id = ?args.request_id, "Signed webhook");
    Ok(header)
}
