//! Payment processor webhooks (Stripe)
//!
//! Credit purchases arrive as signed webhook events. The signature header
//! has the form `t=<unix secs>,v1=<hex hmac>` where the HMAC-SHA256 covers
//! `"<t>.<raw body>"`.

use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use thiserror::Error;

/// Events older than this are rejected as replays
const TOLERANCE_SECS: i64 = 300;

/// The only event a credit purchase is applied from; the payment intent
/// events of the same purchase are ignored so it is credited once
const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("malformed signature header")]
    MalformedHeader,
    #[error("invalid signature encoding")]
    InvalidEncoding,
    #[error("invalid signing secret")]
    InvalidSecret,
    #[error("signature mismatch")]
    Mismatch,
    #[error("timestamp outside tolerance")]
    Expired,
}

/// Verify a webhook signature against the raw request body
pub fn verify_webhook_signature(
    payload: &[u8],
    sig_header: &str,
    secret: &str,
) -> Result<(), SignatureError> {
    verify_at(payload, sig_header, secret, chrono::Utc::now().timestamp())
}

fn verify_at(
    payload: &[u8],
    sig_header: &str,
    secret: &str,
    now: i64,
) -> Result<(), SignatureError> {
    let mut timestamp = "";
    let mut signatures = Vec::new();
    for part in sig_header.split(',') {
        let part = part.trim();
        if let Some(t) = part.strip_prefix("t=") {
            timestamp = t;
        } else if let Some(v) = part.strip_prefix("v1=") {
            signatures.push(v);
        }
    }
    if timestamp.is_empty() || signatures.is_empty() {
        return Err(SignatureError::MalformedHeader);
    }

    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::InvalidSecret)?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);

    // Any v1 entry may match (secret rotation sends several)
    let decoded: Vec<Vec<u8>> = signatures
        .iter()
        .filter_map(|s| hex::decode(s).ok())
        .collect();
    if decoded.is_empty() {
        return Err(SignatureError::InvalidEncoding);
    }
    if !decoded
        .iter()
        .any(|bytes| mac.clone().verify_slice(bytes).is_ok())
    {
        return Err(SignatureError::Mismatch);
    }

    let ts: i64 = timestamp
        .parse()
        .map_err(|_| SignatureError::MalformedHeader)?;
    if (now - ts).abs() > TOLERANCE_SECS {
        return Err(SignatureError::Expired);
    }
    Ok(())
}

/// Credit purchase extracted from a payment event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreditPurchase {
    /// Checkout session id; the ledger idempotency reference
    pub payment_ref: String,
    pub business_id: String,
    pub credits: i64,
}

/// Extract a credit purchase from a verified event
///
/// Returns `None` for events other than a paid checkout session, or when
/// the metadata lacks `business_id` or a positive `credits` count.
pub fn credit_purchase(event: &Value) -> Option<CreditPurchase> {
    if event["type"].as_str()? != CHECKOUT_COMPLETED {
        return None;
    }

    let object = &event["data"]["object"];
    if object["payment_status"].as_str() != Some("paid") {
        return None;
    }
    let payment_ref = object["id"].as_str()?.to_string();
    let metadata = &object["metadata"];
    let business_id = metadata["business_id"]
        .as_str()
        .filter(|s| !s.is_empty())?
        .to_string();

    // Metadata values are strings on Stripe, but accept numbers too
    let credits = match &metadata["credits"] {
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        Value::Number(n) => n.as_i64()?,
        _ => return None,
    };
    if credits <= 0 {
        return None;
    }

    Some(CreditPurchase {
        payment_ref,
        business_id,
        credits,
    })
}

/// Build a valid signature header for `payload`
#[cfg(test)]
pub(crate) fn sign(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{timestamp}.").as_bytes());
    mac.update(payload);
    format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
}
