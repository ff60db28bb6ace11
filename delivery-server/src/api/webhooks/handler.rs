//! Webhook handlers
//!
//! Both handlers take the raw body: the payment webhook needs the exact
//! bytes for signature verification, and provider payloads vary in shape.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use serde::Serialize;
use serde_json::Value;
use shared::error::{AppError, AppResult};
use shared::order::{OrderSource, number};

use crate::core::ServerState;
use crate::dispatch::id_value;
use crate::orders::{ReconcileOutcome, ReconcileReport};
use crate::stripe;

/// Provider order id from a push payload
///
/// Accepts `{"order": {"id": ..}}`, `{"orderId": ..}`, `{"order_id": ..}`
/// and `{"id": ..}`, with string or numeric ids.
pub(crate) fn provider_order_id(payload: &Value) -> Option<String> {
    let order = &payload["order"];
    [
        &order["id"],
        &order["orderId"],
        &payload["orderId"],
        &payload["order_id"],
        &payload["id"],
    ]
    .into_iter()
    .find_map(id_value)
}

/// Order number from a push payload, when the provider echoes it
pub(crate) fn payload_order_number(payload: &Value) -> Option<String> {
    let order = &payload["order"];
    [
        &order["orderNumber"],
        &order["order_number"],
        &payload["orderNumber"],
        &payload["order_number"],
    ]
    .into_iter()
    .filter_map(|v| v.as_str())
    .map(str::trim)
    .find(|s| !s.is_empty())
    .map(str::to_string)
}

pub async fn dispatch(
    State(state): State<ServerState>,
    body: Bytes,
) -> AppResult<Json<ReconcileReport>> {
    let payload: Value = serde_json::from_slice(&body)
        .map_err(|e| AppError::invalid_request(format!("invalid JSON: {e}")))?;

    let Some(provider_order_id) = provider_order_id(&payload) else {
        tracing::warn!(event = ?payload.get("event"), "Dispatch webhook without order id");
        return Err(AppError::validation("order id missing from payload"));
    };

    let origin = payload_order_number(&payload).map(|n| number::classify(&n));
    tracing::info!(
        provider_order_id = %provider_order_id,
        event = ?payload.get("event").and_then(|v| v.as_str()),
        origin = ?origin,
        "Dispatch webhook received"
    );

    let mut report = state.reconciler.reconcile(&provider_order_id).await;
    if report.outcome == ReconcileOutcome::NotFoundLocally {
        match origin {
            Some(OrderSource::ProviderNative) => tracing::debug!(
                provider_order_id = %provider_order_id,
                "Provider-native order has no local record"
            ),
            _ => tracing::warn!(
                provider_order_id = %provider_order_id,
                origin = ?origin,
                "Dispatch webhook for an order with no local record"
            ),
        }
    }
    report.origin = origin;
    Ok(Json(report))
}

#[derive(Debug, Serialize)]
pub struct PaymentAck {
    pub received: bool,
    /// Credits applied by this delivery (0 for ignored events and replays)
    pub credits_applied: i64,
}

pub async fn payments(
    State(state): State<ServerState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<PaymentAck>> {
    let sig_header = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::invalid_signature("missing Stripe-Signature header"))?;

    if let Err(e) =
        stripe::verify_webhook_signature(&body, sig_header, &state.config.payment_webhook_secret)
    {
        tracing::warn!(error = %e, "Payment webhook signature verification failed");
        return Err(AppError::invalid_signature(e.to_string()));
    }

    let event: Value = serde_json::from_slice(&body)
        .map_err(|e| AppError::invalid_request(format!("invalid JSON: {e}")))?;
    let event_type = event["type"].as_str().unwrap_or_default();

    let Some(purchase) = stripe::credit_purchase(&event) else {
        tracing::debug!(event_type = %event_type, "Ignoring payment event");
        return Ok(Json(PaymentAck {
            received: true,
            credits_applied: 0,
        }));
    };

    let applied = state.ledger.top_up_credits(
        &purchase.business_id,
        &purchase.payment_ref,
        purchase.credits,
    )?;
    if applied.replayed {
        tracing::info!(payment_ref = %purchase.payment_ref, "Duplicate payment event, already applied");
    }

    Ok(Json(PaymentAck {
        received: true,
        credits_applied: if applied.replayed { 0 } else { purchase.credits },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_provider_order_id_shapes() {
        assert_eq!(
            provider_order_id(&json!({"event": "ORDER_ASSIGNED", "order": {"id": 123}})),
            Some("123".into())
        );
        assert_eq!(
            provider_order_id(&json!({"orderId": "456"})),
            Some("456".into())
        );
        assert_eq!(
            provider_order_id(&json!({"order_id": 7, "id": 8})),
            Some("7".into())
        );
        assert_eq!(provider_order_id(&json!({"order": {"id": ""}})), None);
        assert_eq!(provider_order_id(&json!({})), None);
    }

    #[test]
    fn test_payload_order_number() {
        assert_eq!(
            payload_order_number(&json!({"order": {"id": 1, "orderNumber": " SHD-20261018-AB "}})),
            Some("SHD-20261018-AB".into())
        );
        assert_eq!(
            payload_order_number(&json!({"order_number": "MKT-1"})),
            Some("MKT-1".into())
        );
        assert_eq!(payload_order_number(&json!({"order": {"orderNumber": ""}})), None);
        assert_eq!(payload_order_number(&json!({"orderNumber": 12})), None);
    }
}
