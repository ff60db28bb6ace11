//! Dispatch provider wire types
//!
//! The provider's JSON is loosely typed: ids arrive as numbers or strings,
//! single orders arrive as objects or one-element arrays, and the status
//! lives either under `orderStatus.orderState` or a flat `status`. Parsing
//! therefore goes through [`serde_json::Value`] instead of strict derives.

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;

use super::error::{DispatchError, DispatchResult};

/// Body of `POST /orders`
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteOrderRequest {
    pub order_number: String,
    pub customer_name: String,
    pub customer_address: String,
    pub customer_phone_number: String,
    pub restaurant_name: String,
    pub restaurant_address: String,
    pub restaurant_phone_number: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub order_total: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub delivery_fee: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub tips: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub tax: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub discount_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_order_cost: Decimal,
    /// `cash` or `credit_card`
    pub payment_method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_instruction: Option<String>,
}

/// Identifiers returned after a successful remote creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteOrderCreated {
    pub provider_order_id: String,
    pub provider_order_number: Option<String>,
    pub tracking_link: Option<String>,
}

/// Carrier assigned to an order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarrierRef {
    pub id: String,
    pub name: Option<String>,
}

/// Provider-side view of one order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderOrderView {
    pub provider_order_id: String,
    pub order_number: Option<String>,
    /// Raw provider status, unmapped
    pub status: Option<String>,
    /// Never `Some("")`
    pub tracking_link: Option<String>,
    pub carrier: Option<CarrierRef>,
}

/// Provider carrier (driver) record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarrierView {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    pub is_on_shift: bool,
    pub is_active: bool,
}

// ============================================================================
// Parsing
// ============================================================================

/// Read an id that may be encoded as a string or a number
pub(crate) fn id_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Parse one order object
pub(crate) fn parse_order_view(value: &Value) -> DispatchResult<ProviderOrderView> {
    let obj = value
        .as_object()
        .ok_or_else(|| DispatchError::Decode("order is not an object".into()))?;

    let provider_order_id = obj
        .get("orderId")
        .or_else(|| obj.get("id"))
        .and_then(id_value)
        .ok_or_else(|| DispatchError::Decode("order without orderId".into()))?;

    let status = non_empty_str(
        obj.get("orderStatus")
            .and_then(|s| s.get("orderState")),
    )
    .or_else(|| non_empty_str(obj.get("status")));

    let carrier = obj
        .get("assignedCarrier")
        .filter(|c| c.is_object())
        .and_then(|c| {
            let id = c.get("id").and_then(id_value)?;
            Some(CarrierRef {
                id,
                name: non_empty_str(c.get("name")),
            })
        });

    Ok(ProviderOrderView {
        provider_order_id,
        order_number: obj.get("orderNumber").and_then(id_value),
        status,
        tracking_link: non_empty_str(obj.get("trackingLink")),
        carrier,
    })
}

/// Parse a single-order answer: a bare object or a singleton array.
/// An empty array (or `null`) means the provider does not have the order.
pub(crate) fn parse_single_order(value: &Value) -> DispatchResult<Option<ProviderOrderView>> {
    match value {
        Value::Null => Ok(None),
        Value::Array(items) => match items.first() {
            Some(first) => parse_order_view(first).map(Some),
            None => Ok(None),
        },
        Value::Object(_) => parse_order_view(value).map(Some),
        other => Err(DispatchError::Decode(format!(
            "expected order object or array, got {other}"
        ))),
    }
}

/// Parse a list of orders, dropping entries without an id
pub(crate) fn parse_order_list(value: &Value) -> DispatchResult<Vec<ProviderOrderView>> {
    let items = value
        .as_array()
        .ok_or_else(|| DispatchError::Decode("expected an array of orders".into()))?;

    let mut orders = Vec::with_capacity(items.len());
    for item in items {
        match parse_order_view(item) {
            Ok(view) => orders.push(view),
            Err(e) => tracing::debug!(error = %e, "Skipping malformed provider order entry"),
        }
    }
    Ok(orders)
}

pub(crate) fn parse_carriers(value: &Value) -> DispatchResult<Vec<CarrierView>> {
    let items = value
        .as_array()
        .ok_or_else(|| DispatchError::Decode("expected an array of carriers".into()))?;

    Ok(items
        .iter()
        .filter_map(|c| {
            let id = c.get("id").and_then(id_value)?;
            Some(CarrierView {
                id,
                name: non_empty_str(c.get("name")).unwrap_or_default(),
                phone: non_empty_str(c.get("phoneNumber")),
                is_on_shift: c.get("isOnShift").and_then(Value::as_bool).unwrap_or(false),
                is_active: c.get("isActive").and_then(Value::as_bool).unwrap_or(true),
            })
        })
        .collect())
}

/// Parse the answer of `POST /orders`
pub(crate) fn parse_created(value: &Value) -> DispatchResult<RemoteOrderCreated> {
    if value.get("success").and_then(Value::as_bool) == Some(false) {
        let message = non_empty_str(value.get("response")).unwrap_or_default();
        return Err(DispatchError::Upstream {
            status: 200,
            body: message,
        });
    }

    let provider_order_id = value
        .get("orderId")
        .and_then(id_value)
        .ok_or_else(|| DispatchError::Decode("create response without orderId".into()))?;

    Ok(RemoteOrderCreated {
        provider_order_id,
        provider_order_number: value.get("orderNumber").and_then(id_value),
        tracking_link: non_empty_str(value.get("trackingLink")),
    })
}
