//! Order model shared by the server and the portals

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::status::OrderStatus;

// ============================================================================
// Classification
// ============================================================================

/// System an order originated from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSource {
    /// Created by a business through the delivery portal
    #[default]
    InternalDelivery,
    /// Imported from the marketplace storefront
    Marketplace,
    /// Exists only on the dispatch provider
    ProviderNative,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    #[default]
    Delivery,
    Pickup,
    Marketplace,
}

/// How the end customer pays
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// Driver collects cash at the door
    Cash,
    /// Paid online, platform already holds the money
    Card,
    #[default]
    #[serde(other)]
    Unknown,
}

// ============================================================================
// Order
// ============================================================================

/// Name, phone and address of one end of the route
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ContactInfo {
    pub name: String,
    #[serde(default)]
    pub phone: String,
    pub address: String,
}

/// The unit of delivery work
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    // === Identity ===
    pub id: String,
    pub order_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_order_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_order_number: Option<String>,

    // === Parties ===
    pub business_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_id: Option<String>,
    /// Provider carrier currently assigned (sync metadata)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carrier_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carrier_name: Option<String>,

    // === Classification ===
    pub source: OrderSource,
    pub order_type: OrderType,

    // === Route ===
    pub customer: ContactInfo,
    pub pickup: ContactInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    // === Money ===
    pub subtotal: Decimal,
    pub delivery_fee: Decimal,
    pub tip: Decimal,
    pub tax: Decimal,
    pub discount: Decimal,
    /// subtotal + delivery_fee + tip + tax - discount
    pub total_amount: Decimal,
    /// What the driver collects at the door (cash orders)
    pub amount_to_collect: Decimal,
    pub payment_method: PaymentMethod,

    // === Status ===
    pub status: OrderStatus,
    /// Last raw status string seen from the provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_link: Option<String>,

    // === Timestamps (Unix millis) ===
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picked_up_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_at: Option<i64>,
}

impl Order {
    /// Total implied by the money fields
    pub fn compute_total(
        subtotal: Decimal,
        delivery_fee: Decimal,
        tip: Decimal,
        tax: Decimal,
        discount: Decimal,
    ) -> Decimal {
        subtotal + delivery_fee + tip + tax - discount
    }

    pub fn tracking(&self) -> OrderTracking {
        OrderTracking {
            order_id: self.id.clone(),
            order_number: self.order_number.clone(),
            status: self.status,
            status_label: self.status.label().to_string(),
            provider_status: self.provider_status.clone(),
            tracking_link: self.tracking_link.clone(),
            last_sync_at: self.last_sync_at,
        }
    }
}

// ============================================================================
// Requests / Views
// ============================================================================

/// Delivery request submitted by a business
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateOrderRequest {
    pub customer: ContactInfo,
    pub pickup: ContactInfo,
    #[serde(default)]
    pub order_type: OrderType,
    pub subtotal: Decimal,
    #[serde(default)]
    pub delivery_fee: Decimal,
    #[serde(default)]
    pub tip: Decimal,
    #[serde(default)]
    pub tax: Decimal,
    #[serde(default)]
    pub discount: Decimal,
    pub payment_method: PaymentMethod,
    /// Amount the driver's settlement is based on; defaults to the order total
    #[serde(default)]
    pub amount_to_collect: Option<Decimal>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Result of a successful order creation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreatedOrder {
    pub order_id: String,
    pub order_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_link: Option<String>,
    pub remaining_credits: i64,
}

/// Tracking view served to the portals
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderTracking {
    pub order_id: String,
    pub order_number: String,
    pub status: OrderStatus,
    pub status_label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_at: Option<i64>,
}
