//! Order creation saga and tracking lookups
//!
//! Creation runs as a saga with one compensating step:
//!
//! ```text
//! validate -> pre-debit credits -> insert local order -> create remote order
//!                                                       |
//!                                        failure: refund credits + CANCELLED
//! ```
//!
//! The local order is inserted before the remote call so that a crash
//! between the two leaves a debited, visible order rather than credits
//! charged for nothing.

use chrono::Utc;
use shared::error::{AppError, ErrorCode};
use shared::order::{
    CreateOrderRequest, CreatedOrder, Order, OrderSource, OrderStatus, OrderTracking,
    PaymentMethod, number,
};
use std::sync::Arc;
use thiserror::Error;

use crate::db::StorageError;
use crate::dispatch::{DispatchError, DispatchProvider, RemoteOrderRequest};
use crate::ledger::{Applied, LedgerError, LedgerService};

use super::storage::{AttachOutcome, OrderStore};

/// Ledger note on compensation refunds
const COMPENSATION_REASON: &str = "dispatch provider unavailable";

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("invalid order: {0}")]
    Validation(String),

    #[error("order not found: {0}")]
    NotFound(String),

    #[error("no tracking available for {0}")]
    TrackingNotAvailable(String),

    #[error("order {order_id} is {status} and cannot be refunded")]
    NotRefundable {
        order_id: String,
        status: OrderStatus,
    },

    /// Remote creation failed; the credits were refunded
    #[error("dispatch provider unavailable: {0}")]
    ProviderUnavailable(DispatchError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type OrderResult<T> = Result<T, OrderError>;

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::Validation(msg) => AppError::validation(msg),
            OrderError::NotFound(id) => {
                AppError::new(ErrorCode::OrderNotFound).with_detail("order_id", id)
            }
            OrderError::TrackingNotAvailable(id) => {
                AppError::new(ErrorCode::TrackingNotAvailable).with_detail("order_id", id)
            }
            OrderError::NotRefundable { order_id, status } => {
                AppError::new(ErrorCode::OrderNotRefundable)
                    .with_detail("order_id", order_id)
                    .with_detail("status", status.to_string())
            }
            OrderError::ProviderUnavailable(e) => {
                AppError::dispatch_unavailable().with_detail("reason", e.kind())
            }
            OrderError::Ledger(e) => e.into(),
            OrderError::Storage(e) => {
                tracing::error!(error = %e, "Order storage error");
                AppError::database(e.to_string())
            }
        }
    }
}

/// Entry point for the business portal
#[derive(Clone)]
pub struct OrderService {
    store: OrderStore,
    ledger: LedgerService,
    dispatch: Arc<dyn DispatchProvider>,
    credit_cost: i64,
}

impl OrderService {
    pub fn new(
        store: OrderStore,
        ledger: LedgerService,
        dispatch: Arc<dyn DispatchProvider>,
        credit_cost: i64,
    ) -> Self {
        Self {
            store,
            ledger,
            dispatch,
            credit_cost,
        }
    }

    /// Create an order for `business_id` and dispatch it
    ///
    /// On success exactly `credit_cost` credits were debited. On any failure
    /// the business balance is what it was before the call.
    pub async fn create_order(
        &self,
        business_id: &str,
        request: CreateOrderRequest,
    ) -> OrderResult<CreatedOrder> {
        let mut order = build_order(business_id, request)?;

        let debit = self
            .ledger
            .pre_debit_for_new_order(business_id, &order.id, self.credit_cost)?;

        if let Err(e) = self.store.insert(&order) {
            tracing::error!(order_id = %order.id, error = %e, "Order insert failed after debit");
            self.compensate(&order, false);
            return Err(e.into());
        }

        let remote = match self
            .dispatch
            .create_remote_order(&remote_request(&order))
            .await
        {
            Ok(remote) => remote,
            Err(e) => {
                match &e {
                    DispatchError::Auth { status } => tracing::error!(
                        alert = true,
                        order_id = %order.id,
                        status = *status,
                        "Dispatch provider rejected credentials on order creation"
                    ),
                    other => tracing::warn!(
                        order_id = %order.id,
                        error = %other,
                        "Remote order creation failed, compensating"
                    ),
                }
                self.compensate(&order, true);
                return Err(OrderError::ProviderUnavailable(e));
            }
        };

        match self.store.attach_provider_id(
            &order.id,
            &remote.provider_order_id,
            remote.provider_order_number.as_deref(),
            remote.tracking_link.as_deref(),
        ) {
            Ok(AttachOutcome::Attached(attached)) | Ok(AttachOutcome::AlreadyAttached(attached)) => {
                order = attached;
            }
            Ok(AttachOutcome::Conflict { existing }) => {
                tracing::error!(
                    order_id = %order.id,
                    existing = %existing,
                    incoming = %remote.provider_order_id,
                    "Order already linked to another provider order"
                );
            }
            Ok(AttachOutcome::NotFound) => {
                tracing::error!(order_id = %order.id, "Order vanished before provider id attach");
            }
            Err(e) => {
                // The remote order exists, so the debit stands
                tracing::error!(
                    alert = true,
                    order_id = %order.id,
                    provider_order_id = %remote.provider_order_id,
                    error = %e,
                    "Failed to record provider id for dispatched order"
                );
                return Err(e.into());
            }
        }

        tracing::info!(
            order_id = %order.id,
            order_number = %order.order_number,
            business_id = %business_id,
            provider_order_id = %remote.provider_order_id,
            remaining_credits = debit.remaining_credits,
            "Order created"
        );

        Ok(CreatedOrder {
            order_id: order.id,
            order_number: order.order_number,
            tracking_link: order.tracking_link,
            remaining_credits: debit.remaining_credits,
        })
    }

    /// Undo the pre-debit and close the order
    fn compensate(&self, order: &Order, inserted: bool) {
        if let Err(e) = self.ledger.refund_order_credits(
            &order.business_id,
            &order.id,
            self.credit_cost,
            COMPENSATION_REASON,
        ) {
            tracing::error!(
                alert = true,
                order_id = %order.id,
                business_id = %order.business_id,
                error = %e,
                "Compensation refund failed"
            );
        }

        if !inserted {
            return;
        }
        let now = shared::util::now_millis();
        let result = self.store.update_with(&order.id, |o| {
            if o.status.can_transition_to(OrderStatus::Cancelled) {
                o.status = OrderStatus::Cancelled;
                o.completed_at.get_or_insert(now);
            }
        });
        if let Err(e) = result {
            tracing::error!(order_id = %order.id, error = %e, "Failed to cancel compensated order");
        }
    }

    /// Tracking view by local id, provider id or order number
    pub fn get_order_tracking(&self, id: &str) -> OrderResult<OrderTracking> {
        self.resolve(id)?
            .map(|o| o.tracking())
            .ok_or_else(|| OrderError::TrackingNotAvailable(id.to_string()))
    }

    /// Full order by local id, provider id or order number
    pub fn get_order(&self, id: &str) -> OrderResult<Order> {
        self.resolve(id)?
            .ok_or_else(|| OrderError::NotFound(id.to_string()))
    }

    pub fn list_orders(&self, business_id: &str) -> OrderResult<Vec<Order>> {
        Ok(self.store.list_for_business(business_id)?)
    }

    fn resolve(&self, id: &str) -> OrderResult<Option<Order>> {
        if number::has_origin_prefix(id) {
            tracing::debug!(id = %id, origin = ?number::classify(id), "Resolving by order number");
            if let Some(order) = self.store.find_by_order_number(id)? {
                return Ok(Some(order));
            }
        }
        if let Some(order) = self.store.get(id)? {
            return Ok(Some(order));
        }
        if let Some(order) = self.store.find_by_provider_id(id)? {
            return Ok(Some(order));
        }
        Ok(self.store.find_by_order_number(id)?)
    }

    /// Return the credits of a cancelled or failed order
    ///
    /// Replays return the original refund.
    pub fn refund_cancelled_order(&self, order_id: &str, reason: &str) -> OrderResult<Applied> {
        let order = self
            .store
            .get(order_id)?
            .ok_or_else(|| OrderError::NotFound(order_id.to_string()))?;

        if !matches!(
            order.status,
            OrderStatus::Cancelled | OrderStatus::FailedDelivery
        ) {
            return Err(OrderError::NotRefundable {
                order_id: order.id,
                status: order.status,
            });
        }

        Ok(self.ledger.refund_order_credits(
            &order.business_id,
            &order.id,
            self.credit_cost,
            reason,
        )?)
    }
}

fn require(value: &str, field: &str) -> OrderResult<()> {
    if value.trim().is_empty() {
        return Err(OrderError::Validation(format!("{field} is required")));
    }
    Ok(())
}

/// Validate a request and build the local order
fn build_order(business_id: &str, req: CreateOrderRequest) -> OrderResult<Order> {
    require(business_id, "business_id")?;
    require(&req.customer.name, "customer.name")?;
    require(&req.customer.address, "customer.address")?;
    require(&req.pickup.name, "pickup.name")?;
    require(&req.pickup.address, "pickup.address")?;

    for (field, value) in [
        ("subtotal", req.subtotal),
        ("delivery_fee", req.delivery_fee),
        ("tip", req.tip),
        ("tax", req.tax),
        ("discount", req.discount),
    ] {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(OrderError::Validation(format!("{field} cannot be negative")));
        }
    }

    if req.payment_method == PaymentMethod::Unknown {
        return Err(OrderError::Validation(
            "payment_method must be CASH or CARD".into(),
        ));
    }

    let total = Order::compute_total(
        req.subtotal,
        req.delivery_fee,
        req.tip,
        req.tax,
        req.discount,
    );
    if total.is_sign_negative() && !total.is_zero() {
        return Err(OrderError::Validation(
            "discount exceeds the order amount".into(),
        ));
    }

    let amount_to_collect = req.amount_to_collect.unwrap_or(total);
    if amount_to_collect.is_sign_negative() && !amount_to_collect.is_zero() {
        return Err(OrderError::Validation(
            "amount_to_collect cannot be negative".into(),
        ));
    }

    let now = Utc::now();
    let order_number = number::generate(OrderSource::InternalDelivery, now.date_naive());
    Ok(Order {
        id: uuid::Uuid::new_v4().to_string(),
        source: number::classify(&order_number),
        order_number,
        provider_order_id: None,
        provider_order_number: None,
        business_id: business_id.to_string(),
        driver_id: None,
        carrier_id: None,
        carrier_name: None,
        order_type: req.order_type,
        customer: req.customer,
        pickup: req.pickup,
        notes: req.notes.filter(|n| !n.trim().is_empty()),
        subtotal: req.subtotal,
        delivery_fee: req.delivery_fee,
        tip: req.tip,
        tax: req.tax,
        discount: req.discount,
        total_amount: total,
        amount_to_collect,
        payment_method: req.payment_method,
        status: OrderStatus::NotAssigned,
        provider_status: None,
        tracking_link: None,
        created_at: now.timestamp_millis(),
        assigned_at: None,
        picked_up_at: None,
        completed_at: None,
        delivered_at: None,
        last_sync_at: None,
    })
}

/// Provider payload for a local order
fn remote_request(order: &Order) -> RemoteOrderRequest {
    RemoteOrderRequest {
        order_number: order.order_number.clone(),
        customer_name: order.customer.name.clone(),
        customer_address: order.customer.address.clone(),
        customer_phone_number: order.customer.phone.clone(),
        restaurant_name: order.pickup.name.clone(),
        restaurant_address: order.pickup.address.clone(),
        restaurant_phone_number: order.pickup.phone.clone(),
        order_total: order.subtotal,
        delivery_fee: order.delivery_fee,
        tips: order.tip,
        tax: order.tax,
        discount_amount: order.discount,
        total_order_cost: order.total_amount,
        payment_method: match order.payment_method {
            PaymentMethod::Card => "credit_card".into(),
            _ => "cash".into(),
        },
        delivery_instruction: order.notes.clone(),
    }
}
