//! Reconciliation: pull provider state into the local order
//!
//! `reconcile(provider_order_id)`:
//!
//! 1. Find the local order (exact provider id, then numeric fallback).
//!    The provider is never authoritative for existence: no local order,
//!    no work.
//! 2. Fetch the provider view. Absent upstream is not an error.
//! 3. Map the raw status through the closed alias table. Unmapped statuses
//!    are skipped without any write.
//! 4. Diff and write inside one write transaction (see [`apply_sync`]).
//! 5. Delivered orders are handed to the ledger for settlement, which is
//!    idempotent per order.
//!
//! Nothing here ever returns an error to the caller: every failure becomes
//! a [`ReconcileOutcome::Failed`] entry and is retried on the next trigger.

use rust_decimal::Decimal;
use serde::Serialize;
use shared::order::{Order, OrderSource, OrderStatus};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::dispatch::{CarrierRef, DispatchError, DispatchProvider, ProviderOrderView};
use crate::ledger::{LedgerService, Settlement};

use super::storage::OrderStore;

/// Broadcast when a sync changed an order's status or tracking link
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OrderSyncEvent {
    pub order_id: String,
    pub provider_order_id: String,
    pub previous_status: OrderStatus,
    pub status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_link: Option<String>,
    pub synced_at: i64,
}

/// What one reconcile pass did to one order
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// Something was written beyond `last_sync_at`
    Updated { from: OrderStatus, to: OrderStatus },
    /// Only `last_sync_at` was refreshed
    Unchanged,
    /// No local order carries this provider id
    NotFoundLocally,
    /// The provider does not know the order (yet)
    NotVisibleUpstream,
    /// Provider status missing or outside the alias table; nothing written
    Skipped { raw: Option<String> },
    Failed { kind: String, message: String },
}

/// Per-order reconcile result
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReconcileReport {
    pub provider_order_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(flatten)]
    pub outcome: ReconcileOutcome,
    /// The order has a settlement row after this pass
    pub settled: bool,
    /// Origin classified from the order number an event carried
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<OrderSource>,
}

impl ReconcileReport {
    fn new(provider_order_id: &str, order_id: Option<&str>, outcome: ReconcileOutcome) -> Self {
        Self {
            provider_order_id: provider_order_id.to_string(),
            order_id: order_id.map(str::to_string),
            outcome,
            settled: false,
            origin: None,
        }
    }
}

/// Provider facts a sync is allowed to apply
#[derive(Debug, Clone)]
pub(crate) struct SyncInput {
    pub status: OrderStatus,
    pub raw_status: String,
    pub tracking_link: Option<String>,
    pub carrier: Option<CarrierRef>,
    /// Driver resolved from the carrier, if the carrier is linked
    pub driver_id: Option<String>,
}

/// What [`apply_sync`] changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SyncChange {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub status_changed: bool,
    pub link_changed: bool,
    /// Any field other than `last_sync_at` changed
    pub changed: bool,
    /// The provider reported a status behind the local one
    pub regression_refused: bool,
}

/// Apply provider facts to an order in place
///
/// - status only moves along [`OrderStatus::can_transition_to`]
/// - a known tracking link is never replaced by an empty one
/// - lifecycle timestamps and `driver_id` are set at most once
/// - `last_sync_at` is always refreshed
pub(crate) fn apply_sync(order: &mut Order, input: &SyncInput, now: i64) -> SyncChange {
    let from = order.status;
    let mut change = SyncChange {
        from,
        to: from,
        status_changed: false,
        link_changed: false,
        changed: false,
        regression_refused: false,
    };

    if order.provider_status.as_deref() != Some(input.raw_status.as_str()) {
        order.provider_status = Some(input.raw_status.clone());
        change.changed = true;
    }

    if input.status != from {
        if from.can_transition_to(input.status) {
            order.status = input.status;
            change.to = input.status;
            change.status_changed = true;
            change.changed = true;
            stamp_lifecycle(order, now);
        } else {
            change.regression_refused = true;
        }
    }

    if let Some(link) = input.tracking_link.as_deref().filter(|l| !l.is_empty())
        && order.tracking_link.as_deref() != Some(link)
    {
        order.tracking_link = Some(link.to_string());
        change.link_changed = true;
        change.changed = true;
    }

    if let Some(carrier) = &input.carrier {
        if order.carrier_id.as_deref() != Some(carrier.id.as_str()) {
            order.carrier_id = Some(carrier.id.clone());
            order.carrier_name = carrier.name.clone();
            change.changed = true;
        } else if carrier.name.is_some() && order.carrier_name != carrier.name {
            order.carrier_name = carrier.name.clone();
            change.changed = true;
        }
    }

    if order.driver_id.is_none()
        && let Some(driver_id) = &input.driver_id
    {
        order.driver_id = Some(driver_id.clone());
        change.changed = true;
    }

    order.last_sync_at = Some(now);
    change
}

/// Stamp the lifecycle timestamps implied by the current status
fn stamp_lifecycle(order: &mut Order, now: i64) {
    let status = order.status;
    let progressed = !status.is_final() || status.is_delivered();

    if progressed && status.rank() >= OrderStatus::Started.rank() && order.assigned_at.is_none() {
        order.assigned_at = Some(now);
    }
    if progressed && status.rank() >= OrderStatus::PickedUp.rank() && order.picked_up_at.is_none()
    {
        order.picked_up_at = Some(now);
    }
    if status.is_final() && order.completed_at.is_none() {
        order.completed_at = Some(now);
        if status.is_delivered() {
            order.delivered_at = Some(now);
        }
    }
}

/// Keeps local orders in step with the dispatch provider
#[derive(Clone)]
pub struct Reconciler {
    store: OrderStore,
    ledger: LedgerService,
    dispatch: Arc<dyn DispatchProvider>,
    service_fee: Decimal,
    events: broadcast::Sender<OrderSyncEvent>,
}

impl Reconciler {
    pub fn new(
        store: OrderStore,
        ledger: LedgerService,
        dispatch: Arc<dyn DispatchProvider>,
        service_fee: Decimal,
    ) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            store,
            ledger,
            dispatch,
            service_fee,
            events,
        }
    }

    /// Subscribe to order sync events
    pub fn subscribe(&self) -> broadcast::Receiver<OrderSyncEvent> {
        self.events.subscribe()
    }

    pub(crate) fn dispatch(&self) -> &Arc<dyn DispatchProvider> {
        &self.dispatch
    }

    /// Reconcile one order identified by its provider id
    pub async fn reconcile(&self, provider_order_id: &str) -> ReconcileReport {
        let order = match self.store.find_by_provider_id(provider_order_id) {
            Ok(Some(order)) => order,
            Ok(None) => {
                tracing::debug!(
                    provider_order_id = %provider_order_id,
                    "No local order for provider id"
                );
                return ReconcileReport::new(
                    provider_order_id,
                    None,
                    ReconcileOutcome::NotFoundLocally,
                );
            }
            Err(e) => {
                tracing::error!(provider_order_id = %provider_order_id, error = %e, "Order lookup failed");
                return ReconcileReport::new(
                    provider_order_id,
                    None,
                    ReconcileOutcome::Failed {
                        kind: "storage".into(),
                        message: e.to_string(),
                    },
                );
            }
        };

        self.reconcile_order(&order, None).await
    }

    /// Reconcile a known local order, using `prefetched` when the caller
    /// already holds the provider view
    pub(crate) async fn reconcile_order(
        &self,
        order: &Order,
        prefetched: Option<ProviderOrderView>,
    ) -> ReconcileReport {
        let provider_order_id = order.provider_order_id.clone().unwrap_or_default();

        let view = match prefetched {
            Some(view) => view,
            None => match self.dispatch.fetch_order(&provider_order_id).await {
                Ok(Some(view)) => view,
                Ok(None) => {
                    tracing::debug!(
                        order_id = %order.id,
                        provider_order_id = %provider_order_id,
                        "Order not visible upstream yet"
                    );
                    let mut report = ReconcileReport::new(
                        &provider_order_id,
                        Some(&order.id),
                        ReconcileOutcome::NotVisibleUpstream,
                    );
                    report.settled = self.settle_if_delivered(order);
                    return report;
                }
                Err(e) => return self.fetch_failed(order, &provider_order_id, e),
            },
        };

        self.apply_view(order, &provider_order_id, view)
    }

    fn fetch_failed(
        &self,
        order: &Order,
        provider_order_id: &str,
        err: DispatchError,
    ) -> ReconcileReport {
        match &err {
            DispatchError::Auth { status } => tracing::error!(
                alert = true,
                order_id = %order.id,
                provider_order_id = %provider_order_id,
                status = *status,
                "Dispatch provider rejected credentials; check DISPATCH_API_KEY"
            ),
            e if e.is_transient() => tracing::warn!(
                order_id = %order.id,
                provider_order_id = %provider_order_id,
                error = %e,
                "Transient dispatch error, will retry on next trigger"
            ),
            e => tracing::warn!(
                order_id = %order.id,
                provider_order_id = %provider_order_id,
                error = %e,
                "Dispatch fetch failed"
            ),
        }

        ReconcileReport::new(
            provider_order_id,
            Some(&order.id),
            ReconcileOutcome::Failed {
                kind: err.kind().to_string(),
                message: err.to_string(),
            },
        )
    }

    fn apply_view(
        &self,
        order: &Order,
        provider_order_id: &str,
        view: ProviderOrderView,
    ) -> ReconcileReport {
        let raw = view.status.clone();
        let Some(status) = raw.as_deref().and_then(OrderStatus::from_provider) else {
            tracing::warn!(
                order_id = %order.id,
                provider_order_id = %provider_order_id,
                raw_status = ?raw,
                "Unmapped provider status, skipping"
            );
            return ReconcileReport::new(
                provider_order_id,
                Some(&order.id),
                ReconcileOutcome::Skipped { raw },
            );
        };

        let driver_id = match &view.carrier {
            Some(carrier) if order.driver_id.is_none() => {
                match self.ledger.find_driver_by_carrier(&carrier.id) {
                    Ok(found) => found,
                    Err(e) => {
                        tracing::warn!(carrier_id = %carrier.id, error = %e, "Carrier lookup failed");
                        None
                    }
                }
            }
            _ => None,
        };

        let input = SyncInput {
            status,
            raw_status: raw.unwrap_or_default(),
            tracking_link: view.tracking_link,
            carrier: view.carrier,
            driver_id,
        };

        let now = shared::util::now_millis();
        let (updated, change) = match self
            .store
            .update_with(&order.id, |o| apply_sync(o, &input, now))
        {
            Ok(Some(result)) => result,
            Ok(None) => {
                return ReconcileReport::new(
                    provider_order_id,
                    Some(&order.id),
                    ReconcileOutcome::NotFoundLocally,
                );
            }
            Err(e) => {
                tracing::error!(order_id = %order.id, error = %e, "Order sync write failed");
                return ReconcileReport::new(
                    provider_order_id,
                    Some(&order.id),
                    ReconcileOutcome::Failed {
                        kind: "storage".into(),
                        message: e.to_string(),
                    },
                );
            }
        };

        if change.regression_refused {
            tracing::warn!(
                order_id = %updated.id,
                local_status = %change.from,
                provider_status = %input.status,
                "Refused status regression from provider"
            );
        }

        if change.status_changed || change.link_changed {
            tracing::info!(
                order_id = %updated.id,
                from = %change.from,
                to = %change.to,
                "Order synced"
            );
            // No receivers is fine
            let _ = self.events.send(OrderSyncEvent {
                order_id: updated.id.clone(),
                provider_order_id: provider_order_id.to_string(),
                previous_status: change.from,
                status: change.to,
                tracking_link: updated.tracking_link.clone(),
                synced_at: now,
            });
        }

        let outcome = if change.changed {
            ReconcileOutcome::Updated {
                from: change.from,
                to: change.to,
            }
        } else {
            ReconcileOutcome::Unchanged
        };

        let mut report = ReconcileReport::new(provider_order_id, Some(&updated.id), outcome);
        report.settled = self.settle_if_delivered(&updated);
        report
    }

    /// Settle a delivered order; returns whether it is settled afterwards
    ///
    /// Failures are logged and retried on the next pass.
    pub(crate) fn settle_if_delivered(&self, order: &Order) -> bool {
        if !order.status.is_delivered() {
            return false;
        }

        match self.ledger.is_settled(&order.id) {
            Ok(true) => return true,
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(order_id = %order.id, error = %e, "Settlement check failed");
                return false;
            }
        }

        let Some(driver_id) = order.driver_id.as_deref() else {
            tracing::warn!(
                order_id = %order.id,
                carrier_id = ?order.carrier_id,
                "Delivered order has no linked driver, settlement pending"
            );
            return false;
        };

        match self.ledger.settle_completed_order(
            driver_id,
            &order.id,
            order.payment_method,
            order.amount_to_collect,
            self.service_fee,
        ) {
            Ok(Settlement::Applied(_)) | Ok(Settlement::AlreadySettled(_)) => true,
            Err(e) => {
                tracing::error!(
                    order_id = %order.id,
                    driver_id = %driver_id,
                    error = %e,
                    "Settlement failed"
                );
                false
            }
        }
    }
}
