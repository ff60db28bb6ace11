//! Periodic reconciliation sweep
//!
//! Each tick collects the sync candidates created inside the window, pulls
//! the provider's active order list once and reconciles every candidate.
//! Candidates missing from the bulk list get an individual fetch, spaced by
//! the stagger delay to stay under the provider's rate limits.

use std::collections::HashMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::dispatch::{CarrierView, ProviderOrderView};

use super::reconcile::{ReconcileOutcome, ReconcileReport, Reconciler};
use super::storage::OrderStore;
use crate::ledger::LedgerService;

/// Poller timing
#[derive(Debug, Clone, Copy)]
pub struct PollerSettings {
    pub interval: Duration,
    /// Only orders created this recently are polled
    pub window: Duration,
    /// Delay between individual fetches
    pub stagger: Duration,
}

/// Background driver for [`Reconciler`]
#[derive(Clone)]
pub struct ReconcilePoller {
    reconciler: Reconciler,
    store: OrderStore,
    ledger: LedgerService,
    settings: PollerSettings,
}

impl ReconcilePoller {
    pub fn new(
        reconciler: Reconciler,
        store: OrderStore,
        ledger: LedgerService,
        settings: PollerSettings,
    ) -> Self {
        Self {
            reconciler,
            store,
            ledger,
            settings,
        }
    }

    /// Run until `shutdown` is cancelled
    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!(
            interval_secs = self.settings.interval.as_secs(),
            window_hours = self.settings.window.as_secs() / 3600,
            "Reconcile poller started"
        );

        let mut interval = tokio::time::interval(self.settings.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Reconcile poller received shutdown signal");
                    break;
                }
                _ = interval.tick() => {
                    let reports = self.run_once().await;
                    log_summary(&reports);
                }
            }
        }
    }

    /// One sweep over all candidates
    pub async fn run_once(&self) -> Vec<ReconcileReport> {
        let candidates = match self.candidates() {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::error!(error = %e, "Failed to list sync candidates");
                return Vec::new();
            }
        };
        if candidates.is_empty() {
            return Vec::new();
        }

        let dispatch = self.reconciler.dispatch();
        let mut bulk: HashMap<String, ProviderOrderView> = match dispatch
            .list_active_orders()
            .await
        {
            Ok(views) => views
                .into_iter()
                .map(|v| (v.provider_order_id.clone(), v))
                .collect(),
            Err(e) => {
                tracing::warn!(error = %e, "Bulk order list failed, falling back to single fetches");
                HashMap::new()
            }
        };

        let carriers: HashMap<String, CarrierView> = match dispatch.list_carriers().await {
            Ok(list) => {
                tracing::debug!(carriers = list.len(), "Carrier roster loaded");
                list.into_iter().map(|c| (c.id.clone(), c)).collect()
            }
            Err(e) => {
                tracing::debug!(error = %e, "Carrier roster unavailable");
                HashMap::new()
            }
        };

        let mut reports = Vec::with_capacity(candidates.len());
        let mut fetched_individually = false;
        for order in &candidates {
            let Some(pid) = order.provider_order_id.as_deref() else {
                continue;
            };

            let prefetched = bulk.remove(pid).map(|view| enrich(view, &carriers));
            if prefetched.is_none() {
                if fetched_individually && !self.settings.stagger.is_zero() {
                    tokio::time::sleep(self.settings.stagger).await;
                }
                fetched_individually = true;
            }

            reports.push(self.reconciler.reconcile_order(order, prefetched).await);
        }
        reports
    }

    /// Dispatched orders in the window, minus delivered ones already settled
    fn candidates(&self) -> Result<Vec<shared::order::Order>, crate::db::StorageError> {
        let window_ms = i64::try_from(self.settings.window.as_millis()).unwrap_or(i64::MAX);
        let since = shared::util::now_millis().saturating_sub(window_ms);

        let orders = self.store.list_sync_candidates(since)?;
        Ok(orders
            .into_iter()
            .filter(|o| {
                !o.status.is_delivered() || !self.ledger.is_settled(&o.id).unwrap_or(false)
            })
            .collect())
    }
}

/// Fill in the carrier name from the roster when the order view lacks it
fn enrich(mut view: ProviderOrderView, carriers: &HashMap<String, CarrierView>) -> ProviderOrderView {
    if let Some(carrier) = view.carrier.as_mut()
        && carrier.name.is_none()
        && let Some(known) = carriers.get(&carrier.id)
    {
        carrier.name = Some(known.name.clone());
    }
    view
}

fn log_summary(reports: &[ReconcileReport]) {
    if reports.is_empty() {
        return;
    }

    let mut updated = 0;
    let mut failed = 0;
    let mut skipped = 0;
    for report in reports {
        match report.outcome {
            ReconcileOutcome::Updated { .. } => updated += 1,
            ReconcileOutcome::Failed { .. } => failed += 1,
            ReconcileOutcome::Skipped { .. } => skipped += 1,
            _ => {}
        }
    }
    let settled = reports.iter().filter(|r| r.settled).count();

    tracing::info!(
        polled = reports.len(),
        updated,
        failed,
        skipped,
        settled,
        "Reconcile sweep finished"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::dispatch::CarrierRef;
    use crate::testing::{FakeDispatch, FetchFailure, provider_view, sample_order};
    use rust_decimal_macros::dec;
    use shared::order::OrderStatus;
    use std::sync::Arc;

    struct Fixture {
        store: OrderStore,
        ledger: LedgerService,
        fake: Arc<FakeDispatch>,
        poller: ReconcilePoller,
    }

    fn fixture() -> Fixture {
        let db = Database::open_in_memory().unwrap();
        let store = OrderStore::new(db.clone());
        let ledger = LedgerService::new(db, dec!(500));
        let fake = Arc::new(FakeDispatch::new());
        let reconciler = Reconciler::new(store.clone(), ledger.clone(), fake.clone(), dec!(15));
        let poller = ReconcilePoller::new(
            reconciler,
            store.clone(),
            ledger.clone(),
            PollerSettings {
                interval: Duration::from_secs(120),
                window: Duration::from_secs(24 * 3600),
                stagger: Duration::ZERO,
            },
        );
        Fixture {
            store,
            ledger,
            fake,
            poller,
        }
    }

    fn insert_dispatched(f: &Fixture, id: &str, pid: &str) {
        let mut order = sample_order(id, "biz-1");
        order.provider_order_id = Some(pid.to_string());
        f.store.insert(&order).unwrap();
    }

    #[tokio::test]
    async fn test_sweep_uses_bulk_list() {
        let f = fixture();
        insert_dispatched(&f, "o1", "100");
        insert_dispatched(&f, "o2", "200");
        f.fake.set_status("100", "STARTED", None);
        f.fake.set_status("200", "PICKED_UP", None);

        let reports = f.poller.run_once().await;

        assert_eq!(reports.len(), 2);
        assert_eq!(f.fake.fetch_calls(), 0);
        assert_eq!(
            f.store.get("o2").unwrap().unwrap().status,
            OrderStatus::PickedUp
        );
    }

    #[tokio::test]
    async fn test_missing_from_bulk_falls_back_to_fetch() {
        let f = fixture();
        insert_dispatched(&f, "o1", "100");
        f.fake.fail_fetch("100", FetchFailure::Upstream(502));

        let reports = f.poller.run_once().await;

        assert_eq!(f.fake.fetch_calls(), 1);
        assert!(matches!(
            reports[0].outcome,
            ReconcileOutcome::Failed { ref kind, .. } if kind == "upstream"
        ));
    }

    #[tokio::test]
    async fn test_skips_undispatched_old_and_final_orders() {
        let f = fixture();
        // Not dispatched
        f.store.insert(&sample_order("o1", "biz-1")).unwrap();
        // Outside the window
        let mut old = sample_order("o2", "biz-1");
        old.provider_order_id = Some("200".into());
        old.created_at -= 48 * 3600 * 1000;
        f.store.insert(&old).unwrap();
        // Cancelled
        let mut cancelled = sample_order("o3", "biz-1");
        cancelled.provider_order_id = Some("300".into());
        cancelled.status = OrderStatus::Cancelled;
        f.store.insert(&cancelled).unwrap();

        let reports = f.poller.run_once().await;
        assert!(reports.is_empty());
    }

    #[tokio::test]
    async fn test_settled_delivered_orders_drop_out() {
        let f = fixture();
        f.ledger
            .register_driver("drv-1", Some("c-1"), None)
            .unwrap();
        insert_dispatched(&f, "o1", "100");
        let mut view = provider_view("100", "ALREADY_DELIVERED", None);
        view.carrier = Some(CarrierRef {
            id: "c-1".into(),
            name: None,
        });
        f.fake.put_order(view);
        f.fake.put_carrier(CarrierView {
            id: "c-1".into(),
            name: "Luis".into(),
            phone: None,
            is_on_shift: true,
            is_active: true,
        });

        let first = f.poller.run_once().await;
        assert_eq!(first.len(), 1);
        assert!(first[0].settled);
        assert_eq!(
            f.store.get("o1").unwrap().unwrap().carrier_name.as_deref(),
            Some("Luis")
        );

        let second = f.poller.run_once().await;
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let f = fixture();
        let token = CancellationToken::new();
        let handle = tokio::spawn(f.poller.clone().run(token.clone()));
        token.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
