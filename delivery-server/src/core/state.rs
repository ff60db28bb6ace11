use std::sync::Arc;

use crate::core::{BackgroundTasks, Config, Result, TaskKind};
use crate::db::Database;
use crate::dispatch::{DispatchProvider, ShipdayClient};
use crate::ledger::LedgerService;
use crate::orders::{OrderService, OrderStore, PollerSettings, ReconcilePoller, Reconciler};

/// Service singletons shared by the HTTP handlers and background tasks
///
/// Cloning is cheap: every field is a handle.
///
/// | Field | Role |
/// |-------|------|
/// | config | Immutable configuration |
/// | db | redb database |
/// | ledger | Owner of every balance |
/// | orders | Creation saga and lookups |
/// | reconciler | Provider to local sync |
/// | poller | Periodic reconcile sweep |
#[derive(Clone)]
pub struct ServerState {
    pub config: Config,
    pub db: Database,
    pub ledger: LedgerService,
    pub orders: OrderService,
    pub reconciler: Reconciler,
    pub poller: ReconcilePoller,
}

impl ServerState {
    /// Open the database and build the production dispatch client
    pub async fn initialize(config: &Config) -> Result<Self> {
        std::fs::create_dir_all(&config.work_dir)?;
        let db = Database::open(config.database_path())?;

        let client = ShipdayClient::new(
            config.dispatch_base_url.clone(),
            config.dispatch_api_key.clone(),
            config.dispatch_timeout,
        )?;

        tracing::info!(
            work_dir = %config.work_dir.display(),
            dispatch = %config.dispatch_base_url,
            "Server state initialized"
        );
        Ok(Self::with_dispatch(config.clone(), db, Arc::new(client)))
    }

    /// Wire the services around an existing database and provider
    pub fn with_dispatch(
        config: Config,
        db: Database,
        dispatch: Arc<dyn DispatchProvider>,
    ) -> Self {
        let store = OrderStore::new(db.clone());
        let ledger = LedgerService::new(db.clone(), config.default_driver_debt_limit);
        let orders = OrderService::new(
            store.clone(),
            ledger.clone(),
            dispatch.clone(),
            config.order_credit_cost,
        );
        let reconciler = Reconciler::new(
            store.clone(),
            ledger.clone(),
            dispatch,
            config.platform_service_fee,
        );
        let poller = ReconcilePoller::new(
            reconciler.clone(),
            store,
            ledger.clone(),
            PollerSettings {
                interval: config.poll_interval,
                window: config.poll_window,
                stagger: config.poll_stagger,
            },
        );

        Self {
            config,
            db,
            ledger,
            orders,
            reconciler,
            poller,
        }
    }

    /// Register the long-running workers
    pub fn start_background_tasks(&self, tasks: &mut BackgroundTasks) {
        let poller = self.poller.clone();
        let token = tasks.shutdown_token();
        tasks.spawn("reconcile_poller", TaskKind::Periodic, async move {
            poller.run(token).await;
        });

        let mut events = self.reconciler.subscribe();
        let token = tasks.shutdown_token();
        tasks.spawn("order_sync_log", TaskKind::Listener, async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    event = events.recv() => match event {
                        Ok(event) => tracing::debug!(
                            order_id = %event.order_id,
                            from = %event.previous_status,
                            to = %event.status,
                            "Order sync event"
                        ),
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!(skipped = n, "Order sync listener lagged");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        });

        tasks.log_summary();
    }
}
