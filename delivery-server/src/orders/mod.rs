//! Local orders: storage, creation and reconciliation
//!
//! - [`storage`]: redb tables and lookups
//! - [`service`]: creation saga, tracking, refunds
//! - [`reconcile`]: pull provider state into local orders
//! - [`poller`]: periodic reconcile sweep
//!
//! Only this module writes order status and tracking fields.

pub mod poller;
pub mod reconcile;
pub mod service;
pub mod storage;

pub use poller::{PollerSettings, ReconcilePoller};
pub use reconcile::{OrderSyncEvent, ReconcileOutcome, ReconcileReport, Reconciler};
pub use service::{OrderError, OrderResult, OrderService};
pub use storage::OrderStore;
