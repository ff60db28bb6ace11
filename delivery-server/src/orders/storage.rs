//! redb-backed order store
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `orders` | `order_id` | `Order` | Store of record |
//! | `provider_index` | provider id, canonical form | `order_id` | Lookup by provider id |
//! | `order_numbers` | `order_number` | `order_id` | Lookup by order number |
//!
//! Orders are never deleted. Reads are public; writes are restricted to the
//! `orders` module so that only reconciliation and the creation flow touch
//! status, provider status and tracking fields.

use redb::{ReadableTable, TableDefinition, WriteTransaction};
use shared::order::Order;

use crate::db::{Database, StorageResult};

/// key = order_id, value = JSON-serialized Order
const ORDERS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("orders");

/// key = provider order id in [`index_key`] form, value = order_id
const PROVIDER_INDEX_TABLE: TableDefinition<&str, &str> = TableDefinition::new("provider_index");

/// key = order number, value = order_id
const ORDER_NUMBERS_TABLE: TableDefinition<&str, &str> = TableDefinition::new("order_numbers");

pub(crate) fn create_tables(txn: &WriteTransaction) -> StorageResult<()> {
    let _ = txn.open_table(ORDERS_TABLE)?;
    let _ = txn.open_table(PROVIDER_INDEX_TABLE)?;
    let _ = txn.open_table(ORDER_NUMBERS_TABLE)?;
    Ok(())
}

/// Canonical integer form of a numeric id (`"00123"`, `"123.0"` -> `"123"`)
fn numeric_form(id: &str) -> Option<String> {
    let trimmed = id.trim();
    if let Ok(n) = trimmed.parse::<i64>() {
        return Some(n.to_string());
    }
    match trimmed.parse::<f64>() {
        Ok(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15 => {
            Some((f as i64).to_string())
        }
        _ => None,
    }
}

/// Provider index key: numeric ids in canonical form, others trimmed
fn index_key(provider_order_id: &str) -> String {
    numeric_form(provider_order_id).unwrap_or_else(|| provider_order_id.trim().to_string())
}

/// Result of [`OrderStore::attach_provider_id`]
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum AttachOutcome {
    Attached(Order),
    /// Same id already attached; nothing written
    AlreadyAttached(Order),
    /// A different provider id is already attached; nothing written
    Conflict { existing: String },
    NotFound,
}

/// Order store backed by redb
#[derive(Clone)]
pub struct OrderStore {
    db: Database,
}

impl OrderStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    // ========== Reads ==========

    pub fn get(&self, order_id: &str) -> StorageResult<Option<Order>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDERS_TABLE)?;

        let order = match table.get(order_id)? {
            Some(value) => Some(serde_json::from_slice(value.value())?),
            None => None,
        };
        Ok(order)
    }

    pub fn find_by_order_number(&self, order_number: &str) -> StorageResult<Option<Order>> {
        let order_id = {
            let read_txn = self.db.begin_read()?;
            let index = read_txn.open_table(ORDER_NUMBERS_TABLE)?;
            let found = index
                .get(order_number.trim())?
                .map(|guard| guard.value().to_string());
            found
        };

        match order_id {
            Some(id) => self.get(&id),
            None => Ok(None),
        }
    }

    /// Find an order by provider id
    ///
    /// Numeric ids match in any spelling: `"123"`, `"123.0"` and `"00123"`
    /// share one index key.
    pub fn find_by_provider_id(&self, provider_order_id: &str) -> StorageResult<Option<Order>> {
        let order_id = {
            let read_txn = self.db.begin_read()?;
            let index = read_txn.open_table(PROVIDER_INDEX_TABLE)?;
            let found = index
                .get(index_key(provider_order_id).as_str())?
                .map(|guard| guard.value().to_string());
            found
        };

        match order_id {
            Some(id) => self.get(&id),
            None => Ok(None),
        }
    }

    /// Orders the poller should look at: dispatched to the provider, created
    /// at or after `created_since`, and either still open or delivered (the
    /// caller filters out delivered orders that are already settled)
    pub fn list_sync_candidates(&self, created_since: i64) -> StorageResult<Vec<Order>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDERS_TABLE)?;

        let mut orders = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            let order: Order = serde_json::from_slice(value.value())?;
            let open_or_delivered = !order.status.is_final() || order.status.is_delivered();
            if order.provider_order_id.is_some()
                && order.created_at >= created_since
                && open_or_delivered
            {
                orders.push(order);
            }
        }

        orders.sort_by_key(|o| o.created_at);
        Ok(orders)
    }

    /// Orders of one business, newest first
    pub fn list_for_business(&self, business_id: &str) -> StorageResult<Vec<Order>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDERS_TABLE)?;

        let mut orders = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            let order: Order = serde_json::from_slice(value.value())?;
            if order.business_id == business_id {
                orders.push(order);
            }
        }

        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    // ========== Writes (orders module only) ==========

    fn read_in(txn: &WriteTransaction, order_id: &str) -> StorageResult<Option<Order>> {
        let table = txn.open_table(ORDERS_TABLE)?;
        let order = match table.get(order_id)? {
            Some(value) => Some(serde_json::from_slice(value.value())?),
            None => None,
        };
        Ok(order)
    }

    fn write_in(txn: &WriteTransaction, order: &Order) -> StorageResult<()> {
        let mut table = txn.open_table(ORDERS_TABLE)?;
        let value = serde_json::to_vec(order)?;
        table.insert(order.id.as_str(), value.as_slice())?;
        Ok(())
    }

    /// Insert a new order and its lookup indexes
    pub(super) fn insert(&self, order: &Order) -> StorageResult<()> {
        let txn = self.db.begin_write()?;
        Self::write_in(&txn, order)?;
        {
            let mut numbers = txn.open_table(ORDER_NUMBERS_TABLE)?;
            numbers.insert(order.order_number.as_str(), order.id.as_str())?;
        }
        if let Some(pid) = order.provider_order_id.as_deref() {
            let mut index = txn.open_table(PROVIDER_INDEX_TABLE)?;
            index.insert(index_key(pid).as_str(), order.id.as_str())?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Read, mutate and write one order inside a single write transaction
    ///
    /// The closure sees the latest committed state, so concurrent callers
    /// never overwrite each other's changes. Returns `None` when the order
    /// does not exist.
    pub(super) fn update_with<T>(
        &self,
        order_id: &str,
        f: impl FnOnce(&mut Order) -> T,
    ) -> StorageResult<Option<(Order, T)>> {
        let txn = self.db.begin_write()?;
        let Some(mut order) = Self::read_in(&txn, order_id)? else {
            return Ok(None);
        };

        let result = f(&mut order);
        Self::write_in(&txn, &order)?;
        txn.commit()?;
        Ok(Some((order, result)))
    }

    /// Attach the provider's identifiers to a local order
    ///
    /// The provider id is set at most once and never reassigned.
    pub(super) fn attach_provider_id(
        &self,
        order_id: &str,
        provider_order_id: &str,
        provider_order_number: Option<&str>,
        tracking_link: Option<&str>,
    ) -> StorageResult<AttachOutcome> {
        let txn = self.db.begin_write()?;
        let Some(mut order) = Self::read_in(&txn, order_id)? else {
            return Ok(AttachOutcome::NotFound);
        };

        match order.provider_order_id.as_deref() {
            Some(existing) if existing == provider_order_id => {
                return Ok(AttachOutcome::AlreadyAttached(order));
            }
            Some(existing) => {
                return Ok(AttachOutcome::Conflict {
                    existing: existing.to_string(),
                });
            }
            None => {}
        }

        order.provider_order_id = Some(provider_order_id.to_string());
        if order.provider_order_number.is_none() {
            order.provider_order_number = provider_order_number.map(str::to_string);
        }
        if let Some(link) = tracking_link.filter(|l| !l.is_empty()) {
            order.tracking_link = Some(link.to_string());
        }
        order.last_sync_at = Some(shared::util::now_millis());

        Self::write_in(&txn, &order)?;
        {
            let mut index = txn.open_table(PROVIDER_INDEX_TABLE)?;
            index.insert(index_key(provider_order_id).as_str(), order.id.as_str())?;
        }
        txn.commit()?;

        Ok(AttachOutcome::Attached(order))
    }
}
