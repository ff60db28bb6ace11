//! redb tables owned by the ledger
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `business_accounts` | `business_id` | `BusinessAccount` | Credit balances |
//! | `driver_wallets` | `driver_id` | `DriverWallet` | Wallets and cash debts |
//! | `carrier_index` | `carrier_id` | `driver_id` | Provider carrier to driver |
//! | `ledger_transactions` | `tx_id` | `LedgerTransaction` | Append-only log |
//! | `ledger_keys` | `"reference\|KIND"` | `tx_id` | Idempotency keys |
//! | `subject_transactions` | `(subject_id, tx_id)` | `()` | History per account |
//!
//! Nothing outside `crate::ledger` can name these tables.

use redb::{ReadableTable, TableDefinition, WriteTransaction};
use serde::Serialize;
use serde::de::DeserializeOwned;
use shared::ledger::{BusinessAccount, DriverWallet, LedgerTransaction};

use crate::db::{Database, StorageResult};

const BUSINESS_ACCOUNTS_TABLE: TableDefinition<&str, &[u8]> =
    TableDefinition::new("business_accounts");

const DRIVER_WALLETS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("driver_wallets");

const CARRIER_INDEX_TABLE: TableDefinition<&str, &str> = TableDefinition::new("carrier_index");

const TRANSACTIONS_TABLE: TableDefinition<i64, &[u8]> =
    TableDefinition::new("ledger_transactions");

const KEYS_TABLE: TableDefinition<&str, i64> = TableDefinition::new("ledger_keys");

const SUBJECT_TRANSACTIONS_TABLE: TableDefinition<(&str, i64), ()> =
    TableDefinition::new("subject_transactions");

pub(crate) fn create_tables(txn: &WriteTransaction) -> StorageResult<()> {
    let _ = txn.open_table(BUSINESS_ACCOUNTS_TABLE)?;
    let _ = txn.open_table(DRIVER_WALLETS_TABLE)?;
    let _ = txn.open_table(CARRIER_INDEX_TABLE)?;
    let _ = txn.open_table(TRANSACTIONS_TABLE)?;
    let _ = txn.open_table(KEYS_TABLE)?;
    let _ = txn.open_table(SUBJECT_TRANSACTIONS_TABLE)?;
    Ok(())
}

fn idempotency_key(reference: &str, kind: &str) -> String {
    format!("{reference}|{kind}")
}

fn get_json<V: DeserializeOwned>(
    table: &impl ReadableTable<&'static str, &'static [u8]>,
    key: &str,
) -> StorageResult<Option<V>> {
    let decoded = match table.get(key)? {
        Some(value) => Some(serde_json::from_slice(value.value())?),
        None => None,
    };
    Ok(decoded)
}

fn put_json<V: Serialize>(
    txn: &WriteTransaction,
    def: TableDefinition<'static, &'static str, &'static [u8]>,
    key: &str,
    value: &V,
) -> StorageResult<()> {
    let mut table = txn.open_table(def)?;
    let bytes = serde_json::to_vec(value)?;
    table.insert(key, bytes.as_slice())?;
    Ok(())
}

// ========== Accounts (write side) ==========

pub(super) fn business(txn: &WriteTransaction, id: &str) -> StorageResult<Option<BusinessAccount>> {
    let table = txn.open_table(BUSINESS_ACCOUNTS_TABLE)?;
    get_json(&table, id)
}

pub(super) fn put_business(txn: &WriteTransaction, account: &BusinessAccount) -> StorageResult<()> {
    put_json(txn, BUSINESS_ACCOUNTS_TABLE, &account.business_id, account)
}

pub(super) fn wallet(txn: &WriteTransaction, id: &str) -> StorageResult<Option<DriverWallet>> {
    let table = txn.open_table(DRIVER_WALLETS_TABLE)?;
    get_json(&table, id)
}

pub(super) fn put_wallet(txn: &WriteTransaction, wallet: &DriverWallet) -> StorageResult<()> {
    put_json(txn, DRIVER_WALLETS_TABLE, &wallet.driver_id, wallet)
}

pub(super) fn unlink_carrier(txn: &WriteTransaction, carrier_id: &str) -> StorageResult<()> {
    let mut table = txn.open_table(CARRIER_INDEX_TABLE)?;
    table.remove(carrier_id)?;
    Ok(())
}

pub(super) fn link_carrier(
    txn: &WriteTransaction,
    carrier_id: &str,
    driver_id: &str,
) -> StorageResult<()> {
    let mut table = txn.open_table(CARRIER_INDEX_TABLE)?;
    table.insert(carrier_id, driver_id)?;
    Ok(())
}

// ========== Transactions (write side) ==========

/// Transaction already recorded under `(reference, kind)`, if any
pub(super) fn find_by_key(
    txn: &WriteTransaction,
    reference: &str,
    kind: &str,
) -> StorageResult<Option<LedgerTransaction>> {
    let key = idempotency_key(reference, kind);
    let tx_id = {
        let keys = txn.open_table(KEYS_TABLE)?;
        let found = keys.get(key.as_str())?.map(|guard| guard.value());
        found
    };

    match tx_id {
        Some(id) => {
            let table = txn.open_table(TRANSACTIONS_TABLE)?;
            let tx = match table.get(id)? {
                Some(value) => Some(serde_json::from_slice(value.value())?),
                None => None,
            };
            Ok(tx)
        }
        None => Ok(None),
    }
}

/// Next transaction id: a snowflake, bumped past the last id so that ids
/// grow strictly in commit order
pub(super) fn next_transaction_id(txn: &WriteTransaction) -> StorageResult<i64> {
    let table = txn.open_table(TRANSACTIONS_TABLE)?;
    let last = table.last()?.map(|(key, _)| key.value());
    let id = shared::util::snowflake_id();
    Ok(match last {
        Some(last) if last >= id => last + 1,
        _ => id,
    })
}

/// Append a transaction together with its idempotency key and history entry
pub(super) fn append(
    txn: &WriteTransaction,
    tx: &LedgerTransaction,
    reference: &str,
) -> StorageResult<()> {
    {
        let mut table = txn.open_table(TRANSACTIONS_TABLE)?;
        let bytes = serde_json::to_vec(tx)?;
        table.insert(tx.id, bytes.as_slice())?;
    }
    {
        let mut keys = txn.open_table(KEYS_TABLE)?;
        let key = idempotency_key(reference, tx.tx_type.idempotency_kind());
        keys.insert(key.as_str(), tx.id)?;
    }
    {
        let mut history = txn.open_table(SUBJECT_TRANSACTIONS_TABLE)?;
        history.insert((tx.subject_id.as_str(), tx.id), ())?;
    }
    Ok(())
}

// ========== Read side ==========

pub(super) fn read_business(db: &Database, id: &str) -> StorageResult<Option<BusinessAccount>> {
    let read_txn = db.begin_read()?;
    let table = read_txn.open_table(BUSINESS_ACCOUNTS_TABLE)?;
    get_json(&table, id)
}

pub(super) fn read_wallet(db: &Database, id: &str) -> StorageResult<Option<DriverWallet>> {
    let read_txn = db.begin_read()?;
    let table = read_txn.open_table(DRIVER_WALLETS_TABLE)?;
    get_json(&table, id)
}

pub(super) fn read_driver_for_carrier(
    db: &Database,
    carrier_id: &str,
) -> StorageResult<Option<String>> {
    let read_txn = db.begin_read()?;
    let table = read_txn.open_table(CARRIER_INDEX_TABLE)?;
    let driver_id = table.get(carrier_id)?.map(|guard| guard.value().to_string());
    Ok(driver_id)
}

pub(super) fn read_key_exists(
    db: &Database,
    reference: &str,
    kind: &str,
) -> StorageResult<bool> {
    let read_txn = db.begin_read()?;
    let keys = read_txn.open_table(KEYS_TABLE)?;
    let key = idempotency_key(reference, kind);
    let exists = keys.get(key.as_str())?.is_some();
    Ok(exists)
}

/// Newest-first history of one account
pub(super) fn read_transactions_for(
    db: &Database,
    subject_id: &str,
    limit: usize,
) -> StorageResult<Vec<LedgerTransaction>> {
    let read_txn = db.begin_read()?;
    let history = read_txn.open_table(SUBJECT_TRANSACTIONS_TABLE)?;
    let table = read_txn.open_table(TRANSACTIONS_TABLE)?;

    let mut transactions = Vec::new();
    for result in history
        .range((subject_id, i64::MIN)..=(subject_id, i64::MAX))?
        .rev()
    {
        if transactions.len() >= limit {
            break;
        }
        let (key, _) = result?;
        let (_, tx_id) = key.value();
        if let Some(value) = table.get(tx_id)? {
            transactions.push(serde_json::from_slice(value.value())?);
        }
    }

    Ok(transactions)
}
