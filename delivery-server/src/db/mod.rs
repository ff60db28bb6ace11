//! Embedded redb database shared by the order store and the ledger
//!
//! Each owning module declares its own tables and exposes a
//! `create_tables` hook; this module only opens the file, creates every
//! table once and hands out transactions to the owners.
//!
//! # Durability
//!
//! redb commits with `Durability::Immediate` by default: once `commit()`
//! returns the data is on disk, and the file is always left in a
//! consistent state (copy-on-write with an atomic root swap).
//!
//! # Concurrency
//!
//! redb serializes write transactions. Every read-modify-write in this
//! crate (account balance + ledger append, order diff + write) runs inside
//! a single write transaction and is therefore serializable.

use redb::{ReadTransaction, ReadableDatabase, WriteTransaction};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Handle to the embedded database (cheap to clone)
#[derive(Clone)]
pub struct Database {
    db: Arc<redb::Database>,
}

impl Database {
    /// Open or create the database file at `path`
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = redb::Database::create(path)?;
        Self::init(db)
    }

    /// Open an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = redb::Database::builder()
            .create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: redb::Database) -> StorageResult<Self> {
        let write_txn = db.begin_write()?;
        crate::orders::storage::create_tables(&write_txn)?;
        crate::ledger::create_tables(&write_txn)?;
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    pub(crate) fn begin_write(&self) -> StorageResult<WriteTransaction> {
        Ok(self.db.begin_write()?)
    }

    pub(crate) fn begin_read(&self) -> StorageResult<ReadTransaction> {
        Ok(self.db.begin_read()?)
    }
}
