//! # redb-backed Store
//!
//! Owns the redb database that holds both index families and the registry
//! tables.
//!
//! redb provides the substrate the lookup engine depends on:
//! - ordered tuple keys with forward range iteration
//! - MVCC: any number of read snapshots concurrently with one writer
//! - copy-on-write B-trees, so a snapshot never observes later commits
//!
//! The store itself holds no mutable state. Every read goes through a
//! [`ReadTransaction`] obtained from [`Store::begin_read`] and threaded
//! explicitly through the resolver, the registry and the scans.

use crate::EntigraphError;
use crate::keys::{
    DATASET_IDS, DATASETS, ENTITY_CHANGES, ENTITY_CURIES, ENTITY_IDS, ENTITY_LOCATOR, METADATA,
    NAMESPACE_STEMS, NAMESPACES,
};
use redb::{Database, ReadTransaction, ReadableDatabase, ReadableTableMetadata};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Row counts of the store's tables, as seen by one snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub entities: u64,
    pub datasets: u64,
    pub namespaces: u64,
    pub locator_entries: u64,
    pub change_entries: u64,
}

/// The versioned entity store.
pub struct Store {
    db: Database,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

impl Store {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, EntigraphError> {
        let db = Database::create(path.as_ref())?;
        Self::init(db)
    }

    /// Create a volatile store backed by memory. Used by tests and demos.
    pub fn in_memory() -> Result<Self, EntigraphError> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    /// Create every table so read transactions never see a missing table.
    fn init(db: Database) -> Result<Self, EntigraphError> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(ENTITY_LOCATOR)?;
            let _ = write_txn.open_table(ENTITY_CHANGES)?;
            let _ = write_txn.open_table(ENTITY_IDS)?;
            let _ = write_txn.open_table(ENTITY_CURIES)?;
            let _ = write_txn.open_table(DATASET_IDS)?;
            let _ = write_txn.open_table(DATASETS)?;
            let _ = write_txn.open_table(NAMESPACES)?;
            let _ = write_txn.open_table(NAMESPACE_STEMS)?;
            let _ = write_txn.open_table(METADATA)?;
        }
        write_txn.commit()?;

        tracing::debug!("store tables initialised");
        Ok(Self { db })
    }

    /// Open a read-only snapshot transaction.
    ///
    /// The snapshot is fixed at this call. Dropping the transaction discards
    /// it; it is never committed.
    pub fn begin_read(&self) -> Result<ReadTransaction, EntigraphError> {
        Ok(self.db.begin_read()?)
    }

    /// The underlying database, for the fixture loader's write transactions.
    pub(crate) fn database(&self) -> &Database {
        &self.db
    }

    /// Compact the database file.
    pub fn compact(&mut self) -> Result<(), EntigraphError> {
        self.db
            .compact()
            .map_err(|e| EntigraphError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Table row counts from a fresh snapshot.
    pub fn stats(&self) -> Result<StoreStats, EntigraphError> {
        let txn = self.begin_read()?;
        Ok(StoreStats {
            entities: txn.open_table(ENTITY_IDS)?.len()?,
            datasets: txn.open_table(DATASETS)?.len()?,
            namespaces: txn.open_table(NAMESPACES)?.len()?,
            locator_entries: txn.open_table(ENTITY_LOCATOR)?.len()?,
            change_entries: txn.open_table(ENTITY_CHANGES)?.len()?,
        })
    }
}
