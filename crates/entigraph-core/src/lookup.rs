//! # Lookup Engine
//!
//! Reconstructs, for one entity, the latest snapshot and the full change
//! history in every dataset it appears in.
//!
//! ## Algorithm
//!
//! 1. Open one read snapshot for the whole call.
//! 2. Normalise the identifier to a curie and resolve its internal id.
//! 3. Resolve the dataset-name filter to a [`DatasetScope`].
//! 4. Scan the locator index over the entity prefix in key order. Entries
//!    arrive grouped by dataset, versions ascending, so the value held when
//!    the dataset id changes is that dataset's latest. Only one pending
//!    record is buffered regardless of how many versions exist.
//! 5. For each surviving dataset, scan its change log prefix oldest first.
//!
//! ## Failure Policy
//!
//! Identifier errors abort before any scan. A stored document that fails to
//! decode aborts the whole call with `Corrupt`: partial entity state is never
//! returned. A dataset id without a registered name, or whose stored name is
//! reserved (empty or all digits), does not abort; it is reported as
//! [`DatasetDetails::Inconsistent`] under its numeric id.

use crate::keys::{self, ChangeKey, ENTITY_CHANGES, ENTITY_LOCATOR, IndexKey, LocatorKey};
use crate::namespace::NamespaceResolver;
use crate::registry::{DatasetScope, Registry, is_reserved_dataset_name};
use crate::{
    DatasetDetails, EntigraphError, EntityDetails, EntityDocument, InternalDatasetId, InternalId,
    Store,
};
use redb::{ReadOnlyTable, ReadTransaction};
use serde::Serialize;
use std::collections::BTreeMap;

/// Decode a stored snapshot document, naming the key on failure.
fn decode_document(key: &[u8], bytes: &[u8]) -> Result<EntityDocument, EntigraphError> {
    serde_json::from_slice(bytes).map_err(|e| EntigraphError::Corrupt {
        key: keys::key_hex(key),
        reason: e.to_string(),
    })
}

/// What an encoded index key (as named by a `Corrupt` error) points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyDescription {
    pub family: &'static str,
    pub entity: InternalId,
    /// `None` when the registry has no curie for `entity`.
    pub curie: Option<String>,
    pub dataset: InternalDatasetId,
    pub dataset_name: Option<String>,
    /// Version (locator) or sequence number (change log).
    pub position: u64,
    /// Whether the key currently has a stored value.
    pub present: bool,
}

/// Entity version lookups over a [`Store`].
#[derive(Debug, Clone, Copy)]
pub struct Lookup<'s> {
    store: &'s Store,
}

impl<'s> Lookup<'s> {
    #[must_use]
    pub const fn new(store: &'s Store) -> Self {
        Self { store }
    }

    /// Per-dataset latest snapshot and change history for `entity_id`.
    ///
    /// `entity_id` may be a curie or an expanded URI. An empty
    /// `dataset_names` means every non-deleted dataset; otherwise unknown
    /// names are ignored and only the named datasets are considered.
    ///
    /// The whole call reads from one snapshot, which is discarded on return.
    pub fn details<S: AsRef<str>>(
        &self,
        entity_id: &str,
        dataset_names: &[S],
    ) -> Result<EntityDetails, EntigraphError> {
        let txn = self.store.begin_read()?;
        Self::details_at(&txn, entity_id, dataset_names)
    }

    /// [`Lookup::details`] against a snapshot the caller already holds.
    pub fn details_at<S: AsRef<str>>(
        txn: &ReadTransaction,
        entity_id: &str,
        dataset_names: &[S],
    ) -> Result<EntityDetails, EntigraphError> {
        let curie = NamespaceResolver::open(txn)?.as_curie(entity_id)?;
        let registry = Registry::open(txn)?;
        let entity = registry.resolve_entity(&curie)?;
        let scope = registry.scope(dataset_names)?;

        tracing::debug!(%curie, %entity, ?scope, "loading entity details");

        let latest = Self::latest_per_dataset(txn, &registry, entity, &scope)?;
        let changes_table = txn.open_table(ENTITY_CHANGES)?;

        let mut result = BTreeMap::new();
        for (dataset, (locator_key, bytes)) in latest {
            // Placeholders live under the numeric id, a key no usable name
            // can take, so neither kind of entry can displace the other.
            let name = match registry.dataset_name(dataset)? {
                Some(name) if !is_reserved_dataset_name(&name) => name,
                stored => {
                    tracing::warn!(
                        %entity,
                        %dataset,
                        name = stored.as_deref(),
                        "dataset present in locator index has no usable name"
                    );
                    result.insert(dataset.to_string(), DatasetDetails::inconsistent(dataset));
                    continue;
                }
            };

            let latest = decode_document(&locator_key.encode(), &bytes)?;
            let changes = Self::load_changes(&changes_table, entity, dataset)?;
            result.insert(name, DatasetDetails::Found { latest, changes });
        }

        Ok(result)
    }

    /// Resolve a hex-encoded index key back to registry names.
    pub fn describe_key(&self, hex: &str) -> Result<KeyDescription, EntigraphError> {
        let key = IndexKey::decode(&keys::parse_key_hex(hex)?)?;
        let txn = self.store.begin_read()?;
        let registry = Registry::open(&txn)?;

        let present = match key {
            IndexKey::Locator(key) => txn
                .open_table(ENTITY_LOCATOR)?
                .get(key.as_tuple())?
                .is_some(),
            IndexKey::Change(key) => txn
                .open_table(ENTITY_CHANGES)?
                .get(key.as_tuple())?
                .is_some(),
        };

        Ok(KeyDescription {
            family: key.family(),
            entity: key.entity(),
            curie: registry.entity_curie(key.entity())?,
            dataset: key.dataset(),
            dataset_name: registry.dataset_name(key.dataset())?,
            position: key.position(),
            present,
        })
    }

    /// Single forward pass over the entity's locator prefix.
    ///
    /// Returns the raw bytes of the last surviving entry of every dataset
    /// that is in scope and not tombstoned, keyed by dataset id.
    fn latest_per_dataset(
        txn: &ReadTransaction,
        registry: &Registry,
        entity: InternalId,
        scope: &DatasetScope,
    ) -> Result<BTreeMap<InternalDatasetId, (LocatorKey, Vec<u8>)>, EntigraphError> {
        let locator = txn.open_table(ENTITY_LOCATOR)?;

        let mut committed = BTreeMap::new();
        let mut pending: Option<(LocatorKey, Vec<u8>)> = None;
        // Eligibility of the dataset group currently being scanned.
        let mut verdict: Option<(InternalDatasetId, bool)> = None;

        for entry in locator.range(keys::entity_locator_range(entity))? {
            let (key, value) = entry?;
            let key = LocatorKey::from(key.value());

            let eligible = match verdict {
                Some((dataset, eligible)) if dataset == key.dataset => eligible,
                _ => {
                    let eligible =
                        scope.admits(key.dataset) && !registry.is_dataset_deleted(key.dataset)?;
                    verdict = Some((key.dataset, eligible));
                    eligible
                }
            };
            if !eligible {
                continue;
            }

            if let Some((previous, bytes)) = pending.take() {
                if previous.dataset != key.dataset {
                    committed.insert(previous.dataset, (previous, bytes));
                }
            }
            pending = Some((key, value.value().to_vec()));
        }

        if let Some((last, bytes)) = pending {
            committed.insert(last.dataset, (last, bytes));
        }

        Ok(committed)
    }

    /// Full history of `entity` within `dataset`, oldest first.
    fn load_changes(
        changes: &ReadOnlyTable<(u32, u64, u64), &'static [u8]>,
        entity: InternalId,
        dataset: InternalDatasetId,
    ) -> Result<Vec<EntityDocument>, EntigraphError> {
        let mut result = Vec::new();
        for entry in changes.range(keys::entity_changes_range(dataset, entity))? {
            let (key, value) = entry?;
            let key = ChangeKey::from(key.value());
            result.push(decode_document(&key.encode(), value.value())?);
        }
        Ok(result)
    }
}
