//! # Internal Identifier Registry
//!
//! Read-only resolution of entity curies and dataset names to the dense
//! integer ids used inside index keys, plus the dataset tombstone check.
//!
//! Every lookup runs against the tables of the caller's read transaction, so
//! identifier resolution and the index scans that follow see the same
//! snapshot. Assignment of new ids belongs to the write path
//! (see [`crate::fixtures`]).

use crate::keys::{DATASET_IDS, DATASETS, ENTITY_CURIES, ENTITY_IDS};
use crate::{DatasetRecord, EntigraphError, InternalDatasetId, InternalId};
use redb::{ReadOnlyTable, ReadTransaction, ReadableTable};
use std::collections::BTreeSet;

// =============================================================================
// DATASET SCOPE
// =============================================================================

/// The set of datasets a lookup is restricted to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DatasetScope {
    /// No filter was given: every non-deleted dataset is in scope.
    #[default]
    Unrestricted,
    /// Only these datasets. An empty set admits nothing.
    Only(BTreeSet<InternalDatasetId>),
}

impl DatasetScope {
    /// Whether `dataset` passes the scope filter.
    #[must_use]
    pub fn admits(&self, dataset: InternalDatasetId) -> bool {
        match self {
            Self::Unrestricted => true,
            Self::Only(ids) => ids.contains(&dataset),
        }
    }
}

/// Whether `name` cannot be used as a dataset name.
///
/// Empty and all-digit names are reserved: lookups key the entry of a
/// dataset that has no usable name by its numeric id.
#[must_use]
pub fn is_reserved_dataset_name(name: &str) -> bool {
    name.bytes().all(|b| b.is_ascii_digit())
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Identifier lookups bound to one read snapshot.
pub struct Registry {
    entity_ids: ReadOnlyTable<&'static str, u64>,
    entity_curies: ReadOnlyTable<u64, &'static str>,
    dataset_ids: ReadOnlyTable<&'static str, u32>,
    datasets: ReadOnlyTable<u32, &'static [u8]>,
}

impl Registry {
    /// Open the registry tables in `txn`.
    pub fn open(txn: &ReadTransaction) -> Result<Self, EntigraphError> {
        Ok(Self {
            entity_ids: txn.open_table(ENTITY_IDS)?,
            entity_curies: txn.open_table(ENTITY_CURIES)?,
            dataset_ids: txn.open_table(DATASET_IDS)?,
            datasets: txn.open_table(DATASETS)?,
        })
    }

    /// Resolve a curie to its internal id.
    ///
    /// Fails with `NotFound` if the curie has never been assigned.
    pub fn resolve_entity(&self, curie: &str) -> Result<InternalId, EntigraphError> {
        self.entity_ids
            .get(curie)?
            .map(|v| InternalId(v.value()))
            .ok_or_else(|| EntigraphError::NotFound(curie.to_string()))
    }

    /// The curie assigned to `id`, if any.
    pub fn entity_curie(&self, id: InternalId) -> Result<Option<String>, EntigraphError> {
        Ok(self.entity_curies.get(id.0)?.map(|v| v.value().to_string()))
    }

    /// Resolve dataset names to ids.
    ///
    /// Names that are not registered are dropped without error. A caller
    /// that passed a non-empty list and gets back an empty set must treat it
    /// as "nothing in scope".
    pub fn resolve_datasets_by_name<S: AsRef<str>>(
        &self,
        names: &[S],
    ) -> Result<BTreeSet<InternalDatasetId>, EntigraphError> {
        let mut ids = BTreeSet::new();
        for name in names {
            if let Some(id) = self.dataset_ids.get(name.as_ref())? {
                ids.insert(InternalDatasetId(id.value()));
            }
        }
        Ok(ids)
    }

    /// Build the lookup scope for a dataset-name filter.
    pub fn scope<S: AsRef<str>>(&self, names: &[S]) -> Result<DatasetScope, EntigraphError> {
        if names.is_empty() {
            return Ok(DatasetScope::Unrestricted);
        }
        Ok(DatasetScope::Only(self.resolve_datasets_by_name(names)?))
    }

    /// The registry record for `id`, if any.
    pub fn dataset(&self, id: InternalDatasetId) -> Result<Option<DatasetRecord>, EntigraphError> {
        match self.datasets.get(id.0)? {
            Some(data) => Ok(Some(postcard::from_bytes(data.value()).map_err(|e| {
                EntigraphError::Corrupt {
                    key: format!("dataset:{}", id),
                    reason: e.to_string(),
                }
            })?)),
            None => Ok(None),
        }
    }

    /// Whether garbage collection has tombstoned `id`.
    ///
    /// An unregistered id is not deleted; it surfaces later as an
    /// inconsistent entry instead of vanishing.
    pub fn is_dataset_deleted(&self, id: InternalDatasetId) -> Result<bool, EntigraphError> {
        Ok(self.dataset(id)?.is_some_and(|record| record.deleted))
    }

    /// The name registered for `id`, if any.
    pub fn dataset_name(&self, id: InternalDatasetId) -> Result<Option<String>, EntigraphError> {
        Ok(self.dataset(id)?.map(|record| record.name))
    }

    /// Every registered dataset with its id, in id order.
    pub fn datasets(&self) -> Result<Vec<(InternalDatasetId, DatasetRecord)>, EntigraphError> {
        let mut result = Vec::new();
        for entry in self.datasets.iter()? {
            let (key, data) = entry?;
            let id = InternalDatasetId(key.value());
            let record: DatasetRecord =
                postcard::from_bytes(data.value()).map_err(|e| EntigraphError::Corrupt {
                    key: format!("dataset:{}", id),
                    reason: e.to_string(),
                })?;
            result.push((id, record));
        }
        Ok(result)
    }
}
