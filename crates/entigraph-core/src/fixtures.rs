//! # Fixture Loader
//!
//! An append-only writer that seeds a store with already-formed snapshot
//! documents. It keeps the key-space invariants the lookup engine reads:
//!
//! - internal ids are dense, start at 1 and are never reused
//! - every append writes the locator entry and the change log entry in the
//!   same transaction, so the locator's last entry for `(entity, dataset)`
//!   always equals the change log's last entry
//! - versions and sequence numbers grow by one per `(entity, dataset)`
//!
//! This is not an ingestion pipeline: it performs no diffing, deduplication
//! or batching policy. Nothing is visible to readers until [`FixtureWriter::commit`].

use crate::keys::{
    self, ChangeKey, DATASET_IDS, DATASETS, ENTITY_CHANGES, ENTITY_CURIES, ENTITY_IDS,
    ENTITY_LOCATOR, LocatorKey, METADATA, NAMESPACE_STEMS, NAMESPACES,
};
use crate::namespace::{is_expanded, split_curie, split_uri};
use crate::registry::is_reserved_dataset_name;
use crate::{
    DatasetRecord, EntigraphError, EntityDocument, InternalDatasetId, InternalId, Namespace, Store,
};
use redb::{ReadableTable, WriteTransaction};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// FIXTURE FILE
// =============================================================================

/// A fixture document: namespaces, per-dataset version sequences, tombstones.
///
/// Versions within a dataset are appended in file order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub namespaces: BTreeMap<String, String>,
    #[serde(default)]
    pub datasets: BTreeMap<String, Vec<EntityDocument>>,
    #[serde(default)]
    pub deleted: Vec<String>,
}

/// Summary of a fixture load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub namespaces: usize,
    pub versions: usize,
    pub tombstones: usize,
}

/// Load `fixture` into `store` in a single write transaction.
pub fn load_fixture(store: &Store, fixture: &Fixture) -> Result<LoadReport, EntigraphError> {
    let mut writer = FixtureWriter::new(store)?;
    let mut report = LoadReport::default();

    for (prefix, expansion) in &fixture.namespaces {
        writer.register_namespace(prefix, expansion)?;
        report.namespaces += 1;
    }
    for (dataset, versions) in &fixture.datasets {
        for doc in versions {
            writer.append(dataset, doc.clone())?;
            report.versions += 1;
        }
    }
    for dataset in &fixture.deleted {
        writer.mark_dataset_deleted(dataset)?;
        report.tombstones += 1;
    }

    writer.commit()?;
    tracing::info!(
        namespaces = report.namespaces,
        versions = report.versions,
        tombstones = report.tombstones,
        "fixture loaded"
    );
    Ok(report)
}

// =============================================================================
// WRITER
// =============================================================================

/// A single write transaction over the store.
///
/// Dropping the writer without calling `commit` rolls everything back.
pub struct FixtureWriter {
    txn: WriteTransaction,
}

impl FixtureWriter {
    /// Begin a write transaction on `store`.
    pub fn new(store: &Store) -> Result<Self, EntigraphError> {
        Ok(Self {
            txn: store.database().begin_write()?,
        })
    }

    /// Make all writes visible to readers that begin after this call.
    pub fn commit(self) -> Result<(), EntigraphError> {
        self.txn.commit()?;
        Ok(())
    }

    /// Take the next value of a metadata counter (counters start at 1).
    fn next_counter(&self, key: &str) -> Result<u64, EntigraphError> {
        let mut meta = self.txn.open_table(METADATA)?;
        let next = meta.get(key)?.map(|v| v.value()).unwrap_or(1);
        meta.insert(key, next.saturating_add(1))?;
        Ok(next)
    }

    /// Bind `prefix` to `expansion`.
    ///
    /// Re-registering the same pair is a no-op. A stem that already has a
    /// prefix keeps it and that prefix is returned; a prefix already bound to
    /// another stem is a `NamespaceConflict`.
    pub fn register_namespace(
        &mut self,
        prefix: &str,
        expansion: &str,
    ) -> Result<String, EntigraphError> {
        if prefix.is_empty() || prefix.contains(':') || prefix.contains('/') {
            return Err(EntigraphError::InvalidIdentifier(prefix.to_string()));
        }

        {
            let stems = self.txn.open_table(NAMESPACE_STEMS)?;
            if let Some(existing) = stems.get(expansion)? {
                return Ok(existing.value().to_string());
            }
        }
        {
            let prefixes = self.txn.open_table(NAMESPACES)?;
            if let Some(data) = prefixes.get(prefix)? {
                let ns: Namespace = postcard::from_bytes(data.value())?;
                return Err(EntigraphError::NamespaceConflict {
                    prefix: prefix.to_string(),
                    existing: ns.expansion,
                    requested: expansion.to_string(),
                });
            }
        }

        let ns = Namespace {
            id: self.next_counter(keys::NEXT_NAMESPACE_ID)?,
            prefix: prefix.to_string(),
            expansion: expansion.to_string(),
        };
        let bytes = postcard::to_allocvec(&ns)?;
        {
            let mut prefixes = self.txn.open_table(NAMESPACES)?;
            prefixes.insert(prefix, bytes.as_slice())?;
        }
        {
            let mut stems = self.txn.open_table(NAMESPACE_STEMS)?;
            stems.insert(expansion, prefix)?;
        }
        Ok(ns.prefix)
    }

    /// The prefix for `expansion`, registering `ns<id>` if it has none.
    pub fn assert_namespace(&mut self, expansion: &str) -> Result<String, EntigraphError> {
        {
            let stems = self.txn.open_table(NAMESPACE_STEMS)?;
            if let Some(existing) = stems.get(expansion)? {
                return Ok(existing.value().to_string());
            }
        }
        let id = {
            let meta = self.txn.open_table(METADATA)?;
            meta.get(keys::NEXT_NAMESPACE_ID)?
                .map(|v| v.value())
                .unwrap_or(1)
        };
        self.register_namespace(&format!("ns{}", id), expansion)
    }

    /// Normalise a document id to a curie, minting a namespace for
    /// unseen URI stems.
    fn curie_for(&mut self, id: &str) -> Result<String, EntigraphError> {
        if is_expanded(id) {
            let (stem, local) =
                split_uri(id).ok_or_else(|| EntigraphError::InvalidIdentifier(id.to_string()))?;
            let prefix = self.assert_namespace(stem)?;
            return Ok(format!("{}:{}", prefix, local));
        }
        split_curie(id).ok_or_else(|| EntigraphError::InvalidIdentifier(id.to_string()))?;
        Ok(id.to_string())
    }

    /// The internal id for `curie`, assigning the next one if unseen.
    pub fn entity_id(&mut self, curie: &str) -> Result<InternalId, EntigraphError> {
        {
            let ids = self.txn.open_table(ENTITY_IDS)?;
            if let Some(id) = ids.get(curie)? {
                return Ok(InternalId(id.value()));
            }
        }
        let id = self.next_counter(keys::NEXT_ENTITY_ID)?;
        {
            let mut ids = self.txn.open_table(ENTITY_IDS)?;
            ids.insert(curie, id)?;
        }
        {
            let mut curies = self.txn.open_table(ENTITY_CURIES)?;
            curies.insert(id, curie)?;
        }
        Ok(InternalId(id))
    }

    /// The internal id for dataset `name`, registering it if unseen.
    ///
    /// Reserved names (empty or all digits) are an `InvalidIdentifier`.
    pub fn dataset_id(&mut self, name: &str) -> Result<InternalDatasetId, EntigraphError> {
        if is_reserved_dataset_name(name) {
            return Err(EntigraphError::InvalidIdentifier(format!(
                "reserved dataset name '{}'",
                name
            )));
        }
        {
            let ids = self.txn.open_table(DATASET_IDS)?;
            if let Some(id) = ids.get(name)? {
                return Ok(InternalDatasetId(id.value()));
            }
        }
        let next = self.next_counter(keys::NEXT_DATASET_ID)?;
        let id = u32::try_from(next)
            .map_err(|_| EntigraphError::Storage("dataset id space exhausted".to_string()))?;
        let record = DatasetRecord {
            name: name.to_string(),
            deleted: false,
        };
        let bytes = postcard::to_allocvec(&record)?;
        {
            let mut ids = self.txn.open_table(DATASET_IDS)?;
            ids.insert(name, id)?;
        }
        {
            let mut datasets = self.txn.open_table(DATASETS)?;
            datasets.insert(id, bytes.as_slice())?;
        }
        Ok(InternalDatasetId(id))
    }

    /// Append `doc` as the newest version of its entity in `dataset`.
    ///
    /// Fills in `internalId`, normalises `id` to a curie and writes the
    /// document to both index families.
    pub fn append(
        &mut self,
        dataset: &str,
        mut doc: EntityDocument,
    ) -> Result<LocatorKey, EntigraphError> {
        doc.id = self.curie_for(&doc.id)?;
        let entity = self.entity_id(&doc.id)?;
        let dataset_id = self.dataset_id(dataset)?;
        doc.internal_id = entity.0;

        let bytes =
            serde_json::to_vec(&doc).map_err(|e| EntigraphError::Serialization(e.to_string()))?;

        let locator_key = {
            let mut locator = self.txn.open_table(ENTITY_LOCATOR)?;
            let last = match locator
                .range(keys::entity_dataset_locator_range(entity, dataset_id))?
                .next_back()
            {
                Some(entry) => entry?.0.value().2,
                None => 0,
            };
            let key = LocatorKey::new(entity, dataset_id, last.saturating_add(1));
            locator.insert(key.as_tuple(), bytes.as_slice())?;
            key
        };
        {
            let mut changes = self.txn.open_table(ENTITY_CHANGES)?;
            let last = match changes
                .range(keys::entity_changes_range(dataset_id, entity))?
                .next_back()
            {
                Some(entry) => entry?.0.value().2,
                None => 0,
            };
            let key = ChangeKey::new(dataset_id, entity, last.saturating_add(1));
            changes.insert(key.as_tuple(), bytes.as_slice())?;
        }

        tracing::debug!(
            entity = %doc.id,
            dataset,
            version = locator_key.version,
            "appended version"
        );
        Ok(locator_key)
    }

    /// Set the tombstone flag on `dataset`, as garbage collection does
    /// before purging. Unknown datasets are registered first so the flag is
    /// never lost.
    pub fn mark_dataset_deleted(
        &mut self,
        dataset: &str,
    ) -> Result<InternalDatasetId, EntigraphError> {
        let id = self.dataset_id(dataset)?;
        let record = DatasetRecord {
            name: dataset.to_string(),
            deleted: true,
        };
        let bytes = postcard::to_allocvec(&record)?;
        let mut datasets = self.txn.open_table(DATASETS)?;
        datasets.insert(id.0, bytes.as_slice())?;
        Ok(id)
    }

    /// Remove the name record of a dataset while leaving its index entries.
    ///
    /// Produces the registry inconsistency that lookups report as
    /// `DatasetDetails::Inconsistent`; used to exercise that path.
    pub fn forget_dataset_name(&mut self, dataset: &str) -> Result<(), EntigraphError> {
        let id = {
            let mut ids = self.txn.open_table(DATASET_IDS)?;
            ids.remove(dataset)?.map(|v| v.value())
        };
        if let Some(id) = id {
            let mut datasets = self.txn.open_table(DATASETS)?;
            datasets.remove(id)?;
        }
        Ok(())
    }

    /// Overwrite a raw locator value. Only for corruption tests.
    #[doc(hidden)]
    pub fn put_raw_locator(&mut self, key: LocatorKey, value: &[u8]) -> Result<(), EntigraphError> {
        let mut locator = self.txn.open_table(ENTITY_LOCATOR)?;
        locator.insert(key.as_tuple(), value)?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::Registry;
    use crate::namespace::NamespaceResolver;
    use redb::ReadableTableMetadata;

    #[test]
    fn append_assigns_dense_versions() {
        let store = Store::in_memory().expect("open store");
        let mut writer = FixtureWriter::new(&store).expect("writer");

        let first = writer
            .append("people", EntityDocument::new("ex:1", 1))
            .expect("append");
        let second = writer
            .append("people", EntityDocument::new("ex:1", 2))
            .expect("append");
        let other = writer
            .append("contacts", EntityDocument::new("ex:1", 3))
            .expect("append");
        writer.commit().expect("commit");

        assert_eq!(first.version, 1);
        assert_eq!(second.version, 2);
        assert_eq!(other.version, 1);
        assert_eq!(first.entity, other.entity);
        assert_ne!(first.dataset, other.dataset);

        let stats = store.stats().expect("stats");
        assert_eq!(stats.locator_entries, 3);
        assert_eq!(stats.change_entries, 3);
        assert_eq!(stats.entities, 1);
        assert_eq!(stats.datasets, 2);
    }

    #[test]
    fn uncommitted_writes_are_invisible() {
        let store = Store::in_memory().expect("open store");
        {
            let mut writer = FixtureWriter::new(&store).expect("writer");
            writer
                .append("people", EntityDocument::new("ex:1", 1))
                .expect("append");
        }
        let txn = store.begin_read().expect("read");
        let table = txn.open_table(ENTITY_LOCATOR).expect("table");
        assert_eq!(table.len().expect("len"), 0);
    }

    #[test]
    fn expanded_ids_mint_namespaces() {
        let store = Store::in_memory().expect("open store");
        let mut writer = FixtureWriter::new(&store).expect("writer");
        writer
            .append("people", EntityDocument::new("http://example.com/people/3", 1))
            .expect("append");
        writer.commit().expect("commit");

        let txn = store.begin_read().expect("read");
        let resolver = NamespaceResolver::open(&txn).expect("resolver");
        let registry = Registry::open(&txn).expect("registry");
        assert_eq!(
            resolver
                .compact("http://example.com/people/3")
                .expect("compact"),
            "ns1:3"
        );
        assert!(registry.resolve_entity("ns1:3").is_ok());
    }

    #[test]
    fn namespace_prefix_is_never_reassigned() {
        let store = Store::in_memory().expect("open store");
        let mut writer = FixtureWriter::new(&store).expect("writer");

        writer
            .register_namespace("ex", "http://example.com/")
            .expect("register");
        assert_eq!(
            writer
                .register_namespace("other", "http://example.com/")
                .expect("same stem"),
            "ex"
        );
        assert!(matches!(
            writer.register_namespace("ex", "http://elsewhere.org/"),
            Err(EntigraphError::NamespaceConflict { .. })
        ));
    }

    #[test]
    fn load_fixture_reports_counts() {
        let store = Store::in_memory().expect("open store");
        let fixture: Fixture = serde_json::from_str(
            r#"{
                "namespaces": {"ex": "http://example.com/"},
                "datasets": {
                    "people": [
                        {"id": "ex:1", "recorded": 1, "props": {"ex:name": "Ann"}},
                        {"id": "ex:1", "recorded": 2, "props": {"ex:name": "Anne"}}
                    ]
                },
                "deleted": ["people"]
            }"#,
        )
        .expect("parse");

        let report = load_fixture(&store, &fixture).expect("load");
        assert_eq!(
            report,
            LoadReport {
                namespaces: 1,
                versions: 2,
                tombstones: 1
            }
        );
    }

    #[test]
    fn invalid_document_id_is_rejected() {
        let store = Store::in_memory().expect("open store");
        let mut writer = FixtureWriter::new(&store).expect("writer");
        let result = writer.append("people", EntityDocument::new("not-a-curie", 1));
        assert!(matches!(result, Err(EntigraphError::InvalidIdentifier(_))));
    }

    #[test]
    fn reserved_dataset_names_are_rejected() {
        let store = Store::in_memory().expect("open store");
        let mut writer = FixtureWriter::new(&store).expect("writer");

        for name in ["1", "007", ""] {
            let result = writer.append(name, EntityDocument::new("ex:1", 1));
            assert!(
                matches!(result, Err(EntigraphError::InvalidIdentifier(_))),
                "{:?} accepted",
                name
            );
        }
        assert!(matches!(
            writer.mark_dataset_deleted("2"),
            Err(EntigraphError::InvalidIdentifier(_))
        ));
        writer.append("v1", EntityDocument::new("ex:1", 1)).expect("append");
    }
}
