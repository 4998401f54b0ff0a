//! # Core Type Definitions
//!
//! This module contains the core types for the Entigraph lookup engine:
//! - Dense internal identifiers (`InternalId`, `InternalDatasetId`)
//! - Namespace and dataset records persisted in the registry tables
//! - The snapshot document stored in both index families (`EntityDocument`)
//! - Lookup output structures (`DatasetDetails`, `EntityDetails`)
//! - Error types (`EntigraphError`)
//!
//! ## Ordering Guarantees
//!
//! Identifier types implement `Ord` so result maps and scope sets iterate
//! deterministically (`BTreeMap`/`BTreeSet`).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

// =============================================================================
// INTERNAL IDENTIFIERS
// =============================================================================

/// Dense surrogate key for an entity URI.
///
/// Assigned monotonically starting at 1 and never reused. All index keys
/// carry this instead of the entity's curie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InternalId(pub u64);

/// Dense surrogate key for a dataset name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InternalDatasetId(pub u32);

impl fmt::Display for InternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for InternalDatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// REGISTRY RECORDS
// =============================================================================

/// A registered namespace: `prefix` stands in for the URI stem `expansion`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    /// Persisted numeric id, assigned in registration order.
    pub id: u64,
    /// Compact prefix, e.g. `ex`.
    pub prefix: String,
    /// Full URI stem including its trailing `/` or `#`.
    pub expansion: String,
}

/// A dataset's registry entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRecord {
    pub name: String,
    /// Tombstone flag. Set by garbage collection before the data is purged.
    pub deleted: bool,
}

// =============================================================================
// SNAPSHOT DOCUMENT
// =============================================================================

/// An entity's full property/reference state as of one version in one dataset.
///
/// Stored as JSON in both the locator index and the change log, because
/// `props` may nest arbitrary JSON (including anonymous sub-entities).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDocument {
    /// The entity's curie.
    pub id: String,
    #[serde(rename = "internalId", default)]
    pub internal_id: u64,
    /// Time the version was recorded, in nanoseconds since the Unix epoch.
    pub recorded: i64,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deleted: bool,
    #[serde(default)]
    pub refs: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub props: serde_json::Map<String, serde_json::Value>,
}

impl EntityDocument {
    /// Create an empty document for `id` recorded at `recorded`.
    #[must_use]
    pub fn new(id: impl Into<String>, recorded: i64) -> Self {
        Self {
            id: id.into(),
            internal_id: 0,
            recorded,
            deleted: false,
            refs: serde_json::Map::new(),
            props: serde_json::Map::new(),
        }
    }

    /// Builder-style helper: set a property.
    #[must_use]
    pub fn with_prop(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.props.insert(key.into(), value);
        self
    }

    /// Builder-style helper: set a reference.
    #[must_use]
    pub fn with_ref(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.refs.insert(key.into(), value);
        self
    }
}

// =============================================================================
// LOOKUP OUTPUT
// =============================================================================

/// Per-dataset lookup result.
///
/// `Inconsistent` marks a dataset id that appears in the locator index but
/// has no registered name. It is reported instead of aborting the lookup so
/// one bad registry entry does not hide every other dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DatasetDetails {
    Found {
        latest: EntityDocument,
        /// Oldest first; the last element equals `latest`.
        changes: Vec<EntityDocument>,
    },
    Inconsistent {
        inconsistent: bool,
        #[serde(rename = "datasetId")]
        dataset_id: u32,
    },
}

impl DatasetDetails {
    /// Placeholder for a dataset id without a registered name.
    #[must_use]
    pub const fn inconsistent(dataset: InternalDatasetId) -> Self {
        Self::Inconsistent {
            inconsistent: true,
            dataset_id: dataset.0,
        }
    }

    /// The latest snapshot, if this entry was resolved.
    #[must_use]
    pub fn latest(&self) -> Option<&EntityDocument> {
        match self {
            Self::Found { latest, .. } => Some(latest),
            Self::Inconsistent { .. } => None,
        }
    }

    /// The change history, if this entry was resolved.
    #[must_use]
    pub fn changes(&self) -> Option<&[EntityDocument]> {
        match self {
            Self::Found { changes, .. } => Some(changes),
            Self::Inconsistent { .. } => None,
        }
    }

    #[must_use]
    pub const fn is_inconsistent(&self) -> bool {
        matches!(self, Self::Inconsistent { .. })
    }
}

/// Result of a details lookup: dataset name (or stringified id for
/// inconsistent entries) to that dataset's view of the entity.
pub type EntityDetails = BTreeMap<String, DatasetDetails>;

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Entigraph core.
///
/// Resolution failures abort a lookup before any index scan runs; decode
/// failures abort mid-scan. Nothing is retried internally.
#[derive(Debug, Error)]
pub enum EntigraphError {
    /// The identifier cannot be parsed or compacted against known namespaces.
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// No registered namespace matches the prefix or URI stem.
    #[error("Unknown namespace: {0}")]
    UnknownNamespace(String),

    /// A prefix is already bound to a different URI stem.
    #[error("Namespace conflict: prefix '{prefix}' is bound to '{existing}', not '{requested}'")]
    NamespaceConflict {
        prefix: String,
        existing: String,
        requested: String,
    },

    /// The curie has never been assigned an internal id.
    #[error("Entity not found: {0}")]
    NotFound(String),

    /// A stored snapshot document failed to decode.
    #[error("Corrupt record at {key}: {reason}")]
    Corrupt { key: String, reason: String },

    /// A redb database, transaction, table or storage error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<redb::DatabaseError> for EntigraphError {
    fn from(e: redb::DatabaseError) -> Self {
        Self::Storage(e.to_string())
    }
}

impl From<redb::TransactionError> for EntigraphError {
    fn from(e: redb::TransactionError) -> Self {
        Self::Storage(e.to_string())
    }
}

impl From<redb::TableError> for EntigraphError {
    fn from(e: redb::TableError) -> Self {
        Self::Storage(e.to_string())
    }
}

impl From<redb::StorageError> for EntigraphError {
    fn from(e: redb::StorageError) -> Self {
        Self::Storage(e.to_string())
    }
}

impl From<redb::CommitError> for EntigraphError {
    fn from(e: redb::CommitError) -> Self {
        Self::Storage(e.to_string())
    }
}

impl From<postcard::Error> for EntigraphError {
    fn from(e: postcard::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

// =============================================================================
// TESTS
// =============================================================================
