//! # Key-Space Contract
//!
//! Table definitions and key layouts for the two ordered index families and
//! the registry tables that feed them.
//!
//! ## Index Families
//!
//! - **Entity Locator Index** (`entity_locator`): `(entity, dataset, version)`
//!   to a JSON snapshot document. Scanning the `entity` prefix visits every
//!   dataset the entity appears in, contiguously, each dataset's versions in
//!   ascending order. The last entry of each dataset group is that dataset's
//!   current view of the entity.
//! - **Entity Change Log** (`entity_changes`): `(dataset, entity, seq)` to a
//!   JSON snapshot document. Scanning the `(dataset, entity)` prefix yields the
//!   full history, oldest first.
//!
//! redb compares tuple keys element by element with integers in numeric
//! order, so the tuple layout above IS the iteration order. The lookup scan
//! relies on this: reordering tuple elements silently breaks "latest".
//!
//! ## Portable Encoding
//!
//! Each key also has a fixed-width big-endian byte form
//! (`[tag: u16][fields...]`) whose lexicographic byte order equals the tuple
//! order. It is used in diagnostics (`Corrupt` errors name the encoded key)
//! and for exporting keys to byte-ordered stores.

use crate::{EntigraphError, InternalDatasetId, InternalId};
use redb::TableDefinition;
use std::ops::RangeInclusive;

// =============================================================================
// INDEX TABLES
// =============================================================================

/// Locator index: (entity, dataset, version) -> JSON snapshot.
pub const ENTITY_LOCATOR: TableDefinition<(u64, u32, u64), &[u8]> =
    TableDefinition::new("entity_locator");

/// Change log: (dataset, entity, seq) -> JSON snapshot.
pub const ENTITY_CHANGES: TableDefinition<(u32, u64, u64), &[u8]> =
    TableDefinition::new("entity_changes");

// =============================================================================
// REGISTRY TABLES
// =============================================================================

/// Entity curie -> InternalId.
pub const ENTITY_IDS: TableDefinition<&str, u64> = TableDefinition::new("entity_ids");

/// InternalId -> entity curie.
pub const ENTITY_CURIES: TableDefinition<u64, &str> = TableDefinition::new("entity_curies");

/// Dataset name -> InternalDatasetId.
pub const DATASET_IDS: TableDefinition<&str, u32> = TableDefinition::new("dataset_ids");

/// InternalDatasetId -> postcard `DatasetRecord`.
pub const DATASETS: TableDefinition<u32, &[u8]> = TableDefinition::new("datasets");

/// Namespace prefix -> postcard `Namespace`.
pub const NAMESPACES: TableDefinition<&str, &[u8]> = TableDefinition::new("namespaces");

/// Namespace URI stem -> prefix.
pub const NAMESPACE_STEMS: TableDefinition<&str, &str> = TableDefinition::new("namespace_stems");

/// Counters: key string -> value u64.
pub const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

/// Metadata key for the next entity id.
pub const NEXT_ENTITY_ID: &str = "next_entity_id";

/// Metadata key for the next dataset id.
pub const NEXT_DATASET_ID: &str = "next_dataset_id";

/// Metadata key for the next namespace id.
pub const NEXT_NAMESPACE_ID: &str = "next_namespace_id";

// =============================================================================
// PORTABLE ENCODING TAGS
// =============================================================================

/// Index tag of the locator family in the byte encoding.
pub const LOCATOR_TAG: u16 = 0x0002;

/// Index tag of the change log family in the byte encoding.
pub const CHANGES_TAG: u16 = 0x0005;

/// Length of an encoded key of either family.
pub const ENCODED_KEY_LEN: usize = 2 + 8 + 4 + 8;

// =============================================================================
// LOCATOR KEY
// =============================================================================

/// A typed view over a locator index key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocatorKey {
    pub entity: InternalId,
    pub dataset: InternalDatasetId,
    pub version: u64,
}

impl LocatorKey {
    #[must_use]
    pub const fn new(entity: InternalId, dataset: InternalDatasetId, version: u64) -> Self {
        Self {
            entity,
            dataset,
            version,
        }
    }

    /// The redb tuple form.
    #[must_use]
    pub const fn as_tuple(&self) -> (u64, u32, u64) {
        (self.entity.0, self.dataset.0, self.version)
    }

    /// Big-endian byte form: tag, entity, dataset, version.
    #[must_use]
    pub fn encode(&self) -> [u8; ENCODED_KEY_LEN] {
        let mut buf = [0u8; ENCODED_KEY_LEN];
        buf[0..2].copy_from_slice(&LOCATOR_TAG.to_be_bytes());
        buf[2..10].copy_from_slice(&self.entity.0.to_be_bytes());
        buf[10..14].copy_from_slice(&self.dataset.0.to_be_bytes());
        buf[14..22].copy_from_slice(&self.version.to_be_bytes());
        buf
    }

    /// Parse the byte form produced by [`LocatorKey::encode`].
    pub fn decode(bytes: &[u8]) -> Result<Self, EntigraphError> {
        let fields = split_key(bytes, LOCATOR_TAG)?;
        Ok(Self {
            entity: InternalId(u64::from_be_bytes(fields.0)),
            dataset: InternalDatasetId(u32::from_be_bytes(fields.1)),
            version: u64::from_be_bytes(fields.2),
        })
    }
}

impl From<(u64, u32, u64)> for LocatorKey {
    fn from((entity, dataset, version): (u64, u32, u64)) -> Self {
        Self::new(InternalId(entity), InternalDatasetId(dataset), version)
    }
}

/// Inclusive range covering every locator entry of `entity`.
#[must_use]
pub const fn entity_locator_range(entity: InternalId) -> RangeInclusive<(u64, u32, u64)> {
    (entity.0, 0, 0)..=(entity.0, u32::MAX, u64::MAX)
}

/// Inclusive range covering the locator entries of `entity` in one dataset.
#[must_use]
pub const fn entity_dataset_locator_range(
    entity: InternalId,
    dataset: InternalDatasetId,
) -> RangeInclusive<(u64, u32, u64)> {
    (entity.0, dataset.0, 0)..=(entity.0, dataset.0, u64::MAX)
}

// =============================================================================
// CHANGE KEY
// =============================================================================

/// A typed view over a change log key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChangeKey {
    pub dataset: InternalDatasetId,
    pub entity: InternalId,
    pub seq: u64,
}

impl ChangeKey {
    #[must_use]
    pub const fn new(dataset: InternalDatasetId, entity: InternalId, seq: u64) -> Self {
        Self {
            dataset,
            entity,
            seq,
        }
    }

    #[must_use]
    pub const fn as_tuple(&self) -> (u32, u64, u64) {
        (self.dataset.0, self.entity.0, self.seq)
    }

    /// Big-endian byte form: tag, dataset, entity, seq.
    #[must_use]
    pub fn encode(&self) -> [u8; ENCODED_KEY_LEN] {
        let mut buf = [0u8; ENCODED_KEY_LEN];
        buf[0..2].copy_from_slice(&CHANGES_TAG.to_be_bytes());
        buf[2..6].copy_from_slice(&self.dataset.0.to_be_bytes());
        buf[6..14].copy_from_slice(&self.entity.0.to_be_bytes());
        buf[14..22].copy_from_slice(&self.seq.to_be_bytes());
        buf
    }

    /// Parse the byte form produced by [`ChangeKey::encode`].
    pub fn decode(bytes: &[u8]) -> Result<Self, EntigraphError> {
        if bytes.len() != ENCODED_KEY_LEN || bytes[0..2] != CHANGES_TAG.to_be_bytes() {
            return Err(bad_key(bytes));
        }
        let mut dataset = [0u8; 4];
        let mut entity = [0u8; 8];
        let mut seq = [0u8; 8];
        dataset.copy_from_slice(&bytes[2..6]);
        entity.copy_from_slice(&bytes[6..14]);
        seq.copy_from_slice(&bytes[14..22]);
        Ok(Self {
            dataset: InternalDatasetId(u32::from_be_bytes(dataset)),
            entity: InternalId(u64::from_be_bytes(entity)),
            seq: u64::from_be_bytes(seq),
        })
    }
}

impl From<(u32, u64, u64)> for ChangeKey {
    fn from((dataset, entity, seq): (u32, u64, u64)) -> Self {
        Self::new(InternalDatasetId(dataset), InternalId(entity), seq)
    }
}

/// Inclusive range covering the change log of `entity` within `dataset`.
#[must_use]
pub const fn entity_changes_range(
    dataset: InternalDatasetId,
    entity: InternalId,
) -> RangeInclusive<(u32, u64, u64)> {
    (dataset.0, entity.0, 0)..=(dataset.0, entity.0, u64::MAX)
}

// =============================================================================
// EITHER FAMILY
// =============================================================================

/// An encoded key of either index family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKey {
    Locator(LocatorKey),
    Change(ChangeKey),
}

impl IndexKey {
    /// Parse an encoded key, picking the family from its tag.
    pub fn decode(bytes: &[u8]) -> Result<Self, EntigraphError> {
        let tag = match bytes {
            [high, low, ..] => u16::from_be_bytes([*high, *low]),
            _ => return Err(bad_key(bytes)),
        };
        match tag {
            LOCATOR_TAG => LocatorKey::decode(bytes).map(Self::Locator),
            CHANGES_TAG => ChangeKey::decode(bytes).map(Self::Change),
            _ => Err(bad_key(bytes)),
        }
    }

    #[must_use]
    pub const fn entity(&self) -> InternalId {
        match self {
            Self::Locator(key) => key.entity,
            Self::Change(key) => key.entity,
        }
    }

    #[must_use]
    pub const fn dataset(&self) -> InternalDatasetId {
        match self {
            Self::Locator(key) => key.dataset,
            Self::Change(key) => key.dataset,
        }
    }

    /// Version for locator keys, sequence number for change keys.
    #[must_use]
    pub const fn position(&self) -> u64 {
        match self {
            Self::Locator(key) => key.version,
            Self::Change(key) => key.seq,
        }
    }

    /// Table name of the family.
    #[must_use]
    pub const fn family(&self) -> &'static str {
        match self {
            Self::Locator(_) => "entity_locator",
            Self::Change(_) => "entity_changes",
        }
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Render an encoded key as lowercase hex for error messages.
#[must_use]
pub fn key_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Parse the output of [`key_hex`] back into bytes.
///
/// Accepts either case; anything else is an `InvalidIdentifier`.
pub fn parse_key_hex(hex: &str) -> Result<Vec<u8>, EntigraphError> {
    let invalid = || EntigraphError::InvalidIdentifier(format!("not a hex key: '{}'", hex));
    if hex.len() % 2 != 0 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    hex.as_bytes()
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|digits| u8::from_str_radix(digits, 16).ok())
                .ok_or_else(invalid)
        })
        .collect()
}

fn bad_key(bytes: &[u8]) -> EntigraphError {
    EntigraphError::Corrupt {
        key: key_hex(bytes),
        reason: "malformed index key".to_string(),
    }
}

/// Split a locator-shaped key into its (u64, u32, u64) field bytes.
fn split_key(bytes: &[u8], tag: u16) -> Result<([u8; 8], [u8; 4], [u8; 8]), EntigraphError> {
    if bytes.len() != ENCODED_KEY_LEN || bytes[0..2] != tag.to_be_bytes() {
        return Err(bad_key(bytes));
    }
    let mut first = [0u8; 8];
    let mut second = [0u8; 4];
    let mut third = [0u8; 8];
    first.copy_from_slice(&bytes[2..10]);
    second.copy_from_slice(&bytes[10..14]);
    third.copy_from_slice(&bytes[14..22]);
    Ok((first, second, third))
}

// =============================================================================
// TESTS
// =============================================================================
