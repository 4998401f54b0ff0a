//! # entigraph-core
//!
//! The entity version lookup engine for Entigraph - THE LOGIC.
//!
//! Entities are identified by URIs and carry a different snapshot of their
//! properties and references in every dataset they belong to. Every change
//! within a dataset is kept as an immutable history entry. This crate
//! answers one question: for a given entity, what is its latest snapshot and
//! full history in each dataset the caller may see?
//!
//! ## Architecture
//!
//! ```text
//! identifier ──► NamespaceResolver ──► Registry ──► Lookup
//!  (curie/URI)     (curie form)       (InternalId)   │
//!                                                    ├─ locator scan (latest per dataset)
//!                                                    └─ change log scan (history)
//! ```
//!
//! All of it runs inside one redb read transaction per call.
//!
//! ## Architectural Constraints
//!
//! - No async, no network dependencies
//! - The lookup path never writes; [`fixtures`] is the only writer
//! - Output maps are ordered (`BTreeMap`) for reproducible responses

// =============================================================================
// MODULES
// =============================================================================

pub mod fixtures;
pub mod keys;
pub mod lookup;
pub mod namespace;
pub mod registry;
pub mod store;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    DatasetDetails, DatasetRecord, EntigraphError, EntityDetails, EntityDocument,
    InternalDatasetId, InternalId, Namespace,
};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use fixtures::{Fixture, FixtureWriter, LoadReport, load_fixture};
pub use keys::{ChangeKey, IndexKey, LocatorKey};
pub use lookup::{KeyDescription, Lookup};
pub use namespace::NamespaceResolver;
pub use registry::{DatasetScope, Registry};
pub use store::{Store, StoreStats};
