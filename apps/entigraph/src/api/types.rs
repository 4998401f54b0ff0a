//! # API Request/Response Types
//!
//! JSON structures for the HTTP API. The details endpoint returns
//! [`entigraph_core::EntityDetails`] as-is.

use entigraph_core::{EntigraphError, StoreStats};
use serde::{Deserialize, Serialize};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// STATUS RESPONSE
// =============================================================================

/// Store status response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub entities: u64,
    pub datasets: u64,
    pub namespaces: u64,
    pub locator_entries: u64,
    pub change_entries: u64,
}

impl From<StoreStats> for StatusResponse {
    fn from(stats: StoreStats) -> Self {
        Self {
            entities: stats.entities,
            datasets: stats.datasets,
            namespaces: stats.namespaces,
            locator_entries: stats.locator_entries,
            change_entries: stats.change_entries,
        }
    }
}

// =============================================================================
// DETAILS QUERY
// =============================================================================

/// Query string of `GET /entities/details`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailsQuery {
    /// Curie or expanded URI.
    pub id: String,
    /// Comma-separated dataset names; absent means all.
    #[serde(default)]
    pub datasets: Option<String>,
}

impl DetailsQuery {
    /// The dataset filter as a list, blanks dropped.
    ///
    /// An absent parameter yields an empty list (no filter). A parameter
    /// that is present but names nothing (`datasets=`, `datasets=,`) is
    /// rejected rather than widened to every dataset.
    pub fn dataset_names(&self) -> Result<Vec<String>, ErrorResponse> {
        let Some(raw) = self.datasets.as_deref() else {
            return Ok(Vec::new());
        };
        let names: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
        if names.is_empty() {
            return Err(ErrorResponse::new(
                "invalid_filter",
                format!("datasets filter '{}' names no dataset", raw),
            ));
        }
        Ok(names)
    }
}

// =============================================================================
// ERROR RESPONSE
// =============================================================================

/// Body of every non-2xx response produced by a handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    /// Machine-readable error kind.
    pub code: String,
    pub error: String,
}

impl ErrorResponse {
    #[must_use]
    pub fn new(code: &str, error: impl Into<String>) -> Self {
        Self {
            success: false,
            code: code.to_string(),
            error: error.into(),
        }
    }
}

impl From<&EntigraphError> for ErrorResponse {
    fn from(e: &EntigraphError) -> Self {
        let code = match e {
            EntigraphError::InvalidIdentifier(_) => "invalid_identifier",
            EntigraphError::UnknownNamespace(_) => "unknown_namespace",
            EntigraphError::NamespaceConflict { .. } => "namespace_conflict",
            EntigraphError::NotFound(_) => "not_found",
            EntigraphError::Corrupt { .. } => "corrupt",
            EntigraphError::Storage(_) => "storage",
            EntigraphError::Serialization(_) => "serialization",
            EntigraphError::Io(_) => "io",
        };
        Self::new(code, e.to_string())
    }
}
