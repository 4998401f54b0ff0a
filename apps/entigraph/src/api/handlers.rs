//! # API Endpoint Handlers
//!
//! Store access is synchronous, so every handler that touches the store
//! runs its work on tokio's blocking pool.

use super::{
    AppState,
    types::{DetailsQuery, ErrorResponse, HealthResponse, StatusResponse},
};
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use entigraph_core::{EntigraphError, Lookup, Store};
use std::sync::Arc;

/// HTTP status for a failed operation.
pub fn status_for(e: &EntigraphError) -> StatusCode {
    match e {
        EntigraphError::InvalidIdentifier(_) | EntigraphError::UnknownNamespace(_) => {
            StatusCode::BAD_REQUEST
        }
        EntigraphError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(e: &EntigraphError) -> Response {
    let status = status_for(e);
    if status.is_server_error() {
        tracing::error!(error = %e, "request failed");
    } else {
        tracing::debug!(error = %e, "request rejected");
    }
    (status, Json(ErrorResponse::from(e))).into_response()
}

/// Run `f` against the store on the blocking pool.
async fn with_store<T, F>(state: &AppState, f: F) -> Result<T, EntigraphError>
where
    T: Send + 'static,
    F: FnOnce(&Store) -> Result<T, EntigraphError> + Send + 'static,
{
    let store = Arc::clone(&state.store);
    tokio::task::spawn_blocking(move || f(&store))
        .await
        .map_err(|e| EntigraphError::Storage(format!("Blocking task failed: {}", e)))?
}

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// STATUS HANDLER
// =============================================================================

/// Table counts of the store.
pub async fn status_handler(State(state): State<AppState>) -> Response {
    match with_store(&state, Store::stats).await {
        Ok(stats) => (StatusCode::OK, Json(StatusResponse::from(stats))).into_response(),
        Err(e) => error_response(&e),
    }
}

// =============================================================================
// DETAILS HANDLER
// =============================================================================

/// Latest snapshot and change history per dataset for one entity.
pub async fn details_handler(
    State(state): State<AppState>,
    Query(query): Query<DetailsQuery>,
) -> Response {
    let names = match query.dataset_names() {
        Ok(names) => names,
        Err(body) => {
            tracing::debug!(error = %body.error, "request rejected");
            return (StatusCode::BAD_REQUEST, Json(body)).into_response();
        }
    };
    let id = query.id;

    let result = with_store(&state, move |store| {
        Lookup::new(store).details(&id, &names)
    })
    .await;

    match result {
        Ok(details) => (StatusCode::OK, Json(details)).into_response(),
        Err(e) => error_response(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            status_for(&EntigraphError::InvalidIdentifier("x".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&EntigraphError::NotFound("ex:1".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&EntigraphError::Corrupt {
                key: "00".to_string(),
                reason: "eof".to_string()
            }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_for(&EntigraphError::Storage("io".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
