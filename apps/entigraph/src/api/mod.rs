//! # Entigraph HTTP API Module
//!
//! A thin HTTP surface over the lookup engine, built on axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check (never authenticated)
//! - `GET /status` - Store table counts
//! - `GET /entities/details?id=<id>&datasets=a,b` - Latest snapshot and
//!   change history per dataset
//!
//! ## Security Configuration
//!
//! Taken from [`ApiConfig`]:
//!
//! - `cors_origins`: comma-separated allowed origins, or "*" (default: localhost only)
//! - `rate_limit`: requests per second (default: 100, 0 to disable)
//! - `api_key`: if set, requires Bearer token authentication

mod auth;
mod handlers;
mod middleware;
mod types;

pub use auth::ApiKey;
pub use handlers::{details_handler, health_handler, status_for, status_handler};
pub use middleware::{GlobalRateLimiter, create_rate_limiter};
pub use types::{DetailsQuery, ErrorResponse, HealthResponse, StatusResponse};

use crate::config::ApiConfig;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::get,
};
use entigraph_core::{EntigraphError, Store};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state. The store is read-only from here, so no lock.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
}

impl AppState {
    #[must_use]
    pub fn new(store: Store) -> Self {
        Self {
            store: Arc::new(store),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build the CORS layer from `cors_origins`.
///
/// - `"*"`: allows all origins
/// - `None`: localhost only
/// - otherwise: the comma-separated list; invalid entries are skipped, and a
///   list with no valid entry falls back to localhost only
fn build_cors_layer(origins: Option<&str>) -> CorsLayer {
    match origins {
        Some("*") => {
            tracing::warn!("CORS: Allowing ALL origins. This is insecure for production!");
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .filter_map(|s| match s.parse::<HeaderValue>() {
                    Ok(hv) => {
                        tracing::info!("CORS: Allowing origin: {}", s);
                        Some(hv)
                    }
                    Err(e) => {
                        tracing::warn!("CORS: Invalid origin '{}': {}", s, e);
                        None
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!("CORS: No valid origins configured, defaulting to localhost only");
                build_localhost_cors()
            } else {
                cors_for(allowed_origins)
            }
        }
        None => build_localhost_cors(),
    }
}

/// CORS layer for localhost development origins.
fn build_localhost_cors() -> CorsLayer {
    let origins = [
        "http://localhost",
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .filter_map(|s| s.parse::<HeaderValue>().ok())
    .collect();
    cors_for(origins)
}

fn cors_for(origins: Vec<HeaderValue>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Rate Limiting - if `rate_limit > 0`
/// 4. Authentication - if `api_key` is set; `/health` is exempt
pub fn create_router(state: AppState, config: &ApiConfig) -> Router {
    let cors = build_cors_layer(config.cors_origins.as_deref());

    let mut protected = Router::new()
        .route("/status", get(handlers::status_handler))
        .route("/entities/details", get(handlers::details_handler));

    match config.api_key.as_deref().and_then(ApiKey::new) {
        Some(key) => {
            tracing::info!("API key authentication enabled");
            protected = protected.layer(axum_middleware::from_fn_with_state(
                key,
                auth::api_key_auth_middleware,
            ));
        }
        None => tracing::warn!(
            "API key authentication DISABLED - all endpoints are publicly accessible! \
             Set ENTIGRAPH_API_KEY or api.api_key to enable authentication."
        ),
    }

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .merge(protected);

    if config.rate_limit > 0 {
        tracing::info!("Rate limiting enabled: {} requests/second", config.rate_limit);
        router = router.layer(axum_middleware::from_fn_with_state(
            create_rate_limiter(config.rate_limit),
            middleware::rate_limit_middleware,
        ));
    } else {
        tracing::info!("Rate limiting disabled");
    }

    router
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Serve `store` on `addr` until the process exits.
pub async fn run_server(addr: &str, store: Store, config: &ApiConfig) -> Result<(), EntigraphError> {
    let router = create_router(AppState::new(store), config);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| EntigraphError::Io(format!("Bind failed: {}", e)))?;

    tracing::info!("Entigraph HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .await
        .map_err(|e| EntigraphError::Io(format!("Server error: {}", e)))
}
