//! # Authentication Module
//!
//! API key authentication for the Entigraph HTTP API.
//!
//! The key comes from `api.api_key` in the config (or `ENTIGRAPH_API_KEY`).
//! When set, every route except `/health` requires it:
//!
//! ```text
//! Authorization: Bearer <your-api-key>
//! ```

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

// =============================================================================
// API KEY
// =============================================================================

/// The expected key, shared by every request.
#[derive(Clone)]
pub struct ApiKey(Arc<str>);

impl ApiKey {
    /// `None` for an empty key, which leaves authentication disabled.
    #[must_use]
    pub fn new(key: &str) -> Option<Self> {
        (!key.is_empty()).then(|| Self(Arc::from(key)))
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Compare two keys in time independent of where they differ.
///
/// Both sides are padded to the same length so `ct_eq` always runs over the
/// same number of bytes.
fn keys_match(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();

    let max_len = provided.len().max(expected.len());
    let mut padded_provided = vec![0u8; max_len];
    let mut padded_expected = vec![0u8; max_len];
    padded_provided[..provided.len()].copy_from_slice(provided);
    padded_expected[..expected.len()].copy_from_slice(expected);

    let bytes_match: bool = padded_provided.ct_eq(&padded_expected).into();
    bytes_match && provided.len() == expected.len()
}

// =============================================================================
// MIDDLEWARE
// =============================================================================

/// Reject requests without a matching `Authorization` header.
///
/// Accepts both `Bearer <key>` and a raw `<key>`.
pub async fn api_key_auth_middleware(
    State(expected): State<ApiKey>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    match provided {
        Some(header_value) => {
            let provided_key = header_value.strip_prefix("Bearer ").unwrap_or(header_value);
            if keys_match(provided_key, &expected.0) {
                Ok(next.run(request).await)
            } else {
                tracing::warn!(
                    event = "auth_failure",
                    reason = "invalid_api_key",
                    "Authentication failed: invalid API key"
                );
                Err((StatusCode::UNAUTHORIZED, "Unauthorized"))
            }
        }
        None => {
            tracing::warn!(
                event = "auth_failure",
                reason = "missing_authorization_header",
                "Missing Authorization header"
            );
            Err((StatusCode::UNAUTHORIZED, "Unauthorized"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_key_disables_auth() {
        assert!(ApiKey::new("").is_none());
        assert!(ApiKey::new("secret").is_some());
    }

    #[test]
    fn keys_match_exactly() {
        assert!(keys_match("secret", "secret"));
        assert!(!keys_match("secret", "secreT"));
        assert!(!keys_match("secret", "secret-longer"));
        assert!(!keys_match("", "secret"));
    }

    #[test]
    fn debug_hides_key() {
        let key = ApiKey::new("secret").map(|k| format!("{:?}", k));
        assert_eq!(key.as_deref(), Some("ApiKey(***)"));
    }
}
