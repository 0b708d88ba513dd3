use axum::http::HeaderMap;
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::errors::{GatewayError, GatewayResult};

pub const API_KEY_HEADER: &str = "x-api-key";
pub const USER_ID_HEADER: &str = "x-user-id";

/// Identity attached to a request after the pre-shared key checks out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceIdentity {
    pub service_name: &'static str,
    /// Parsed from the secondary header when present and numeric, else None.
    pub user_id: Option<i64>,
}

/// Validates that inbound requests originate from the trusted backend via a
/// single static shared secret. This is caller-to-gateway trust, not
/// per-request HMAC; the comparison is constant-time so the key cannot be
/// recovered through a timing channel.
#[derive(Debug, Clone)]
pub struct ServiceAuthenticator {
    expected: Option<String>,
}

impl ServiceAuthenticator {
    pub fn new(expected: Option<String>) -> Self {
        let expected = expected.filter(|k| !k.is_empty());
        if expected.is_none() {
            warn!("service API key not configured; authenticated routes will fail closed");
        }
        Self { expected }
    }

    pub fn authenticate(&self, headers: &HeaderMap) -> GatewayResult<ServiceIdentity> {
        // Misconfiguration is decided before looking at the request at all.
        let Some(expected) = self.expected.as_deref() else {
            return Err(GatewayError::Misconfigured(
                "service API key not configured".into(),
            ));
        };

        let provided = headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                GatewayError::Unauthenticated(format!("missing {} header", API_KEY_HEADER))
            })?;

        if !bool::from(provided.as_bytes().ct_eq(expected.as_bytes())) {
            return Err(GatewayError::Forbidden("invalid service API key".into()));
        }

        Ok(ServiceIdentity {
            service_name: "backend",
            user_id: parse_user_id(headers),
        })
    }
}

/// `x-user-id` is advisory: absent or non-numeric values simply yield None.
pub fn parse_user_id(headers: &HeaderMap) -> Option<i64> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<i64>().ok())
}
