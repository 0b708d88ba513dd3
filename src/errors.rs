use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Typed error hierarchy for the gateway.
///
/// Use at module boundaries (auth, signature verification, rate limiting,
/// adapter calls, bus publishes). Internal/leaf functions can continue using
/// `anyhow::Result` — the `Internal` variant allows seamless conversion via
/// the `?` operator.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// A required secret or config value is missing. Deployment error, not a
    /// client error; fails closed before any credential comparison.
    #[error("Service misconfigured: {0}")]
    Misconfigured(String),

    /// Credential absent.
    #[error("Authentication required: {0}")]
    Unauthenticated(String),

    /// Credential present but invalid.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Request body failed schema validation.
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("Rate limit exceeded")]
    RateLimited,

    /// A channel adapter or the event bus failed. The caller gets a generic
    /// message; full detail is logged where the failure happened.
    #[error("Downstream unavailable: {0}")]
    Downstream(String),

    #[error("Not found")]
    NotFound,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Convenience alias for results using GatewayError.
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

impl GatewayError {
    pub fn validation(message: impl Into<String>) -> Self {
        GatewayError::Validation {
            message: message.into(),
            details: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Misconfigured(_) | GatewayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            GatewayError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            GatewayError::Forbidden(_) => StatusCode::FORBIDDEN,
            GatewayError::Validation { .. } => StatusCode::BAD_REQUEST,
            GatewayError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::Downstream(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::NotFound => StatusCode::NOT_FOUND,
        }
    }

    /// Message sent to the caller. Downstream and internal failures are
    /// collapsed to generic text; their detail only goes to the logs.
    fn public_message(&self) -> String {
        match self {
            GatewayError::Misconfigured(_) => "Service unavailable".to_string(),
            GatewayError::Downstream(_) => "Upstream service unavailable".to_string(),
            GatewayError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            GatewayError::Misconfigured(detail) => {
                tracing::error!("misconfiguration: {}", detail);
            }
            GatewayError::Downstream(detail) => {
                tracing::error!("downstream failure: {}", detail);
            }
            GatewayError::Internal(e) => {
                tracing::error!("internal error: {:#}", e);
            }
            other => {
                tracing::warn!("request rejected ({}): {}", status, other);
            }
        }

        let mut body = serde_json::json!({
            "success": false,
            "error": self.public_message(),
        });
        if let GatewayError::Validation {
            details: Some(details),
            ..
        } = &self
        {
            body["details"] = details.clone();
        }
        (status, Json(body)).into_response()
    }
}
