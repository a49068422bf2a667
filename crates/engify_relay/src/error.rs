//! Relay error taxonomy and its HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use engify_core::RelayErrorBody;
use thiserror::Error;

pub const ALL_MODELS_FAILED: &str = "All models failed";
pub const INTERNAL_SERVER_ERROR: &str = "Internal server error";

/// Every way a relay request can end without enhanced text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    /// Caller origin is not on the allow-list.
    #[error("Forbidden")]
    Forbidden,

    #[error("Method not allowed")]
    MethodNotAllowed,

    /// Bad, missing or oversized input.
    #[error("{0}")]
    Validation(String),

    /// A provider refused the content. Terminal: no other provider is tried.
    #[error("Request blocked: {0}")]
    Blocked(String),

    /// Every provider was tried; carries the last recorded provider error.
    #[error("{0}")]
    Exhausted(String),

    /// A handler panicked; details stay in the log.
    #[error("{}", INTERNAL_SERVER_ERROR)]
    Internal,
}

impl RelayError {
    pub fn validation(message: impl Into<String>) -> Self {
        RelayError::Validation(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::Forbidden => StatusCode::FORBIDDEN,
            RelayError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            RelayError::Validation(_) | RelayError::Blocked(_) => StatusCode::BAD_REQUEST,
            RelayError::Exhausted(_) => StatusCode::TOO_MANY_REQUESTS,
            RelayError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let body = RelayErrorBody {
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Problems loading the relay configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: ron::error::SpannedError,
    },
    #[error("invalid listen address {0}")]
    Address(String),
}
