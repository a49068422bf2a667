use std::fmt;

use engify_core::RequestId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    /// Intermediate status for the request, e.g. a retry notice.
    Status { request_id: RequestId, status: String },
    Completed {
        request_id: RequestId,
        result: Result<String, CallError>,
    },
}

/// A failed relay attempt, or the final failure once retries are exhausted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CallError {
    pub kind: FailureKind,
    pub message: String,
    /// HTTP status the relay answered with, when it answered at all.
    pub status: Option<u16>,
}

impl CallError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    /// Error bodies mentioning a block are terminal regardless of status.
    pub(crate) fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        let kind = if message.to_ascii_lowercase().contains("blocked") {
            FailureKind::Blocked
        } else {
            FailureKind::HttpStatus(status)
        };
        Self {
            kind,
            message,
            status: Some(status),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    HttpStatus(u16),
    Network,
    Timeout,
    Blocked,
    MalformedResponse,
    InvalidEndpoint,
    NoResponder,
}

impl FailureKind {
    /// Rate limits, server errors and transport failures are worth another attempt.
    pub fn is_retryable(self) -> bool {
        match self {
            FailureKind::HttpStatus(429) => true,
            FailureKind::HttpStatus(code) => code >= 500,
            FailureKind::Network | FailureKind::Timeout => true,
            FailureKind::Blocked
            | FailureKind::MalformedResponse
            | FailureKind::InvalidEndpoint
            | FailureKind::NoResponder => false,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Blocked => write!(f, "blocked"),
            FailureKind::MalformedResponse => write!(f, "malformed response"),
            FailureKind::InvalidEndpoint => write!(f, "invalid endpoint"),
            FailureKind::NoResponder => write!(f, "no responder"),
        }
    }
}
