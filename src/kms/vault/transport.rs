// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Transport abstraction between the transit client and the backend.

use async_trait::async_trait;
use serde_json::Value;

/// Errors raised by a transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The HTTP request could not be completed.
    #[error("request to {path} failed: {source}")]
    Http {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    /// The request URL was rejected before sending.
    #[error("request to {path} rejected: {source}")]
    Rejected {
        path: String,
        #[source]
        source: crate::net::NetError,
    },

    /// The backend answered with a non-success status.
    #[error("{path} returned status {status}: {}", .errors.join("; "))]
    Status {
        path: String,
        status: u16,
        errors: Vec<String>,
    },

    /// The response body was not valid JSON.
    #[error("invalid response body from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl TransportError {
    /// Returns the HTTP status reported by the backend, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            TransportError::Http { source, .. } => source.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// A request/response channel to a transit backend.
///
/// Paths are relative to the API root (`<mount>/<endpoint>/<key>`) and
/// already escaped. Both methods return the `data` object of the
/// backend's answer, or `None` when the backend returned nothing.
///
/// Cancellation is by dropping the returned future; timeouts belong to
/// the implementation.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Reads the resource at `path`.
    async fn read(&self, path: &str) -> Result<Option<Value>, TransportError>;

    /// Writes `body` to `path`. `None` sends an empty request body.
    async fn write(&self, path: &str, body: Option<Value>) -> Result<Option<Value>, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_display() {
        let err = TransportError::Status {
            path: "transit/keys/orders".into(),
            status: 403,
            errors: vec!["permission denied".into(), "1 error occurred".into()],
        };
        assert_eq!(
            err.to_string(),
            "transit/keys/orders returned status 403: permission denied; 1 error occurred"
        );
        assert_eq!(err.status(), Some(403));
    }
}
