// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Error types surfaced by the client and its store backends.

use std::time::Duration;

use thiserror::Error;

/// Errors returned to callers of [`crate::CCentral`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// The key was never declared with one of the `add_*_field` methods.
    #[error("configuration option for '{0}' is missing")]
    UnknownField(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Store failure on an operation that reports errors back to the caller.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Failures talking to the key-value store.
///
/// The refresh engine logs and swallows every variant; they are only
/// visible to code that drives a [`crate::store::StoreClient`] directly.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Transport-level issue (DNS, TLS, socket, etc.).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The store answered with a non-success status.
    #[error("unexpected status {status} from {url}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },

    #[error("store request timed out after {0:?}")]
    Timeout(Duration),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The store answered, but not with the expected document shape.
    #[error("malformed store payload: {0}")]
    Payload(String),

    #[error("no store endpoints configured")]
    NoEndpoints,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_field_display() {
        let error = ClientError::UnknownField("bool".to_string());
        assert_eq!(
            error.to_string(),
            "configuration option for 'bool' is missing"
        );
    }

    #[test]
    fn test_store_error_wraps_into_client_error() {
        let error: ClientError = StoreError::Timeout(Duration::from_secs(20)).into();
        assert!(matches!(error, ClientError::Store(StoreError::Timeout(_))));
        assert_eq!(error.to_string(), "store error: store request timed out after 20s");
    }

    #[test]
    fn test_status_display() {
        let error = StoreError::Status {
            status: 500,
            url: "http://127.0.0.1:2379/v2/keys/x".to_string(),
            body: "boom".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "unexpected status 500 from http://127.0.0.1:2379/v2/keys/x: boom"
        );
    }
}
