// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2025 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! Error structures and enumerations for the NetStorage client.
//!
//! The taxonomy is small and fixed: configuration validation, typed HTTP
//! failures, classified transport failures, invalid mtime instants, XML
//! decode failures, local I/O, and internal invariant breaks. Retryability
//! is a property of the error value so the retry driver never inspects
//! transport internals.

use strum::Display;
use thiserror::Error;

use crate::common::consts::is_retryable_status;

/// Convenience alias for results carrying a [`NetStorageError`].
pub type Result<T> = std::result::Result<T, NetStorageError>;

/// Classified transport failure kinds.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
#[strum(serialize_all = "lowercase")]
pub enum NetworkErrorKind {
    /// The request or stream exceeded its deadline.
    Timeout,
    /// The connection was reset or closed by the peer.
    Reset,
    /// Host name resolution failed.
    DnsFailure,
    /// The request was aborted by the caller.
    Aborted,
}

/// A typed error enumeration for the NetStorage client.
#[derive(Debug, Error)]
pub enum NetStorageError {
    /// A required configuration field is missing or empty.
    #[error("Invalid configuration: `{field}` must be set")]
    ConfigValidation {
        /// Name of the offending field.
        field: &'static str,
    },
    /// The server answered with a non-success status.
    #[error("HTTP {status} for {method} {url}")]
    Http {
        status: u16,
        method: String,
        url: String,
        /// First bytes of the response body, capped at 8 KiB.
        body: String,
    },
    /// The request failed below the HTTP layer.
    #[error("Network error ({kind}): {detail}")]
    Network {
        kind: NetworkErrorKind,
        detail: String,
    },
    /// The supplied mtime is not a valid instant.
    #[error("Not a valid date: {value}")]
    NotADate { value: i64 },
    /// The response body could not be decoded as NetStorage XML.
    #[error("XML decode error: {0}")]
    Xml(String),
    /// A local filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// An internal invariant was broken.
    #[error("{0}")]
    Internal(String),
}

impl NetStorageError {
    /// Builds an aborted-by-caller error.
    #[must_use]
    pub fn aborted(detail: impl Into<String>) -> Self {
        Self::Network {
            kind: NetworkErrorKind::Aborted,
            detail: detail.into(),
        }
    }

    /// Builds a deadline-exceeded error.
    #[must_use]
    pub fn timeout(detail: impl Into<String>) -> Self {
        Self::Network {
            kind: NetworkErrorKind::Timeout,
            detail: detail.into(),
        }
    }

    /// Classifies a transport-layer failure from the underlying HTTP client.
    #[must_use]
    pub fn from_transport(error: &reqwest::Error, method: &str, url: &str) -> Self {
        let detail = format!("{method} {url}: {error}");
        let kind = if error.is_timeout() {
            NetworkErrorKind::Timeout
        } else if error.is_connect() {
            // reqwest does not expose resolver failures as a distinct
            // variant; the error chain names dns when resolution failed.
            if detail.contains("dns") || detail.contains("resolve") {
                NetworkErrorKind::DnsFailure
            } else {
                NetworkErrorKind::Reset
            }
        } else {
            NetworkErrorKind::Reset
        };
        Self::Network { kind, detail }
    }

    /// Returns `true` when the retry driver should re-attempt the operation.
    ///
    /// Transient network kinds and HTTP {429, 500, 502, 503, 504} retry;
    /// everything else surfaces immediately. An aborted request is a caller
    /// decision and never retries.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http { status, .. } => is_retryable_status(*status),
            Self::Network { kind, .. } => !matches!(kind, NetworkErrorKind::Aborted),
            _ => false,
        }
    }

    /// Returns `true` when the error is an HTTP 404.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Http { status: 404, .. })
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn http_error(status: u16) -> NetStorageError {
        NetStorageError::Http {
            status,
            method: "GET".to_string(),
            url: "http://h.example/foo".to_string(),
            body: String::new(),
        }
    }

    #[rstest]
    #[case(429, true)]
    #[case(500, true)]
    #[case(503, true)]
    #[case(404, false)]
    #[case(400, false)]
    fn test_http_retryability(#[case] status: u16, #[case] expected: bool) {
        assert_eq!(http_error(status).is_retryable(), expected);
    }

    #[rstest]
    #[case(NetworkErrorKind::Timeout, true)]
    #[case(NetworkErrorKind::Reset, true)]
    #[case(NetworkErrorKind::DnsFailure, true)]
    #[case(NetworkErrorKind::Aborted, false)]
    fn test_network_retryability(#[case] kind: NetworkErrorKind, #[case] expected: bool) {
        let error = NetStorageError::Network {
            kind,
            detail: String::new(),
        };
        assert_eq!(error.is_retryable(), expected);
    }

    #[rstest]
    fn test_not_found_recognition() {
        assert!(http_error(404).is_not_found());
        assert!(!http_error(403).is_not_found());
        assert!(!NetStorageError::Internal("404".to_string()).is_not_found());
    }

    #[rstest]
    fn test_non_transport_errors_never_retry() {
        assert!(!NetStorageError::NotADate { value: -1 }.is_retryable());
        assert!(!NetStorageError::Xml("bad".to_string()).is_retryable());
        assert!(!NetStorageError::ConfigValidation { field: "key" }.is_retryable());
    }
}
