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

//! Configuration structures for the NetStorage client.

use serde::{Deserialize, Serialize};

use crate::{
    common::{
        consts::{
            DEFAULT_DIR_LIMIT, DEFAULT_RATE_INTERVAL_MS, DEFAULT_READ_LIMIT, DEFAULT_TIMEOUT_MS,
            DEFAULT_WRITE_LIMIT,
        },
        urls,
    },
    http::error::{NetStorageError, Result},
    retry::RetryConfig,
};

/// Admissions per class for each refill interval.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct RateLimitConfig {
    /// `stat`/`du`/`download` admissions per interval.
    pub read: u32,
    /// Mutating-verb admissions per interval.
    pub write: u32,
    /// `dir` admissions per interval.
    pub dir: u32,
    /// Refill interval in milliseconds.
    pub interval_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            read: DEFAULT_READ_LIMIT,
            write: DEFAULT_WRITE_LIMIT,
            dir: DEFAULT_DIR_LIMIT,
            interval_ms: DEFAULT_RATE_INTERVAL_MS,
        }
    }
}

/// Configuration for the NetStorage client.
///
/// Constructed once and shared by reference across all operations; the
/// derived rate limiters and HTTP pool live on the client for as long as the
/// configuration does.
#[derive(Clone, Deserialize, Serialize, PartialEq)]
pub struct NetStorageConfig {
    /// Upload-account secret key.
    pub key: String,
    /// Upload-account key name.
    pub key_name: String,
    /// NetStorage host, e.g. `example-nsu.akamaihd.net`.
    pub host: String,
    /// When `true`, requests go over HTTPS.
    #[serde(default)]
    pub ssl: bool,
    /// Optional CP code prepended to request paths.
    #[serde(default)]
    pub cp_code: Option<String>,
    /// Default per-request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Per-class admission limits.
    #[serde(default)]
    pub rate_limits: RateLimitConfig,
    /// Retry policy for the request pipeline.
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl std::fmt::Debug for NetStorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(NetStorageConfig))
            .field("key", &"<redacted>")
            .field("key_name", &self.key_name)
            .field("host", &self.host)
            .field("ssl", &self.ssl)
            .field("cp_code", &self.cp_code)
            .field("timeout_ms", &self.timeout_ms)
            .field("rate_limits", &self.rate_limits)
            .field("retry", &self.retry)
            .finish()
    }
}

impl NetStorageConfig {
    /// Creates a new validated [`NetStorageConfig`] with default tuning.
    ///
    /// # Errors
    ///
    /// Returns [`NetStorageError::ConfigValidation`] if `key`, `key_name` or
    /// `host` is empty.
    pub fn new(key: String, key_name: String, host: String) -> Result<Self> {
        let config = Self {
            key,
            key_name,
            host,
            ssl: false,
            cp_code: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            rate_limits: RateLimitConfig::default(),
            retry: RetryConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validates the required fields.
    ///
    /// # Errors
    ///
    /// Returns [`NetStorageError::ConfigValidation`] naming the first empty
    /// required field.
    pub fn validate(&self) -> Result<()> {
        if self.key.trim().is_empty() {
            return Err(NetStorageError::ConfigValidation { field: "key" });
        }
        if self.key_name.trim().is_empty() {
            return Err(NetStorageError::ConfigValidation { field: "keyName" });
        }
        if self.host.trim().is_empty() {
            return Err(NetStorageError::ConfigValidation { field: "host" });
        }
        Ok(())
    }

    /// Returns the scheme-qualified base URL.
    #[must_use]
    pub fn base_url(&self) -> String {
        let scheme = if self.ssl { "https" } else { "http" };
        format!("{scheme}://{}", self.host)
    }

    /// Returns the full request URI for `path`, injecting the CP code.
    #[must_use]
    pub fn uri(&self, path: &str) -> String {
        format!(
            "{}{}",
            self.base_url(),
            urls::with_cp_code(path, self.cp_code.as_deref())
        )
    }

    /// Returns the path as signed, CP-code prefixed with one trailing slash
    /// trimmed.
    #[must_use]
    pub fn signing_path(&self, path: &str) -> String {
        urls::signing_path(path, self.cp_code.as_deref())
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn config() -> NetStorageConfig {
        NetStorageConfig::new(
            "secret".to_string(),
            "alice".to_string(),
            "h.example".to_string(),
        )
        .unwrap()
    }

    #[rstest]
    #[case("", "alice", "h.example", "key")]
    #[case("secret", "", "h.example", "keyName")]
    #[case("secret", "alice", "", "host")]
    #[case("  ", "alice", "h.example", "key")]
    fn test_validation_rejects_empty_fields(
        #[case] key: &str,
        #[case] key_name: &str,
        #[case] host: &str,
        #[case] expected_field: &str,
    ) {
        let result =
            NetStorageConfig::new(key.to_string(), key_name.to_string(), host.to_string());
        match result {
            Err(NetStorageError::ConfigValidation { field }) => {
                assert_eq!(field, expected_field);
            }
            other => panic!("expected ConfigValidation, got {other:?}"),
        }
    }

    #[rstest]
    fn test_defaults() {
        let config = config();
        assert!(!config.ssl);
        assert_eq!(config.timeout_ms, 10_000);
        assert_eq!(config.rate_limits.read, 800);
        assert_eq!(config.rate_limits.write, 25);
        assert_eq!(config.rate_limits.dir, 50);
        assert_eq!(config.rate_limits.interval_ms, 1_000);
    }

    #[rstest]
    fn test_uri_with_and_without_ssl() {
        let mut config = config();
        assert_eq!(config.uri("/foo"), "http://h.example/foo");

        config.ssl = true;
        assert_eq!(config.uri("/foo"), "https://h.example/foo");
    }

    #[rstest]
    fn test_uri_injects_cp_code_once() {
        let mut config = config();
        config.cp_code = Some("12345".to_string());
        assert_eq!(config.uri("/foo"), "http://h.example/12345/foo");
        assert_eq!(config.uri("/12345/foo"), "http://h.example/12345/foo");
    }

    #[rstest]
    fn test_debug_redacts_key() {
        let output = format!("{:?}", config());
        assert!(!output.contains("secret"));
    }
}
