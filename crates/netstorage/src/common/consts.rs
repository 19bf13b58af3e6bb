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

//! Core constants shared across the NetStorage client components.

/// User agent sent with every request.
pub static NETSTORAGE_USER_AGENT: &str = concat!("netstorage-rs/", env!("CARGO_PKG_VERSION"));

/// Version field carried in the `X-Akamai-ACS-Auth-Data` tuple.
pub const ACS_AUTH_VERSION: u32 = 5;

/// Reserved fields of the auth-data tuple (unused by the ACS dialect but
/// required to be present).
pub const ACS_AUTH_RESERVED: &str = "0.0.0.0";

/// Default per-request timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Default width of the bounded scheduler used by directory-level operations.
pub const DEFAULT_MAX_CONCURRENCY: usize = 5;

/// Default read-class admissions per interval.
pub const DEFAULT_READ_LIMIT: u32 = 800;

/// Default write-class admissions per interval.
pub const DEFAULT_WRITE_LIMIT: u32 = 25;

/// Default dir-class admissions per interval.
pub const DEFAULT_DIR_LIMIT: u32 = 50;

/// Default token-bucket refill interval in milliseconds.
pub const DEFAULT_RATE_INTERVAL_MS: u64 = 1_000;

/// Maximum number of error-body bytes buffered into an HTTP error.
pub const ERROR_BODY_SNIPPET_MAX: usize = 8 * 1024;

/// HTTP status codes that should trigger retries.
///
/// Only transient server conditions and throttling are retried; client
/// errors surface immediately.
pub const RETRYABLE_STATUS_CODES: &[u16] = &[429, 500, 502, 503, 504];

/// Determines if an HTTP status code should trigger a retry.
#[must_use]
pub fn is_retryable_status(status: u16) -> bool {
    RETRYABLE_STATUS_CODES.contains(&status)
}

/// Expectation message for poisoned internal locks.
pub const MUTEX_POISONED: &str = "internal mutex poisoned";

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(429, true)]
    #[case(500, true)]
    #[case(502, true)]
    #[case(503, true)]
    #[case(504, true)]
    #[case(200, false)]
    #[case(400, false)]
    #[case(404, false)]
    #[case(501, false)]
    fn test_is_retryable_status(#[case] status: u16, #[case] expected: bool) {
        assert_eq!(is_retryable_status(status), expected);
    }
}
