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

//! NetStorage API credential storage and request signing helpers.
//!
//! Every request carries the ACS header triple: the action query, an
//! auth-data tuple, and a base64 HMAC-SHA256 signature over both. Signing is
//! deterministic given `(key, key_name, path, query, unix_seconds, unique_id)`
//! so the scheme is verifiable with fixed vectors.

use std::{
    fmt::Debug,
    time::{SystemTime, UNIX_EPOCH},
};

use aws_lc_rs::hmac;
use base64::prelude::*;
use rand::{distr::Alphanumeric, Rng};
use ustr::Ustr;
use zeroize::ZeroizeOnDrop;

use crate::common::consts::{ACS_AUTH_RESERVED, ACS_AUTH_VERSION};

/// The signed ACS header triple attached to every request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AcsHeaders {
    /// Value for `X-Akamai-ACS-Action`.
    pub action: String,
    /// Value for `X-Akamai-ACS-Auth-Data`.
    pub auth_data: String,
    /// Value for `X-Akamai-ACS-Auth-Sign`.
    pub auth_sign: String,
}

/// NetStorage upload-account credentials for signing requests.
///
/// Uses HMAC SHA256 for request signing as per the ACS authentication scheme.
/// The secret key is automatically zeroized on drop.
#[derive(Clone, ZeroizeOnDrop)]
pub struct Credential {
    #[zeroize(skip)]
    pub key_name: Ustr,
    key: Box<[u8]>,
}

impl Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(Credential))
            .field("key_name", &self.key_name)
            .field("key", &"<redacted>")
            .finish()
    }
}

impl Credential {
    /// Creates a new [`Credential`] instance.
    #[must_use]
    pub fn new(key: String, key_name: String) -> Self {
        Self {
            key_name: key_name.into(),
            key: key.into_bytes().into_boxed_slice(),
        }
    }

    /// Signs an arbitrary message with the account key.
    #[must_use]
    pub fn sign(&self, message: &str) -> String {
        let key = hmac::Key::new(hmac::HMAC_SHA256, &self.key[..]);
        let tag = hmac::sign(&key, message.as_bytes());
        BASE64_STANDARD.encode(tag.as_ref())
    }

    /// Builds the comma-space-separated auth-data tuple.
    #[must_use]
    pub fn auth_data(&self, unix_seconds: u64, unique_id: &str) -> String {
        format!(
            "{ACS_AUTH_VERSION}, {ACS_AUTH_RESERVED}, {ACS_AUTH_RESERVED}, {unix_seconds}, {unique_id}, {}",
            self.key_name
        )
    }

    /// Produces the signed header triple for a request.
    ///
    /// `signing_path` must already carry the CP-code prefix with the trailing
    /// slash trimmed (see [`crate::common::urls::signing_path`]), and
    /// `action_query` is the canonical `version=1&action=…` string.
    #[must_use]
    pub fn acs_headers(
        &self,
        signing_path: &str,
        action_query: &str,
        unix_seconds: u64,
        unique_id: &str,
    ) -> AcsHeaders {
        let auth_data = self.auth_data(unix_seconds, unique_id);
        let sign_input = format!("{auth_data}{signing_path}\nx-akamai-acs-action:{action_query}\n");
        let auth_sign = self.sign(&sign_input);
        AcsHeaders {
            action: action_query.to_string(),
            auth_data,
            auth_sign,
        }
    }
}

/// Returns the current Unix time in whole seconds.
///
/// # Panics
///
/// Panics if the system clock is set before the Unix epoch.
#[must_use]
pub fn unix_seconds_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before Unix epoch")
        .as_secs()
}

/// Generates the per-request nonce for the auth-data tuple.
///
/// A short random alphanumeric window concatenated with the process id:
/// distinct across concurrent requests within the same process, and cheap
/// enough to mint per request.
#[must_use]
pub fn unique_id() -> String {
    let window: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect();
    format!("{window}{}", std::process::id())
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::common::urls;

    const KEY: &str = "secret";
    const KEY_NAME: &str = "alice";

    fn credential() -> Credential {
        Credential::new(KEY.to_string(), KEY_NAME.to_string())
    }

    #[rstest]
    fn test_auth_data_layout() {
        let auth_data = credential().auth_data(1_700_000_000, "abc123");
        assert_eq!(auth_data, "5, 0.0.0.0, 0.0.0.0, 1700000000, abc123, alice");
    }

    #[rstest]
    fn test_signing_determinism_with_cp_code() {
        let path = urls::signing_path("/foo/bar", Some("12345"));
        let headers = credential().acs_headers(
            &path,
            "version=1&action=stat&format=xml",
            1_700_000_000,
            "abc123",
        );

        assert_eq!(headers.action, "version=1&action=stat&format=xml");
        assert_eq!(
            headers.auth_data,
            "5, 0.0.0.0, 0.0.0.0, 1700000000, abc123, alice"
        );
        assert_eq!(headers.auth_sign, "A4Wxzta3tbAPjXQoU6A7X3akBdRuW2Mazb7+SSAzAKM=");
    }

    #[rstest]
    fn test_signing_determinism_upload() {
        let path = urls::signing_path("/foo", None);
        let headers = credential().acs_headers(
            &path,
            "version=1&action=upload&format=xml&upload-type=binary",
            1_700_000_000,
            "abc123",
        );

        assert_eq!(headers.auth_sign, "3iB+D9thsepLPk/7yKA5ay9um6BM3Z6rFimVKJqAfl8=");
    }

    #[rstest]
    fn test_signature_stable_across_calls() {
        let credential = credential();
        let first = credential.acs_headers("/foo", "version=1&action=du&format=xml", 1, "id1");
        let second = credential.acs_headers("/foo", "version=1&action=du&format=xml", 1, "id1");
        assert_eq!(first, second);
    }

    #[rstest]
    fn test_unique_id_varies_within_process() {
        let first = unique_id();
        let second = unique_id();
        assert_ne!(first, second);
        let pid = std::process::id().to_string();
        assert!(first.ends_with(&pid));
        assert!(second.ends_with(&pid));
    }

    #[rstest]
    fn test_debug_redacts_key() {
        let output = format!("{:?}", credential());
        assert!(!output.contains(KEY));
        assert!(output.contains("<redacted>"));
    }
}
