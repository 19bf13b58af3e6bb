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

//! Comparison predicates shared by conditional uploads and sync.
//!
//! Missing remote metadata (size or md5) always counts as a mismatch: the
//! safe reading of "unknown" is "needs transfer".

use std::path::Path;

use crate::http::{error::Result, models::RemoteEntry};

/// Returns `true` when no remote entry exists.
#[must_use]
pub fn is_remote_missing(remote: Option<&RemoteEntry>) -> bool {
    remote.is_none()
}

/// Returns `true` when the remote size is absent or differs from the local
/// size.
#[must_use]
pub fn is_size_mismatch(local_size: u64, remote: &RemoteEntry) -> bool {
    remote.parsed_size() != Some(local_size)
}

/// Returns `true` when the local mtime (milliseconds) is strictly newer than
/// the remote one (Unix seconds).
#[must_use]
pub fn is_mtime_newer(local_mtime_ms: i64, remote: &RemoteEntry) -> bool {
    match remote.parsed_mtime() {
        Some(remote_secs) => local_mtime_ms > remote_secs * 1_000,
        None => true,
    }
}

/// Returns `true` when the remote md5 is absent or differs from the local
/// file's checksum.
///
/// # Errors
///
/// Returns an error if the local file cannot be read.
pub async fn is_checksum_mismatch(local_path: &Path, remote: &RemoteEntry) -> Result<bool> {
    let Some(remote_md5) = remote.md5.as_deref() else {
        return Ok(true);
    };
    let local_md5 = file_md5_hex(local_path).await?;
    Ok(!local_md5.eq_ignore_ascii_case(remote_md5))
}

/// Computes the hex MD5 of a local file.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub async fn file_md5_hex(path: &Path) -> Result<String> {
    let contents = tokio::fs::read(path).await?;
    Ok(format!("{:x}", md5::compute(&contents)))
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
