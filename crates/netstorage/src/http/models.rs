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

//! Data models for NetStorage XML responses.
//!
//! Attribute values stay as the server sends them (decimal-digit strings);
//! the `parsed_*` helpers convert on demand so listing large directories
//! never pays for numbers nobody reads.

use serde::{Deserialize, Serialize};

/// Entry kinds reported by directory listings.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub enum RemoteEntryType {
    #[serde(rename = "file")]
    File,
    #[serde(rename = "dir")]
    Dir,
    #[serde(rename = "symlink")]
    Symlink,
}

/// One element of a `stat` or `dir` response.
///
/// XML attributes decode from their `@`-prefixed form; serialization (CLI
/// JSON output) uses the bare names.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct RemoteEntry {
    /// Entry name relative to the listed directory.
    #[serde(rename(serialize = "name", deserialize = "@name"))]
    pub name: String,
    /// Entry kind.
    #[serde(rename(serialize = "type", deserialize = "@type"))]
    pub entry_type: RemoteEntryType,
    /// File size in bytes, present for files.
    #[serde(
        rename(serialize = "size", deserialize = "@size"),
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub size: Option<String>,
    /// Modification time in Unix seconds.
    #[serde(
        rename(serialize = "mtime", deserialize = "@mtime"),
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub mtime: Option<String>,
    /// MD5 checksum, present when the account enables it.
    #[serde(
        rename(serialize = "md5", deserialize = "@md5"),
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub md5: Option<String>,
    /// Symlink target, present for symlinks.
    #[serde(
        rename(serialize = "target", deserialize = "@target"),
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub target: Option<String>,
    /// `"true"` when the directory exists only because files live beneath it.
    #[serde(
        rename(serialize = "implicit", deserialize = "@implicit"),
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub implicit: Option<String>,
    /// Aggregate byte count carried on directory entries.
    #[serde(
        rename(serialize = "bytes", deserialize = "@bytes"),
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub bytes: Option<String>,
    /// Aggregate file count carried on directory entries.
    #[serde(
        rename(serialize = "files", deserialize = "@files"),
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub files: Option<String>,
}

impl RemoteEntry {
    /// Creates a minimal entry, used for synthetic records.
    #[must_use]
    pub fn named(name: impl Into<String>, entry_type: RemoteEntryType) -> Self {
        Self {
            name: name.into(),
            entry_type,
            size: None,
            mtime: None,
            md5: None,
            target: None,
            implicit: None,
            bytes: None,
            files: None,
        }
    }

    #[must_use]
    pub fn is_file(&self) -> bool {
        self.entry_type == RemoteEntryType::File
    }

    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.entry_type == RemoteEntryType::Dir
    }

    #[must_use]
    pub fn is_symlink(&self) -> bool {
        self.entry_type == RemoteEntryType::Symlink
    }

    /// Returns `true` for directories the server marks implicit.
    #[must_use]
    pub fn is_implicit(&self) -> bool {
        self.implicit.as_deref() == Some("true")
    }

    /// Parses the size attribute.
    #[must_use]
    pub fn parsed_size(&self) -> Option<u64> {
        self.size.as_deref().and_then(|s| s.parse().ok())
    }

    /// Parses the mtime attribute into Unix seconds.
    #[must_use]
    pub fn parsed_mtime(&self) -> Option<i64> {
        self.mtime.as_deref().and_then(|s| s.parse().ok())
    }
}

/// Raw `<stat>`/`<list>` document as decoded from XML.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct StatXml {
    #[serde(rename = "@directory", default)]
    pub directory: Option<String>,
    #[serde(rename = "file", default)]
    pub files: Vec<RemoteEntry>,
}

/// Raw `<du-info>` element.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct DuInfo {
    /// Number of files beneath the directory.
    #[serde(rename(serialize = "files", deserialize = "@files"))]
    pub files: u64,
    /// Total bytes beneath the directory.
    #[serde(rename(serialize = "bytes", deserialize = "@bytes"))]
    pub bytes: u64,
}

/// Raw `<du>` document.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct DuXml {
    #[serde(rename = "@directory", default)]
    pub directory: Option<String>,
    #[serde(rename = "du-info")]
    pub info: DuInfo,
}

/// Raw `<status>` document returned by some mutating verbs.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct StatusXml {
    #[serde(rename = "@code")]
    pub code: u16,
    #[serde(rename = "@message", default)]
    pub message: Option<String>,
}

/// Normalized status record; carries the XML `<status>` when the server sent
/// one, otherwise the HTTP status.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct StatusDocument {
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StatusDocument {
    /// Builds a status record from a bare HTTP status code.
    #[must_use]
    pub fn from_http(status: u16) -> Self {
        Self {
            code: status,
            message: None,
        }
    }

    /// The record reported when an operation decided to do nothing (e.g. an
    /// `upload_missing` whose destination already exists).
    #[must_use]
    pub fn skipped() -> Self {
        Self {
            code: 0,
            message: Some("skipped".to_string()),
        }
    }
}

impl From<StatusXml> for StatusDocument {
    fn from(value: StatusXml) -> Self {
        Self {
            code: value.code,
            message: value.message,
        }
    }
}

/// Normalized `stat`/`dir` response.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct StatResponse {
    /// The listed directory path, when the server reported one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
    /// Listing entries in server order.
    pub entries: Vec<RemoteEntry>,
    /// Response status.
    pub status: StatusDocument,
}

impl StatResponse {
    /// Returns the single file record of a `stat` on a file path.
    #[must_use]
    pub fn file(&self) -> Option<&RemoteEntry> {
        self.entries.first()
    }
}

/// Normalized `du` response.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct DuResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<DuInfo>,
    pub status: StatusDocument,
}

/// Result of a streaming upload.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct UploadOutcome {
    pub status: StatusDocument,
    /// Bytes sent on the wire; zero when the upload was skipped.
    pub bytes_transferred: u64,
}

/// Result of a streaming download.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct DownloadOutcome {
    pub status: StatusDocument,
    /// Bytes written to the destination.
    pub bytes_transferred: u64,
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn file_entry(size: Option<&str>) -> RemoteEntry {
        let mut entry = RemoteEntry::named("a.txt", RemoteEntryType::File);
        entry.size = size.map(str::to_string);
        entry
    }

    #[rstest]
    fn test_parsed_size() {
        assert_eq!(file_entry(Some("1024")).parsed_size(), Some(1024));
        assert_eq!(file_entry(None).parsed_size(), None);
        assert_eq!(file_entry(Some("not-a-number")).parsed_size(), None);
    }

    #[rstest]
    fn test_parsed_mtime() {
        let mut entry = file_entry(None);
        entry.mtime = Some("1700000000".to_string());
        assert_eq!(entry.parsed_mtime(), Some(1_700_000_000));
    }

    #[rstest]
    #[case(Some("true"), true)]
    #[case(Some("false"), false)]
    #[case(None, false)]
    fn test_is_implicit(#[case] implicit: Option<&str>, #[case] expected: bool) {
        let mut entry = RemoteEntry::named("sub", RemoteEntryType::Dir);
        entry.implicit = implicit.map(str::to_string);
        assert_eq!(entry.is_implicit(), expected);
    }

    #[rstest]
    fn test_skipped_status_code_zero() {
        assert_eq!(StatusDocument::skipped().code, 0);
    }
}
