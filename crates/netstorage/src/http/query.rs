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

//! NetStorage verbs and canonical action-query assembly.
//!
//! The action query is the string signed into `X-Akamai-ACS-Action`: it
//! always begins `version=1&action=<verb>&format=xml`, followed by the
//! verb-specific parameters. Key order is stable and later assignments
//! override earlier ones, so the query entering the signature and the query
//! on the wire are always byte-identical.

use reqwest::Method;
use strum::Display;

use crate::ratelimiter::OpClass;

/// The NetStorage API verbs.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
#[strum(serialize_all = "lowercase")]
pub enum NsVerb {
    Stat,
    Dir,
    Du,
    Mkdir,
    Rmdir,
    /// The `rm` operation; the wire action is named `delete`.
    Delete,
    Rename,
    Symlink,
    Mtime,
    Upload,
    Download,
}

impl NsVerb {
    /// Returns the HTTP method for the verb: GET for reads, PUT for writes.
    #[must_use]
    pub fn method(&self) -> Method {
        match self {
            Self::Stat | Self::Dir | Self::Du | Self::Download => Method::GET,
            _ => Method::PUT,
        }
    }

    /// Returns the admission class the verb is charged against.
    #[must_use]
    pub fn class(&self) -> OpClass {
        match self {
            Self::Dir => OpClass::Dir,
            Self::Stat | Self::Du | Self::Download => OpClass::Read,
            Self::Mkdir
            | Self::Rmdir
            | Self::Delete
            | Self::Rename
            | Self::Symlink
            | Self::Mtime
            | Self::Upload => OpClass::Write,
        }
    }
}

/// Ordered action-query builder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionQuery {
    verb: NsVerb,
    pairs: Vec<(String, String)>,
}

impl ActionQuery {
    /// Creates the canonical query for `verb`.
    #[must_use]
    pub fn new(verb: NsVerb) -> Self {
        Self {
            verb,
            pairs: vec![
                ("version".to_string(), "1".to_string()),
                ("action".to_string(), verb.to_string()),
                ("format".to_string(), "xml".to_string()),
            ],
        }
    }

    /// Returns the verb the query was built for.
    #[must_use]
    pub fn verb(&self) -> NsVerb {
        self.verb
    }

    /// Sets a parameter, overriding in place when the key already exists.
    #[must_use]
    pub fn set(mut self, key: &str, value: impl Into<String>) -> Self {
        let value = value.into();
        match self.pairs.iter_mut().find(|(k, _)| k == key) {
            Some(pair) => pair.1 = value,
            None => self.pairs.push((key.to_string(), value)),
        }
        self
    }

    /// Percent-encodes the query in its stable key order.
    #[must_use]
    pub fn encode(&self) -> String {
        serde_urlencoded::to_string(&self.pairs).unwrap_or_default()
    }

    /// Query for `stat`.
    #[must_use]
    pub fn stat() -> Self {
        Self::new(NsVerb::Stat)
    }

    /// Query for a single-page `dir` listing.
    #[must_use]
    pub fn dir() -> Self {
        Self::new(NsVerb::Dir)
    }

    /// Query for `du`.
    #[must_use]
    pub fn du() -> Self {
        Self::new(NsVerb::Du)
    }

    /// Query for `mkdir`.
    #[must_use]
    pub fn mkdir() -> Self {
        Self::new(NsVerb::Mkdir)
    }

    /// Query for `rmdir`.
    #[must_use]
    pub fn rmdir() -> Self {
        Self::new(NsVerb::Rmdir)
    }

    /// Query for `rm` (wire action `delete`).
    #[must_use]
    pub fn rm() -> Self {
        Self::new(NsVerb::Delete)
    }

    /// Query for `rename` to `destination`.
    #[must_use]
    pub fn rename(destination: &str) -> Self {
        Self::new(NsVerb::Rename).set("destination", destination)
    }

    /// Query for `symlink` pointing at `target`.
    #[must_use]
    pub fn symlink(target: &str) -> Self {
        Self::new(NsVerb::Symlink).set("target", target)
    }

    /// Query for `mtime` with a validated Unix-seconds instant.
    #[must_use]
    pub fn mtime(unix_seconds: i64) -> Self {
        Self::new(NsVerb::Mtime).set("mtime", unix_seconds.to_string())
    }

    /// Query for a binary `upload`.
    #[must_use]
    pub fn upload() -> Self {
        Self::new(NsVerb::Upload).set("upload-type", "binary")
    }

    /// Query for a streaming `download`.
    #[must_use]
    pub fn download() -> Self {
        Self::new(NsVerb::Download)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_canonical_prefix_and_order() {
        assert_eq!(ActionQuery::stat().encode(), "version=1&action=stat&format=xml");
        assert_eq!(
            ActionQuery::upload().encode(),
            "version=1&action=upload&format=xml&upload-type=binary"
        );
    }

    #[rstest]
    fn test_rm_maps_to_delete_action() {
        assert_eq!(ActionQuery::rm().encode(), "version=1&action=delete&format=xml");
    }

    #[rstest]
    fn test_set_overrides_in_place() {
        let query = ActionQuery::stat().set("format", "json").set("extra", "1");
        assert_eq!(query.encode(), "version=1&action=stat&format=json&extra=1");
    }

    #[rstest]
    fn test_destination_is_percent_encoded() {
        let query = ActionQuery::rename("/to/new name.txt");
        assert_eq!(
            query.encode(),
            "version=1&action=rename&format=xml&destination=%2Fto%2Fnew+name.txt"
        );
    }

    #[rstest]
    fn test_mtime_value() {
        let query = ActionQuery::mtime(1_700_000_000);
        assert_eq!(
            query.encode(),
            "version=1&action=mtime&format=xml&mtime=1700000000"
        );
    }

    #[rstest]
    #[case(NsVerb::Stat, OpClass::Read)]
    #[case(NsVerb::Du, OpClass::Read)]
    #[case(NsVerb::Download, OpClass::Read)]
    #[case(NsVerb::Dir, OpClass::Dir)]
    #[case(NsVerb::Mkdir, OpClass::Write)]
    #[case(NsVerb::Rmdir, OpClass::Write)]
    #[case(NsVerb::Delete, OpClass::Write)]
    #[case(NsVerb::Rename, OpClass::Write)]
    #[case(NsVerb::Symlink, OpClass::Write)]
    #[case(NsVerb::Mtime, OpClass::Write)]
    #[case(NsVerb::Upload, OpClass::Write)]
    fn test_verb_class_mapping(#[case] verb: NsVerb, #[case] expected: OpClass) {
        assert_eq!(verb.class(), expected);
    }

    #[rstest]
    #[case(NsVerb::Stat, Method::GET)]
    #[case(NsVerb::Dir, Method::GET)]
    #[case(NsVerb::Du, Method::GET)]
    #[case(NsVerb::Download, Method::GET)]
    #[case(NsVerb::Upload, Method::PUT)]
    #[case(NsVerb::Mkdir, Method::PUT)]
    fn test_verb_method_mapping(#[case] verb: NsVerb, #[case] expected: Method) {
        assert_eq!(verb.method(), expected);
    }
}
