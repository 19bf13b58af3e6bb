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

//! Remote path canonicalization and URI assembly.
//!
//! NetStorage paths are absolute, slash-separated, and may be prefixed with a
//! CP code. The helpers here are the single place where slashes are collapsed
//! and the CP code is injected, so that the URI sent on the wire and the path
//! that enters the signature always agree.

/// Collapses repeated slashes and guarantees a single leading slash.
///
/// An empty input canonicalizes to `"/"`.
#[must_use]
pub fn canonicalize_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len() + 1);
    out.push('/');
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        if !out.ends_with('/') {
            out.push('/');
        }
        out.push_str(segment);
    }
    out
}

/// Canonicalizes and trims trailing slashes, keeping the bare root as `"/"`.
#[must_use]
pub fn trim_trailing_slash(path: &str) -> String {
    let canonical = canonicalize_path(path);
    let trimmed = canonical.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Prepends the CP code iff one is configured and the path does not already
/// begin with it.
#[must_use]
pub fn with_cp_code(path: &str, cp_code: Option<&str>) -> String {
    let canonical = canonicalize_path(path);
    match cp_code {
        Some(code) if !code.is_empty() => {
            let prefix = format!("/{code}");
            if canonical == prefix || canonical.starts_with(&format!("{prefix}/")) {
                canonical
            } else if canonical == "/" {
                prefix
            } else {
                format!("{prefix}{canonical}")
            }
        }
        _ => canonical,
    }
}

/// The path that enters the ACS signature: CP-code prefixed with one trailing
/// slash trimmed.
#[must_use]
pub fn signing_path(path: &str, cp_code: Option<&str>) -> String {
    let prefixed = with_cp_code(path, cp_code);
    match prefixed.strip_suffix('/') {
        Some(rest) if !rest.is_empty() => rest.to_string(),
        _ => prefixed,
    }
}

/// Joins a remote directory path and a child name, collapsing slashes.
#[must_use]
pub fn join_remote(parent: &str, name: &str) -> String {
    if parent == "/" || parent.is_empty() {
        canonicalize_path(&format!("/{name}"))
    } else {
        canonicalize_path(&format!("{parent}/{name}"))
    }
}

/// Joins a relative prefix and a child name with forward slashes.
#[must_use]
pub fn join_relative(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
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
    #[case("", "/")]
    #[case("/", "/")]
    #[case("//", "/")]
    #[case("foo/bar", "/foo/bar")]
    #[case("/foo//bar/", "/foo/bar")]
    #[case("///foo", "/foo")]
    fn test_canonicalize_path(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(canonicalize_path(input), expected);
    }

    #[rstest]
    #[case("/", "/")]
    #[case("/foo/", "/foo")]
    #[case("/foo//", "/foo")]
    #[case("/foo/bar", "/foo/bar")]
    fn test_trim_trailing_slash(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(trim_trailing_slash(input), expected);
    }

    #[rstest]
    #[case("/foo/bar", None, "/foo/bar")]
    #[case("/foo/bar", Some("12345"), "/12345/foo/bar")]
    #[case("/12345/foo", Some("12345"), "/12345/foo")]
    #[case("/12345", Some("12345"), "/12345")]
    #[case("/", Some("12345"), "/12345")]
    #[case("/123456/foo", Some("12345"), "/12345/123456/foo")]
    fn test_with_cp_code(#[case] path: &str, #[case] cp: Option<&str>, #[case] expected: &str) {
        assert_eq!(with_cp_code(path, cp), expected);
    }

    #[rstest]
    #[case("/foo/bar/", Some("12345"), "/12345/foo/bar")]
    #[case("/foo/bar", Some("12345"), "/12345/foo/bar")]
    #[case("/", None, "/")]
    fn test_signing_path(#[case] path: &str, #[case] cp: Option<&str>, #[case] expected: &str) {
        assert_eq!(signing_path(path, cp), expected);
    }

    #[rstest]
    #[case("/", "a.txt", "/a.txt")]
    #[case("/r", "A", "/r/A")]
    #[case("/r/", "A", "/r/A")]
    fn test_join_remote(#[case] parent: &str, #[case] name: &str, #[case] expected: &str) {
        assert_eq!(join_remote(parent, name), expected);
    }

    #[rstest]
    #[case("", "a.txt", "a.txt")]
    #[case("sub", "a.txt", "sub/a.txt")]
    fn test_join_relative(#[case] prefix: &str, #[case] name: &str, #[case] expected: &str) {
        assert_eq!(join_relative(prefix, name), expected);
    }
}
