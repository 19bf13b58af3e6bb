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

//! Local filesystem traversal feeding directory uploads and sync.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::http::error::{NetStorageError, Result};

/// One record of a local walk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalEntry {
    /// Absolute (or root-relative) filesystem path.
    pub local_path: PathBuf,
    /// Forward-slash path relative to the walk root.
    pub relative_path: String,
    /// `true` for directory records.
    pub is_directory: bool,
}

/// Options for [`walk_local`].
#[derive(Clone, Debug, Default)]
pub struct LocalWalkOptions {
    /// Glob patterns evaluated against the relative path; a match prunes the
    /// entry and, for directories, their subtree.
    pub ignore: Vec<String>,
    /// Follow symlinks into their targets. Unfollowed symlinks are skipped.
    pub follow_symlinks: bool,
    /// Emit directory records alongside files.
    pub include_dirs: bool,
}

/// Compiles ignore patterns into one matcher.
///
/// # Errors
///
/// Returns [`NetStorageError::Internal`] when a pattern is not a valid glob.
pub fn build_ignore_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| NetStorageError::Internal(format!("invalid ignore glob: {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| NetStorageError::Internal(format!("invalid ignore globs: {e}")))
}

fn relative_of(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Depth-first walk of a local tree in filesystem order.
///
/// Unreadable entries are logged at debug and skipped; they never abort the
/// walk.
///
/// # Errors
///
/// Returns an error if `root` does not exist or an ignore glob is invalid.
pub fn walk_local(root: &Path, options: &LocalWalkOptions) -> Result<Vec<LocalEntry>> {
    std::fs::metadata(root)?;
    let ignore_set = build_ignore_set(&options.ignore)?;

    let mut entries = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(options.follow_symlinks)
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0 || !ignore_set.is_match(relative_of(root, entry.path()))
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!("Skipping unreadable local entry: {e}");
                continue;
            }
        };
        if entry.depth() == 0 {
            continue;
        }

        let file_type = entry.file_type();
        let is_directory = file_type.is_dir();
        if !is_directory && !file_type.is_file() {
            // Unfollowed symlinks and special files.
            continue;
        }
        if is_directory && !options.include_dirs {
            continue;
        }

        entries.push(LocalEntry {
            relative_path: relative_of(root, entry.path()),
            local_path: entry.into_path(),
            is_directory,
        });
    }

    Ok(entries)
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn fixture_tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sub/nested")).unwrap();
        std::fs::create_dir_all(dir.path().join("node_modules/dep")).unwrap();
        std::fs::write(dir.path().join("a.txt"), b"aaa").unwrap();
        std::fs::write(dir.path().join("sub/b.txt"), b"bb").unwrap();
        std::fs::write(dir.path().join("sub/nested/c.log"), b"c").unwrap();
        std::fs::write(dir.path().join("node_modules/dep/index.js"), b"x").unwrap();
        dir
    }

    fn relative_paths(entries: &[LocalEntry]) -> Vec<String> {
        let mut paths: Vec<String> = entries.iter().map(|e| e.relative_path.clone()).collect();
        paths.sort();
        paths
    }

    #[rstest]
    fn test_walk_files_only() {
        let dir = fixture_tree();
        let entries = walk_local(dir.path(), &LocalWalkOptions::default()).unwrap();

        assert!(entries.iter().all(|e| !e.is_directory));
        assert_eq!(
            relative_paths(&entries),
            vec![
                "a.txt",
                "node_modules/dep/index.js",
                "sub/b.txt",
                "sub/nested/c.log",
            ]
        );
    }

    #[rstest]
    fn test_ignore_prunes_directory_subtree() {
        let dir = fixture_tree();
        let options = LocalWalkOptions {
            ignore: vec!["node_modules".to_string()],
            ..Default::default()
        };
        let entries = walk_local(dir.path(), &options).unwrap();

        assert_eq!(
            relative_paths(&entries),
            vec!["a.txt", "sub/b.txt", "sub/nested/c.log"]
        );
    }

    #[rstest]
    fn test_ignore_glob_on_relative_path() {
        let dir = fixture_tree();
        let options = LocalWalkOptions {
            ignore: vec!["**/*.log".to_string()],
            ..Default::default()
        };
        let entries = walk_local(dir.path(), &options).unwrap();

        assert!(entries.iter().all(|e| !e.relative_path.ends_with(".log")));
    }

    #[rstest]
    fn test_include_dirs() {
        let dir = fixture_tree();
        let options = LocalWalkOptions {
            include_dirs: true,
            ..Default::default()
        };
        let entries = walk_local(dir.path(), &options).unwrap();

        let dirs: Vec<&str> = entries
            .iter()
            .filter(|e| e.is_directory)
            .map(|e| e.relative_path.as_str())
            .collect();
        assert!(dirs.contains(&"sub"));
        assert!(dirs.contains(&"sub/nested"));
    }

    #[rstest]
    fn test_missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(walk_local(&missing, &LocalWalkOptions::default()).is_err());
    }

    #[cfg(unix)]
    #[rstest]
    fn test_symlinks_skipped_unless_followed() {
        let dir = fixture_tree();
        std::os::unix::fs::symlink(dir.path().join("a.txt"), dir.path().join("a.link")).unwrap();

        let entries = walk_local(dir.path(), &LocalWalkOptions::default()).unwrap();
        assert!(!relative_paths(&entries).contains(&"a.link".to_string()));

        let options = LocalWalkOptions {
            follow_symlinks: true,
            ..Default::default()
        };
        let entries = walk_local(dir.path(), &options).unwrap();
        assert!(relative_paths(&entries).contains(&"a.link".to_string()));
    }

    #[rstest]
    fn test_invalid_glob_is_an_error() {
        let dir = fixture_tree();
        let options = LocalWalkOptions {
            ignore: vec!["a[".to_string()],
            ..Default::default()
        };
        assert!(walk_local(dir.path(), &options).is_err());
    }
}
