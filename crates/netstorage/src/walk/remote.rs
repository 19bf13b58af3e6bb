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

//! Lazy depth-first traversal of a remote tree.
//!
//! The walker pulls one `dir` page per directory and yields entries as the
//! consumer demands them. Ordering guarantees: ancestors precede their
//! descendants, and siblings preserve server order. A failed `dir` call
//! prunes that subtree without aborting the walk.

use std::{collections::VecDeque, sync::Arc};

use async_stream::stream;
use futures_util::Stream;

use crate::{
    common::urls,
    http::{
        client::{NetStorageClient, RequestOptions},
        models::{RemoteEntry, RemoteEntryType},
    },
};

/// Name of the pseudo-entry representing the traversal root.
pub const SYNTHETIC_ROOT_NAME: &str = "__synthetic_root__";

/// One record yielded by the remote walker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WalkEntry {
    /// The listing element.
    pub file: RemoteEntry,
    /// Absolute, slash-collapsed remote path.
    pub path: String,
    /// Path of the containing directory (empty for the synthetic root).
    pub parent: String,
    /// Forward-slash path relative to the walk root (empty at the root).
    pub relative_path: String,
    /// Zero for immediate children of the root (and the synthetic root).
    pub depth: u32,
}

impl WalkEntry {
    /// Returns `true` when the entry is the synthetic root record.
    #[must_use]
    pub fn is_synthetic_root(&self) -> bool {
        self.file.name == SYNTHETIC_ROOT_NAME
    }
}

/// Include predicate applied to each candidate entry.
pub type IncludeFn = Arc<dyn Fn(&WalkEntry) -> bool + Send + Sync>;

/// Options for [`walk_remote`].
#[derive(Clone, Default)]
pub struct RemoteWalkOptions {
    /// Deepest level to descend into; `0` yields only immediate children of
    /// the root. Absent means unbounded.
    pub max_depth: Option<u32>,
    /// Entry filter; excluded directories are still descended into.
    pub include: Option<IncludeFn>,
    /// Yield a pseudo-entry for the root when the server reports it as a
    /// directory.
    pub synthetic_root: bool,
    /// Per-request cancellation and timeout.
    pub request: RequestOptions,
}

impl std::fmt::Debug for RemoteWalkOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(RemoteWalkOptions))
            .field("max_depth", &self.max_depth)
            .field("include", &self.include.as_ref().map(|_| "<fn>"))
            .field("synthetic_root", &self.synthetic_root)
            .field("request", &self.request)
            .finish()
    }
}

struct Frame {
    path: String,
    relative: String,
    depth: u32,
    entries: VecDeque<RemoteEntry>,
}

/// Walks the remote tree rooted at `path`, depth-first and lazily.
///
/// Consumption drives the traversal; no listing is requested until the
/// consumer demands entries from that directory.
pub fn walk_remote<'a>(
    client: &'a NetStorageClient,
    path: &str,
    options: RemoteWalkOptions,
) -> impl Stream<Item = WalkEntry> + 'a {
    let root = urls::trim_trailing_slash(path);

    stream! {
        let listing = match client.dir(&root, &options.request).await {
            Ok(listing) => listing,
            Err(e) => {
                tracing::debug!("Pruning walk root {root}: {e}");
                return;
            }
        };

        if options.synthetic_root && listing.directory.is_some() {
            yield WalkEntry {
                file: RemoteEntry::named(SYNTHETIC_ROOT_NAME, RemoteEntryType::Dir),
                path: root.clone(),
                parent: String::new(),
                relative_path: String::new(),
                depth: 0,
            };
        }

        let mut stack = vec![Frame {
            path: root,
            relative: String::new(),
            depth: 0,
            entries: listing.entries.into(),
        }];

        while !stack.is_empty() {
            let (parent, relative_prefix, depth, entry) = {
                let Some(top) = stack.last_mut() else { break };
                match top.entries.pop_front() {
                    Some(entry) => (top.path.clone(), top.relative.clone(), top.depth, entry),
                    None => {
                        stack.pop();
                        continue;
                    }
                }
            };

            let full_path = urls::join_remote(&parent, &entry.name);
            let relative_path = urls::join_relative(&relative_prefix, &entry.name);
            let is_dir = entry.is_dir();

            let walk_entry = WalkEntry {
                file: entry,
                path: full_path.clone(),
                parent,
                relative_path: relative_path.clone(),
                depth,
            };

            let included = options
                .include
                .as_ref()
                .is_none_or(|include| include(&walk_entry));
            if included {
                yield walk_entry;
            }

            let descend = is_dir && options.max_depth.is_none_or(|max| depth < max);
            if descend {
                match client.dir(&full_path, &options.request).await {
                    Ok(listing) => stack.push(Frame {
                        path: full_path,
                        relative: relative_path,
                        depth: depth + 1,
                        entries: listing.entries.into(),
                    }),
                    Err(e) => {
                        tracing::debug!("Pruning subtree {full_path}: {e}");
                    }
                }
            }
        }
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
    fn test_synthetic_root_recognition() {
        let entry = WalkEntry {
            file: RemoteEntry::named(SYNTHETIC_ROOT_NAME, RemoteEntryType::Dir),
            path: "/r".to_string(),
            parent: String::new(),
            relative_path: String::new(),
            depth: 0,
        };
        assert!(entry.is_synthetic_root());
    }

    #[rstest]
    fn test_walk_entry_path_invariant() {
        let entry = WalkEntry {
            file: RemoteEntry::named("c.txt", RemoteEntryType::File),
            path: urls::join_remote("/r/A", "c.txt"),
            parent: "/r/A".to_string(),
            relative_path: "A/c.txt".to_string(),
            depth: 1,
        };
        assert_eq!(entry.path, format!("{}/{}", entry.parent, entry.file.name));
    }
}
