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

//! Depth bucketing and per-directory size rollups over walk output.

use std::collections::{BTreeMap, HashMap};

use futures_util::{pin_mut, StreamExt};

use crate::{
    http::client::NetStorageClient,
    walk::remote::{walk_remote, RemoteWalkOptions, WalkEntry},
};

/// Walk entries grouped at one depth, in walk order.
#[derive(Clone, Debug, Default)]
pub struct DepthBucket {
    pub depth: u32,
    pub entries: Vec<WalkEntry>,
}

/// Depth-bucketed walk output with the total of all file sizes.
#[derive(Clone, Debug, Default)]
pub struct AdjacencyList {
    /// Buckets in ascending depth order.
    pub buckets: Vec<DepthBucket>,
    /// Sum of the parsed sizes of every file entry.
    pub total_size: u64,
}

impl AdjacencyList {
    /// Flattens the buckets in ascending depth order.
    ///
    /// The flattened order keeps every ancestor ahead of its descendants,
    /// which is the precondition for [`aggregate_directory_sizes`].
    #[must_use]
    pub fn flattened(&self) -> Vec<WalkEntry> {
        self.buckets
            .iter()
            .flat_map(|bucket| bucket.entries.iter().cloned())
            .collect()
    }
}

/// Drains the remote walker into depth buckets.
pub async fn build_adjacency_list(
    client: &NetStorageClient,
    path: &str,
    options: RemoteWalkOptions,
) -> AdjacencyList {
    let stream = walk_remote(client, path, options);
    pin_mut!(stream);

    let mut grouped: BTreeMap<u32, Vec<WalkEntry>> = BTreeMap::new();
    let mut total_size = 0u64;
    while let Some(entry) = stream.next().await {
        if entry.file.is_file() {
            total_size += entry.file.parsed_size().unwrap_or(0);
        }
        grouped.entry(entry.depth).or_default().push(entry);
    }

    AdjacencyList {
        buckets: grouped
            .into_iter()
            .map(|(depth, entries)| DepthBucket { depth, entries })
            .collect(),
        total_size,
    }
}

/// Rolls up file sizes into their ancestor directories.
///
/// `entries` must keep ancestors ahead of descendants (walk order or
/// flattened bucket order both qualify). The result maps every directory
/// path, including the walk root, to the byte total of all files beneath it.
#[must_use]
pub fn aggregate_directory_sizes(entries: &[WalkEntry]) -> HashMap<String, u64> {
    let mut sizes: HashMap<String, u64> = HashMap::new();
    let mut accumulators: HashMap<String, u64> = HashMap::new();

    // Deepest entries first: a directory's accumulator is complete by the
    // time the directory itself is visited.
    for entry in entries.iter().rev() {
        if entry.is_synthetic_root() {
            continue;
        }
        if entry.file.is_file() {
            let size = entry.file.parsed_size().unwrap_or(0);
            *accumulators.entry(entry.parent.clone()).or_default() += size;
        } else if entry.file.is_dir() {
            let subtree = accumulators.remove(&entry.path).unwrap_or(0);
            sizes.insert(entry.path.clone(), subtree);
            *accumulators.entry(entry.parent.clone()).or_default() += subtree;
        }
    }

    // Whatever accumulated against paths never yielded as directory entries
    // belongs to the walk root (and, with pruning, orphaned ancestors).
    for (path, size) in accumulators {
        *sizes.entry(path).or_default() += size;
    }

    sizes
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
