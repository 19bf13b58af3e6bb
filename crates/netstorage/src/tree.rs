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

//! Formatted tree rendering over walk output.
//!
//! Directories sort ahead of files, then case-insensitively by name.
//! Optional columns append parenthesized and pipe-separated in a fixed
//! order: size, mtime, md5, symlink target, path. Directory sizes are the
//! aggregated subtree totals.

use std::{cmp::Ordering, collections::HashMap};

use crate::{
    http::client::{NetStorageClient, RequestOptions},
    walk::{
        adjacency::{aggregate_directory_sizes, build_adjacency_list, AdjacencyList},
        remote::{RemoteWalkOptions, WalkEntry},
    },
};

/// Which path column, if any, to append to each line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TreePathColumn {
    #[default]
    None,
    Relative,
    Absolute,
}

/// Options for [`tree`].
#[derive(Clone, Debug, Default)]
pub struct TreeOptions {
    /// Deepest level to descend into; absent means unbounded.
    pub max_depth: Option<u32>,
    /// Append file sizes and aggregated directory sizes.
    pub show_size: bool,
    /// Append modification times (Unix seconds).
    pub show_mtime: bool,
    /// Append MD5 checksums where the server reports them.
    pub show_md5: bool,
    /// Append symlink targets.
    pub show_target: bool,
    /// Append a relative or absolute path column.
    pub path_column: TreePathColumn,
    /// Per-request cancellation and timeout.
    pub request: RequestOptions,
}

/// A rendered tree plus the size rollups it was rendered from.
#[derive(Clone, Debug, Default)]
pub struct TreeOutput {
    /// Lines ready for display, the root label first.
    pub lines: Vec<String>,
    /// Sum of all file sizes beneath the root.
    pub total_size: u64,
    /// Aggregated subtree size per directory path.
    pub directory_sizes: HashMap<String, u64>,
}

/// Walks `path` and renders the remote tree.
pub async fn tree(client: &NetStorageClient, path: &str, options: TreeOptions) -> TreeOutput {
    let walk_options = RemoteWalkOptions {
        max_depth: options.max_depth,
        include: None,
        synthetic_root: false,
        request: options.request.clone(),
    };
    let list = build_adjacency_list(client, path, walk_options).await;
    render(path, &list, &options)
}

/// Renders an already-built adjacency list.
#[must_use]
pub fn render(root: &str, list: &AdjacencyList, options: &TreeOptions) -> TreeOutput {
    let entries = list.flattened();
    let directory_sizes = aggregate_directory_sizes(&entries);
    let root_path = crate::common::urls::trim_trailing_slash(root);

    let mut children: HashMap<&str, Vec<&WalkEntry>> = HashMap::new();
    for entry in &entries {
        if entry.is_synthetic_root() {
            continue;
        }
        children.entry(entry.parent.as_str()).or_default().push(entry);
    }
    for bucket in children.values_mut() {
        bucket.sort_by(|a, b| compare_entries(a, b));
    }

    let mut lines = vec![root_path.clone()];
    render_children(
        &root_path,
        "",
        &children,
        &directory_sizes,
        options,
        &mut lines,
    );

    TreeOutput {
        lines,
        total_size: list.total_size,
        directory_sizes,
    }
}

/// Directories ahead of files, then case-insensitive by name.
fn compare_entries(a: &WalkEntry, b: &WalkEntry) -> Ordering {
    match (a.file.is_dir(), b.file.is_dir()) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => a
            .file
            .name
            .to_lowercase()
            .cmp(&b.file.name.to_lowercase())
            .then_with(|| a.file.name.cmp(&b.file.name)),
    }
}

fn render_children(
    parent: &str,
    prefix: &str,
    children: &HashMap<&str, Vec<&WalkEntry>>,
    directory_sizes: &HashMap<String, u64>,
    options: &TreeOptions,
    lines: &mut Vec<String>,
) {
    let Some(bucket) = children.get(parent) else {
        return;
    };
    let last_index = bucket.len().saturating_sub(1);
    for (index, entry) in bucket.iter().enumerate() {
        let is_last = index == last_index;
        let connector = if is_last { "└── " } else { "├── " };
        let suffix = columns(entry, directory_sizes, options);
        lines.push(format!("{prefix}{connector}{}{suffix}", entry.file.name));

        if entry.file.is_dir() {
            let continuation = if is_last { "    " } else { "│   " };
            let child_prefix = format!("{prefix}{continuation}");
            render_children(
                entry.path.as_str(),
                &child_prefix,
                children,
                directory_sizes,
                options,
                lines,
            );
        }
    }
}

fn columns(
    entry: &WalkEntry,
    directory_sizes: &HashMap<String, u64>,
    options: &TreeOptions,
) -> String {
    let mut cols: Vec<String> = Vec::new();
    if options.show_size {
        let size = if entry.file.is_dir() {
            directory_sizes.get(&entry.path).copied().unwrap_or(0)
        } else {
            entry.file.parsed_size().unwrap_or(0)
        };
        cols.push(format!("size: {size}"));
    }
    if options.show_mtime {
        if let Some(mtime) = &entry.file.mtime {
            cols.push(format!("mtime: {mtime}"));
        }
    }
    if options.show_md5 {
        if let Some(md5) = &entry.file.md5 {
            cols.push(format!("md5: {md5}"));
        }
    }
    if options.show_target {
        if let Some(target) = &entry.file.target {
            cols.push(format!("target: {target}"));
        }
    }
    match options.path_column {
        TreePathColumn::None => {}
        TreePathColumn::Relative => cols.push(format!("path: {}", entry.relative_path)),
        TreePathColumn::Absolute => cols.push(format!("path: {}", entry.path)),
    }

    if cols.is_empty() {
        String::new()
    } else {
        format!(" ({})", cols.join(" | "))
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::{
        http::models::{RemoteEntry, RemoteEntryType},
        walk::adjacency::DepthBucket,
    };

    fn entry(
        name: &str,
        entry_type: RemoteEntryType,
        size: Option<u64>,
        parent: &str,
        relative: &str,
        depth: u32,
    ) -> WalkEntry {
        let mut file = RemoteEntry::named(name, entry_type);
        file.size = size.map(|s| s.to_string());
        WalkEntry {
            path: crate::common::urls::join_remote(parent, name),
            file,
            parent: parent.to_string(),
            relative_path: relative.to_string(),
            depth,
        }
    }

    fn fixture_list() -> AdjacencyList {
        AdjacencyList {
            buckets: vec![
                DepthBucket {
                    depth: 0,
                    entries: vec![
                        entry("zeta.txt", RemoteEntryType::File, Some(10), "/r", "zeta.txt", 0),
                        entry("Alpha", RemoteEntryType::Dir, None, "/r", "Alpha", 0),
                        entry("beta.txt", RemoteEntryType::File, Some(5), "/r", "beta.txt", 0),
                    ],
                },
                DepthBucket {
                    depth: 1,
                    entries: vec![entry(
                        "c.txt",
                        RemoteEntryType::File,
                        Some(30),
                        "/r/Alpha",
                        "Alpha/c.txt",
                        1,
                    )],
                },
            ],
            total_size: 45,
        }
    }

    #[rstest]
    fn test_render_layout_and_order() {
        let output = render("/r", &fixture_list(), &TreeOptions::default());

        assert_eq!(
            output.lines,
            vec![
                "/r",
                "├── Alpha",
                "│   └── c.txt",
                "├── beta.txt",
                "└── zeta.txt",
            ]
        );
    }

    #[rstest]
    fn test_render_size_columns() {
        let options = TreeOptions {
            show_size: true,
            ..Default::default()
        };
        let output = render("/r", &fixture_list(), &options);

        assert!(output.lines.contains(&"├── Alpha (size: 30)".to_string()));
        assert!(output.lines.contains(&"└── zeta.txt (size: 10)".to_string()));
        assert_eq!(output.total_size, 45);
    }

    #[rstest]
    fn test_render_path_column_order() {
        let options = TreeOptions {
            show_size: true,
            path_column: TreePathColumn::Relative,
            ..Default::default()
        };
        let output = render("/r", &fixture_list(), &options);

        assert!(output
            .lines
            .contains(&"│   └── c.txt (size: 30 | path: Alpha/c.txt)".to_string()));
    }

    #[rstest]
    fn test_directories_sort_before_files_case_insensitively() {
        let list = AdjacencyList {
            buckets: vec![DepthBucket {
                depth: 0,
                entries: vec![
                    entry("b.txt", RemoteEntryType::File, Some(1), "/r", "b.txt", 0),
                    entry("a", RemoteEntryType::Dir, None, "/r", "a", 0),
                    entry("B", RemoteEntryType::Dir, None, "/r", "B", 0),
                ],
            }],
            total_size: 1,
        };
        let output = render("/r", &list, &TreeOptions::default());
        assert_eq!(output.lines[1], "├── a");
        assert_eq!(output.lines[2], "├── B");
        assert_eq!(output.lines[3], "└── b.txt");
    }
}
