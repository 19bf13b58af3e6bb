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

//! Client library for the [Akamai NetStorage](https://techdocs.akamai.com/netstorage) HTTP
//! content store.
//!
//! The `netstorage` crate provides the authenticated, rate-limited, retrying
//! request pipeline behind every NetStorage API verb, plus the traversal and
//! transfer orchestration built on top of it:
//!
//! - ACS request signing (HMAC-SHA256 header triple).
//! - Buffered XML transport for metadata verbs and streaming bodies for
//!   `upload`/`download`, with progress, cancellation, and timeouts.
//! - Per-operation-class token-bucket admission control.
//! - Bounded retries with exponential backoff and jitter.
//! - Lazy, depth-bounded remote walking with size rollups and tree
//!   rendering.
//! - Concurrent directory upload/download/removal and bidirectional sync
//!   with compare strategies and conflict rules.

#![warn(rustc::all)]
#![deny(unsafe_code)]
#![deny(nonstandard_style)]
#![deny(clippy::missing_errors_doc)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod backoff;
pub mod common;
pub mod config;
pub mod http;
pub mod ratelimiter;
pub mod retry;
pub mod sync;
pub mod transfer;
pub mod tree;
pub mod walk;

// Re-exports
pub use crate::{
    config::{NetStorageConfig, RateLimitConfig},
    http::{
        client::{NetStorageClient, ProgressFn, RequestOptions},
        error::{NetStorageError, NetworkErrorKind, Result},
        models::{RemoteEntry, RemoteEntryType, StatResponse, StatusDocument},
    },
    retry::RetryConfig,
    sync::{
        sync_directory, CompareStrategy, ConflictResolution, ConflictRule, DeleteExtraneous,
        RuleAction, SyncDirection, SyncOptions, SyncOptionsBuilder, SyncReport,
    },
    transfer::{
        download_directory, remove_directory, upload_directory, DownloadDirectoryOptions,
        DownloadDirectoryOptionsBuilder, RemoveDirectoryOptions, RemoveDirectoryOptionsBuilder,
        UploadDirectoryOptions, UploadDirectoryOptionsBuilder,
    },
    tree::{tree, TreeOptions, TreeOutput, TreePathColumn},
    walk::{
        adjacency::{aggregate_directory_sizes, build_adjacency_list, AdjacencyList, DepthBucket},
        local::{walk_local, LocalEntry, LocalWalkOptions},
        remote::{walk_remote, RemoteWalkOptions, WalkEntry},
    },
};
