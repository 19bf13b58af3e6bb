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

//! Directory-level transfer operations with bounded concurrency.
//!
//! `upload_directory`, `download_directory` and `remove_directory` fan out
//! per-item work through a scheduler of configurable width. Per-item errors
//! become skip outcomes carried in the returned report; only cancellation
//! stops a batch early, and it does so by refusing to start new items while
//! outstanding ones settle.

pub mod predicates;

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use derive_builder::Builder;
use futures_util::{pin_mut, StreamExt};

use crate::{
    common::{consts::DEFAULT_MAX_CONCURRENCY, urls},
    http::{
        client::{NetStorageClient, RequestOptions},
        error::Result,
    },
    walk::{
        local::{walk_local, LocalWalkOptions},
        remote::{walk_remote, RemoteWalkOptions, WalkEntry},
    },
};

/// Why an item was not transferred or removed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// Rejected by the caller's filter.
    Filtered,
    /// Dry run: the work was only reported.
    DryRun,
    /// The destination exists and overwriting is disabled.
    OverwriteDisabled,
    /// An implicit directory; it disappears with its contents.
    Implicit,
    /// The per-item operation failed.
    Error(String),
}

/// One file scheduled for transfer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferRecord {
    /// Forward-slash path relative to both roots.
    pub relative_path: String,
    /// Local file path.
    pub local_path: PathBuf,
    /// Absolute remote path.
    pub remote_path: String,
    /// Bytes moved; zero until the transfer completes.
    pub bytes: u64,
}

/// Outcome of one scheduled item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransferEvent {
    Transferred(TransferRecord),
    Skipped(TransferRecord, SkipReason),
}

/// Observer invoked as each item settles.
pub type TransferEventFn = Arc<dyn Fn(&TransferEvent) + Send + Sync>;

/// Per-record filter; rejected records are skipped as [`SkipReason::Filtered`].
pub type TransferFilterFn = Arc<dyn Fn(&TransferRecord) -> bool + Send + Sync>;

/// Report returned by directory uploads and downloads.
#[derive(Clone, Debug, Default)]
pub struct DirectoryTransferReport {
    /// Successful transfers.
    pub transferred: Vec<TransferRecord>,
    /// Skipped items with their reasons.
    pub skipped: Vec<(TransferRecord, SkipReason)>,
}

impl DirectoryTransferReport {
    fn from_events(events: Vec<TransferEvent>) -> Self {
        let mut report = Self::default();
        for event in events {
            match event {
                TransferEvent::Transferred(record) => report.transferred.push(record),
                TransferEvent::Skipped(record, reason) => report.skipped.push((record, reason)),
            }
        }
        report
    }
}

fn emit(observer: Option<&TransferEventFn>, event: &TransferEvent) {
    if let Some(observer) = observer {
        observer(event);
    }
}

/// Options for [`upload_directory`].
#[derive(Clone, Builder)]
#[builder(default, setter(into, strip_option))]
pub struct UploadDirectoryOptions {
    /// Replace files that already exist remotely.
    pub overwrite: bool,
    /// Follow local symlinks into their targets.
    pub follow_symlinks: bool,
    /// Glob patterns pruning the local walk.
    pub ignore: Vec<String>,
    /// Report what would transfer without sending anything.
    pub dry_run: bool,
    /// Width of the bounded scheduler.
    #[builder(default = "DEFAULT_MAX_CONCURRENCY")]
    pub max_concurrency: usize,
    /// Per-file gate; rejected files are skipped as filtered.
    pub should_upload: Option<TransferFilterFn>,
    /// Observer invoked as each item settles.
    pub on_event: Option<TransferEventFn>,
    /// Per-request cancellation and timeout.
    pub request: RequestOptions,
}

impl Default for UploadDirectoryOptions {
    fn default() -> Self {
        Self {
            overwrite: false,
            follow_symlinks: false,
            ignore: Vec::new(),
            dry_run: false,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            should_upload: None,
            on_event: None,
            request: RequestOptions::default(),
        }
    }
}

impl std::fmt::Debug for UploadDirectoryOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(UploadDirectoryOptions))
            .field("overwrite", &self.overwrite)
            .field("follow_symlinks", &self.follow_symlinks)
            .field("ignore", &self.ignore)
            .field("dry_run", &self.dry_run)
            .field("max_concurrency", &self.max_concurrency)
            .finish_non_exhaustive()
    }
}

/// Uploads every file beneath `local_path` to the corresponding path under
/// `remote_path`.
///
/// Returns a report of per-file outcomes; item failures never abort the
/// batch.
///
/// # Errors
///
/// Returns an error if the local tree cannot be walked.
pub async fn upload_directory(
    client: &NetStorageClient,
    local_path: &Path,
    remote_path: &str,
    options: &UploadDirectoryOptions,
) -> Result<DirectoryTransferReport> {
    let walk_options = LocalWalkOptions {
        ignore: options.ignore.clone(),
        follow_symlinks: options.follow_symlinks,
        include_dirs: false,
    };
    let entries = walk_local(local_path, &walk_options)?;
    let remote_root = urls::trim_trailing_slash(remote_path);

    let events = futures_util::stream::iter(entries.into_iter().map(|entry| {
        let record = TransferRecord {
            remote_path: urls::join_remote(&remote_root, &entry.relative_path),
            relative_path: entry.relative_path,
            local_path: entry.local_path,
            bytes: 0,
        };
        async move {
            let event = upload_one(client, record, options).await;
            emit(options.on_event.as_ref(), &event);
            event
        }
    }))
    .buffer_unordered(options.max_concurrency.max(1))
    .collect::<Vec<_>>()
    .await;

    Ok(DirectoryTransferReport::from_events(events))
}

async fn upload_one(
    client: &NetStorageClient,
    mut record: TransferRecord,
    options: &UploadDirectoryOptions,
) -> TransferEvent {
    if options
        .request
        .cancel
        .as_ref()
        .is_some_and(|token| token.is_cancelled())
    {
        return TransferEvent::Skipped(record, SkipReason::Error("canceled".to_string()));
    }
    if options
        .should_upload
        .as_ref()
        .is_some_and(|gate| !gate(&record))
    {
        return TransferEvent::Skipped(record, SkipReason::Filtered);
    }
    if options.dry_run {
        tracing::info!("[dry-run] would upload {}", record.remote_path);
        return TransferEvent::Skipped(record, SkipReason::DryRun);
    }
    if !options.overwrite {
        match client.is_file(&record.remote_path, &options.request).await {
            Ok(true) => return TransferEvent::Skipped(record, SkipReason::OverwriteDisabled),
            Ok(false) => {}
            Err(e) => {
                return TransferEvent::Skipped(record, SkipReason::Error(e.to_string()));
            }
        }
    }

    match client
        .upload_file(&record.local_path, &record.remote_path, &options.request, None)
        .await
    {
        Ok(outcome) => {
            record.bytes = outcome.bytes_transferred;
            tracing::debug!("Uploaded {} ({} bytes)", record.remote_path, record.bytes);
            TransferEvent::Transferred(record)
        }
        Err(e) => {
            tracing::warn!("Upload of {} failed: {e}", record.remote_path);
            TransferEvent::Skipped(record, SkipReason::Error(e.to_string()))
        }
    }
}

/// Options for [`download_directory`].
#[derive(Clone, Builder)]
#[builder(default, setter(into, strip_option))]
pub struct DownloadDirectoryOptions {
    /// Replace files that already exist locally.
    pub overwrite: bool,
    /// Report what would transfer without writing anything.
    pub dry_run: bool,
    /// Deepest remote level to descend into; absent means unbounded.
    pub max_depth: Option<u32>,
    /// Width of the bounded scheduler.
    #[builder(default = "DEFAULT_MAX_CONCURRENCY")]
    pub max_concurrency: usize,
    /// Per-file gate; rejected files are skipped as filtered.
    pub should_download: Option<TransferFilterFn>,
    /// Observer invoked as each item settles.
    pub on_event: Option<TransferEventFn>,
    /// Per-request cancellation and timeout.
    pub request: RequestOptions,
}

impl Default for DownloadDirectoryOptions {
    fn default() -> Self {
        Self {
            overwrite: false,
            dry_run: false,
            max_depth: None,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            should_download: None,
            on_event: None,
            request: RequestOptions::default(),
        }
    }
}

impl std::fmt::Debug for DownloadDirectoryOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(DownloadDirectoryOptions))
            .field("overwrite", &self.overwrite)
            .field("dry_run", &self.dry_run)
            .field("max_depth", &self.max_depth)
            .field("max_concurrency", &self.max_concurrency)
            .finish_non_exhaustive()
    }
}

/// Downloads every file beneath `remote_path` into `local_path`, creating
/// parent directories as needed.
///
/// # Errors
///
/// Returns an error if the local root cannot be created.
pub async fn download_directory(
    client: &NetStorageClient,
    remote_path: &str,
    local_path: &Path,
    options: &DownloadDirectoryOptions,
) -> Result<DirectoryTransferReport> {
    if !options.dry_run {
        tokio::fs::create_dir_all(local_path).await?;
    }

    let walk_options = RemoteWalkOptions {
        max_depth: options.max_depth,
        include: None,
        synthetic_root: false,
        request: options.request.clone(),
    };
    let stream = walk_remote(client, remote_path, walk_options);
    pin_mut!(stream);
    let mut files = Vec::new();
    while let Some(entry) = stream.next().await {
        if entry.file.is_file() {
            files.push(entry);
        }
    }

    let events = futures_util::stream::iter(files.into_iter().map(|entry| {
        let record = TransferRecord {
            local_path: local_path.join(&entry.relative_path),
            remote_path: entry.path.clone(),
            relative_path: entry.relative_path,
            bytes: 0,
        };
        async move {
            let event = download_one(client, record, options).await;
            emit(options.on_event.as_ref(), &event);
            event
        }
    }))
    .buffer_unordered(options.max_concurrency.max(1))
    .collect::<Vec<_>>()
    .await;

    Ok(DirectoryTransferReport::from_events(events))
}

async fn download_one(
    client: &NetStorageClient,
    mut record: TransferRecord,
    options: &DownloadDirectoryOptions,
) -> TransferEvent {
    if options
        .request
        .cancel
        .as_ref()
        .is_some_and(|token| token.is_cancelled())
    {
        return TransferEvent::Skipped(record, SkipReason::Error("canceled".to_string()));
    }
    if options
        .should_download
        .as_ref()
        .is_some_and(|gate| !gate(&record))
    {
        return TransferEvent::Skipped(record, SkipReason::Filtered);
    }
    if options.dry_run {
        tracing::info!("[dry-run] would download {}", record.remote_path);
        return TransferEvent::Skipped(record, SkipReason::DryRun);
    }
    if !options.overwrite {
        match tokio::fs::metadata(&record.local_path).await {
            Ok(_) => return TransferEvent::Skipped(record, SkipReason::OverwriteDisabled),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return TransferEvent::Skipped(record, SkipReason::Error(e.to_string())),
        }
    }
    if let Some(parent) = record.local_path.parent() {
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            return TransferEvent::Skipped(record, SkipReason::Error(e.to_string()));
        }
    }

    match client
        .download_file(&record.remote_path, &record.local_path, &options.request, None)
        .await
    {
        Ok(outcome) => {
            record.bytes = outcome.bytes_transferred;
            tracing::debug!("Downloaded {} ({} bytes)", record.remote_path, record.bytes);
            TransferEvent::Transferred(record)
        }
        Err(e) => {
            tracing::warn!("Download of {} failed: {e}", record.remote_path);
            TransferEvent::Skipped(record, SkipReason::Error(e.to_string()))
        }
    }
}

/// Per-entry filter for [`remove_directory`].
pub type RemoveFilterFn = Arc<dyn Fn(&WalkEntry) -> bool + Send + Sync>;

/// Outcome of one removal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RemoveEvent {
    Removed(String),
    Skipped(String, SkipReason),
}

/// Observer invoked as each removal settles.
pub type RemoveEventFn = Arc<dyn Fn(&RemoveEvent) + Send + Sync>;

/// Options for [`remove_directory`].
#[derive(Clone, Builder)]
#[builder(default, setter(into, strip_option))]
pub struct RemoveDirectoryOptions {
    /// Report what would be removed without deleting anything.
    pub dry_run: bool,
    /// Width of the bounded scheduler within each depth level.
    #[builder(default = "DEFAULT_MAX_CONCURRENCY")]
    pub max_concurrency: usize,
    /// Per-entry gate; rejected entries are skipped as filtered.
    pub should_remove: Option<RemoveFilterFn>,
    /// Observer invoked as each item settles.
    pub on_event: Option<RemoveEventFn>,
    /// Per-request cancellation and timeout.
    pub request: RequestOptions,
}

impl Default for RemoveDirectoryOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            should_remove: None,
            on_event: None,
            request: RequestOptions::default(),
        }
    }
}

impl std::fmt::Debug for RemoveDirectoryOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(RemoveDirectoryOptions))
            .field("dry_run", &self.dry_run)
            .field("max_concurrency", &self.max_concurrency)
            .finish_non_exhaustive()
    }
}

/// Report returned by [`remove_directory`].
#[derive(Clone, Debug, Default)]
pub struct RemoveDirectoryReport {
    /// Paths removed, in completion order.
    pub removed: Vec<String>,
    /// Skipped paths with their reasons.
    pub skipped: Vec<(String, SkipReason)>,
}

/// Removes everything beneath `remote_path`, deepest entries first.
///
/// Each depth level is processed concurrently, but a level only starts once
/// the one below it has settled, so directories are never removed before
/// their contents.
///
/// # Errors
///
/// This function currently always returns `Ok`; per-item failures are
/// reported through the skip outcomes.
pub async fn remove_directory(
    client: &NetStorageClient,
    remote_path: &str,
    options: &RemoveDirectoryOptions,
) -> Result<RemoveDirectoryReport> {
    let walk_options = RemoteWalkOptions {
        max_depth: None,
        include: None,
        synthetic_root: false,
        request: options.request.clone(),
    };
    let stream = walk_remote(client, remote_path, walk_options);
    pin_mut!(stream);
    let mut by_depth: BTreeMap<u32, Vec<WalkEntry>> = BTreeMap::new();
    while let Some(entry) = stream.next().await {
        by_depth.entry(entry.depth).or_default().push(entry);
    }

    let mut report = RemoveDirectoryReport::default();
    for (_, level) in by_depth.into_iter().rev() {
        let events = futures_util::stream::iter(level.into_iter().map(|entry| async move {
            let event = remove_one(client, entry, options).await;
            if let Some(observer) = &options.on_event {
                observer(&event);
            }
            event
        }))
        .buffer_unordered(options.max_concurrency.max(1))
        .collect::<Vec<_>>()
        .await;

        for event in events {
            match event {
                RemoveEvent::Removed(path) => report.removed.push(path),
                RemoveEvent::Skipped(path, reason) => report.skipped.push((path, reason)),
            }
        }
    }

    Ok(report)
}

async fn remove_one(
    client: &NetStorageClient,
    entry: WalkEntry,
    options: &RemoveDirectoryOptions,
) -> RemoveEvent {
    let path = entry.path.clone();
    if options
        .request
        .cancel
        .as_ref()
        .is_some_and(|token| token.is_cancelled())
    {
        return RemoveEvent::Skipped(path, SkipReason::Error("canceled".to_string()));
    }
    if options
        .should_remove
        .as_ref()
        .is_some_and(|gate| !gate(&entry))
    {
        return RemoveEvent::Skipped(path, SkipReason::Filtered);
    }
    if options.dry_run {
        tracing::info!("[dry-run] would remove {path}");
        return RemoveEvent::Skipped(path, SkipReason::DryRun);
    }

    let result = if entry.file.is_dir() {
        if entry.file.is_implicit() {
            return RemoveEvent::Skipped(path, SkipReason::Implicit);
        }
        client.rmdir(&path, &options.request).await
    } else {
        client.rm(&path, &options.request).await
    };

    match result {
        Ok(_) => {
            tracing::debug!("Removed {path}");
            RemoveEvent::Removed(path)
        }
        Err(e) => {
            tracing::warn!("Removal of {path} failed: {e}");
            RemoveEvent::Skipped(path, SkipReason::Error(e.to_string()))
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
    fn test_report_from_events() {
        let record = TransferRecord {
            relative_path: "a.txt".to_string(),
            local_path: PathBuf::from("/tmp/a.txt"),
            remote_path: "/r/a.txt".to_string(),
            bytes: 3,
        };
        let events = vec![
            TransferEvent::Transferred(record.clone()),
            TransferEvent::Skipped(record, SkipReason::DryRun),
        ];

        let report = DirectoryTransferReport::from_events(events);
        assert_eq!(report.transferred.len(), 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].1, SkipReason::DryRun);
    }

    #[rstest]
    fn test_upload_options_builder_defaults() {
        let options = UploadDirectoryOptionsBuilder::default().build().unwrap();
        assert!(!options.overwrite);
        assert!(!options.dry_run);
        assert_eq!(options.max_concurrency, DEFAULT_MAX_CONCURRENCY);
    }

    #[rstest]
    fn test_remove_options_builder() {
        let options = RemoveDirectoryOptionsBuilder::default()
            .dry_run(true)
            .max_concurrency(2usize)
            .build()
            .unwrap();
        assert!(options.dry_run);
        assert_eq!(options.max_concurrency, 2);
    }
}
