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

//! Bidirectional directory synchronization.
//!
//! The engine indexes both sides, issues deletions of extraneous paths
//! first (avoiding transient double storage), then decides one action per
//! relative path from the compare strategy, the conflict rules, and the
//! conflict resolution policy, and finally executes transfers through the
//! bounded scheduler. Per-item failures become skip outcomes; the batch
//! always settles.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    path::{Path, PathBuf},
    sync::Arc,
};

use derive_builder::Builder;
use futures_util::{pin_mut, StreamExt};
use globset::{Glob, GlobMatcher};
use strum::Display;

use crate::{
    common::{consts::DEFAULT_MAX_CONCURRENCY, urls},
    http::{
        client::{NetStorageClient, RequestOptions},
        error::{NetStorageError, Result},
        models::RemoteEntry,
    },
    transfer::predicates,
    walk::{
        local::{walk_local, LocalWalkOptions},
        remote::{walk_remote, RemoteWalkOptions},
    },
};

/// Which way files may flow.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
#[strum(serialize_all = "lowercase")]
pub enum SyncDirection {
    Upload,
    Download,
    Both,
}

/// How two files are judged equal.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
#[strum(serialize_all = "lowercase")]
pub enum CompareStrategy {
    Exists,
    Size,
    Mtime,
    Checksum,
}

/// Who wins when both sides are transfer candidates.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
#[strum(serialize_all = "snake_case")]
pub enum ConflictResolution {
    PreferLocal,
    PreferRemote,
    Manual,
}

/// Which side loses files that the other side does not have.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
#[strum(serialize_all = "lowercase")]
pub enum DeleteExtraneous {
    None,
    Local,
    Remote,
    Both,
}

/// Action mapped by a conflict rule.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
#[strum(serialize_all = "lowercase")]
pub enum RuleAction {
    Upload,
    Download,
    Skip,
}

/// One glob-keyed override; first match in insertion order wins.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConflictRule {
    pub pattern: String,
    pub action: RuleAction,
}

/// What the engine did (or would do) to one path.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
#[strum(serialize_all = "snake_case")]
pub enum SyncAction {
    Upload,
    Download,
    DeleteLocal,
    DeleteRemote,
}

/// One unit of sync work.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncItem {
    pub relative_path: String,
    pub action: SyncAction,
}

/// Why a unit of work was not executed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncSkipReason {
    /// Dry run: the work was only reported.
    DryRun,
    /// Both sides were candidates and resolution is manual.
    Conflict,
    /// A conflict rule suppressed the work.
    Rule,
    /// The operation failed.
    Error(String),
}

/// Event emitted as each unit of work settles.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncEvent {
    Transferred(SyncItem),
    Deleted(SyncItem),
    Skipped(SyncItem, SyncSkipReason),
}

/// Observer invoked as each unit of work settles.
pub type SyncEventFn = Arc<dyn Fn(&SyncEvent) + Send + Sync>;

/// Options for [`sync_directory`].
#[derive(Clone, Builder)]
#[builder(default, setter(into, strip_option))]
pub struct SyncOptions {
    /// Which way files may flow.
    #[builder(default = "SyncDirection::Both")]
    pub direction: SyncDirection,
    /// How files are judged equal.
    #[builder(default = "CompareStrategy::Exists")]
    pub compare: CompareStrategy,
    /// Who wins simultaneous candidates.
    #[builder(default = "ConflictResolution::Manual")]
    pub conflict_resolution: ConflictResolution,
    /// Glob overrides, first match in insertion order wins.
    pub conflict_rules: Vec<ConflictRule>,
    /// Which side loses extraneous files.
    #[builder(default = "DeleteExtraneous::None")]
    pub delete_extraneous: DeleteExtraneous,
    /// Report the plan without executing it.
    pub dry_run: bool,
    /// Glob patterns pruning the local walk.
    pub ignore: Vec<String>,
    /// Follow local symlinks into their targets.
    pub follow_symlinks: bool,
    /// Width of the bounded scheduler.
    #[builder(default = "DEFAULT_MAX_CONCURRENCY")]
    pub max_concurrency: usize,
    /// Observer invoked as each unit of work settles.
    pub on_event: Option<SyncEventFn>,
    /// Per-request cancellation and timeout.
    pub request: RequestOptions,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            direction: SyncDirection::Both,
            compare: CompareStrategy::Exists,
            conflict_resolution: ConflictResolution::Manual,
            conflict_rules: Vec::new(),
            delete_extraneous: DeleteExtraneous::None,
            dry_run: false,
            ignore: Vec::new(),
            follow_symlinks: false,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            on_event: None,
            request: RequestOptions::default(),
        }
    }
}

impl std::fmt::Debug for SyncOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(SyncOptions))
            .field("direction", &self.direction)
            .field("compare", &self.compare)
            .field("conflict_resolution", &self.conflict_resolution)
            .field("conflict_rules", &self.conflict_rules)
            .field("delete_extraneous", &self.delete_extraneous)
            .field("dry_run", &self.dry_run)
            .field("max_concurrency", &self.max_concurrency)
            .finish_non_exhaustive()
    }
}

/// Final accounting of a sync run.
#[derive(Clone, Debug, Default)]
pub struct SyncReport {
    /// Executed (or planned, under dry run) transfers.
    pub transferred: Vec<SyncItem>,
    /// Executed (or planned) deletions.
    pub deleted: Vec<SyncItem>,
    /// Skipped work with reasons.
    pub skipped: Vec<(SyncItem, SyncSkipReason)>,
    /// Paths left untouched because resolution is manual.
    pub conflicts: Vec<String>,
}

impl SyncReport {
    fn record(&mut self, event: SyncEvent) {
        match event {
            SyncEvent::Transferred(item) => self.transferred.push(item),
            SyncEvent::Deleted(item) => self.deleted.push(item),
            SyncEvent::Skipped(item, reason) => {
                if reason == SyncSkipReason::Conflict {
                    self.conflicts.push(item.relative_path.clone());
                }
                self.skipped.push((item, reason));
            }
        }
    }
}

#[derive(Clone, Debug)]
struct LocalFileMeta {
    path: PathBuf,
    size: u64,
    mtime_ms: i64,
}

struct RemoteIndex {
    files: HashMap<String, RemoteEntry>,
    /// Relative path → (depth, implicit) for explicit deletion ordering.
    dirs: BTreeMap<String, (u32, bool)>,
}

struct LocalIndex {
    files: HashMap<String, LocalFileMeta>,
    dirs: BTreeSet<String>,
}

/// The per-path decision before execution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Decision {
    Nothing,
    Upload,
    Download,
    Conflict,
    RuleSkip,
}

/// Synchronizes `local_path` and `remote_path`.
///
/// After a non-dry run with `direction = Both` and
/// `delete_extraneous = Both`, both sides hold the same relative paths and
/// every pair passes the chosen compare strategy.
///
/// # Errors
///
/// Returns an error if either side cannot be indexed or a conflict rule is
/// not a valid glob.
pub async fn sync_directory(
    client: &NetStorageClient,
    local_path: &Path,
    remote_path: &str,
    options: &SyncOptions,
) -> Result<SyncReport> {
    let rules = compile_rules(&options.conflict_rules)?;
    let remote_root = urls::trim_trailing_slash(remote_path);

    let mut local = index_local(local_path, options).await?;
    let mut remote = index_remote(client, &remote_root, options).await;
    tracing::info!(
        "Syncing {} local and {} remote files ({} {})",
        local.files.len(),
        remote.files.len(),
        options.direction,
        options.compare,
    );

    let mut report = SyncReport::default();

    // Deletions first: either order converges, but deleting before
    // transferring avoids transient double storage. Paths settled here leave
    // the indices so the transfer planner never revisits them.
    delete_extraneous(
        client,
        local_path,
        &remote_root,
        &mut local,
        &mut remote,
        options,
        &mut report,
    )
    .await;

    let mut paths: BTreeSet<&String> = BTreeSet::new();
    paths.extend(local.files.keys());
    paths.extend(remote.files.keys());

    let mut planned: Vec<(String, SyncAction)> = Vec::new();
    for rel in paths {
        let local_meta = local.files.get(rel);
        let remote_entry = remote.files.get(rel);

        let decision = match first_rule(&rules, rel) {
            Some(action) => decide_from_rule(action, options.direction, local_meta.is_some(), remote_entry.is_some()),
            None => {
                let checksum_mismatch = match (options.compare, local_meta, remote_entry) {
                    (CompareStrategy::Checksum, Some(meta), Some(entry)) => {
                        match predicates::is_checksum_mismatch(&meta.path, entry).await {
                            Ok(mismatch) => mismatch,
                            Err(e) => {
                                let item = SyncItem {
                                    relative_path: rel.clone(),
                                    action: SyncAction::Upload,
                                };
                                emit_and_record(
                                    options,
                                    &mut report,
                                    SyncEvent::Skipped(item, SyncSkipReason::Error(e.to_string())),
                                );
                                continue;
                            }
                        }
                    }
                    _ => false,
                };
                let (up, down) =
                    transfer_candidates(options.compare, local_meta, remote_entry, checksum_mismatch);
                resolve(options.direction, options.conflict_resolution, up, down)
            }
        };

        match decision {
            Decision::Nothing => {}
            Decision::Upload => planned.push((rel.clone(), SyncAction::Upload)),
            Decision::Download => planned.push((rel.clone(), SyncAction::Download)),
            Decision::Conflict => {
                let item = SyncItem {
                    relative_path: rel.clone(),
                    action: SyncAction::Upload,
                };
                emit_and_record(
                    options,
                    &mut report,
                    SyncEvent::Skipped(item, SyncSkipReason::Conflict),
                );
            }
            Decision::RuleSkip => {
                let item = SyncItem {
                    relative_path: rel.clone(),
                    action: SyncAction::Upload,
                };
                emit_and_record(
                    options,
                    &mut report,
                    SyncEvent::Skipped(item, SyncSkipReason::Rule),
                );
            }
        }
    }

    let events = futures_util::stream::iter(planned.into_iter().map(|(rel, action)| {
        let local_meta = local.files.get(&rel).cloned();
        let remote_root = remote_root.clone();
        async move {
            execute_transfer(client, local_path, &remote_root, rel, action, local_meta, options)
                .await
        }
    }))
    .buffer_unordered(options.max_concurrency.max(1))
    .collect::<Vec<_>>()
    .await;

    for event in events {
        if let Some(observer) = &options.on_event {
            observer(&event);
        }
        report.record(event);
    }

    Ok(report)
}

fn compile_rules(rules: &[ConflictRule]) -> Result<Vec<(GlobMatcher, RuleAction)>> {
    rules
        .iter()
        .map(|rule| {
            Glob::new(&rule.pattern)
                .map(|glob| (glob.compile_matcher(), rule.action))
                .map_err(|e| {
                    NetStorageError::Internal(format!(
                        "invalid conflict rule `{}`: {e}",
                        rule.pattern
                    ))
                })
        })
        .collect()
}

fn first_rule(rules: &[(GlobMatcher, RuleAction)], relative_path: &str) -> Option<RuleAction> {
    rules
        .iter()
        .find(|(matcher, _)| matcher.is_match(relative_path))
        .map(|(_, action)| *action)
}

fn decide_from_rule(
    action: RuleAction,
    direction: SyncDirection,
    has_local: bool,
    has_remote: bool,
) -> Decision {
    match action {
        RuleAction::Skip => Decision::RuleSkip,
        RuleAction::Upload if has_local && direction != SyncDirection::Download => Decision::Upload,
        RuleAction::Download if has_remote && direction != SyncDirection::Upload => {
            Decision::Download
        }
        _ => Decision::RuleSkip,
    }
}

/// Per-direction transfer need before direction filtering and resolution.
fn transfer_candidates(
    strategy: CompareStrategy,
    local: Option<&LocalFileMeta>,
    remote: Option<&RemoteEntry>,
    checksum_mismatch: bool,
) -> (bool, bool) {
    match (local, remote) {
        (Some(_), None) => (true, false),
        (None, Some(_)) => (false, true),
        (None, None) => (false, false),
        (Some(meta), Some(entry)) => match strategy {
            CompareStrategy::Exists => (false, false),
            CompareStrategy::Size => {
                let mismatch = predicates::is_size_mismatch(meta.size, entry);
                (mismatch, mismatch)
            }
            CompareStrategy::Mtime => {
                if predicates::is_mtime_newer(meta.mtime_ms, entry) {
                    (true, false)
                } else if entry
                    .parsed_mtime()
                    .is_some_and(|secs| secs * 1_000 > meta.mtime_ms)
                {
                    (false, true)
                } else {
                    (false, false)
                }
            }
            CompareStrategy::Checksum => (checksum_mismatch, checksum_mismatch),
        },
    }
}

fn resolve(
    direction: SyncDirection,
    resolution: ConflictResolution,
    mut upload: bool,
    mut download: bool,
) -> Decision {
    if direction == SyncDirection::Upload {
        download = false;
    }
    if direction == SyncDirection::Download {
        upload = false;
    }
    match (upload, download) {
        (false, false) => Decision::Nothing,
        (true, false) => Decision::Upload,
        (false, true) => Decision::Download,
        (true, true) => match resolution {
            ConflictResolution::PreferLocal => Decision::Upload,
            ConflictResolution::PreferRemote => Decision::Download,
            ConflictResolution::Manual => Decision::Conflict,
        },
    }
}

async fn index_local(root: &Path, options: &SyncOptions) -> Result<LocalIndex> {
    let walk_options = LocalWalkOptions {
        ignore: options.ignore.clone(),
        follow_symlinks: options.follow_symlinks,
        include_dirs: true,
    };
    let entries = walk_local(root, &walk_options)?;

    let mut files = HashMap::new();
    let mut dirs = BTreeSet::new();
    for entry in entries {
        if entry.is_directory {
            dirs.insert(entry.relative_path);
            continue;
        }
        let metadata = tokio::fs::metadata(&entry.local_path).await?;
        let mtime_ms = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map_or(0, |d| d.as_millis() as i64);
        files.insert(
            entry.relative_path,
            LocalFileMeta {
                path: entry.local_path,
                size: metadata.len(),
                mtime_ms,
            },
        );
    }
    Ok(LocalIndex { files, dirs })
}

async fn index_remote(
    client: &NetStorageClient,
    remote_root: &str,
    options: &SyncOptions,
) -> RemoteIndex {
    let walk_options = RemoteWalkOptions {
        max_depth: None,
        include: None,
        synthetic_root: false,
        request: options.request.clone(),
    };
    let stream = walk_remote(client, remote_root, walk_options);
    pin_mut!(stream);

    let mut files = HashMap::new();
    let mut dirs = BTreeMap::new();
    while let Some(entry) = stream.next().await {
        if entry.file.is_dir() {
            dirs.insert(
                entry.relative_path,
                (entry.depth, entry.file.is_implicit()),
            );
        } else if entry.file.is_file() {
            files.insert(entry.relative_path, entry.file);
        }
    }
    RemoteIndex { files, dirs }
}

fn emit_and_record(options: &SyncOptions, report: &mut SyncReport, event: SyncEvent) {
    if let Some(observer) = &options.on_event {
        observer(&event);
    }
    report.record(event);
}

async fn delete_extraneous(
    client: &NetStorageClient,
    local_root: &Path,
    remote_root: &str,
    local: &mut LocalIndex,
    remote: &mut RemoteIndex,
    options: &SyncOptions,
    report: &mut SyncReport,
) {
    let delete_remote = matches!(
        options.delete_extraneous,
        DeleteExtraneous::Remote | DeleteExtraneous::Both
    );
    let delete_local = matches!(
        options.delete_extraneous,
        DeleteExtraneous::Local | DeleteExtraneous::Both
    );

    if delete_remote {
        let extraneous: Vec<String> = remote
            .files
            .keys()
            .filter(|rel| !local.files.contains_key(*rel))
            .cloned()
            .collect();

        let events = futures_util::stream::iter(extraneous.into_iter().map(|rel| {
            let item = SyncItem {
                relative_path: rel.clone(),
                action: SyncAction::DeleteRemote,
            };
            let path = urls::join_remote(remote_root, &rel);
            async move {
                if options.dry_run {
                    tracing::info!("[dry-run] would delete remote {path}");
                    return SyncEvent::Skipped(item, SyncSkipReason::DryRun);
                }
                match client.rm(&path, &options.request).await {
                    Ok(_) => SyncEvent::Deleted(item),
                    Err(e) => SyncEvent::Skipped(item, SyncSkipReason::Error(e.to_string())),
                }
            }
        }))
        .buffer_unordered(options.max_concurrency.max(1))
        .collect::<Vec<_>>()
        .await;
        for event in events {
            if settled(&event) {
                remote.files.remove(relative_of(&event));
            }
            emit_and_record(options, report, event);
        }

        // Explicit directories with nothing left on the local side, deepest
        // first so children go before their parents.
        let mut extraneous_dirs: Vec<(String, u32, bool)> = remote
            .dirs
            .iter()
            .filter(|(rel, _)| !local.dirs.contains(*rel))
            .map(|(rel, (depth, implicit))| (rel.clone(), *depth, *implicit))
            .collect();
        extraneous_dirs.sort_by(|a, b| b.1.cmp(&a.1));
        for (rel, _, implicit) in extraneous_dirs {
            if implicit {
                remote.dirs.remove(&rel);
                continue;
            }
            let item = SyncItem {
                relative_path: rel.clone(),
                action: SyncAction::DeleteRemote,
            };
            let path = urls::join_remote(remote_root, &rel);
            let event = if options.dry_run {
                SyncEvent::Skipped(item, SyncSkipReason::DryRun)
            } else {
                match client.rmdir(&path, &options.request).await {
                    Ok(_) => SyncEvent::Deleted(item),
                    Err(e) => SyncEvent::Skipped(item, SyncSkipReason::Error(e.to_string())),
                }
            };
            if settled(&event) {
                remote.dirs.remove(&rel);
            }
            emit_and_record(options, report, event);
        }
    }

    if delete_local {
        let extraneous: Vec<(String, PathBuf)> = local
            .files
            .iter()
            .filter(|(rel, _)| !remote.files.contains_key(*rel))
            .map(|(rel, meta)| (rel.clone(), meta.path.clone()))
            .collect();
        for (rel, path) in extraneous {
            let item = SyncItem {
                relative_path: rel.clone(),
                action: SyncAction::DeleteLocal,
            };
            let event = if options.dry_run {
                tracing::info!("[dry-run] would delete local {}", path.display());
                SyncEvent::Skipped(item, SyncSkipReason::DryRun)
            } else {
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => SyncEvent::Deleted(item),
                    Err(e) => SyncEvent::Skipped(item, SyncSkipReason::Error(e.to_string())),
                }
            };
            if settled(&event) {
                local.files.remove(&rel);
            }
            emit_and_record(options, report, event);
        }

        // Deepest-first so empty parents follow their children.
        let extraneous_dirs: Vec<String> = local
            .dirs
            .iter()
            .filter(|rel| !remote.dirs.contains_key(*rel))
            .rev()
            .cloned()
            .collect();
        for rel in extraneous_dirs {
            let item = SyncItem {
                relative_path: rel.clone(),
                action: SyncAction::DeleteLocal,
            };
            let path = local_root.join(&rel);
            let event = if options.dry_run {
                SyncEvent::Skipped(item, SyncSkipReason::DryRun)
            } else {
                match tokio::fs::remove_dir(&path).await {
                    Ok(()) => SyncEvent::Deleted(item),
                    Err(e) => SyncEvent::Skipped(item, SyncSkipReason::Error(e.to_string())),
                }
            };
            if settled(&event) {
                local.dirs.remove(&rel);
            }
            emit_and_record(options, report, event);
        }
    }
}

/// A deletion counts as settled when it ran (or would run under dry run);
/// failures leave the path in the index for the transfer planner.
fn settled(event: &SyncEvent) -> bool {
    matches!(
        event,
        SyncEvent::Deleted(_) | SyncEvent::Skipped(_, SyncSkipReason::DryRun)
    )
}

fn relative_of(event: &SyncEvent) -> &String {
    match event {
        SyncEvent::Transferred(item)
        | SyncEvent::Deleted(item)
        | SyncEvent::Skipped(item, _) => &item.relative_path,
    }
}

async fn execute_transfer(
    client: &NetStorageClient,
    local_root: &Path,
    remote_root: &str,
    relative_path: String,
    action: SyncAction,
    local_meta: Option<LocalFileMeta>,
    options: &SyncOptions,
) -> SyncEvent {
    let item = SyncItem {
        relative_path: relative_path.clone(),
        action,
    };
    if options
        .request
        .cancel
        .as_ref()
        .is_some_and(|token| token.is_cancelled())
    {
        return SyncEvent::Skipped(item, SyncSkipReason::Error("canceled".to_string()));
    }
    if options.dry_run {
        tracing::info!("[dry-run] would {action} {relative_path}");
        return SyncEvent::Skipped(item, SyncSkipReason::DryRun);
    }

    let remote_path = urls::join_remote(remote_root, &relative_path);
    let result = match action {
        SyncAction::Upload => {
            let Some(meta) = local_meta else {
                return SyncEvent::Skipped(
                    item,
                    SyncSkipReason::Error("missing local file".to_string()),
                );
            };
            client
                .upload_file(&meta.path, &remote_path, &options.request, None)
                .await
                .map(|_| ())
        }
        SyncAction::Download => {
            let destination = local_root.join(&relative_path);
            let prepare = match destination.parent() {
                Some(parent) => tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(NetStorageError::from),
                None => Ok(()),
            };
            match prepare {
                Ok(()) => client
                    .download_file(&remote_path, &destination, &options.request, None)
                    .await
                    .map(|_| ()),
                Err(e) => Err(e),
            }
        }
        SyncAction::DeleteLocal | SyncAction::DeleteRemote => {
            return SyncEvent::Skipped(
                item,
                SyncSkipReason::Error("deletions are not transfer actions".to_string()),
            );
        }
    };

    match result {
        Ok(()) => {
            tracing::debug!("Synced {relative_path} ({action})");
            SyncEvent::Transferred(item)
        }
        Err(e) => {
            tracing::warn!("Sync of {relative_path} failed: {e}");
            SyncEvent::Skipped(item, SyncSkipReason::Error(e.to_string()))
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
