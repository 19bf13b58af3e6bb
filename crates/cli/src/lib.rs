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

//! Command dispatch for the `netstorage` binary.
//!
//! This crate is a thin driver: it resolves the layered configuration,
//! constructs a [`NetStorageClient`], and maps each subcommand onto the
//! library surface. All output shaping (JSON, tree lines, per-item event
//! lines) lives here; the library stays silent apart from tracing.

#![warn(rustc::all)]
#![deny(unsafe_code)]
#![deny(nonstandard_style)]

pub mod config;
pub mod opt;

use std::sync::Arc;

use anyhow::Context;
use futures_util::{pin_mut, StreamExt};
use netstorage::{
    sync_directory, transfer, tree::TreePathColumn, walk_remote, CompareStrategy,
    ConflictResolution, ConflictRule, DeleteExtraneous, DownloadDirectoryOptions, NetStorageClient,
    NetStorageError, RemoteWalkOptions, RemoveDirectoryOptions, RequestOptions, RuleAction,
    SyncDirection, SyncOptions, TreeOptions, UploadDirectoryOptions,
};
use tokio_util::sync::CancellationToken;

use crate::opt::{Commands, ConfigCommand, GlobalOpts, NetStorageCli};

/// Runs one parsed CLI invocation to completion.
///
/// # Errors
///
/// Returns an error for configuration problems, invalid flag values, or a
/// failed operation; the binary maps every error to exit code 1.
pub async fn run(cli: NetStorageCli) -> anyhow::Result<()> {
    let global = cli.global;

    if let Commands::Config(config_opt) = &cli.command {
        return run_config_command(&config_opt.command, &global);
    }

    let client = NetStorageClient::new(config::resolve(&global)?)?;
    tracing::debug!("Using {}", client.config().base_url());
    let request = request_options(&global);

    match cli.command {
        Commands::Stat { path } => {
            let response = client.stat(&path, &request).await?;
            print_json(&response, global.pretty)?;
        }
        Commands::Dir { path } => {
            let response = client.dir(&path, &request).await?;
            print_json(&response, global.pretty)?;
        }
        Commands::Du { path } => {
            let response = client.du(&path, &request).await?;
            print_json(&response, global.pretty)?;
        }
        Commands::Mkdir { path } => {
            let status = client.mkdir(&path, &request).await?;
            print_json(&status, global.pretty)?;
        }
        Commands::Rmdir {
            path,
            recursive,
            max_concurrency,
        } => {
            if recursive {
                let options = RemoveDirectoryOptions {
                    dry_run: global.dry_run,
                    max_concurrency,
                    on_event: remove_event_printer(global.quiet),
                    request: request.clone(),
                    ..Default::default()
                };
                let report = transfer::remove_directory(&client, &path, &options).await?;
                let root_removed = if global.dry_run {
                    if !global.quiet {
                        println!("[dry-run] would remove {path}");
                    }
                    false
                } else {
                    client.rmdir(&path, &request).await.is_ok()
                };
                print_json(
                    &serde_json::json!({
                        "removed": report.removed.len(),
                        "skipped": report.skipped.len(),
                        "root": root_removed,
                    }),
                    global.pretty,
                )?;
            } else {
                let status = client.rmdir(&path, &request).await?;
                print_json(&status, global.pretty)?;
            }
        }
        Commands::Rm { path } => {
            let status = client.rm(&path, &request).await?;
            print_json(&status, global.pretty)?;
        }
        Commands::Rename { from, to } => {
            let status = client.rename(&from, &to, &request).await?;
            print_json(&status, global.pretty)?;
        }
        Commands::Symlink { path, target } => {
            let status = client.symlink(&path, &target, &request).await?;
            print_json(&status, global.pretty)?;
        }
        Commands::Mtime { path, mtime } => {
            let status = client.set_mtime(&path, mtime, &request).await?;
            print_json(&status, global.pretty)?;
        }
        Commands::Tree {
            path,
            depth,
            size,
            mtime,
            md5,
            target,
            relative,
            absolute,
        } => {
            let options = TreeOptions {
                max_depth: depth,
                show_size: size,
                show_mtime: mtime,
                show_md5: md5,
                show_target: target,
                path_column: if relative {
                    TreePathColumn::Relative
                } else if absolute {
                    TreePathColumn::Absolute
                } else {
                    TreePathColumn::None
                },
                request: request.clone(),
            };
            let output = netstorage::tree::tree(&client, &path, options).await;
            for line in &output.lines {
                println!("{line}");
            }
            if size {
                println!();
                println!("total: {} bytes", output.total_size);
            }
        }
        Commands::Upload {
            local,
            remote,
            overwrite,
            missing,
            ignore,
            follow_symlinks,
            max_concurrency,
        } => {
            let metadata = tokio::fs::metadata(&local)
                .await
                .with_context(|| format!("cannot read {}", local.display()))?;
            if metadata.is_dir() {
                let options = UploadDirectoryOptions {
                    overwrite,
                    follow_symlinks,
                    ignore,
                    dry_run: global.dry_run,
                    max_concurrency,
                    on_event: transfer_event_printer(global.quiet),
                    request: request.clone(),
                    ..Default::default()
                };
                let report =
                    transfer::upload_directory(&client, &local, &remote, &options).await?;
                print_json(
                    &serde_json::json!({
                        "transferred": report.transferred.len(),
                        "skipped": report.skipped.len(),
                    }),
                    global.pretty,
                )?;
            } else if global.dry_run {
                println!("[dry-run] would upload {} to {remote}", local.display());
            } else if missing {
                let outcome = client.upload_missing(&local, &remote, &request, None).await?;
                print_json(&outcome, global.pretty)?;
            } else {
                let outcome = client.upload_file(&local, &remote, &request, None).await?;
                print_json(&outcome, global.pretty)?;
            }
        }
        Commands::Download {
            remote,
            local,
            overwrite,
            max_concurrency,
        } => {
            if client.is_directory(&remote, &request).await? {
                let options = DownloadDirectoryOptions {
                    overwrite,
                    dry_run: global.dry_run,
                    max_concurrency,
                    on_event: transfer_event_printer(global.quiet),
                    request: request.clone(),
                    ..Default::default()
                };
                let report =
                    transfer::download_directory(&client, &remote, &local, &options).await?;
                print_json(
                    &serde_json::json!({
                        "transferred": report.transferred.len(),
                        "skipped": report.skipped.len(),
                    }),
                    global.pretty,
                )?;
            } else if global.dry_run {
                println!("[dry-run] would download {remote} to {}", local.display());
            } else {
                if let Some(parent) = local.parent() {
                    if !parent.as_os_str().is_empty() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                }
                let outcome = client.download_file(&remote, &local, &request, None).await?;
                print_json(&outcome, global.pretty)?;
            }
        }
        Commands::Sync {
            local,
            remote,
            direction,
            compare,
            conflict_resolution,
            rules,
            delete_extraneous,
            ignore,
            follow_symlinks,
            max_concurrency,
        } => {
            let options = SyncOptions {
                direction: parse_direction(&direction)?,
                compare: parse_compare(&compare)?,
                conflict_resolution: parse_resolution(&conflict_resolution)?,
                conflict_rules: parse_rules(&rules)?,
                delete_extraneous: parse_delete(&delete_extraneous)?,
                dry_run: global.dry_run,
                ignore,
                follow_symlinks,
                max_concurrency,
                on_event: sync_event_printer(global.quiet),
                request: request.clone(),
            };
            let report = sync_directory(&client, &local, &remote, &options).await?;
            print_json(
                &serde_json::json!({
                    "transferred": report.transferred.len(),
                    "deleted": report.deleted.len(),
                    "skipped": report.skipped.len(),
                    "conflicts": report.conflicts,
                }),
                global.pretty,
            )?;
        }
        Commands::Find {
            path,
            name,
            entry_type,
            depth,
        } => {
            run_find(&client, &path, name, entry_type, depth, request).await?;
        }
        Commands::Config(_) => unreachable!("handled before client construction"),
    }

    Ok(())
}

fn run_config_command(command: &ConfigCommand, global: &GlobalOpts) -> anyhow::Result<()> {
    match command {
        ConfigCommand::Set { field, value } => {
            let mut layer = config::load_user_layer()?;
            layer.set(field, value)?;
            config::store_user_layer(&layer)?;
            if !global.quiet {
                println!("set {field}");
            }
        }
        ConfigCommand::Show { reveal } => {
            let mut layer = config::load_user_layer()?;
            if !reveal {
                layer.key = layer.key.map(|_| "********".to_string());
            }
            let rendered = if global.pretty {
                serde_json::to_string_pretty(&layer)?
            } else {
                serde_json::to_string(&layer)?
            };
            println!("{rendered}");
        }
        ConfigCommand::Clear => {
            let path = config::user_config_path()?;
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    if !global.quiet {
                        println!("removed {}", path.display());
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("cannot remove {}", path.display()));
                }
            }
        }
        ConfigCommand::Path => println!("{}", config::user_config_path()?.display()),
    }
    Ok(())
}

async fn run_find(
    client: &NetStorageClient,
    path: &str,
    name: Option<String>,
    entry_type: Option<String>,
    depth: Option<u32>,
    request: RequestOptions,
) -> anyhow::Result<()> {
    let name_matcher = name
        .map(|pattern| {
            globset::Glob::new(&pattern)
                .map(|glob| glob.compile_matcher())
                .with_context(|| format!("invalid name glob `{pattern}`"))
        })
        .transpose()?;
    let entry_type = entry_type
        .map(|value| match value.as_str() {
            "file" => Ok(netstorage::RemoteEntryType::File),
            "dir" => Ok(netstorage::RemoteEntryType::Dir),
            "symlink" => Ok(netstorage::RemoteEntryType::Symlink),
            other => anyhow::bail!("unknown entry type `{other}` (expected file, dir, or symlink)"),
        })
        .transpose()?;

    let options = RemoteWalkOptions {
        max_depth: depth,
        request,
        ..Default::default()
    };
    let stream = walk_remote(client, path, options);
    pin_mut!(stream);
    while let Some(entry) = stream.next().await {
        if let Some(matcher) = &name_matcher {
            if !matcher.is_match(&entry.file.name) {
                continue;
            }
        }
        if let Some(wanted) = entry_type {
            if entry.file.entry_type != wanted {
                continue;
            }
        }
        println!("{}", entry.path);
    }
    Ok(())
}

fn request_options(global: &GlobalOpts) -> RequestOptions {
    let cancel = global.cancel_after.map(|after_ms| {
        let token = CancellationToken::new();
        let armed = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(after_ms)).await;
            armed.cancel();
        });
        token
    });
    RequestOptions {
        timeout_ms: global.timeout,
        cancel,
    }
}

fn print_json<T: serde::Serialize>(value: &T, pretty: bool) -> anyhow::Result<()> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{rendered}");
    Ok(())
}

fn transfer_event_printer(quiet: bool) -> Option<transfer::TransferEventFn> {
    if quiet {
        return None;
    }
    Some(Arc::new(|event: &transfer::TransferEvent| match event {
        transfer::TransferEvent::Transferred(record) => {
            println!("transferred {} ({} bytes)", record.remote_path, record.bytes);
        }
        transfer::TransferEvent::Skipped(record, reason) => {
            println!("skipped {} ({reason:?})", record.remote_path);
        }
    }))
}

fn remove_event_printer(quiet: bool) -> Option<transfer::RemoveEventFn> {
    if quiet {
        return None;
    }
    Some(Arc::new(|event: &transfer::RemoveEvent| match event {
        transfer::RemoveEvent::Removed(path) => println!("removed {path}"),
        transfer::RemoveEvent::Skipped(path, reason) => {
            println!("skipped {path} ({reason:?})");
        }
    }))
}

fn sync_event_printer(quiet: bool) -> Option<netstorage::sync::SyncEventFn> {
    if quiet {
        return None;
    }
    Some(Arc::new(|event: &netstorage::sync::SyncEvent| match event {
        netstorage::sync::SyncEvent::Transferred(item) => {
            println!("{} {}", item.action, item.relative_path);
        }
        netstorage::sync::SyncEvent::Deleted(item) => {
            println!("{} {}", item.action, item.relative_path);
        }
        netstorage::sync::SyncEvent::Skipped(item, reason) => {
            println!("skipped {} ({reason:?})", item.relative_path);
        }
    }))
}

fn parse_direction(value: &str) -> anyhow::Result<SyncDirection> {
    match value {
        "upload" => Ok(SyncDirection::Upload),
        "download" => Ok(SyncDirection::Download),
        "both" => Ok(SyncDirection::Both),
        other => anyhow::bail!("unknown direction `{other}` (expected upload, download, or both)"),
    }
}

fn parse_compare(value: &str) -> anyhow::Result<CompareStrategy> {
    match value {
        "exists" => Ok(CompareStrategy::Exists),
        "size" => Ok(CompareStrategy::Size),
        "mtime" => Ok(CompareStrategy::Mtime),
        "checksum" => Ok(CompareStrategy::Checksum),
        other => anyhow::bail!(
            "unknown compare strategy `{other}` (expected exists, size, mtime, or checksum)"
        ),
    }
}

fn parse_resolution(value: &str) -> anyhow::Result<ConflictResolution> {
    match value {
        "prefer-local" => Ok(ConflictResolution::PreferLocal),
        "prefer-remote" => Ok(ConflictResolution::PreferRemote),
        "manual" => Ok(ConflictResolution::Manual),
        other => anyhow::bail!(
            "unknown conflict resolution `{other}` (expected prefer-local, prefer-remote, or manual)"
        ),
    }
}

fn parse_delete(value: &str) -> anyhow::Result<DeleteExtraneous> {
    match value {
        "none" => Ok(DeleteExtraneous::None),
        "local" => Ok(DeleteExtraneous::Local),
        "remote" => Ok(DeleteExtraneous::Remote),
        "both" => Ok(DeleteExtraneous::Both),
        other => anyhow::bail!(
            "unknown delete target `{other}` (expected none, local, remote, or both)"
        ),
    }
}

fn parse_rules(raw: &[String]) -> anyhow::Result<Vec<ConflictRule>> {
    raw.iter()
        .map(|rule| {
            let (pattern, action) = rule
                .split_once('=')
                .with_context(|| format!("rule `{rule}` must look like <glob>=<action>"))?;
            let action = match action {
                "upload" => RuleAction::Upload,
                "download" => RuleAction::Download,
                "skip" => RuleAction::Skip,
                other => anyhow::bail!(
                    "unknown rule action `{other}` (expected upload, download, or skip)"
                ),
            };
            Ok(ConflictRule {
                pattern: pattern.to_string(),
                action,
            })
        })
        .collect()
}

/// Maps an error to the message printed on stderr by the binary.
#[must_use]
pub fn render_error(error: &anyhow::Error) -> String {
    if let Some(e) = error.downcast_ref::<NetStorageError>() {
        match e {
            NetStorageError::ConfigValidation { field } => {
                format!("Missing configuration `{field}`. Hint: netstorage config set {field} <value>")
            }
            NetStorageError::Http {
                status,
                method,
                url,
                ..
            } => format!("HTTP {status} {} for {method} {url}", reason_phrase(*status)),
            other => other.to_string(),
        }
    } else {
        format!("{error:#}")
    }
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        409 => "Conflict",
        412 => "Precondition Failed",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "",
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
