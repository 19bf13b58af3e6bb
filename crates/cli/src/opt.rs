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

use std::path::PathBuf;

use clap::Parser;

/// Main CLI structure for parsing command-line arguments and options.
///
/// This is the entry point for the `netstorage` command-line interface,
/// covering every NetStorage verb plus the directory-level composites.
#[derive(Debug, Parser)]
#[clap(name = "netstorage", version, about, author)]
pub struct NetStorageCli {
    #[clap(flatten)]
    pub global: GlobalOpts,
    #[clap(subcommand)]
    pub command: Commands,
}

/// Flags shared by every subcommand.
#[derive(Debug, Clone, Parser)]
pub struct GlobalOpts {
    /// Per-request timeout in milliseconds.
    #[arg(long, global = true)]
    pub timeout: Option<u64>,
    /// Abort the whole command after this many milliseconds.
    #[arg(long, global = true)]
    pub cancel_after: Option<u64>,
    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,
    /// Suppress non-essential output.
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
    /// Log level: error, warn, info, verbose, debug.
    #[arg(long, global = true)]
    pub log_level: Option<String>,
    /// Shortcut for `--log-level verbose`.
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
    /// Report what would happen without doing it.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Upload-account key (overrides config and environment).
    #[arg(long, global = true, hide_env_values = true, env = "NETSTORAGE_API_KEY")]
    pub key: Option<String>,
    /// Upload-account key name.
    #[arg(long, global = true, env = "NETSTORAGE_API_KEYNAME")]
    pub keyname: Option<String>,
    /// NetStorage host.
    #[arg(long, global = true, env = "NETSTORAGE_HOST")]
    pub host: Option<String>,
    /// Use HTTPS.
    #[arg(long, global = true, env = "NETSTORAGE_SSL")]
    pub ssl: Option<bool>,
    /// CP code prefixed to remote paths.
    #[arg(long, global = true, env = "NETSTORAGE_CP_CODE")]
    pub cpcode: Option<String>,
}

/// Available top-level commands for the NetStorage CLI.
#[derive(Parser, Debug)]
pub enum Commands {
    /// Request metadata for a remote path.
    Stat { path: String },
    /// List one server page of a remote directory.
    Dir { path: String },
    /// Report aggregate disk usage beneath a remote directory.
    Du { path: String },
    /// Create a remote directory.
    Mkdir { path: String },
    /// Remove a remote directory.
    Rmdir {
        path: String,
        /// Remove the directory contents first, deepest entries first.
        #[arg(long, short = 'r')]
        recursive: bool,
        /// Scheduler width for recursive removal.
        #[arg(long, default_value_t = 5)]
        max_concurrency: usize,
    },
    /// Remove a remote file or symlink.
    Rm { path: String },
    /// Rename a remote path within the storage group.
    Rename { from: String, to: String },
    /// Create a remote symlink pointing at a target.
    Symlink { path: String, target: String },
    /// Set the modification time of a remote path (Unix seconds).
    Mtime { path: String, mtime: i64 },
    /// Render a remote tree with aggregated directory sizes.
    Tree {
        path: String,
        /// Deepest level to descend into.
        #[arg(long)]
        depth: Option<u32>,
        /// Append file and aggregated directory sizes.
        #[arg(long)]
        size: bool,
        /// Append modification times.
        #[arg(long)]
        mtime: bool,
        /// Append MD5 checksums.
        #[arg(long)]
        md5: bool,
        /// Append symlink targets.
        #[arg(long)]
        target: bool,
        /// Append relative paths.
        #[arg(long, conflicts_with = "absolute")]
        relative: bool,
        /// Append absolute paths.
        #[arg(long)]
        absolute: bool,
    },
    /// Upload a local file or directory.
    Upload {
        local: PathBuf,
        remote: String,
        /// Replace files that already exist remotely.
        #[arg(long)]
        overwrite: bool,
        /// Upload only when nothing exists at the destination (single file).
        #[arg(long, conflicts_with = "overwrite")]
        missing: bool,
        /// Glob patterns pruning the local walk (directories only).
        #[arg(long)]
        ignore: Vec<String>,
        /// Follow local symlinks into their targets.
        #[arg(long)]
        follow_symlinks: bool,
        /// Scheduler width for directory uploads.
        #[arg(long, default_value_t = 5)]
        max_concurrency: usize,
    },
    /// Download a remote file or directory.
    Download {
        remote: String,
        local: PathBuf,
        /// Replace files that already exist locally.
        #[arg(long)]
        overwrite: bool,
        /// Scheduler width for directory downloads.
        #[arg(long, default_value_t = 5)]
        max_concurrency: usize,
    },
    /// Synchronize a local directory and a remote directory.
    Sync {
        local: PathBuf,
        remote: String,
        /// upload, download, or both.
        #[arg(long, default_value = "both")]
        direction: String,
        /// exists, size, mtime, or checksum.
        #[arg(long, default_value = "exists")]
        compare: String,
        /// prefer-local, prefer-remote, or manual.
        #[arg(long, default_value = "manual")]
        conflict_resolution: String,
        /// Conflict rules as `<glob>=<upload|download|skip>`, first match wins.
        #[arg(long = "rule")]
        rules: Vec<String>,
        /// none, local, remote, or both.
        #[arg(long, default_value = "none")]
        delete_extraneous: String,
        /// Glob patterns pruning the local walk.
        #[arg(long)]
        ignore: Vec<String>,
        /// Follow local symlinks into their targets.
        #[arg(long)]
        follow_symlinks: bool,
        /// Scheduler width for transfers.
        #[arg(long, default_value_t = 5)]
        max_concurrency: usize,
    },
    /// Walk a remote tree and print matching paths.
    Find {
        path: String,
        /// Glob matched against entry names.
        #[arg(long)]
        name: Option<String>,
        /// Entry kind: file, dir, or symlink.
        #[arg(long = "type")]
        entry_type: Option<String>,
        /// Deepest level to descend into.
        #[arg(long)]
        depth: Option<u32>,
    },
    /// Manage the persistent configuration file.
    Config(ConfigOpt),
}

/// Configuration file management options.
#[derive(Parser, Debug)]
pub struct ConfigOpt {
    #[clap(subcommand)]
    pub command: ConfigCommand,
}

/// Available configuration management commands.
#[derive(Parser, Debug, Clone)]
pub enum ConfigCommand {
    /// Set a field in the user configuration file.
    Set { field: String, value: String },
    /// Print the resolved configuration (key masked unless --reveal).
    Show {
        #[arg(long)]
        reveal: bool,
    },
    /// Delete the user configuration file.
    Clear,
    /// Print the user configuration file path.
    Path,
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use clap::Parser;
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_parse_stat() {
        let cli = NetStorageCli::parse_from(["netstorage", "stat", "/foo"]);
        assert!(matches!(cli.command, Commands::Stat { path } if path == "/foo"));
    }

    #[rstest]
    fn test_global_flags_after_subcommand() {
        let cli = NetStorageCli::parse_from([
            "netstorage",
            "dir",
            "/foo",
            "--timeout",
            "5000",
            "--pretty",
        ]);
        assert_eq!(cli.global.timeout, Some(5000));
        assert!(cli.global.pretty);
    }

    #[rstest]
    fn test_parse_sync_rules() {
        let cli = NetStorageCli::parse_from([
            "netstorage",
            "sync",
            "./local",
            "/remote",
            "--rule",
            "*.log=skip",
            "--rule",
            "**/*=upload",
            "--compare",
            "size",
        ]);
        match cli.command {
            Commands::Sync { rules, compare, .. } => {
                assert_eq!(rules, vec!["*.log=skip", "**/*=upload"]);
                assert_eq!(compare, "size");
            }
            other => panic!("expected sync, got {other:?}"),
        }
    }

    #[rstest]
    fn test_config_subcommands() {
        let cli = NetStorageCli::parse_from(["netstorage", "config", "set", "host", "h.example"]);
        match cli.command {
            Commands::Config(opt) => {
                assert!(matches!(
                    opt.command,
                    ConfigCommand::Set { field, value } if field == "host" && value == "h.example"
                ));
            }
            other => panic!("expected config, got {other:?}"),
        }
    }
}
