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

//! Layered configuration resolution for the CLI.
//!
//! Precedence, strongest first: command-line flags (which clap already
//! merged with the `NETSTORAGE_*` environment), the project-local
//! `netstorage.json`, then the persistent user file under the platform
//! config directory. Missing required fields surface as the library's
//! configuration validation error.

use std::path::PathBuf;

use anyhow::Context;
use netstorage::NetStorageConfig;
use serde::{Deserialize, Serialize};

use crate::opt::GlobalOpts;

/// Name of the project-local configuration file.
pub const PROJECT_CONFIG_FILE: &str = "netstorage.json";

/// One configuration layer as stored on disk.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct FileConfig {
    pub key: Option<String>,
    pub key_name: Option<String>,
    pub host: Option<String>,
    pub ssl: Option<bool>,
    pub cp_code: Option<String>,
    pub timeout_ms: Option<u64>,
}

impl FileConfig {
    /// Fills unset fields from a weaker layer.
    fn or(self, weaker: Self) -> Self {
        Self {
            key: self.key.or(weaker.key),
            key_name: self.key_name.or(weaker.key_name),
            host: self.host.or(weaker.host),
            ssl: self.ssl.or(weaker.ssl),
            cp_code: self.cp_code.or(weaker.cp_code),
            timeout_ms: self.timeout_ms.or(weaker.timeout_ms),
        }
    }

    fn from_flags(global: &GlobalOpts) -> Self {
        Self {
            key: global.key.clone(),
            key_name: global.keyname.clone(),
            host: global.host.clone(),
            ssl: global.ssl,
            cp_code: global.cpcode.clone(),
            timeout_ms: global.timeout,
        }
    }

    /// Sets one field by its configuration name.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown fields or non-boolean/numeric values
    /// where one is required.
    pub fn set(&mut self, field: &str, value: &str) -> anyhow::Result<()> {
        match field {
            "key" => self.key = Some(value.to_string()),
            "keyName" | "keyname" => self.key_name = Some(value.to_string()),
            "host" => self.host = Some(value.to_string()),
            "ssl" => {
                self.ssl = Some(
                    value
                        .parse::<bool>()
                        .with_context(|| format!("`{value}` is not a boolean"))?,
                );
            }
            "cpCode" | "cpcode" => self.cp_code = Some(value.to_string()),
            "timeoutMs" | "timeout" => {
                self.timeout_ms = Some(
                    value
                        .parse::<u64>()
                        .with_context(|| format!("`{value}` is not a millisecond count"))?,
                );
            }
            other => anyhow::bail!(
                "unknown config field `{other}` (expected key, keyName, host, ssl, cpCode, or timeoutMs)"
            ),
        }
        Ok(())
    }
}

/// Path of the persistent user configuration file.
///
/// # Errors
///
/// Returns an error when the platform config directory cannot be determined.
pub fn user_config_path() -> anyhow::Result<PathBuf> {
    let base = dirs::config_dir().context("no user configuration directory on this platform")?;
    Ok(base.join("netstorage").join("config.json"))
}

fn load_layer(path: &std::path::Path) -> anyhow::Result<FileConfig> {
    match std::fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str(&contents)
            .with_context(|| format!("invalid config file {}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(FileConfig::default()),
        Err(e) => Err(e).with_context(|| format!("cannot read config file {}", path.display())),
    }
}

/// Loads the persistent user layer.
///
/// # Errors
///
/// Returns an error when the file exists but cannot be read or parsed.
pub fn load_user_layer() -> anyhow::Result<FileConfig> {
    load_layer(&user_config_path()?)
}

/// Loads the project-local layer from the working directory.
///
/// # Errors
///
/// Returns an error when the file exists but cannot be read or parsed.
pub fn load_project_layer() -> anyhow::Result<FileConfig> {
    load_layer(std::path::Path::new(PROJECT_CONFIG_FILE))
}

/// Writes the persistent user layer, creating parent directories.
///
/// # Errors
///
/// Returns an error when the file cannot be written.
pub fn store_user_layer(config: &FileConfig) -> anyhow::Result<()> {
    let path = user_config_path()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("cannot create {}", parent.display()))?;
    }
    let contents = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, contents)
        .with_context(|| format!("cannot write config file {}", path.display()))?;
    Ok(())
}

/// Resolves the effective client configuration from all layers.
///
/// # Errors
///
/// Returns an error when a layer is unreadable or a required field is
/// missing after merging.
pub fn resolve(global: &GlobalOpts) -> anyhow::Result<NetStorageConfig> {
    let merged = FileConfig::from_flags(global)
        .or(load_project_layer()?)
        .or(load_user_layer()?);

    let mut config = NetStorageConfig::new(
        merged.key.unwrap_or_default(),
        merged.key_name.unwrap_or_default(),
        merged.host.unwrap_or_default(),
    )?;
    config.ssl = merged.ssl.unwrap_or(false);
    config.cp_code = merged.cp_code.filter(|code| !code.is_empty());
    if let Some(timeout_ms) = merged.timeout_ms {
        config.timeout_ms = timeout_ms;
    }
    Ok(config)
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
