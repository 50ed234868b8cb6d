// EDB - Ethereum Debugger
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Engine configuration
//!
//! Settings are read from an optional `.sdb.toml` in the project root. Every
//! field has a default, so a partial (or missing) file is fine:
//!
//! ```toml
//! build_dir = "out/solidity"
//! max_frames = 256
//! ```

use std::{
    fs,
    path::{Path, PathBuf},
};

use alloy_primitives::{address, Address};
use eyre::{Context, Result};
use sdb_common::{PathNormalizer, DEFAULT_SOURCE_ROOT, DEFAULT_SOURCE_SUFFIX};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::controller::DEFAULT_MAX_FRAMES;

/// Name of the per-project configuration file.
pub const CONFIG_FILE_NAME: &str = ".sdb.toml";

/// Directory holding compiled artifacts, relative to the project root.
pub const DEFAULT_BUILD_DIR: &str = "build/resources/main/solidity";

/// Gas limit of the debugged transactions.
pub const DEFAULT_GAS_LIMIT: u64 = 16_000_000;

/// Account sending the debugged transactions.
pub const DEFAULT_CALLER: Address = address!("0x1000000000000000000000000000000000000001");

/// Configuration for one debug session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Root that source paths and the build directory are resolved against
    pub project_root: PathBuf,
    /// Directory scanned for compiled artifacts
    pub build_dir: PathBuf,
    /// Source root prefix stripped from breakpoint paths
    pub source_root: String,
    /// Source file suffix stripped from breakpoint paths
    pub source_suffix: String,
    /// Maximum number of recorded stack frames
    pub max_frames: usize,
    /// Sender of the debugged transactions
    pub caller: Address,
    /// Gas limit of the debugged transactions
    pub gas_limit: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            build_dir: PathBuf::from(DEFAULT_BUILD_DIR),
            source_root: DEFAULT_SOURCE_ROOT.to_string(),
            source_suffix: DEFAULT_SOURCE_SUFFIX.to_string(),
            max_frames: DEFAULT_MAX_FRAMES,
            caller: DEFAULT_CALLER,
            gas_limit: DEFAULT_GAS_LIMIT,
        }
    }
}

impl EngineConfig {
    /// Load configuration from `path`, falling back to defaults when the file does not exist
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path:?}"))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file as TOML: {path:?}"))?;

        debug!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Load `.sdb.toml` from `project_root` and point the configuration at that root
    pub fn for_project(project_root: impl Into<PathBuf>) -> Result<Self> {
        let project_root = project_root.into();
        let config = Self::load(project_root.join(CONFIG_FILE_NAME))?;
        Ok(config.with_project_root(project_root))
    }

    /// Save configuration to `path`
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content =
            toml::to_string_pretty(self).with_context(|| "Failed to serialize config to TOML")?;
        fs::write(path, content).with_context(|| format!("Failed to write config file: {path:?}"))?;
        debug!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Set the project root
    pub fn with_project_root(mut self, project_root: impl Into<PathBuf>) -> Self {
        self.project_root = project_root.into();
        self
    }

    /// Set the build directory
    pub fn with_build_dir(mut self, build_dir: impl Into<PathBuf>) -> Self {
        self.build_dir = build_dir.into();
        self
    }

    /// Set the source root and suffix used to normalize breakpoint paths
    pub fn with_source_layout(mut self, root: impl Into<String>, suffix: impl Into<String>) -> Self {
        self.source_root = root.into();
        self.source_suffix = suffix.into();
        self
    }

    /// Bound the recorded frame history
    pub fn with_max_frames(mut self, max_frames: usize) -> Self {
        self.max_frames = max_frames;
        self
    }

    /// Set the transaction sender
    pub fn with_caller(mut self, caller: Address) -> Self {
        self.caller = caller;
        self
    }

    /// Set the transaction gas limit
    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    /// The build directory resolved against the project root
    pub fn build_path(&self) -> PathBuf {
        self.project_root.join(&self.build_dir)
    }

    /// Path normalizer matching this source layout
    pub fn normalizer(&self) -> PathNormalizer {
        PathNormalizer::new(self.source_root.clone(), self.source_suffix.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = EngineConfig::load(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.build_dir, PathBuf::from(DEFAULT_BUILD_DIR));
        assert_eq!(config.max_frames, DEFAULT_MAX_FRAMES);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CONFIG_FILE_NAME), "build_dir = \"out\"\nmax_frames = 8\n").unwrap();

        let config = EngineConfig::for_project(dir.path()).unwrap();
        assert_eq!(config.project_root, dir.path());
        assert_eq!(config.build_dir, PathBuf::from("out"));
        assert_eq!(config.max_frames, 8);
        assert_eq!(config.source_suffix, DEFAULT_SOURCE_SUFFIX);
        assert_eq!(config.build_path(), dir.path().join("out"));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "max_frames = \"many\"").unwrap();
        assert!(EngineConfig::load(&path).is_err());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let config = EngineConfig::default()
            .with_build_dir("artifacts")
            .with_source_layout("contracts/", ".sol")
            .with_gas_limit(1_000_000);
        config.save(&path).unwrap();
        assert_eq!(EngineConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_normalizer_follows_layout() {
        let config = EngineConfig::default().with_source_layout("contracts/", ".sol");
        assert_eq!(config.normalizer().normalize("contracts/Token.sol"), "Token");
    }
}
