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

//! Environment variable name constants for SDB configuration.
//!
//! These constants are the single source of truth for environment variable
//! names, shared by the CLI (through `clap`'s `env` support) and the logging
//! setup.
//!
//! # Environment Variables
//!
//! - [`SDB_PROJECT_ROOT`] - Project directory that source paths are resolved against
//! - [`SDB_BUILD_DIR`] - Directory holding compiled contract metadata
//! - [`SDB_CONFIG`] - Path of the TOML configuration file
//! - [`SDB_LOG_DIR`] - Directory for log files

/// Environment variable for the project root.
///
/// Source files listed in build artifacts are read relative to this
/// directory, and stack frames report paths joined onto it.
///
/// # Default
///
/// The current working directory.
pub const SDB_PROJECT_ROOT: &str = "SDB_PROJECT_ROOT";

/// Environment variable for the build-output directory.
///
/// The directory is scanned recursively for `*.json` contract metadata. A
/// relative value is resolved against the project root.
///
/// # Default
///
/// `build/resources/main/solidity`
pub const SDB_BUILD_DIR: &str = "SDB_BUILD_DIR";

/// Environment variable for the configuration file.
///
/// # Default
///
/// `.sdb.toml` in the project root. A missing file means defaults.
pub const SDB_CONFIG: &str = "SDB_CONFIG";

/// Environment variable for the log directory.
///
/// When set, file logs are written under this directory instead of the
/// system temp directory.
pub const SDB_LOG_DIR: &str = "SDB_LOG_DIR";
