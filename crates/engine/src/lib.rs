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

//! SDB Engine - source mapping and step execution for Solidity contracts
//!
//! The engine maps the program counter of executing EVM bytecode back to
//! Solidity source lines and drives a line-by-line step debugger on top of
//! revm:
//!
//! - [`sourcemap`] decodes solc's compressed source maps
//! - [`utils::disasm`] splits bytecode into instructions
//! - [`pc_index`] joins both into a program counter index
//! - [`artifact`] finds and caches the mapping for executing bytecode
//! - [`render`] turns a mapped byte range into source lines
//! - [`controller`] decides, opcode by opcode, where to stop
//! - [`session`] runs the VM on its own thread and exposes the host API

pub mod artifact;
pub use artifact::*;

pub mod channel;
pub use channel::*;

pub mod config;
pub use config::*;

pub mod controller;
pub use controller::*;

pub mod host;
pub use host::*;

pub mod inspector;
pub use inspector::*;

pub mod jump;
pub use jump::*;

pub mod pc_index;
pub use pc_index::*;

pub mod render;

pub mod session;
pub use session::*;

pub mod sourcemap;
pub use sourcemap::SourceMapError;

pub mod utils;
