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

//! Domain types shared between the engine and its hosts.
//!
//! - [`SourceMapElement`] and [`JumpType`] describe one decoded source-map entry.
//! - [`SourceLine`], [`SourceFile`] and [`RenderedSource`] describe loaded and rendered source text.
//! - [`BreakpointRegistry`] is the shared, lock-protected set of line breakpoints.
//! - [`DebugCommand`] and [`ControllerState`] drive and describe the step controller.
//! - [`StackFrame`] and [`NamedValue`] capture the VM state at each stop.

mod breakpoint;
pub use breakpoint::*;

mod command;
pub use command::*;

mod frame;
pub use frame::*;

mod source;
pub use source::*;

mod source_map;
pub use source_map::*;
