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

//! Step-execution controller
//!
//! The controller sees every opcode the VM executes, in order, on the VM
//! thread. For each one it resolves the program counter to a source line and
//! decides whether to let the VM continue or to park the thread until the host
//! sends a command.
//!
//! # Protocol
//!
//! Each call to [`StepController::trace_execution`] pushes one
//! [`DebugCommand::Execute`] pulse into the command channel and then consumes
//! commands until that pulse has been handled:
//!
//! - `Execute` evaluates the stepping mode and breakpoints. Reaching a new
//!   source line while stepping, or a breakpoint while running, queues an
//!   internal `Suspend`.
//! - `Suspend` records a [`StackFrame`], notifies the host and blocks until
//!   the host sends the next command.
//! - `StepInto`, `StepOver`, `StepOut` and `Resume` adjust the stepping mode.
//! - `Stop` terminates the session. Every later call returns immediately.
//!
//! Internal transitions go through a local queue instead of recursion, so a
//! stop never re-enters the controller.
//!
//! While a jump skip is active (see [`JumpSkipManager`]) opcodes are ignored
//! entirely and the channel is not touched.

use std::{collections::VecDeque, sync::Arc};

use parking_lot::RwLock;
use sdb_common::{
    memory_values, stack_values, BreakpointRegistry, ControllerState, DebugCommand, JumpType,
    RenderedSource, SourceMapElement, StackFrame,
};
use thiserror::Error;
use tracing::{debug, info, trace};

use crate::{
    artifact::{ArtifactLoader, ContractMapping},
    channel::{CommandChannel, CommandOrigin},
    host::DebugHost,
    inspector::OpcodeStep,
    jump::{JumpSkipManager, SkipKind},
    render::render_source,
    utils::disasm::format_instruction,
};

/// Default bound on the recorded frame history.
pub const DEFAULT_MAX_FRAMES: usize = 1024;

/// Errors returned to the VM integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DebuggerError {
    /// The host stopped the session.
    #[error("debug session terminated")]
    Terminated,
}

/// Where the current opcode sits in the source.
#[derive(Debug, Clone)]
pub struct SourceLocation {
    /// Program counter of the opcode
    pub pc: usize,
    /// Source-map element for the program counter, if mapped
    pub element: Option<SourceMapElement>,
    /// Rendered lines around the executing range
    pub source: RenderedSource,
    /// First selected line, 0 when nothing is selected
    pub line: usize,
    /// Column where the range starts on that line
    pub column: usize,
    mapping: Arc<ContractMapping>,
}

impl SourceLocation {
    fn jump_type(&self) -> Option<&JumpType> {
        self.element.as_ref().map(|element| &element.jump)
    }

    /// A `JUMP` that can enter a function. Jumps marked as leaving one never do.
    fn is_call_jump(&self, step: &impl OpcodeStep) -> bool {
        step.opcode().is_jump() && self.jump_type() != Some(&JumpType::Out)
    }

    fn describe_opcode(&self, step: &impl OpcodeStep) -> String {
        self.mapping
            .disassembly
            .get_instruction_at_pc(self.pc)
            .map(|instruction| format_instruction(instruction, false))
            .unwrap_or_else(|| step.opcode().as_str().to_string())
    }
}

/// Cloneable read access to what the controller exposes to the host.
#[derive(Debug, Clone, Default)]
pub struct ControllerHandle {
    frames: Arc<RwLock<VecDeque<StackFrame>>>,
    state: Arc<RwLock<ControllerState>>,
}

impl ControllerHandle {
    /// Recorded frames, oldest first.
    pub fn stack_frames(&self) -> Vec<StackFrame> {
        self.frames.read().iter().cloned().collect()
    }

    /// The most recently recorded frame.
    pub fn top_frame(&self) -> Option<StackFrame> {
        self.frames.read().back().cloned()
    }

    /// Current controller state.
    pub fn state(&self) -> ControllerState {
        *self.state.read()
    }

    fn set_state(&self, state: ControllerState) {
        *self.state.write() = state;
    }
}

/// The per-opcode state machine driving source-level stepping.
#[derive(Debug)]
pub struct StepController<H> {
    loader: Arc<ArtifactLoader>,
    registry: BreakpointRegistry,
    channel: CommandChannel,
    host: H,
    jump: JumpSkipManager,
    handle: ControllerHandle,
    max_frames: usize,
    no_mapping: Arc<ContractMapping>,
    last_good: Option<RenderedSource>,
    last_selected_line: usize,
    run_till_next_line: bool,
    armed: Option<SkipKind>,
    resumed_from: Option<usize>,
    terminated: bool,
}

impl<H: DebugHost> StepController<H> {
    /// Create a controller consuming `channel` and reporting to `host`.
    pub fn new(
        loader: Arc<ArtifactLoader>,
        registry: BreakpointRegistry,
        channel: CommandChannel,
        host: H,
    ) -> Self {
        Self {
            loader,
            registry,
            channel,
            host,
            jump: JumpSkipManager::new(),
            handle: ControllerHandle::default(),
            max_frames: DEFAULT_MAX_FRAMES,
            no_mapping: Arc::new(ContractMapping::empty()),
            last_good: None,
            last_selected_line: 0,
            run_till_next_line: false,
            armed: None,
            resumed_from: None,
            terminated: false,
        }
    }

    /// Bound the frame history. The oldest frames are evicted first.
    pub fn with_max_frames(mut self, max_frames: usize) -> Self {
        self.max_frames = max_frames.max(1);
        self
    }

    /// A handle for reading frames and state from another thread.
    pub fn handle(&self) -> ControllerHandle {
        self.handle.clone()
    }

    /// The host this controller reports to.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// The line of the most recent stop.
    pub fn last_selected_line(&self) -> usize {
        self.last_selected_line
    }

    /// Whether the controller is stepping towards the next line.
    pub fn is_running_till_next_line(&self) -> bool {
        self.run_till_next_line
    }

    /// Whether the host stopped the session.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// The jump-skip state.
    pub fn jump_skip(&self) -> &JumpSkipManager {
        &self.jump
    }

    /// Resolve the program counter of `step` to a source location.
    ///
    /// Falls back to the last successfully rendered source, then to the
    /// placeholder, whenever the current opcode cannot be mapped.
    pub fn resolve(&mut self, step: &impl OpcodeStep) -> SourceLocation {
        let pc = step.pc();
        let mapping = match step.bytecode_hex() {
            Some(code) => self.loader.resolve(code, step.is_creation()),
            None => Arc::clone(&self.no_mapping),
        };
        let element = mapping.lookup(pc).cloned();

        let rendered = element
            .as_ref()
            .map(|element| render_source(&mapping, element))
            .filter(|source| source.selected_lines().next().is_some());
        let source = match rendered {
            Some(source) => {
                self.last_good = Some(source.clone());
                source
            }
            None => self.last_good.clone().unwrap_or_else(RenderedSource::placeholder),
        };

        let (line, column) = source.first_selected();
        SourceLocation { pc, element, source, line, column, mapping }
    }

    /// Handle one opcode about to be executed.
    ///
    /// Blocks while the session is suspended. Returns
    /// [`DebuggerError::Terminated`] once, when the host stops the session.
    pub fn trace_execution(&mut self, step: &impl OpcodeStep) -> Result<(), DebuggerError> {
        if self.terminated {
            return Ok(());
        }

        let opcode = step.opcode();
        if self.jump.is_active() {
            if opcode.is_jumpdest() {
                self.jump.observe_jumpdest();
            }
            trace!(pc = step.pc(), remaining = self.jump.remaining(), "Skipping opcode");
            return Ok(());
        }

        let location = self.resolve(step);
        trace!(pc = location.pc, line = location.line, opcode = %opcode.as_str(), "Tracing opcode");

        if self.resumed_from.is_some_and(|line| line != location.line) {
            self.resumed_from = None;
        }

        self.channel.push(DebugCommand::Execute);
        self.handle.set_state(ControllerState::AwaitingCommand);
        let result = self.process_commands(step, &location);
        self.handle.set_state(ControllerState::Running);
        result
    }

    /// A VM frame completed, reverted or halted.
    pub fn on_frame_exit(&mut self) {
        if self.run_till_next_line {
            debug!("Frame exited while stepping, running to the next breakpoint");
        }
        self.run_till_next_line = false;
        self.armed = None;
        self.jump.deactivate();
    }

    fn process_commands(
        &mut self,
        step: &impl OpcodeStep,
        location: &SourceLocation,
    ) -> Result<(), DebuggerError> {
        let mut transitions = VecDeque::new();
        let mut pulse_pending = true;

        loop {
            let command = match transitions.pop_front() {
                Some(command) => command,
                None => {
                    let (command, origin) = self.channel.take();
                    if command == DebugCommand::Execute && origin == CommandOrigin::Harness {
                        pulse_pending = false;
                    }
                    command
                }
            };

            match command {
                DebugCommand::Execute => {
                    if self.should_suspend(step, location) {
                        transitions.push_back(DebugCommand::Suspend);
                        continue;
                    }
                }
                DebugCommand::Suspend => {
                    let next = self.suspend(step, location);
                    // Stale pulses are discarded while parked.
                    pulse_pending = false;
                    transitions.push_back(next);
                    continue;
                }
                DebugCommand::StepInto => {
                    debug!(line = location.line, "Step into");
                }
                DebugCommand::StepOver => {
                    self.arm_or_skip(SkipKind::StepOver, step, location);
                    debug!(line = location.line, skipping = self.jump.is_active(), "Step over");
                }
                DebugCommand::StepOut => {
                    self.arm_or_skip(SkipKind::StepOut, step, location);
                    debug!(line = location.line, skipping = self.jump.is_active(), "Step out");
                }
                DebugCommand::Resume => {
                    self.run_till_next_line = false;
                    self.armed = None;
                    self.resumed_from = Some(location.line);
                    debug!(line = location.line, "Resume");
                }
                DebugCommand::Stop => {
                    info!(pc = location.pc, "Debug session stopped by host");
                    self.terminated = true;
                    self.run_till_next_line = false;
                    self.jump.deactivate();
                    return Err(DebuggerError::Terminated);
                }
            }

            if !pulse_pending {
                return Ok(());
            }
        }
    }

    /// Skip now if `step` is a call jump, otherwise wait for one on this line.
    fn arm_or_skip(&mut self, kind: SkipKind, step: &impl OpcodeStep, location: &SourceLocation) {
        if location.is_call_jump(step) {
            self.armed = None;
            self.jump.activate(kind);
        } else {
            self.armed = Some(kind);
        }
    }

    fn should_suspend(&mut self, step: &impl OpcodeStep, location: &SourceLocation) -> bool {
        if self.run_till_next_line {
            if location.line == self.last_selected_line {
                if location.is_call_jump(step) {
                    if let Some(kind) = self.armed.take() {
                        self.jump.activate(kind);
                    }
                }
                return false;
            }
            self.run_till_next_line = false;
            debug!(from = self.last_selected_line, to = location.line, "Reached next line");
            return true;
        }

        if self.resumed_from == Some(location.line) {
            return false;
        }
        let hit = self.registry.should_stop(location.source.path.as_deref(), location.line);
        if hit {
            debug!(line = location.line, "Breakpoint hit");
        }
        hit
    }

    fn suspend(&mut self, step: &impl OpcodeStep, location: &SourceLocation) -> DebugCommand {
        self.last_selected_line = location.line;
        self.run_till_next_line = true;
        self.armed = None;

        let frame = self.record_frame(step, location);
        info!(%frame, "Execution suspended");

        self.handle.set_state(ControllerState::Suspended);
        self.host.suspended(location.line, Some(&frame));
        let command = self.channel.take_from_host();
        self.handle.set_state(ControllerState::AwaitingCommand);

        debug!(%command, "Resuming from suspension");
        command
    }

    fn record_frame(&mut self, step: &impl OpcodeStep, location: &SourceLocation) -> StackFrame {
        let mut values = stack_values(&step.stack());
        values.extend(memory_values(&step.memory()));

        let frame = StackFrame {
            file: location.source.path.as_ref().map(|path| self.loader.project_root().join(path)),
            line: location.line,
            column_offset: location.column,
            pc: location.pc,
            opcode: location.describe_opcode(step),
            values,
        };

        let mut frames = self.handle.frames.write();
        while frames.len() >= self.max_frames {
            frames.pop_front();
        }
        frames.push_back(frame.clone());
        frame
    }
}
