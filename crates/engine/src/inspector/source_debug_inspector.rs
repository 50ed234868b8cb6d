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

//! Inspector driving the step controller from revm callbacks
//!
//! Every `step` is forwarded to [`StepController::trace_execution`]. The
//! inspector keeps one entry per active call frame recording whether the frame
//! runs creation code and, once the first opcode of the frame is seen, the hex
//! of its code. `call_end` and `create_end` notify the controller that a frame
//! finished.
//!
//! Once the host stops the session the inspector turns into a pass-through and
//! the VM runs to completion unobserved.

use revm::{
    context::ContextTr,
    interpreter::{CallInputs, CallOutcome, CreateInputs, CreateOutcome, Interpreter},
    Inspector,
};
use tracing::{debug, error};

use crate::{
    controller::{DebuggerError, StepController},
    host::DebugHost,
    inspector::InterpreterStep,
};

#[derive(Debug)]
struct FrameCode {
    is_creation: bool,
    code: Option<String>,
}

/// Inspector that lets a [`StepController`] observe and pause execution.
#[derive(Debug)]
pub struct SourceDebugInspector<H> {
    controller: StepController<H>,
    frames: Vec<FrameCode>,
    terminated: bool,
}

impl<H: DebugHost> SourceDebugInspector<H> {
    /// Wrap a controller.
    pub fn new(controller: StepController<H>) -> Self {
        Self { controller, frames: Vec::new(), terminated: false }
    }

    /// The wrapped controller.
    pub fn controller(&self) -> &StepController<H> {
        &self.controller
    }

    /// Unwrap the controller.
    pub fn into_controller(self) -> StepController<H> {
        self.controller
    }

    /// Whether the host stopped the session.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Number of call frames currently executing.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    fn push_frame(&mut self, is_creation: bool) {
        self.frames.push(FrameCode { is_creation, code: None });
    }

    fn pop_frame(&mut self) {
        if self.frames.pop().is_none() {
            error!("Frame stack underflow");
        }
        if !self.terminated {
            self.controller.on_frame_exit();
        }
    }
}

impl<CTX: ContextTr, H: DebugHost> Inspector<CTX> for SourceDebugInspector<H> {
    fn step(&mut self, interp: &mut Interpreter, _context: &mut CTX) {
        if self.terminated {
            return;
        }

        let Some(frame) = self.frames.last_mut() else {
            debug!("No active frame, cannot step");
            return;
        };
        if frame.code.is_none() {
            frame.code = Some(hex::encode(interp.bytecode.bytes()));
        }

        let step = InterpreterStep::new(interp, frame.is_creation, frame.code.as_deref());
        if let Err(DebuggerError::Terminated) = self.controller.trace_execution(&step) {
            debug!("Inspector switched to pass-through");
            self.terminated = true;
        }
    }

    fn call(&mut self, _context: &mut CTX, _inputs: &mut CallInputs) -> Option<CallOutcome> {
        self.push_frame(false);
        None
    }

    fn call_end(&mut self, _context: &mut CTX, _inputs: &CallInputs, _outcome: &mut CallOutcome) {
        self.pop_frame();
    }

    fn create(&mut self, _context: &mut CTX, _inputs: &mut CreateInputs) -> Option<CreateOutcome> {
        self.push_frame(true);
        None
    }

    fn create_end(
        &mut self,
        _context: &mut CTX,
        _inputs: &CreateInputs,
        _outcome: &mut CreateOutcome,
    ) {
        self.pop_frame();
    }
}
