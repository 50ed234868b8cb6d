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

//! The view of one executing opcode that the step controller consumes.

use std::borrow::Borrow;

use revm::{
    bytecode::OpCode,
    interpreter::{interpreter_types::Jumps, Interpreter},
    primitives::U256,
};

/// One opcode about to be executed.
///
/// Stack and memory are only read when the controller records a frame.
pub trait OpcodeStep {
    /// Byte offset of the opcode within the executing code.
    fn pc(&self) -> usize;

    /// The opcode itself.
    fn opcode(&self) -> OpCode;

    /// Whether the executing code is creation (init) code.
    fn is_creation(&self) -> bool;

    /// Lowercase hex of the executing code, without `0x`.
    fn bytecode_hex(&self) -> Option<&str>;

    /// Operand stack, bottom first.
    fn stack(&self) -> Vec<U256>;

    /// Linear memory of the current call frame.
    fn memory(&self) -> Vec<u8>;
}

/// [`OpcodeStep`] backed by a live revm interpreter.
pub struct InterpreterStep<'a> {
    interp: &'a Interpreter,
    is_creation: bool,
    code: Option<&'a str>,
}

impl<'a> InterpreterStep<'a> {
    /// Wrap `interp`, whose code is `code` (hex) and belongs to a creation frame if `is_creation`.
    pub fn new(interp: &'a Interpreter, is_creation: bool, code: Option<&'a str>) -> Self {
        Self { interp, is_creation, code }
    }
}

impl OpcodeStep for InterpreterStep<'_> {
    fn pc(&self) -> usize {
        self.interp.bytecode.pc()
    }

    fn opcode(&self) -> OpCode {
        OpCode::new(self.interp.bytecode.opcode()).unwrap_or(OpCode::INVALID)
    }

    fn is_creation(&self) -> bool {
        self.is_creation
    }

    fn bytecode_hex(&self) -> Option<&str> {
        self.code
    }

    fn stack(&self) -> Vec<U256> {
        self.interp.stack.data().clone()
    }

    fn memory(&self) -> Vec<u8> {
        self.interp.memory.borrow().context_memory().to_vec()
    }
}
