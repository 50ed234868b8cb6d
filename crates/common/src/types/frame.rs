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

use std::{fmt::Display, path::PathBuf};

use revm::primitives::U256;
use serde::{Deserialize, Serialize};

/// Width of one EVM memory word in bytes.
pub const WORD_SIZE: usize = 32;

/// A value shown alongside a stack frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedValue {
    /// Display name, e.g. `memory[2]`
    pub name: String,
    /// Type label, e.g. `bytes32`
    pub type_name: String,
    /// Rendered value
    pub value: String,
}

impl NamedValue {
    /// Create a new named value.
    pub fn new(
        name: impl Into<String>,
        type_name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self { name: name.into(), type_name: type_name.into(), value: value.into() }
    }
}

impl Display for NamedValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} = {}", self.name, self.type_name, self.value)
    }
}

/// A snapshot of the VM taken each time the controller decides to stop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    /// Source file, resolved against the project root. `None` when no source was available.
    pub file: Option<PathBuf>,
    /// 1-based line the frame stopped at (0 for the placeholder)
    pub line: usize,
    /// Byte offset of the executing range within that line
    pub column_offset: usize,
    /// Program counter of the opcode that triggered the stop
    pub pc: usize,
    /// Mnemonic of that opcode
    pub opcode: String,
    /// Captured stack and memory values
    pub values: Vec<NamedValue>,
}

impl Display for StackFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{}:{}:{}", file.display(), self.line, self.column_offset)?,
            None => write!(f, "<unknown>:{}", self.line)?,
        }
        write!(f, " (pc {:#x} {})", self.pc, self.opcode)
    }
}

/// Render a byte slice as text, dropping zero bytes.
///
/// An empty slice renders as a single space so that the value column never collapses.
pub fn readable_string(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return " ".to_string();
    }
    let printable: Vec<u8> = bytes.iter().copied().filter(|b| *b != 0).collect();
    String::from_utf8_lossy(&printable).into_owned()
}

/// Split linear memory into 32-byte words, each rendered as hex followed by its readable text.
///
/// A trailing partial word is zero padded.
pub fn memory_values(memory: &[u8]) -> Vec<NamedValue> {
    memory
        .chunks(WORD_SIZE)
        .enumerate()
        .map(|(index, chunk)| {
            let mut word = [0u8; WORD_SIZE];
            word[..chunk.len()].copy_from_slice(chunk);
            let value = format!("0x{} {}", hex::encode(word), readable_string(&word));
            NamedValue::new(format!("memory[{index}]"), "bytes32", value)
        })
        .collect()
}

/// Render the operand stack, top of stack first.
pub fn stack_values(stack: &[U256]) -> Vec<NamedValue> {
    stack
        .iter()
        .rev()
        .enumerate()
        .map(|(depth, item)| NamedValue::new(format!("stack[{depth}]"), "uint256", format!("{item:#x}")))
        .collect()
}
