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

//! EVM bytecode disassembly utilities
//!
//! Two views of the same instruction stream are provided:
//! - [`split_instructions`] groups a hex string into per-instruction hex strings,
//!   which is what the source-map index is built from.
//! - [`disassemble`] produces structured instructions with their opcode and
//!   immediate bytes, used to describe the instruction at a stop.
//!
//! Both accept truncated bytecode: a trailing PUSH with fewer immediate bytes
//! than it declares is kept as a shorter instruction, never padded or dropped.

use alloy_primitives::Bytes;
use revm::bytecode::opcode::OpCode;
use sdb_common::{immediate_size, OpcodeTr};

/// A single disassembled instruction with its associated data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisassemblyInstruction {
    /// Program counter offset where this instruction starts
    pub pc: usize,
    /// The opcode for this instruction
    pub opcode: OpCode,
    /// For PUSHX instructions, the immediate bytes actually present in the bytecode.
    /// For other instructions, this is empty
    pub push_data: Vec<u8>,
}

impl DisassemblyInstruction {
    /// Create a new instruction without push data
    pub fn new(pc: usize, opcode: OpCode) -> Self {
        Self { pc, opcode, push_data: Vec::new() }
    }

    /// Create a new instruction with push data
    pub fn with_push_data(pc: usize, opcode: OpCode, push_data: Vec<u8>) -> Self {
        Self { pc, opcode, push_data }
    }

    /// Check if this instruction is a PUSH instruction
    pub fn is_push(&self) -> bool {
        self.opcode.is_push()
    }

    /// Size of the immediate data the opcode declares
    pub fn push_size(&self) -> usize {
        self.opcode.immediate_size()
    }

    /// Number of bytes this instruction occupies in the bytecode
    pub fn instruction_size(&self) -> usize {
        1 + self.push_data.len()
    }

    /// Whether the bytecode ended before all declared immediate bytes
    pub fn is_truncated(&self) -> bool {
        self.push_data.len() < self.push_size()
    }

    /// Lowercase hex of the instruction bytes
    pub fn to_hex(&self) -> String {
        let mut hex = format!("{:02x}", self.opcode.get());
        hex.push_str(&hex::encode(&self.push_data));
        hex
    }
}

/// Complete disassembly result for a piece of bytecode
#[derive(Debug, Clone, Default)]
pub struct DisassemblyResult {
    /// Original bytecode that was disassembled
    pub bytecode: Bytes,
    /// List of disassembled instructions in order
    pub instructions: Vec<DisassemblyInstruction>,
}

impl DisassemblyResult {
    /// Create a new disassembly result
    pub fn new(bytecode: Bytes, instructions: Vec<DisassemblyInstruction>) -> Self {
        Self { bytecode, instructions }
    }

    /// Get the total number of instructions
    pub fn instruction_count(&self) -> usize {
        self.instructions.len()
    }

    /// Get instruction at a specific program counter offset
    pub fn get_instruction_at_pc(&self, pc: usize) -> Option<&DisassemblyInstruction> {
        self.instructions
            .binary_search_by_key(&pc, |inst| inst.pc)
            .ok()
            .map(|index| &self.instructions[index])
    }

    /// Find the instruction that contains a given PC offset
    /// This is useful when the PC might point into the middle of a PUSH instruction's data
    pub fn find_instruction_containing_pc(&self, pc: usize) -> Option<&DisassemblyInstruction> {
        let index = match self.instructions.binary_search_by_key(&pc, |inst| inst.pc) {
            Ok(index) => index,
            Err(0) => return None,
            Err(next) => next - 1,
        };
        let inst = &self.instructions[index];
        (pc < inst.pc + inst.instruction_size()).then_some(inst)
    }
}

/// Disassemble EVM bytecode into a structured representation
///
/// # Examples
/// ```rust
/// use alloy_primitives::Bytes;
/// use sdb_engine::utils::disasm::disassemble;
///
/// let bytecode = Bytes::from(vec![0x60, 0x42, 0x80]); // PUSH1 0x42, DUP1
/// let result = disassemble(&bytecode);
/// assert_eq!(result.instructions.len(), 2);
/// assert!(result.instructions[0].is_push());
/// assert_eq!(result.instructions[0].push_data, vec![0x42]);
/// ```
pub fn disassemble(bytecode: &Bytes) -> DisassemblyResult {
    let mut instructions = Vec::new();
    let mut pc = 0;

    while pc < bytecode.len() {
        let opcode_byte = bytecode[pc];

        // Invalid opcodes are kept as-is; `format_instruction` reports them.
        let opcode = unsafe { OpCode::new_unchecked(opcode_byte) };

        let push_size = immediate_size(opcode_byte);
        if push_size > 0 {
            let data_start = pc + 1;
            let data_end = (data_start + push_size).min(bytecode.len());
            let push_data = bytecode[data_start..data_end].to_vec();

            instructions.push(DisassemblyInstruction::with_push_data(pc, opcode, push_data));
            pc = data_end;
        } else {
            instructions.push(DisassemblyInstruction::new(pc, opcode));
            pc += 1;
        }
    }

    DisassemblyResult::new(bytecode.clone(), instructions)
}

/// Width in bytes of the instruction starting with the two-digit hex `chunk`.
///
/// Anything that is not a hex byte is treated as a one-byte instruction.
fn instruction_width(chunk: &str) -> usize {
    u8::from_str_radix(chunk, 16).map(|byte| 1 + immediate_size(byte)).unwrap_or(1)
}

/// Split a hex-encoded bytecode string into per-instruction hex groups
///
/// An optional `0x` prefix is stripped. The string is walked two hex digits at
/// a time; each instruction boundary opens a group as wide as the opcode
/// requires and the following digits are absorbed into it. A trailing partial
/// instruction is returned shorter than its nominal width.
///
/// # Examples
/// ```rust
/// use sdb_engine::utils::disasm::split_instructions;
///
/// assert_eq!(split_instructions("600160020100"), vec!["6001", "6002", "01", "00"]);
/// assert_eq!(split_instructions("6101"), vec!["6101"]);
/// ```
pub fn split_instructions(bytecode_hex: &str) -> Vec<String> {
    let hex = bytecode_hex.strip_prefix("0x").unwrap_or(bytecode_hex);

    let mut groups: Vec<String> = Vec::new();
    let mut remaining = 0usize;

    for chunk in hex.as_bytes().chunks(2) {
        let chunk = String::from_utf8_lossy(chunk);
        if remaining == 0 {
            remaining = instruction_width(&chunk);
            groups.push(String::with_capacity(remaining * 2));
        }
        if let Some(group) = groups.last_mut() {
            group.push_str(&chunk);
        }
        remaining -= 1;
    }

    groups
}

/// Format a disassembly instruction as a human-readable string
///
/// # Examples
/// ```rust
/// use sdb_engine::utils::disasm::{DisassemblyInstruction, format_instruction};
/// use revm::bytecode::opcode::OpCode;
///
/// let push_inst = DisassemblyInstruction::with_push_data(
///     10,
///     unsafe { OpCode::new_unchecked(0x61) }, // PUSH2
///     vec![0x12, 0x34]
/// );
/// let formatted = format_instruction(&push_inst, true);
/// assert!(formatted.contains("PUSH2"));
/// assert!(formatted.contains("0x1234"));
/// ```
pub fn format_instruction(instruction: &DisassemblyInstruction, show_pc: bool) -> String {
    let pc_part = if show_pc { format!("{:04x}: ", instruction.pc) } else { String::new() };

    let opcode_name = if instruction.opcode.is_valid() {
        instruction.opcode.as_str().to_string()
    } else {
        format!("'{:x}'(Unknown Opcode)", instruction.opcode.get())
    };

    if instruction.is_push() && !instruction.push_data.is_empty() {
        let hex_data = hex::encode(&instruction.push_data);
        format!("{pc_part}{opcode_name} 0x{hex_data}")
    } else {
        format!("{pc_part}{opcode_name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Bytes;

    #[test]
    fn test_split_instructions_fixed_point() {
        assert_eq!(split_instructions("600160020100"), vec!["6001", "6002", "01", "00"]);
        assert_eq!(split_instructions("0x600160020100"), vec!["6001", "6002", "01", "00"]);
        assert_eq!(split_instructions("7F").len(), 1);
        assert!(split_instructions("").is_empty());
    }

    #[test]
    fn test_split_instructions_push32() {
        let push32 = format!("7f{}", "ab".repeat(32));
        let groups = split_instructions(&format!("{push32}00"));
        assert_eq!(groups, vec![push32, "00".to_string()]);
    }

    #[test]
    fn test_split_instructions_truncated_tail() {
        assert_eq!(split_instructions("016102aa"), vec!["01", "6102aa"]);
        assert_eq!(split_instructions("0161"), vec!["01", "61"]);
        assert_eq!(split_instructions("6001600"), vec!["6001", "600"]);
    }

    #[test]
    fn test_split_instructions_non_hex() {
        assert_eq!(split_instructions("zz6001"), vec!["zz", "6001"]);
    }

    #[test]
    fn test_split_matches_structured_disassembly() {
        let hex = "6080604052348015600f57600080fd5b50603f80601d6000396000f3fe6080";
        let bytes = Bytes::from(hex::decode(hex).unwrap());
        let structured: Vec<String> =
            disassemble(&bytes).instructions.iter().map(DisassemblyInstruction::to_hex).collect();
        assert_eq!(split_instructions(hex), structured);
    }

    #[test]
    fn test_disassemble_simple() {
        let bytecode = Bytes::from(vec![0x80, 0x81, 0x82]); // DUP1, DUP2, DUP3
        let result = disassemble(&bytecode);

        assert_eq!(result.instructions.len(), 3);
        assert_eq!(result.instructions[0].pc, 0);
        assert_eq!(result.instructions[1].pc, 1);
        assert_eq!(result.instructions[2].pc, 2);

        for inst in &result.instructions {
            assert!(!inst.is_push());
            assert!(inst.push_data.is_empty());
        }
    }

    #[test]
    fn test_disassemble_push_instructions() {
        let bytecode = Bytes::from(vec![
            0x60, 0x42, // PUSH1 0x42
            0x61, 0x12, 0x34, // PUSH2 0x1234
            0x80, // DUP1
        ]);
        let result = disassemble(&bytecode);

        assert_eq!(result.instructions.len(), 3);

        assert_eq!(result.instructions[0].pc, 0);
        assert!(result.instructions[0].is_push());
        assert_eq!(result.instructions[0].push_data, vec![0x42]);
        assert_eq!(result.instructions[0].instruction_size(), 2);

        assert_eq!(result.instructions[1].pc, 2);
        assert_eq!(result.instructions[1].push_data, vec![0x12, 0x34]);
        assert_eq!(result.instructions[1].instruction_size(), 3);

        assert_eq!(result.instructions[2].pc, 5);
        assert!(!result.instructions[2].is_push());
        assert_eq!(result.instructions[2].instruction_size(), 1);
    }

    #[test]
    fn test_find_instruction_containing_pc() {
        let bytecode = Bytes::from(vec![
            0x60, 0x42, // PUSH1 0x42 (PC 0-1)
            0x61, 0x12, 0x34, // PUSH2 0x1234 (PC 2-4)
            0x80, // DUP1 (PC 5)
        ]);
        let result = disassemble(&bytecode);

        assert_eq!(result.find_instruction_containing_pc(0).unwrap().pc, 0);
        assert_eq!(result.find_instruction_containing_pc(1).unwrap().pc, 0);
        assert_eq!(result.find_instruction_containing_pc(3).unwrap().pc, 2);
        assert_eq!(result.find_instruction_containing_pc(5).unwrap().pc, 5);
        assert!(result.find_instruction_containing_pc(6).is_none());

        assert!(result.get_instruction_at_pc(2).is_some());
        assert!(result.get_instruction_at_pc(3).is_none());
    }

    #[test]
    fn test_truncated_push_instruction() {
        let bytecode = Bytes::from(vec![0x61, 0x12]); // PUSH2 but only 1 byte of data
        let result = disassemble(&bytecode);

        assert_eq!(result.instructions.len(), 1);
        assert!(result.instructions[0].is_push());
        assert!(result.instructions[0].is_truncated());
        assert_eq!(result.instructions[0].push_data, vec![0x12]);
        assert_eq!(result.instructions[0].instruction_size(), 2);
        assert_eq!(result.instructions[0].to_hex(), "6112");
    }

    #[test]
    fn test_format_instruction() {
        let push_inst = DisassemblyInstruction::with_push_data(
            10,
            unsafe { OpCode::new_unchecked(0x61) },
            vec![0x12, 0x34],
        );

        assert_eq!(format_instruction(&push_inst, true), "000a: PUSH2 0x1234");
        assert_eq!(format_instruction(&push_inst, false), "PUSH2 0x1234");

        let regular_inst = DisassemblyInstruction::new(5, unsafe { OpCode::new_unchecked(0x80) });
        assert_eq!(format_instruction(&regular_inst, true), "0005: DUP1");
    }
}
