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

use revm::bytecode::OpCode;

/// First PUSH opcode carrying immediate data (`PUSH1`).
pub const PUSH1_BYTE: u8 = 0x60;

/// Last PUSH opcode (`PUSH32`).
pub const PUSH32_BYTE: u8 = 0x7F;

/// Number of immediate bytes following the opcode byte `byte`.
///
/// `PUSH1` through `PUSH32` carry 1 to 32 bytes, every other opcode none.
pub const fn immediate_size(byte: u8) -> usize {
    if byte >= PUSH1_BYTE && byte <= PUSH32_BYTE {
        (byte - PUSH1_BYTE + 1) as usize
    } else {
        0
    }
}

/// Extended trait for EVM opcode widths
///
/// `OpCode` already classifies jumps, jump destinations and pushes. This adds
/// the width of an instruction in the bytecode, which the disassembler needs
/// to walk program counters.
pub trait OpcodeTr {
    /// Number of immediate data bytes following the opcode
    ///
    /// # Example
    /// ```rust
    /// use revm::bytecode::OpCode;
    /// use sdb_common::OpcodeTr;
    ///
    /// assert_eq!(OpCode::PUSH2.immediate_size(), 2);
    /// assert_eq!(OpCode::JUMP.immediate_size(), 0);
    /// ```
    fn immediate_size(&self) -> usize;

    /// Total instruction width in bytes (opcode plus immediate data)
    fn instruction_size(&self) -> usize {
        1 + self.immediate_size()
    }
}

impl OpcodeTr for OpCode {
    fn immediate_size(&self) -> usize {
        immediate_size(self.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_immediate_sizes() {
        assert_eq!(OpCode::PUSH1.immediate_size(), 1);
        assert_eq!(OpCode::PUSH32.immediate_size(), 32);
        assert_eq!(OpCode::PUSH32.instruction_size(), 33);
        assert_eq!(OpCode::ADD.immediate_size(), 0);
        assert_eq!(OpCode::ADD.instruction_size(), 1);
        assert_eq!(OpCode::JUMPDEST.instruction_size(), 1);

        for byte in 0u8..=255 {
            let expected = if (0x60..=0x7f).contains(&byte) { (byte - 0x5f) as usize } else { 0 };
            assert_eq!(immediate_size(byte), expected);
        }
    }

    #[test]
    fn test_width_agrees_with_push_classification() {
        for byte in 0u8..=255 {
            if let Some(opcode) = OpCode::new(byte) {
                assert_eq!(opcode.is_push(), opcode.immediate_size() > 0, "{opcode}");
            }
        }
    }
}
