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

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// The jump annotation solc attaches to each source-map entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JumpType {
    /// `i`: the instruction jumps into a function.
    Into,
    /// `o`: the instruction returns from a function.
    Out,
    /// `-`: an ordinary jump.
    Regular,
    /// No marker has been seen yet.
    #[default]
    Unspecified,
    /// Any marker this debugger does not know about, kept verbatim.
    Other(String),
}

impl JumpType {
    /// Interpret a raw jump marker. Unknown markers are preserved rather than rejected.
    pub fn from_marker(marker: &str) -> Self {
        match marker {
            "i" => Self::Into,
            "o" => Self::Out,
            "-" => Self::Regular,
            "" => Self::Unspecified,
            other => Self::Other(other.to_string()),
        }
    }

    /// The marker as it appears in an encoded source map.
    pub fn as_marker(&self) -> &str {
        match self {
            Self::Into => "i",
            Self::Out => "o",
            Self::Regular => "-",
            Self::Unspecified => "",
            Self::Other(marker) => marker,
        }
    }
}

impl Display for JumpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_marker())
    }
}

/// One decoded entry of a compressed source map.
///
/// Each entry is index-aligned with one disassembled instruction and points at
/// the byte range `[offset, offset + length)` of source file `file_index`.
/// A `file_index` of `None` stands for solc's `-1` marker: the instruction has
/// no corresponding source (compiler generated code).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceMapElement {
    /// Byte offset of the range start within the source file
    pub offset: usize,
    /// Length of the range in bytes
    pub length: usize,
    /// Index into the compilation unit's `sourceList`
    pub file_index: Option<usize>,
    /// Jump annotation
    pub jump: JumpType,
    /// Modifier depth, emitted by solc 0.6 and later
    pub modifier_depth: usize,
}

impl Default for SourceMapElement {
    fn default() -> Self {
        Self {
            offset: 0,
            length: 0,
            file_index: Some(0),
            jump: JumpType::Unspecified,
            modifier_depth: 0,
        }
    }
}

impl SourceMapElement {
    /// Exclusive end of the source range.
    pub fn end(&self) -> usize {
        self.offset.saturating_add(self.length)
    }

    /// Whether this element points into a real source file.
    pub fn has_source(&self) -> bool {
        self.file_index.is_some()
    }
}

impl Display for SourceMapElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let file = match self.file_index {
            Some(index) => index.to_string(),
            None => "-1".to_string(),
        };
        write!(f, "{}:{}:{file}:{}:{}", self.offset, self.length, self.jump, self.modifier_depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jump_type_markers() {
        assert_eq!(JumpType::from_marker("i"), JumpType::Into);
        assert_eq!(JumpType::from_marker("o"), JumpType::Out);
        assert_eq!(JumpType::from_marker("-"), JumpType::Regular);
        assert_eq!(JumpType::from_marker(""), JumpType::Unspecified);
        assert_eq!(JumpType::from_marker("x"), JumpType::Other("x".to_string()));

        for marker in ["i", "o", "-", "", "x"] {
            assert_eq!(JumpType::from_marker(marker).as_marker(), marker);
        }
    }

    #[test]
    fn test_element_display() {
        let element = SourceMapElement {
            offset: 12,
            length: 4,
            file_index: None,
            jump: JumpType::Into,
            modifier_depth: 1,
        };
        assert_eq!(element.to_string(), "12:4:-1:i:1");
        assert_eq!(element.end(), 16);
        assert!(!element.has_source());
        assert!(SourceMapElement::default().has_source());
    }
}
