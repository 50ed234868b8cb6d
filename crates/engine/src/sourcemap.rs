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

//! Decoder for solc's compressed source maps.
//!
//! A source map is a `;`-separated list of entries, one per instruction. Each
//! entry is `s:l:f:j:m` (byte offset, length, file index, jump marker and
//! modifier depth). Any field may be empty or omitted, in which case it keeps
//! the value of the previous entry:
//!
//! ```text
//! 1:2:0:-;;4::1:o
//! ```
//!
//! decodes to `1:2:0:-`, `1:2:0:-` and `4:2:1:o`.

use sdb_common::{JumpType, SourceMapElement};
use thiserror::Error;

/// Error raised when a source map contains a malformed field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceMapError {
    /// A field that is present could not be parsed as a number.
    #[error("invalid {field} `{value}` in source map segment {segment}")]
    InvalidField {
        /// Zero-based index of the offending `;`-separated segment
        segment: usize,
        /// Name of the offending field
        field: &'static str,
        /// The raw field text
        value: String,
    },
}

const FIELD_NAMES: [&str; 5] = ["offset", "length", "file index", "jump", "modifier depth"];

/// Decode a compressed source map.
///
/// The output has exactly one element per `;`-separated segment, so a trailing
/// `;` yields a final element duplicating the previous one and an empty input
/// yields a single default element. Fields beyond the fifth are ignored.
pub fn decode(raw: &str) -> Result<Vec<SourceMapElement>, SourceMapError> {
    let mut elements = Vec::with_capacity(raw.len() / 8 + 1);
    let mut current = SourceMapElement::default();

    for (segment, entry) in raw.split(';').enumerate() {
        for (index, field) in entry.split(':').enumerate() {
            let field = field.trim();
            if field.is_empty() {
                continue;
            }
            match index {
                0 => current.offset = parse_position(segment, index, field)?,
                1 => current.length = parse_position(segment, index, field)?,
                2 => {
                    let value = parse_number(segment, index, field)?;
                    current.file_index = usize::try_from(value).ok();
                }
                3 => current.jump = JumpType::from_marker(field),
                4 => current.modifier_depth = parse_position(segment, index, field)?,
                _ => {}
            }
        }
        elements.push(current.clone());
    }

    Ok(elements)
}

fn parse_number(segment: usize, index: usize, field: &str) -> Result<i64, SourceMapError> {
    field.parse::<i64>().map_err(|_| SourceMapError::InvalidField {
        segment,
        field: FIELD_NAMES[index],
        value: field.to_string(),
    })
}

/// Offsets, lengths and depths. solc writes `-1` for compiler generated code,
/// which is clamped to zero.
fn parse_position(segment: usize, index: usize, field: &str) -> Result<usize, SourceMapError> {
    parse_number(segment, index, field).map(|value| usize::try_from(value).unwrap_or(0))
}
