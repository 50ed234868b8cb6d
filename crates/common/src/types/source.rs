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

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Text shown when the current program counter cannot be mapped to any source.
pub const NO_SOURCE_AVAILABLE: &str = "No source available";

/// A single line of source text, optionally marked as part of the executing range.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLine {
    /// The line text, without its trailing newline
    pub text: String,
    /// Whether the line overlaps the currently executing source range
    pub selected: bool,
    /// Byte offset within `text` where the selected range starts (only meaningful if `selected`)
    pub offset: usize,
}

impl SourceLine {
    /// Create an unselected line.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), selected: false, offset: 0 }
    }

    /// Create a selected line whose selection starts at `offset`.
    pub fn selected(text: impl Into<String>, offset: usize) -> Self {
        Self { text: text.into(), selected: true, offset }
    }
}

/// One file of a compilation unit, indexed by 1-based line number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    /// Path as listed in the artifact's `sourceList`
    pub path: String,
    /// Lines keyed by 1-based line number
    pub lines: BTreeMap<usize, SourceLine>,
}

impl SourceFile {
    /// Split `text` into numbered lines.
    pub fn from_text(path: impl Into<String>, text: &str) -> Self {
        let lines = text.lines().enumerate().map(|(i, line)| (i + 1, SourceLine::new(line))).collect();
        Self { path: path.into(), lines }
    }

    /// Number of bytes covered by the file, counting one newline byte per line.
    pub fn byte_len(&self) -> usize {
        self.lines.values().map(|line| line.text.len() + 1).sum()
    }
}

/// The source slice displayed for one program counter.
///
/// `path` is `None` for the synthetic placeholder produced when no source has
/// ever been resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedSource {
    /// Path of the file the lines come from
    pub path: Option<String>,
    /// Rendered lines keyed by 1-based line number
    pub lines: BTreeMap<usize, SourceLine>,
}

impl RenderedSource {
    /// The single-line placeholder keyed at line 0.
    pub fn placeholder() -> Self {
        let mut lines = BTreeMap::new();
        lines.insert(0, SourceLine::new(NO_SOURCE_AVAILABLE));
        Self { path: None, lines }
    }

    /// Whether this is the placeholder rendering.
    pub fn is_placeholder(&self) -> bool {
        self.path.is_none()
    }

    /// Whether nothing was rendered.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Line numbers marked as selected, in increasing order.
    pub fn selected_lines(&self) -> impl Iterator<Item = usize> + '_ {
        self.lines.iter().filter(|(_, line)| line.selected).map(|(number, _)| *number)
    }

    /// The first selected line and its selection offset, `(0, 0)` when nothing is selected.
    pub fn first_selected(&self) -> (usize, usize) {
        self.lines
            .iter()
            .find(|(_, line)| line.selected)
            .map(|(number, line)| (*number, line.offset))
            .unwrap_or((0, 0))
    }

    /// The last selected line, 0 when nothing is selected.
    pub fn last_selected(&self) -> usize {
        self.selected_lines().last().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_file_from_text() {
        let file = SourceFile::from_text("Foo.sol", "a\nbc\n\ndef\n");
        assert_eq!(file.lines.len(), 4);
        assert_eq!(file.lines[&1].text, "a");
        assert_eq!(file.lines[&3].text, "");
        assert_eq!(file.lines[&4].text, "def");
        assert_eq!(file.byte_len(), 2 + 3 + 1 + 4);
    }

    #[test]
    fn test_placeholder() {
        let placeholder = RenderedSource::placeholder();
        assert!(placeholder.is_placeholder());
        assert_eq!(placeholder.lines[&0].text, NO_SOURCE_AVAILABLE);
        assert_eq!(placeholder.first_selected(), (0, 0));
        assert_eq!(placeholder.last_selected(), 0);
    }

    #[test]
    fn test_first_selected() {
        let mut rendered = RenderedSource { path: Some("Foo.sol".into()), lines: BTreeMap::new() };
        rendered.lines.insert(3, SourceLine::new("head"));
        rendered.lines.insert(4, SourceLine::selected("body", 2));
        rendered.lines.insert(5, SourceLine::selected("more", 0));
        rendered.lines.insert(6, SourceLine::new("tail"));

        assert_eq!(rendered.first_selected(), (4, 2));
        assert_eq!(rendered.last_selected(), 5);
        assert_eq!(rendered.selected_lines().collect::<Vec<_>>(), vec![4, 5]);
    }
}
