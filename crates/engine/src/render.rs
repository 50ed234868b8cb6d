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

//! Source line renderer
//!
//! Turns a source-map byte range into the handful of lines around it. The
//! result holds up to two context lines before the range (head), every line
//! overlapping the range (body, marked selected) and up to two lines after it
//! (tail). Lines cut by the range boundaries are reassembled from their head,
//! body and tail pieces, and a selected line records the column where the
//! range starts.
//!
//! Offsets count one newline byte after every line.

use std::collections::BTreeMap;

use sdb_common::{RenderedSource, SourceFile, SourceLine, SourceMapElement};

use crate::artifact::ContractMapping;

/// Number of context lines shown before and after the executing range.
pub const CONTEXT_LINES: usize = 2;

/// The pieces of every line overlapping the inclusive byte range `[from, to]`.
///
/// A line spanning `[start, end]` (with `end` being its newline) overlaps when
/// either end lies in the range or either range bound lies in the line. Each
/// piece holds only the characters of the line that fall inside the range.
fn source_range(file: &SourceFile, from: i64, to: i64) -> BTreeMap<usize, String> {
    let mut pieces = BTreeMap::new();
    let mut start = 0i64;

    for (number, line) in &file.lines {
        let len = line.text.len() as i64;
        let end = start + len;

        let in_range = |pos: i64| from <= pos && pos <= to;
        let in_line = |pos: i64| start <= pos && pos <= end;
        if in_range(start) || in_range(end) || in_line(from) || in_line(to) {
            let lo = (from - start).clamp(0, len) as usize;
            let hi = (to - start + 1).clamp(0, len) as usize;
            let piece = if lo < hi {
                String::from_utf8_lossy(&line.text.as_bytes()[lo..hi]).into_owned()
            } else {
                String::new()
            };
            pieces.insert(*number, piece);
        }

        start = end + 1;
    }

    pieces
}

/// Locate the lines covered by `element` within `file`.
///
/// Returns an empty map when nothing overlaps, which callers treat as "no
/// source available".
pub fn locate(file: &SourceFile, element: &SourceMapElement) -> BTreeMap<usize, SourceLine> {
    let size = file.byte_len() as i64;
    let from = element.offset as i64;
    let to = from + element.length as i64;

    let head = source_range(file, 0, from - 1);
    let body = source_range(file, from, to - 1);
    let tail = source_range(file, to, size);

    let mut lines: BTreeMap<usize, SourceLine> = BTreeMap::new();

    for (number, piece) in head.into_iter().rev().take(CONTEXT_LINES) {
        lines.insert(number, SourceLine::new(piece));
    }

    for (number, piece) in body {
        match lines.get_mut(&number) {
            Some(line) => {
                if !line.selected {
                    line.offset = line.text.len();
                }
                line.text.push_str(&piece);
                line.selected = true;
            }
            None => {
                lines.insert(number, SourceLine::selected(piece, 0));
            }
        }
    }

    for (number, piece) in tail.into_iter().take(CONTEXT_LINES) {
        match lines.get_mut(&number) {
            Some(line) => line.text.push_str(&piece),
            None => {
                lines.insert(number, SourceLine::new(piece));
            }
        }
    }

    lines
}

/// Render `element` against `file`, tagging the result with the file path.
pub fn render(file: &SourceFile, element: &SourceMapElement) -> RenderedSource {
    RenderedSource { path: Some(file.path.clone()), lines: locate(file, element) }
}

/// Render `element` against whichever source of `mapping` it points into.
///
/// Yields an empty rendering when that source is not loaded.
pub fn render_source(mapping: &ContractMapping, element: &SourceMapElement) -> RenderedSource {
    mapping.source_for(element).map(|file| render(file, element)).unwrap_or_default()
}

/// Combine two renderings of the same file.
///
/// A line is selected if it is selected in either input; its offset comes from
/// the first input that selects it.
pub fn merge(first: &RenderedSource, second: &RenderedSource) -> RenderedSource {
    let mut merged = first.clone();
    for (number, line) in &second.lines {
        match merged.lines.get_mut(number) {
            Some(existing) => {
                if line.selected && !existing.selected {
                    existing.selected = true;
                    existing.offset = line.offset;
                }
                if line.text.len() > existing.text.len() {
                    existing.text.clone_from(&line.text);
                }
            }
            None => {
                merged.lines.insert(*number, line.clone());
            }
        }
    }
    if merged.path.is_none() {
        merged.path.clone_from(&second.path);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "pragma solidity ^0.8.0;\n\
                          \n\
                          contract Counter {\n\
                          \x20   uint256 public count;\n\
                          \x20   function inc() public {\n\
                          \x20       count += 1;\n\
                          \x20   }\n\
                          }\n";

    fn file() -> SourceFile {
        SourceFile::from_text("Counter.sol", SOURCE)
    }

    fn element_for(needle: &str) -> SourceMapElement {
        let offset = SOURCE.find(needle).unwrap();
        SourceMapElement { offset, length: needle.len(), ..Default::default() }
    }

    #[test]
    fn test_single_line_selection() {
        let lines = locate(&file(), &element_for("count += 1;"));

        // The cut line itself uses up one head and one tail slot.
        assert_eq!(lines.keys().copied().collect::<Vec<_>>(), vec![5, 6, 7]);
        assert!(lines[&6].selected);
        assert_eq!(lines[&6].text, "        count += 1;");
        assert_eq!(lines[&6].offset, 8);

        assert!(!lines[&5].selected);
        assert_eq!(lines[&5].text, "    function inc() public {");
        assert!(!lines[&7].selected);
        assert_eq!(lines[&7].text, "    }");
    }

    #[test]
    fn test_multi_line_selection() {
        let lines = locate(&file(), &element_for("function inc() public {\n        count += 1;\n    }"));

        let selected: Vec<usize> = lines.iter().filter(|(_, l)| l.selected).map(|(n, _)| *n).collect();
        assert_eq!(selected, vec![5, 6, 7]);
        assert_eq!(lines[&5].offset, 4);
        assert_eq!(lines[&5].text, "    function inc() public {");
        assert_eq!(lines[&6].offset, 0);
        assert_eq!(lines[&7].text, "    }");
        assert_eq!(lines[&4].text, "    uint256 public count;");
        assert!(!lines[&4].selected);
        assert_eq!(lines[&8].text, "}");
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn test_selection_at_file_start() {
        let lines = locate(&file(), &SourceMapElement { offset: 0, length: 6, ..Default::default() });
        assert!(lines[&1].selected);
        assert_eq!(lines[&1].offset, 0);
        assert_eq!(lines[&1].text, "pragma solidity ^0.8.0;");
        assert!(!lines[&2].selected);
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn test_range_outside_file_has_no_selection() {
        let lines =
            locate(&file(), &SourceMapElement { offset: 10_000, length: 4, ..Default::default() });
        assert!(lines.values().all(|line| !line.selected));

        let rendered = render(&file(), &SourceMapElement { offset: 10_000, length: 4, ..Default::default() });
        assert_eq!(rendered.first_selected(), (0, 0));
    }

    #[test]
    fn test_render_carries_path() {
        let rendered = render(&file(), &element_for("count += 1;"));
        assert_eq!(rendered.path.as_deref(), Some("Counter.sol"));
        assert_eq!(rendered.first_selected(), (6, 8));
    }

    #[test]
    fn test_render_source_needs_loaded_file() {
        let mut mapping = ContractMapping::empty();
        let element = element_for("count += 1;");
        assert!(render_source(&mapping, &element).is_empty());

        mapping.sources.insert(0, file());
        assert_eq!(render_source(&mapping, &element).first_selected(), (6, 8));

        let unmapped = SourceMapElement { file_index: None, ..element };
        assert!(render_source(&mapping, &unmapped).is_empty());
    }

    #[test]
    fn test_merge_of_adjacent_line_ranges_equals_union() {
        let source = file();
        let line4 = "    uint256 public count;";
        let line5 = "    function inc() public {";
        let start4 = SOURCE.find(line4).unwrap();
        let start5 = SOURCE.find(line5).unwrap();

        let first = SourceMapElement { offset: start4, length: line4.len(), ..Default::default() };
        let second = SourceMapElement { offset: start5, length: line5.len(), ..Default::default() };
        let union = SourceMapElement {
            offset: start4,
            length: start5 + line5.len() - start4,
            ..Default::default()
        };

        let merged = merge(&render(&source, &first), &render(&source, &second));
        let direct = render(&source, &union);

        let selected = |r: &RenderedSource| r.selected_lines().collect::<Vec<_>>();
        assert_eq!(selected(&merged), selected(&direct));
        assert_eq!(selected(&direct), vec![4, 5]);
        for number in selected(&direct) {
            assert_eq!(merged.lines[&number], direct.lines[&number]);
        }
    }
}
