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

//! Program-counter to source-location index.

use std::collections::BTreeMap;

use sdb_common::SourceMapElement;

/// Maps the byte offset of every mapped instruction to its source-map element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PcSourceIndex {
    entries: BTreeMap<usize, SourceMapElement>,
}

impl PcSourceIndex {
    /// Zip decoded source-map elements with instruction groups.
    ///
    /// Both sequences are walked in lock step up to the shorter length. Each
    /// element is keyed by the running byte offset, which advances by the byte
    /// width of the instruction group (hex digits / 2).
    pub fn build(elements: &[SourceMapElement], groups: &[String]) -> Self {
        let mut entries = BTreeMap::new();
        let mut pc = 0usize;
        for (element, group) in elements.iter().zip(groups) {
            entries.insert(pc, element.clone());
            pc += group.len() / 2;
        }
        Self { entries }
    }

    /// The element for the instruction starting at `pc`, if any.
    pub fn lookup(&self, pc: usize) -> Option<&SourceMapElement> {
        self.entries.get(&pc)
    }

    /// Mapped program counters in increasing order.
    pub fn pcs(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries.keys().copied()
    }

    /// Iterate over `(pc, element)` pairs in program-counter order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &SourceMapElement)> + '_ {
        self.entries.iter().map(|(pc, element)| (*pc, element))
    }

    /// Number of mapped instructions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is mapped.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{sourcemap::decode, utils::disasm::split_instructions};

    #[test]
    fn test_build_offsets() {
        let groups = split_instructions("600160020100");
        let elements = decode("0:1:0;1:1:0;2:1:0;3:1:0").unwrap();
        let index = PcSourceIndex::build(&elements, &groups);

        assert_eq!(index.pcs().collect::<Vec<_>>(), vec![0, 2, 4, 5]);
        assert_eq!(index.lookup(2).unwrap().offset, 1);
        assert_eq!(index.lookup(5).unwrap().offset, 3);
        assert!(index.lookup(1).is_none());
        assert!(index.lookup(6).is_none());
    }

    #[test]
    fn test_shorter_sequence_bounds_index() {
        let groups = split_instructions("600160020100");
        let elements = decode("0:1:0;1:1:0").unwrap();
        let index = PcSourceIndex::build(&elements, &groups);
        assert_eq!(index.len(), 2);

        let elements = decode("0:1:0;;;;;;;;").unwrap();
        let index = PcSourceIndex::build(&elements, &groups);
        assert_eq!(index.len(), 4);
    }

    #[test]
    fn test_monotonic_keys_match_prefix_sums() {
        let hex = "6080604052348015600f57600080fd5b50603f80601d6000396000f3fe";
        let groups = split_instructions(hex);
        let elements = vec![SourceMapElement::default(); groups.len()];
        let index = PcSourceIndex::build(&elements, &groups);

        let keys: Vec<usize> = index.pcs().collect();
        assert!(keys.windows(2).all(|w| w[0] < w[1]));

        let mut expected = 0;
        for (key, group) in keys.iter().zip(&groups) {
            assert_eq!(*key, expected);
            expected += group.len() / 2;
        }
    }

    #[test]
    fn test_empty_index() {
        let index = PcSourceIndex::build(&[], &split_instructions("6001"));
        assert!(index.is_empty());
        assert!(index.lookup(0).is_none());
    }
}
