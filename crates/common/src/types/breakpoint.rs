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

use std::{
    collections::{BTreeSet, HashMap},
    fmt::Display,
    str::FromStr,
    sync::Arc,
};

use eyre::{bail, eyre, Error, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Default project-relative directory holding contract sources.
pub const DEFAULT_SOURCE_ROOT: &str = "src/main/solidity/";

/// Default source file extension.
pub const DEFAULT_SOURCE_SUFFIX: &str = ".sol";

/// A line breakpoint as typed by a user: `<path>:<line>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineBreakpoint {
    /// Path of the source file, project relative or as listed in the artifact
    pub path: String,
    /// 1-based line number
    pub line: usize,
}

impl LineBreakpoint {
    /// Create a new line breakpoint.
    pub fn new(path: impl Into<String>, line: usize) -> Self {
        Self { path: path.into(), line }
    }
}

impl Display for LineBreakpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.path, self.line)
    }
}

impl FromStr for LineBreakpoint {
    type Err = Error;

    /// Parses `<path>:<line>`. The path itself may contain colons.
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let Some((path, line)) = trimmed.rsplit_once(':') else {
            bail!("Invalid breakpoint format. Expected <path>:<line>, got: {s}");
        };
        if path.is_empty() {
            bail!("Breakpoint path is empty: {s}");
        }
        let line = line.trim().parse::<usize>().map_err(|e| eyre!("Invalid line number: {e}"))?;
        if line == 0 {
            bail!("Line numbers are 1-based, got 0");
        }
        Ok(Self { path: path.to_string(), line })
    }
}

/// Normalizes source paths so that breakpoints set from the editor side and
/// paths listed in build artifacts meet on the same key.
///
/// A leading `./` and the configured source root are stripped, then the source
/// suffix. `./src/main/solidity/token/Token.sol` and `token/Token.sol` both
/// normalize to `token/Token`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathNormalizer {
    source_root: String,
    suffix: String,
}

impl Default for PathNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_SOURCE_ROOT, DEFAULT_SOURCE_SUFFIX)
    }
}

impl PathNormalizer {
    /// Create a normalizer for the given source root and file suffix.
    pub fn new(source_root: impl Into<String>, suffix: impl Into<String>) -> Self {
        let mut source_root = source_root.into().replace('\\', "/");
        if let Some(stripped) = source_root.strip_prefix("./") {
            source_root = stripped.to_string();
        }
        if !source_root.is_empty() && !source_root.ends_with('/') {
            source_root.push('/');
        }
        Self { source_root, suffix: suffix.into() }
    }

    /// Normalize a source path.
    pub fn normalize(&self, path: &str) -> String {
        let path = path.trim().replace('\\', "/");
        let mut path = path.as_str();
        while let Some(stripped) = path.strip_prefix("./") {
            path = stripped;
        }
        if !self.source_root.is_empty() {
            // The root may also appear after an absolute project prefix.
            if let Some(index) = path.find(self.source_root.as_str()) {
                if index == 0 || path[..index].ends_with('/') {
                    path = &path[index + self.source_root.len()..];
                }
            }
        }
        if !self.suffix.is_empty() {
            path = path.strip_suffix(self.suffix.as_str()).unwrap_or(path);
        }
        path.to_string()
    }
}

#[derive(Debug, Default)]
struct Lines {
    breakpoints: HashMap<String, BTreeSet<usize>>,
    skipped: HashMap<String, BTreeSet<usize>>,
}

/// Line breakpoints shared between the host and the step controller.
///
/// The host mutates the registry from its own thread while the controller reads
/// it once per opcode; every handle cloned from the same registry sees the same
/// set. Breakpoints can additionally be marked as skipped, which keeps them
/// registered but prevents them from stopping execution.
#[derive(Debug, Clone, Default)]
pub struct BreakpointRegistry {
    normalizer: PathNormalizer,
    lines: Arc<RwLock<Lines>>,
}

impl BreakpointRegistry {
    /// Create an empty registry using the given path normalizer.
    pub fn new(normalizer: PathNormalizer) -> Self {
        Self { normalizer, lines: Arc::default() }
    }

    /// The normalizer used for every path handed to this registry.
    pub fn normalizer(&self) -> &PathNormalizer {
        &self.normalizer
    }

    /// Add a breakpoint. Returns `false` if it was already present.
    pub fn add_breakpoint(&self, path: &str, line: usize) -> bool {
        let key = self.normalizer.normalize(path);
        self.lines.write().breakpoints.entry(key).or_default().insert(line)
    }

    /// Remove a breakpoint. Returns `false` if it was not present.
    pub fn remove_breakpoint(&self, path: &str, line: usize) -> bool {
        let key = self.normalizer.normalize(path);
        let mut lines = self.lines.write();
        if let Some(skipped) = lines.skipped.get_mut(&key) {
            skipped.remove(&line);
        }
        let Some(set) = lines.breakpoints.get_mut(&key) else {
            return false;
        };
        let removed = set.remove(&line);
        if set.is_empty() {
            lines.breakpoints.remove(&key);
        }
        removed
    }

    /// Toggle a breakpoint, returning whether it is now set.
    pub fn toggle_breakpoint(&self, path: &str, line: usize) -> bool {
        if self.has_breakpoint(path, line) {
            self.remove_breakpoint(path, line);
            false
        } else {
            self.add_breakpoint(path, line)
        }
    }

    /// Keep a breakpoint registered but stop honouring it.
    pub fn skip_breakpoint(&self, path: &str, line: usize) {
        let key = self.normalizer.normalize(path);
        self.lines.write().skipped.entry(key).or_default().insert(line);
    }

    /// Honour a previously skipped breakpoint again.
    pub fn unskip_breakpoint(&self, path: &str, line: usize) {
        let key = self.normalizer.normalize(path);
        if let Some(set) = self.lines.write().skipped.get_mut(&key) {
            set.remove(&line);
        }
    }

    /// Check if a breakpoint exists at the given location.
    pub fn has_breakpoint(&self, path: &str, line: usize) -> bool {
        let key = self.normalizer.normalize(path);
        self.lines.read().breakpoints.get(&key).is_some_and(|set| set.contains(&line))
    }

    /// Whether execution should stop at `line`.
    ///
    /// With a known `path` only breakpoints of that file match. Without one (the
    /// controller could not tell which file is executing) a breakpoint on that
    /// line in any file matches.
    pub fn should_stop(&self, path: Option<&str>, line: usize) -> bool {
        let lines = self.lines.read();
        match path {
            Some(path) => {
                let key = self.normalizer.normalize(path);
                let hit = lines.breakpoints.get(&key).is_some_and(|set| set.contains(&line));
                let skipped = lines.skipped.get(&key).is_some_and(|set| set.contains(&line));
                hit && !skipped
            }
            None => lines.breakpoints.iter().any(|(key, set)| {
                set.contains(&line)
                    && !lines.skipped.get(key).is_some_and(|skipped| skipped.contains(&line))
            }),
        }
    }

    /// All breakpoints, sorted by normalized path then line.
    pub fn get_all_breakpoints(&self) -> Vec<LineBreakpoint> {
        let lines = self.lines.read();
        let mut all: Vec<LineBreakpoint> = lines
            .breakpoints
            .iter()
            .flat_map(|(path, set)| set.iter().map(|line| LineBreakpoint::new(path.clone(), *line)))
            .collect();
        all.sort_by(|a, b| a.path.cmp(&b.path).then(a.line.cmp(&b.line)));
        all
    }

    /// Number of registered breakpoints.
    pub fn count(&self) -> usize {
        self.lines.read().breakpoints.values().map(BTreeSet::len).sum()
    }

    /// Remove every breakpoint and skip mark.
    pub fn clear(&self) {
        let mut lines = self.lines.write();
        lines.breakpoints.clear();
        lines.skipped.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_breakpoint_from_str() {
        let bp: LineBreakpoint = "src/main/solidity/Foo.sol:12".parse().unwrap();
        assert_eq!(bp.path, "src/main/solidity/Foo.sol");
        assert_eq!(bp.line, 12);
        assert_eq!(bp.to_string(), "src/main/solidity/Foo.sol:12");

        let bp: LineBreakpoint = "C:/work/Foo.sol:3".parse().unwrap();
        assert_eq!(bp.path, "C:/work/Foo.sol");
        assert_eq!(bp.line, 3);
    }

    #[test]
    fn test_line_breakpoint_from_str_invalid() {
        assert!("Foo.sol".parse::<LineBreakpoint>().is_err());
        assert!("Foo.sol:abc".parse::<LineBreakpoint>().is_err());
        assert!("Foo.sol:0".parse::<LineBreakpoint>().is_err());
        assert!(":4".parse::<LineBreakpoint>().is_err());
    }

    #[test]
    fn test_normalize() {
        let normalizer = PathNormalizer::default();
        assert_eq!(normalizer.normalize("src/main/solidity/Foo.sol"), "Foo");
        assert_eq!(normalizer.normalize("./src/main/solidity/token/Token.sol"), "token/Token");
        assert_eq!(normalizer.normalize("token/Token.sol"), "token/Token");
        assert_eq!(normalizer.normalize("/home/me/app/src/main/solidity/Foo.sol"), "Foo");
        assert_eq!(normalizer.normalize("Foo"), "Foo");

        let custom = PathNormalizer::new("./contracts", ".sol");
        assert_eq!(custom.normalize("contracts/Foo.sol"), "Foo");
        assert_eq!(custom.normalize("mycontracts/Foo.sol"), "mycontracts/Foo");
    }

    #[test]
    fn test_add_remove_breakpoints() {
        let registry = BreakpointRegistry::default();
        assert!(registry.add_breakpoint("src/main/solidity/Foo.sol", 5));
        assert!(!registry.add_breakpoint("Foo.sol", 5));
        assert!(registry.has_breakpoint("./src/main/solidity/Foo.sol", 5));
        assert_eq!(registry.count(), 1);

        assert!(registry.remove_breakpoint("Foo.sol", 5));
        assert!(!registry.remove_breakpoint("Foo.sol", 5));
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn test_toggle_breakpoint() {
        let registry = BreakpointRegistry::default();
        assert!(registry.toggle_breakpoint("Foo.sol", 3));
        assert!(registry.has_breakpoint("Foo.sol", 3));
        assert!(!registry.toggle_breakpoint("Foo.sol", 3));
        assert!(!registry.has_breakpoint("Foo.sol", 3));
    }

    #[test]
    fn test_should_stop() {
        let registry = BreakpointRegistry::default();
        registry.add_breakpoint("Foo.sol", 10);

        assert!(registry.should_stop(Some("src/main/solidity/Foo.sol"), 10));
        assert!(!registry.should_stop(Some("Bar.sol"), 10));
        assert!(!registry.should_stop(Some("Foo.sol"), 11));
        assert!(registry.should_stop(None, 10));
        assert!(!registry.should_stop(None, 11));
    }

    #[test]
    fn test_skipped_breakpoints() {
        let registry = BreakpointRegistry::default();
        registry.add_breakpoint("Foo.sol", 10);
        registry.skip_breakpoint("Foo.sol", 10);

        assert!(registry.has_breakpoint("Foo.sol", 10));
        assert!(!registry.should_stop(Some("Foo.sol"), 10));
        assert!(!registry.should_stop(None, 10));

        registry.unskip_breakpoint("Foo.sol", 10);
        assert!(registry.should_stop(Some("Foo.sol"), 10));
    }

    #[test]
    fn test_clones_share_state() {
        let registry = BreakpointRegistry::default();
        let handle = registry.clone();
        handle.add_breakpoint("Foo.sol", 1);
        handle.add_breakpoint("Bar.sol", 2);
        assert_eq!(registry.count(), 2);

        let all = registry.get_all_breakpoints();
        assert_eq!(all, vec![LineBreakpoint::new("Bar", 2), LineBreakpoint::new("Foo", 1)]);

        registry.clear();
        assert_eq!(handle.count(), 0);
    }
}
