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

//! Contract metadata loading and source mapping construction.
//!
//! The build directory holds solc combined-JSON style files:
//!
//! ```json
//! {
//!   "contracts": { "Counter.sol:Counter": { "bin": "6080...", "srcmap": "...", ... } },
//!   "sourceList": ["src/main/solidity/Counter.sol"]
//! }
//! ```
//!
//! [`ArtifactLoader::resolve`] finds the contract whose `bin*` property is a
//! prefix of the executing bytecode, decodes the matching source map, loads
//! the listed sources and builds a [`ContractMapping`]. Mappings are cached per
//! loader keyed by `(bytecode, is_creation)`.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use alloy_primitives::Bytes;
use dashmap::DashMap;
use parking_lot::RwLock;
use sdb_common::{SourceFile, SourceMapElement};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, trace, warn};
use walkdir::WalkDir;

use crate::{
    pc_index::PcSourceIndex,
    sourcemap::{self, SourceMapError},
    utils::disasm::{disassemble, split_instructions, DisassemblyResult},
};

/// Property holding the creation source map.
pub const SRCMAP_KEY: &str = "srcmap";
/// Property holding the runtime source map.
pub const SRCMAP_RUNTIME_KEY: &str = "srcmap-runtime";
/// Prefix shared by the bytecode properties (`bin`, `bin-runtime`).
pub const BIN_KEY_PREFIX: &str = "bin";
/// Files ending with this suffix are compiler metadata, not artifacts.
pub const META_SUFFIX: &str = "meta.json";

/// Errors raised while reading one artifact file.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Offending file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid JSON.
    #[error("failed to parse {path}: {source}")]
    Json {
        /// Offending file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },
    /// The JSON does not have the expected shape.
    #[error("unexpected artifact layout in {path}: {reason}")]
    Layout {
        /// Offending file
        path: PathBuf,
        /// What was wrong
        reason: String,
    },
}

/// One contract entry of a build artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractArtifact {
    /// Contract key, usually `<source>:<name>`
    pub name: String,
    /// Artifact file the contract was read from
    pub file: PathBuf,
    /// String-valued properties (`bin`, `bin-runtime`, `srcmap`, ...)
    pub properties: BTreeMap<String, String>,
    /// The compilation unit's `sourceList`
    pub source_list: Vec<String>,
}

impl ContractArtifact {
    /// Creation bytecode.
    pub fn bytecode(&self) -> Option<&str> {
        self.properties.get("bin").map(String::as_str)
    }

    /// Deployed bytecode.
    pub fn runtime_bytecode(&self) -> Option<&str> {
        self.properties.get("bin-runtime").map(String::as_str)
    }

    /// The source map for creation or runtime code.
    pub fn source_map(&self, is_creation: bool) -> Option<&str> {
        let key = if is_creation { SRCMAP_KEY } else { SRCMAP_RUNTIME_KEY };
        self.properties.get(key).map(String::as_str)
    }

    /// Whether any non-empty `bin*` property is a prefix of `bytecode`.
    ///
    /// `bytecode` must already be normalized with [`normalize_hex`]. Prefix
    /// matching tolerates constructor arguments appended to creation code.
    pub fn matches(&self, bytecode: &str) -> bool {
        self.properties.iter().any(|(key, value)| {
            key.starts_with(BIN_KEY_PREFIX) && {
                let value = normalize_hex(value);
                !value.is_empty() && bytecode.starts_with(value.as_str())
            }
        })
    }

    /// Whether this contract is called `name`, either exactly or as `<source>:<name>`.
    pub fn is_named(&self, name: &str) -> bool {
        self.name == name || self.name.rsplit_once(':').is_some_and(|(_, short)| short == name)
    }
}

/// Everything needed to map program counters of one bytecode to source.
#[derive(Debug, Clone, Default)]
pub struct ContractMapping {
    /// Name of the matched contract, if any
    pub contract: Option<String>,
    /// Loaded source files keyed by their `sourceList` index
    pub sources: BTreeMap<usize, SourceFile>,
    /// Program counter index
    pub index: PcSourceIndex,
    /// Structured disassembly of the mapped bytecode
    pub disassembly: DisassemblyResult,
}

impl ContractMapping {
    /// A mapping that resolves nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether no program counter can be resolved.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// The source-map element for `pc`.
    pub fn lookup(&self, pc: usize) -> Option<&SourceMapElement> {
        self.index.lookup(pc)
    }

    /// The loaded source file an element points into.
    pub fn source_for(&self, element: &SourceMapElement) -> Option<&SourceFile> {
        element.file_index.and_then(|index| self.sources.get(&index))
    }
}

/// Strip an optional `0x` prefix and lowercase.
pub fn normalize_hex(hex: &str) -> String {
    let trimmed = hex.trim();
    trimmed.strip_prefix("0x").unwrap_or(trimmed).to_ascii_lowercase()
}

/// Parse one artifact file into its contracts.
pub fn load_artifact(path: &Path) -> Result<Vec<ContractArtifact>, ArtifactError> {
    let content = fs::read_to_string(path)
        .map_err(|source| ArtifactError::Io { path: path.to_path_buf(), source })?;
    let json: Value = serde_json::from_str(&content)
        .map_err(|source| ArtifactError::Json { path: path.to_path_buf(), source })?;

    let layout = |reason: &str| ArtifactError::Layout {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    let contracts =
        json.get("contracts").and_then(Value::as_object).ok_or_else(|| layout("missing `contracts`"))?;

    let source_list = match json.get("sourceList") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string).ok_or_else(|| layout("non-string source")))
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => return Err(layout("`sourceList` is not an array")),
        None => Vec::new(),
    };

    Ok(contracts
        .iter()
        .filter_map(|(name, props)| {
            let props = props.as_object()?;
            let properties = props
                .iter()
                .filter_map(|(key, value)| value.as_str().map(|v| (key.clone(), v.to_string())))
                .collect();
            Some(ContractArtifact {
                name: name.clone(),
                file: path.to_path_buf(),
                properties,
                source_list: source_list.clone(),
            })
        })
        .collect())
}

/// Recursively collect every contract below `build_dir`.
///
/// Files are visited in path order. Unreadable or malformed files are logged
/// and skipped; a missing directory yields nothing.
pub fn scan_artifacts(build_dir: &Path) -> Vec<ContractArtifact> {
    if !build_dir.is_dir() {
        debug!(build_dir = %build_dir.display(), "Build directory does not exist");
        return Vec::new();
    }

    let mut contracts = Vec::new();
    for entry in WalkDir::new(build_dir).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Failed to walk build directory: {e}");
                continue;
            }
        };
        let name = entry.file_name().to_string_lossy();
        if !entry.file_type().is_file() || !name.ends_with(".json") || name.ends_with(META_SUFFIX) {
            continue;
        }
        match load_artifact(entry.path()) {
            Ok(found) => {
                trace!(file = %entry.path().display(), contracts = found.len(), "Loaded artifact");
                contracts.extend(found);
            }
            Err(e) => warn!("Skipping artifact: {e}"),
        }
    }
    contracts
}

/// Locates contract metadata for executing bytecode and caches the resulting mappings.
///
/// One loader belongs to one debug session; its caches are dropped with it.
#[derive(Debug)]
pub struct ArtifactLoader {
    project_root: PathBuf,
    build_dir: PathBuf,
    artifacts: RwLock<Option<Arc<Vec<ContractArtifact>>>>,
    cache: DashMap<(String, bool), Arc<ContractMapping>>,
}

impl ArtifactLoader {
    /// Create a loader. A relative `build_dir` is resolved against `project_root`.
    pub fn new(project_root: impl Into<PathBuf>, build_dir: impl AsRef<Path>) -> Self {
        let project_root = project_root.into();
        let build_dir = project_root.join(build_dir);
        Self { project_root, build_dir, artifacts: RwLock::new(None), cache: DashMap::new() }
    }

    /// Directory source paths are resolved against.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Directory scanned for artifacts.
    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    /// All contracts found in the build directory. The directory is scanned once.
    pub fn artifacts(&self) -> Arc<Vec<ContractArtifact>> {
        if let Some(artifacts) = self.artifacts.read().as_ref() {
            return Arc::clone(artifacts);
        }
        let mut slot = self.artifacts.write();
        Arc::clone(slot.get_or_insert_with(|| Arc::new(scan_artifacts(&self.build_dir))))
    }

    /// Look a contract up by name.
    pub fn find_contract(&self, name: &str) -> Option<ContractArtifact> {
        self.artifacts().iter().find(|artifact| artifact.is_named(name)).cloned()
    }

    /// Number of cached mappings.
    pub fn cached_mappings(&self) -> usize {
        self.cache.len()
    }

    /// Resolve the mapping for `bytecode`, building and caching it on first use.
    ///
    /// Never fails: anything that prevents a mapping from being built results
    /// in an empty mapping.
    pub fn resolve(&self, bytecode: &str, is_creation: bool) -> Arc<ContractMapping> {
        let bytecode = normalize_hex(bytecode);
        let key = (bytecode, is_creation);
        if let Some(mapping) = self.cache.get(&key) {
            return Arc::clone(mapping.value());
        }

        let mapping = Arc::new(self.build_mapping(&key.0, is_creation));
        Arc::clone(self.cache.entry(key).or_insert(mapping).value())
    }

    fn build_mapping(&self, bytecode: &str, is_creation: bool) -> ContractMapping {
        let artifacts = self.artifacts();
        for artifact in artifacts.iter().filter(|artifact| artifact.matches(bytecode)) {
            let Some(raw) = artifact.source_map(is_creation) else {
                debug!(contract = %artifact.name, is_creation, "Matched contract has no source map");
                return ContractMapping::empty();
            };
            match self.build_from_artifact(artifact, raw, bytecode) {
                Ok(mapping) => {
                    debug!(
                        contract = %artifact.name,
                        is_creation,
                        instructions = mapping.index.len(),
                        sources = mapping.sources.len(),
                        "Built source mapping"
                    );
                    return mapping;
                }
                Err(e) => {
                    warn!(contract = %artifact.name, "Ignoring artifact with malformed source map: {e}");
                }
            }
        }
        debug!(is_creation, "No artifact matches the executing bytecode");
        ContractMapping::empty()
    }

    fn build_from_artifact(
        &self,
        artifact: &ContractArtifact,
        raw: &str,
        bytecode: &str,
    ) -> Result<ContractMapping, SourceMapError> {
        let elements = sourcemap::decode(raw)?;
        let groups = split_instructions(bytecode);
        let index = PcSourceIndex::build(&elements, &groups);

        let disassembly = match hex::decode(bytecode) {
            Ok(bytes) => disassemble(&Bytes::from(bytes)),
            Err(_) => DisassemblyResult::default(),
        };

        Ok(ContractMapping {
            contract: Some(artifact.name.clone()),
            sources: self.load_sources(&artifact.source_list),
            index,
            disassembly,
        })
    }

    fn load_sources(&self, source_list: &[String]) -> BTreeMap<usize, SourceFile> {
        source_list
            .iter()
            .enumerate()
            .filter_map(|(index, path)| match fs::read_to_string(self.project_root.join(path)) {
                Ok(text) => Some((index, SourceFile::from_text(path.clone(), &text))),
                Err(e) => {
                    warn!(path = %path, "Failed to load source file: {e}");
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(props: &[(&str, &str)]) -> ContractArtifact {
        ContractArtifact {
            name: "Counter.sol:Counter".to_string(),
            file: PathBuf::from("combined.json"),
            properties: props.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            source_list: vec![],
        }
    }

    #[test]
    fn test_prefix_match() {
        let contract = artifact(&[("bin", "0x6080"), ("bin-runtime", "6001")]);
        assert!(contract.matches("6080604052"));
        assert!(contract.matches("600100"));
        assert!(!contract.matches("6100"));
    }

    #[test]
    fn test_empty_bin_never_matches() {
        let contract = artifact(&[("bin", ""), ("bin-runtime", "")]);
        assert!(!contract.matches("6080"));
        assert!(!contract.matches(""));
    }

    #[test]
    fn test_only_bin_properties_match() {
        let contract = artifact(&[("srcmap", "6080"), ("abi", "6080")]);
        assert!(!contract.matches("6080"));
    }

    #[test]
    fn test_source_map_selection() {
        let contract = artifact(&[("srcmap", "1:1:0"), ("srcmap-runtime", "2:2:0")]);
        assert_eq!(contract.source_map(true), Some("1:1:0"));
        assert_eq!(contract.source_map(false), Some("2:2:0"));
        assert_eq!(artifact(&[]).source_map(true), None);
    }

    #[test]
    fn test_is_named() {
        let contract = artifact(&[]);
        assert!(contract.is_named("Counter"));
        assert!(contract.is_named("Counter.sol:Counter"));
        assert!(!contract.is_named("Count"));
    }

    #[test]
    fn test_normalize_hex() {
        assert_eq!(normalize_hex("0xABcd"), "abcd");
        assert_eq!(normalize_hex(" 6080 "), "6080");
    }

    #[test]
    fn test_missing_build_dir_resolves_empty() {
        let loader = ArtifactLoader::new("/definitely/not/here", "build");
        let mapping = loader.resolve("6080", false);
        assert!(mapping.is_empty());
        assert!(mapping.contract.is_none());
        assert_eq!(loader.cached_mappings(), 1);
    }
}
