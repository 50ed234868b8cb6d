use std::{fs, path::Path, sync::Arc};

use sdb_engine::{render::render_source, ArtifactLoader, DebugTarget};
use serde_json::json;
use tempfile::TempDir;
use tracing::info;

const SOURCE: &str = "contract Adder {\n  uint a = 1;\n  uint b = 2;\n}\n";
const INIT_CODE: &str = "6080604052600a600c";
const RUNTIME_CODE: &str = "600160020100";

fn write_artifact(dir: &Path, file: &str, contracts: serde_json::Value) {
    let build = dir.join("build");
    fs::create_dir_all(&build).unwrap();
    let artifact = json!({ "contracts": contracts, "sourceList": ["src/main/solidity/Adder.sol"] });
    fs::write(build.join(file), artifact.to_string()).unwrap();
}

fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    let sources = dir.path().join("src/main/solidity");
    fs::create_dir_all(&sources).unwrap();
    fs::write(sources.join("Adder.sol"), SOURCE).unwrap();

    let line2 = SOURCE.find("uint a").unwrap();
    let line3 = SOURCE.find("uint b").unwrap();
    write_artifact(
        dir.path(),
        "Adder.json",
        json!({
            "Adder.sol:Adder": {
                "bin": INIT_CODE,
                "bin-runtime": RUNTIME_CODE,
                "srcmap": "0:16:0;;;;;",
                "srcmap-runtime": format!("{line2}:11:0;;{line3}:11:0;;"),
            }
        }),
    );
    dir
}

#[test]
fn test_resolve_is_cached_per_bytecode_and_mode() {
    sdb_common::logging::ensure_test_logging(None);
    info!("Running test");
    let dir = project();
    let loader = ArtifactLoader::new(dir.path(), "build");

    let first = loader.resolve(RUNTIME_CODE, false);
    let second = loader.resolve(&format!("0x{}", RUNTIME_CODE.to_uppercase()), false);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(loader.cached_mappings(), 1);

    let creation = loader.resolve(RUNTIME_CODE, true);
    assert!(!Arc::ptr_eq(&first, &creation));
    assert_eq!(loader.cached_mappings(), 2);
}

#[test]
fn test_creation_flag_selects_source_map() {
    sdb_common::logging::ensure_test_logging(None);
    let dir = project();
    let loader = ArtifactLoader::new(dir.path(), "build");

    let runtime = loader.resolve(RUNTIME_CODE, false);
    assert_eq!(runtime.contract.as_deref(), Some("Adder.sol:Adder"));
    assert_eq!(runtime.index.pcs().collect::<Vec<_>>(), vec![0, 2, 4, 5]);
    let element = runtime.lookup(4).unwrap();
    assert_eq!(render_source(&runtime, element).first_selected(), (3, 2));

    let init = loader.resolve(INIT_CODE, true);
    let element = init.lookup(0).unwrap();
    assert_eq!(render_source(&init, element).first_selected(), (1, 0));
}

#[test]
fn test_constructor_arguments_still_match() {
    sdb_common::logging::ensure_test_logging(None);
    let dir = project();
    let loader = ArtifactLoader::new(dir.path(), "build");

    let with_args = format!("{INIT_CODE}{}", "00".repeat(32));
    let mapping = loader.resolve(&with_args, true);
    assert_eq!(mapping.contract.as_deref(), Some("Adder.sol:Adder"));
}

#[test]
fn test_unknown_bytecode_resolves_empty() {
    sdb_common::logging::ensure_test_logging(None);
    let dir = project();
    let loader = ArtifactLoader::new(dir.path(), "build");

    let mapping = loader.resolve("fe", false);
    assert!(mapping.is_empty());
    assert!(mapping.lookup(0).is_none());
}

#[test]
fn test_malformed_source_map_falls_through() {
    sdb_common::logging::ensure_test_logging(None);
    let dir = project();
    // Sorted before Adder.json, so this candidate is tried first.
    write_artifact(
        dir.path(),
        "Aaa.json",
        json!({ "Broken.sol:Broken": { "bin-runtime": RUNTIME_CODE, "srcmap-runtime": "x:1:0" } }),
    );
    let loader = ArtifactLoader::new(dir.path(), "build");

    let mapping = loader.resolve(RUNTIME_CODE, false);
    assert_eq!(mapping.contract.as_deref(), Some("Adder.sol:Adder"));
}

#[test]
fn test_metadata_and_invalid_files_are_skipped() {
    sdb_common::logging::ensure_test_logging(None);
    let dir = project();
    let build = dir.path().join("build");
    fs::write(build.join("Adder.meta.json"), "{\"contracts\": {}}").unwrap();
    fs::write(build.join("garbage.json"), "not json").unwrap();
    fs::write(build.join("notes.txt"), "ignored").unwrap();

    let loader = ArtifactLoader::new(dir.path(), "build");
    assert_eq!(loader.artifacts().len(), 1);
    assert!(loader.find_contract("Adder").is_some());
    assert!(loader.find_contract("Missing").is_none());
}

#[test]
fn test_missing_source_file_still_maps_pcs() {
    sdb_common::logging::ensure_test_logging(None);
    let dir = project();
    fs::remove_file(dir.path().join("src/main/solidity/Adder.sol")).unwrap();
    let loader = ArtifactLoader::new(dir.path(), "build");

    let mapping = loader.resolve(RUNTIME_CODE, false);
    assert!(!mapping.is_empty());
    assert!(mapping.sources.is_empty());
    let element = mapping.lookup(0).unwrap();
    assert!(render_source(&mapping, element).is_empty());
}

#[test]
fn test_target_from_artifact() {
    sdb_common::logging::ensure_test_logging(None);
    let dir = project();
    let loader = ArtifactLoader::new(dir.path(), "build");

    let artifact = loader.find_contract("Adder").unwrap();
    let target = DebugTarget::from_artifact(&artifact).unwrap().with_call(vec![0x12]);
    assert_eq!(hex::encode(&target.init_code), INIT_CODE);
    assert_eq!(target.calldata.as_ref().map(|data| data.to_vec()), Some(vec![0x12]));
}
