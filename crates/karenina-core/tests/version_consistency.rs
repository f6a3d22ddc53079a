//! Every workspace crate inherits the workspace version, and the version
//! stamped into exports is that same version.

use std::path::{Path, PathBuf};

fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .expect("crate lives under <root>/crates/")
        .to_path_buf()
}

fn manifest(path: &Path) -> toml::Value {
    let text = std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()));
    text.parse()
        .unwrap_or_else(|e| panic!("invalid TOML in {}: {e}", path.display()))
}

fn workspace_members() -> Vec<String> {
    let root = manifest(&workspace_root().join("Cargo.toml"));
    root["workspace"]["members"]
        .as_array()
        .expect("workspace.members is an array")
        .iter()
        .filter_map(|m| m.as_str().map(str::to_string))
        .collect()
}

#[test]
fn all_members_inherit_workspace_version() {
    let members = workspace_members();
    assert!(members.contains(&"crates/karenina-core".to_string()));

    for member in members {
        let doc = manifest(&workspace_root().join(&member).join("Cargo.toml"));
        let inherits = doc["package"]["version"]
            .get("workspace")
            .and_then(toml::Value::as_bool);
        assert_eq!(
            inherits,
            Some(true),
            "{member} should use version.workspace = true"
        );
    }
}

#[test]
fn exported_version_matches_workspace() {
    let root = manifest(&workspace_root().join("Cargo.toml"));
    let ws_version = root["workspace"]["package"]["version"]
        .as_str()
        .expect("workspace.package.version is a string");
    assert_eq!(ws_version, karenina_core::VERSION);
}
