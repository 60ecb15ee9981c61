use std::fs;
use std::path::Path;

use stencil::error::Error;
use stencil::ignore::IGNORE_FILE;
use stencil::manifest::load_manifest;
use stencil::store::{NodeKind, TemplateStore, TEMPLATE_SUFFIX};
use tempfile::TempDir;

fn write_file(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn load(temp_dir: &TempDir) -> TemplateStore {
    let manifest = load_manifest(temp_dir.path()).unwrap();
    TemplateStore::load(temp_dir.path(), &manifest).unwrap()
}

#[test]
fn test_load_classifies_nodes() {
    let temp_dir = TempDir::new().unwrap();
    write_file(temp_dir.path(), "stencil.json", "{}");
    write_file(temp_dir.path(), "LICENSE", "verbatim");
    write_file(temp_dir.path(), "README.md.j2", "# {{ project_name }}");
    write_file(temp_dir.path(), "src/lib.rs", "");

    let store = load(&temp_dir);
    let kinds: Vec<(&str, NodeKind)> = store
        .iter()
        .map(|n| (n.relative.as_str(), n.kind))
        .collect();
    assert_eq!(
        kinds,
        vec![
            ("LICENSE", NodeKind::Literal),
            ("README.md.j2", NodeKind::Rendered),
            ("src", NodeKind::Directory),
            ("src/lib.rs", NodeKind::Literal),
        ]
    );
}

#[test]
fn test_manifest_is_not_a_store_entry() {
    let temp_dir = TempDir::new().unwrap();
    write_file(temp_dir.path(), "stencil.yaml", "options: {}");
    write_file(temp_dir.path(), IGNORE_FILE, "");
    write_file(temp_dir.path(), "a.txt", "a");

    let store = load(&temp_dir);
    assert_eq!(store.len(), 1);
    assert_eq!(store.nodes()[0].relative, "a.txt");
}

#[test]
fn test_iteration_is_deterministic_and_restartable() {
    let temp_dir = TempDir::new().unwrap();
    write_file(temp_dir.path(), "stencil.json", "{}");
    write_file(temp_dir.path(), "zeta.txt", "");
    write_file(temp_dir.path(), "alpha.txt", "");
    write_file(temp_dir.path(), "mid/inner.txt", "");

    let first: Vec<String> = load(&temp_dir).iter().map(|n| n.relative.clone()).collect();
    let second: Vec<String> = load(&temp_dir).iter().map(|n| n.relative.clone()).collect();

    assert_eq!(first, vec!["alpha.txt", "mid", "mid/inner.txt", "zeta.txt"]);
    assert_eq!(first, second);
}

#[test]
fn test_output_template_strips_render_suffix() {
    let temp_dir = TempDir::new().unwrap();
    write_file(temp_dir.path(), "stencil.json", "{}");
    write_file(temp_dir.path(), "Cargo.toml.j2", "");
    write_file(temp_dir.path(), "plain.txt", "");

    let store = load(&temp_dir);
    let rendered = store.iter().find(|n| n.kind == NodeKind::Rendered).unwrap();
    assert_eq!(rendered.output_template(), "Cargo.toml");
    let literal = store.iter().find(|n| n.relative == "plain.txt").unwrap();
    assert_eq!(literal.output_template(), "plain.txt");
}

#[test]
fn test_bare_suffix_file_is_literal() {
    // A file literally named ".j2" has nothing left after stripping, so it
    // is copied as-is
    let temp_dir = TempDir::new().unwrap();
    write_file(temp_dir.path(), "stencil.json", "{}");
    write_file(temp_dir.path(), TEMPLATE_SUFFIX, "raw");

    let store = load(&temp_dir);
    assert_eq!(store.nodes()[0].kind, NodeKind::Literal);
}

#[test]
fn test_stencilignore_filters_the_walk() {
    let temp_dir = TempDir::new().unwrap();
    write_file(temp_dir.path(), "stencil.json", "{}");
    write_file(temp_dir.path(), IGNORE_FILE, "*.bak\nscratch\nscratch/**\n");
    write_file(temp_dir.path(), "keep.txt", "");
    write_file(temp_dir.path(), "old.bak", "");
    write_file(temp_dir.path(), "scratch/notes.txt", "");

    let store = load(&temp_dir);
    let paths: Vec<&str> = store.iter().map(|n| n.relative.as_str()).collect();
    assert_eq!(paths, vec!["keep.txt"]);
}

#[test]
fn test_conditions_attach_to_file_and_subtree() {
    let temp_dir = TempDir::new().unwrap();
    write_file(
        temp_dir.path(),
        "stencil.json",
        r#"{
            "options": {"use_docs": {"type": "boolean", "default": true}},
            "conditions": [{"path": "docs", "when": "use_docs"}]
        }"#,
    );
    write_file(temp_dir.path(), "docs/index.md", "");
    write_file(temp_dir.path(), "docs/guide/setup.md", "");
    write_file(temp_dir.path(), "docs-other.txt", "");

    let store = load(&temp_dir);
    for node in store.iter() {
        let gated = node.relative == "docs" || node.relative.starts_with("docs/");
        assert_eq!(
            node.conditions.len(),
            usize::from(gated),
            "unexpected conditions on {:?}",
            node.relative
        );
    }
}

#[test]
fn test_condition_may_name_the_output_path_of_a_rendered_file() {
    // The rule targets "main.go", the on-disk entry is "main.go.j2"
    let temp_dir = TempDir::new().unwrap();
    write_file(
        temp_dir.path(),
        "stencil.json",
        r#"{
            "options": {"cli": {"type": "boolean", "default": true}},
            "conditions": [{"path": "main.go", "when": "cli"}]
        }"#,
    );
    write_file(temp_dir.path(), "main.go.j2", "package main");

    let store = load(&temp_dir);
    assert_eq!(store.nodes()[0].conditions, vec![0]);
}

#[test]
fn test_stale_condition_rule_is_a_load_error() {
    let temp_dir = TempDir::new().unwrap();
    write_file(
        temp_dir.path(),
        "stencil.json",
        r#"{"conditions": [{"path": "no/such/entry", "when": "true"}]}"#,
    );
    write_file(temp_dir.path(), "a.txt", "");

    let manifest = load_manifest(temp_dir.path()).unwrap();
    match TemplateStore::load(temp_dir.path(), &manifest) {
        Err(Error::MalformedCondition { path, detail }) => {
            assert_eq!(path, "no/such/entry");
            assert!(detail.contains("matches no"));
        }
        other => panic!("expected MalformedCondition, got {other:?}"),
    }
}

#[test]
fn test_missing_template_directory() {
    let temp_dir = TempDir::new().unwrap();
    write_file(temp_dir.path(), "stencil.json", "{}");
    let manifest = load_manifest(temp_dir.path()).unwrap();
    assert!(matches!(
        TemplateStore::load(&temp_dir.path().join("gone"), &manifest),
        Err(Error::TemplateDoesNotExist { .. })
    ));
}
