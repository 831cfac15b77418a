//! Loading JSON statement trees from disk and building them.

use std::fs;
use std::path::Path;

use yang_model::{statement, RawStatement};
use yang_reactor::{ErrorKind, FeatureSet, StatementStreamSource};
use yang_tools::{collect_sources, load_config, summarize, JsonFileSource};

fn write_tree(path: &Path, tree: &RawStatement) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, serde_json::to_string_pretty(tree).unwrap()).unwrap();
}

fn as_dyn(sources: &[JsonFileSource]) -> Vec<&dyn StatementStreamSource> {
    sources.iter().map(|source| source as &dyn StatementStreamSource).collect()
}

// ===== Collection =====

#[test]
fn test_directories_are_walked_for_json() {
    let dir = tempfile::tempdir().unwrap();
    write_tree(&dir.path().join("b.json"), &statement! { module "b"; });
    write_tree(&dir.path().join("nested/a.json"), &statement! { module "a"; });
    fs::write(dir.path().join("notes.txt"), "not a source").unwrap();

    let sources = collect_sources(&[dir.path().to_path_buf()]).unwrap();
    let names: Vec<_> = sources
        .iter()
        .map(|source| source.path().file_name().unwrap().to_string_lossy().to_string())
        .collect();
    assert_eq!(names, ["b.json", "a.json"]);
}

#[test]
fn test_file_named_twice_is_loaded_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.json");
    write_tree(&path, &statement! { module "a"; });
    let sources = collect_sources(&[path.clone(), path]).unwrap();
    assert_eq!(sources.len(), 1);
}

#[test]
fn test_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, r#"{ "supported_features": { "mode": "only", "features": [] } }"#).unwrap();
    let config = load_config(Some(path.as_path())).unwrap();
    assert_eq!(config.supported_features, FeatureSet::only([]));

    assert!(load_config(Some(dir.path().join("missing.json").as_path())).is_err());
}

// ===== Builds =====

#[test]
fn test_build_from_files() {
    let dir = tempfile::tempdir().unwrap();
    let library = tempfile::tempdir().unwrap();
    write_tree(
        &dir.path().join("app.json"),
        &statement! {
            module "app" {
                namespace "urn:app";
                prefix "app";
                revision "2024-05-01";
                import "common" { prefix "c"; }
                container "settings" {
                    leaf "name" { type "c:label"; }
                    leaf "port" { type "uint16"; }
                }
            }
        },
    );
    write_tree(
        &library.path().join("common.json"),
        &statement! {
            module "common" {
                namespace "urn:common";
                prefix "c";
                typedef "label" { type "string"; }
            }
        },
    );
    let unused = statement! { module "unused" { prefix "u"; } };
    write_tree(&library.path().join("unused.json"), &unused);

    let sources = collect_sources(&[dir.path().to_path_buf()]).unwrap();
    let libraries = collect_sources(&[library.path().to_path_buf()]).unwrap();
    let reactor = yang_stmt::default_reactor();
    let model = reactor.build(&as_dyn(&sources), &as_dyn(&libraries)).unwrap();

    let summaries = summarize(&model);
    assert_eq!(summaries.len(), 1);
    assert_eq!(
        summaries[0].to_string(),
        "app@2024-05-01 urn:app (1 top-level, 3 schema nodes)"
    );
}

#[test]
fn test_unreadable_tree_fails_the_build() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.json");
    fs::write(&path, "{ \"keyword\": ").unwrap();

    let sources = collect_sources(&[path]).unwrap();
    let error = yang_stmt::default_reactor().build(&as_dyn(&sources), &[]).unwrap_err();
    let missing = error.errors_of(ErrorKind::MissingSource);
    assert_eq!(missing.len(), 1);
    assert!(missing[0].notes[0].contains("invalid statement tree"));
}
