use super::*;
use crate::error::DocsRagError;
use crate::types::{ModelDocumentation, SourceDeclaration, SqlModel};
use std::collections::BTreeSet;
use tempfile::TempDir;

fn entry(name: &str, folder: &str) -> ModelDirectoryEntry {
    ModelDirectoryEntry {
        name: name.to_string(),
        sql: Some(SqlModel {
            absolute_path: PathBuf::from(format!("/project/models/{}/{}.sql", folder, name)),
            relative_path: format!("models/{}/{}.sql", folder, name),
            sql_contents: "select 1".to_string(),
            refs: BTreeSet::new(),
            unresolved_refs: BTreeSet::new(),
            deps: Vec::new(),
            sources: Vec::new(),
            checksum: "abc".to_string(),
        }),
        ..Default::default()
    }
}

fn directory(entries: &[(&str, &str)]) -> ProjectDirectory {
    let mut directory = ProjectDirectory::default();
    for (name, folder) in entries {
        directory
            .models
            .insert(name.to_string(), entry(name, folder));
    }
    directory
}

fn interpretation(description: &str) -> ModelDocumentation {
    ModelDocumentation {
        name: None,
        description: Some(description.to_string()),
        ..Default::default()
    }
}

#[test]
fn test_open_missing_file_is_empty() {
    let dir = TempDir::new().unwrap();
    let store = DirectoryStore::open(dir.path().join("directory.json")).unwrap();
    assert!(store.directory().unwrap().models.is_empty());
    assert!(!store.path().exists());
}

#[test]
fn test_get_missing_is_none() {
    let dir = TempDir::new().unwrap();
    let store = DirectoryStore::open(dir.path().join("directory.json")).unwrap();
    assert!(store.get("nope").unwrap().is_none());
}

#[test]
fn test_save_and_reopen_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("directory.json");
    let mut built = directory(&[("a", "staging"), ("b", "marts")]);
    built.sources.insert(
        "shop".to_string(),
        SourceDeclaration {
            name: "shop".to_string(),
            ..Default::default()
        },
    );

    let store = DirectoryStore::open(&path).unwrap();
    store.save_directory(built.clone(), true).unwrap();

    let reopened = DirectoryStore::open(&path).unwrap();
    assert_eq!(reopened.directory().unwrap(), built);

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert!(raw.get("models").is_some());
    assert!(raw.get("sources").is_some());
}

#[test]
fn test_no_temp_file_left_behind() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("directory.json");
    let store = DirectoryStore::open(&path).unwrap();
    store.upsert(entry("a", "staging")).unwrap();

    assert!(path.exists());
    assert!(!sibling_path(&path, "tmp").exists());
}

#[test]
fn test_save_with_prune_drops_stale_entries() {
    let dir = TempDir::new().unwrap();
    let store = DirectoryStore::open(dir.path().join("directory.json")).unwrap();

    store
        .save_directory(directory(&[("a", "staging"), ("b", "staging")]), true)
        .unwrap();
    store
        .save_directory(directory(&[("a", "staging")]), true)
        .unwrap();

    assert!(store.get("a").unwrap().is_some());
    assert!(store.get("b").unwrap().is_none());
}

#[test]
fn test_save_without_prune_keeps_stale_entries() {
    let dir = TempDir::new().unwrap();
    let store = DirectoryStore::open(dir.path().join("directory.json")).unwrap();

    store
        .save_directory(directory(&[("a", "staging"), ("b", "staging")]), true)
        .unwrap();
    store
        .save_directory(directory(&[("a", "staging")]), false)
        .unwrap();

    assert!(store.get("b").unwrap().is_some());
}

#[test]
fn test_reparse_keeps_interpretation() {
    let dir = TempDir::new().unwrap();
    let store = DirectoryStore::open(dir.path().join("directory.json")).unwrap();

    store
        .save_directory(directory(&[("a", "staging")]), true)
        .unwrap();
    store
        .update_field("a", EntryUpdate::interpretation(interpretation("generated")))
        .unwrap();
    store
        .save_directory(directory(&[("a", "staging")]), true)
        .unwrap();

    let a = store.get("a").unwrap().unwrap();
    assert_eq!(
        a.interpretation.unwrap().description.as_deref(),
        Some("generated")
    );
}

#[test]
fn test_upsert_replaces_entry() {
    let dir = TempDir::new().unwrap();
    let store = DirectoryStore::open(dir.path().join("directory.json")).unwrap();

    store.upsert(entry("a", "staging")).unwrap();
    store.upsert(entry("a", "marts")).unwrap();

    let a = store.get("a").unwrap().unwrap();
    assert_eq!(a.relative_path(), Some("models/marts/a.sql"));
    assert_eq!(store.directory().unwrap().models.len(), 1);
}

#[test]
fn test_update_field_merges() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("directory.json");
    let store = DirectoryStore::open(&path).unwrap();
    store.upsert(entry("a", "staging")).unwrap();

    store
        .update_field(
            "a",
            EntryUpdate::interpretation(interpretation("generated"))
                .with_yaml_path("/project/models/staging/_a.yml"),
        )
        .unwrap();

    let reopened = DirectoryStore::open(&path).unwrap();
    let a = reopened.get("a").unwrap().unwrap();
    assert!(a.sql.is_some());
    assert!(a.interpretation.is_some());
    assert_eq!(
        a.yaml_path.as_deref(),
        Some(Path::new("/project/models/staging/_a.yml"))
    );
}

#[test]
fn test_update_field_unknown_model() {
    let dir = TempDir::new().unwrap();
    let store = DirectoryStore::open(dir.path().join("directory.json")).unwrap();
    let err = store
        .update_field("ghost", EntryUpdate::default())
        .unwrap_err();
    assert!(matches!(
        err,
        DocsRagError::Store(StoreError::ModelNotFound(ref name)) if name == "ghost"
    ));
}

#[test]
fn test_list_filters() {
    let dir = TempDir::new().unwrap();
    let store = DirectoryStore::open(dir.path().join("directory.json")).unwrap();
    store
        .save_directory(
            directory(&[
                ("stg_a", "staging"),
                ("stg_b", "staging"),
                ("int_a", "intermediate"),
                ("mart_a", "marts"),
            ]),
            true,
        )
        .unwrap();

    assert_eq!(store.list(&ModelFilter::all()).unwrap().len(), 4);
    assert_eq!(
        store
            .list(&ModelFilter::all().including(["models/staging"]))
            .unwrap()
            .len(),
        2
    );
    assert_eq!(
        store
            .list(&ModelFilter::all().excluding(["models/marts"]))
            .unwrap()
            .len(),
        3
    );
}

#[test]
fn test_reload_sees_external_writes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("directory.json");
    let reader = DirectoryStore::open(&path).unwrap();
    let writer = DirectoryStore::open(&path).unwrap();

    writer.upsert(entry("a", "staging")).unwrap();
    assert!(reader.get("a").unwrap().is_none());

    reader.reload().unwrap();
    assert!(reader.get("a").unwrap().is_some());
}

#[test]
fn test_corrupt_file_fails_to_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("directory.json");
    std::fs::write(&path, "{ not json").unwrap();

    let err = DirectoryStore::open(&path).err().unwrap();
    assert!(matches!(
        err,
        DocsRagError::Store(StoreError::LoadFailed { .. })
    ));
}
