// Tests for loading record type descriptions and store configuration from data
//
// Descriptions that only exist at runtime arrive as JSON; kind names go
// through the same alias table as `FieldKind::parse`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use sqlite_orm::{
    resolve_table, DynamicRecord, Error, FieldKind, RecordType, SqliteConfig, SqliteStore, Value,
};
use tempfile::NamedTempFile;

const NOTE_TYPE: &str = r#"{
    "type_name": "Note",
    "table": "notes",
    "fields": [
        { "name": "id", "kind": "int", "primary_key": true },
        { "name": "title", "kind": "String", "column": "heading" },
        { "name": "pinned", "kind": "bool" }
    ]
}"#;

#[test]
fn test_record_type_loads_with_kind_aliases() {
    let record_type: RecordType = serde_json::from_str(NOTE_TYPE).unwrap();
    assert_eq!(record_type.table.as_deref(), Some("notes"));
    let kinds: Vec<&FieldKind> = record_type.fields.iter().map(|f| &f.kind).collect();
    assert_eq!(
        kinds,
        [&FieldKind::Integer, &FieldKind::Text, &FieldKind::Boolean]
    );
    assert!(!record_type.fields[1].primary_key);

    let table = resolve_table(&record_type).unwrap();
    assert_eq!(table.primary_key().unwrap().name, "id");
    assert_eq!(table.columns[1].name, "heading");

    // Kinds serialize under their canonical names.
    let json = serde_json::to_value(&record_type).unwrap();
    assert_eq!(json["fields"][0]["kind"], "integer");
    assert_eq!(json["fields"][2]["kind"], "boolean");
}

#[test]
fn test_unknown_kind_loads_then_fails_resolution() {
    let record_type: RecordType = serde_json::from_str(
        r#"{
            "type_name": "Item",
            "fields": [
                { "name": "id", "kind": "integer", "primary_key": true },
                { "name": "price", "kind": "decimal" }
            ]
        }"#,
    )
    .unwrap();
    assert_eq!(record_type.table, None);
    assert_eq!(record_type.fields[1].kind.name(), "decimal");

    let err = resolve_table(&record_type).unwrap_err();
    assert!(matches!(
        err,
        Error::UnsupportedType { ref field, ref kind } if field == "price" && kind == "decimal"
    ));
}

#[test]
fn test_config_fills_defaults() {
    let config: SqliteConfig = serde_json::from_str(r#"{ "db_path": "data/app.db" }"#).unwrap();
    assert_eq!(config.db_path, PathBuf::from("data/app.db"));
    assert!(config.create_if_missing);
    assert!(!config.create_parent_dirs);
    assert_eq!(config, SqliteConfig::new("data/app.db"));

    let config: SqliteConfig = serde_json::from_str(
        r#"{ "db_path": "app.db", "create_if_missing": false, "create_parent_dirs": true }"#,
    )
    .unwrap();
    assert!(!config.create_if_missing);
    assert!(config.create_parent_dirs);
}

#[tokio::test]
async fn test_loaded_description_drives_the_store() {
    test_loaded_description_drives_the_store_impl().unwrap();
}

fn test_loaded_description_drives_the_store_impl() -> Result<()> {
    let note_type: Arc<RecordType> = Arc::new(serde_json::from_str(NOTE_TYPE)?);
    let temp_file = NamedTempFile::new()?;
    let store = SqliteStore::at(temp_file.path());
    store.create_table_for(&note_type)?;

    let note = DynamicRecord::new(Arc::clone(&note_type))
        .with("id", 3_i64)?
        .with("title", "loaded")?
        .with("pinned", false)?;
    store.insert_dynamic(&note)?;

    let loaded = store
        .select_dynamic(&note_type, 3_i64)?
        .expect("note 3 exists");
    assert_eq!(loaded.get("title"), Some(&Value::from("loaded")));
    assert_eq!(loaded.get("pinned"), Some(&Value::Boolean(false)));
    Ok(())
}
