//! Tests for document loading and writing.

use super::*;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Write JSON5 contents to a path, creating parent directories if needed.
fn write_json5(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("dir");
    }
    fs::write(path, contents).expect("write");
}

const SAMPLE: &str = r#"{
  config: {
    "global-properties": { greeting: "Hello", port: 8080 },
    components: [
      {
        name: "base",
        type: "Greeter",
        properties: { message: "${greeting} World", repeat: "2" },
      },
      {
        name: "A",
        inherit: "base",
        export: true,
        leasetime: 5000,
        entries: "meta",
        properties: {
          repeat: "3",
          items: [ { item: "x" }, { type: "Service" }, "plain" ],
          table: { k: "v", n: 1 },
        },
      },
    ],
  },
}"#;

/// Parse globals, inheritance, flags, and every property shape.
#[test]
fn parses_components_and_inheritance() {
    let document = ConfigDocument::load_from_str(SAMPLE).expect("document");
    assert_eq!(document.globals.raw("greeting"), Some("Hello"));
    assert_eq!(document.globals.raw("port"), Some("8080"));
    assert_eq!(document.record_names().collect::<Vec<_>>(), vec!["base", "A"]);

    let record = document.record("A").expect("A");
    assert_eq!(record.type_name, "Greeter");
    assert!(record.exportable);
    assert!(!record.importable);
    assert_eq!(record.lease_millis, Some(5000));
    assert_eq!(record.entries_group.as_deref(), Some("meta"));
    assert_eq!(
        record.property("message"),
        Some(&PropertyValue::Text("${greeting} World".to_string()))
    );
    assert_eq!(
        record.property("repeat"),
        Some(&PropertyValue::Text("3".to_string()))
    );
    assert_eq!(
        record.property("items"),
        Some(&PropertyValue::List(vec![
            ListItem::Value("x".to_string()),
            ListItem::TypeRef("Service".to_string()),
            ListItem::Value("plain".to_string()),
        ]))
    );
    assert_eq!(
        record.property("table"),
        Some(&PropertyValue::map([("k", "v"), ("n", "1")]))
    );
}

/// Reject unexpected keys inside a component.
#[test]
fn rejects_unknown_component_key() {
    let json5 = r#"{ config: { components: [ { name: "a", type: "T", bogus: 1 } ] } }"#;
    let err = ConfigDocument::load_from_str(json5).unwrap_err();
    let msg = format!("{err}");
    assert!(msg.contains("unknown key 'bogus'"));
    assert!(msg.contains("config.components[0].bogus"));
}

/// Duplicate definitions fail the whole load.
#[test]
fn rejects_duplicate_definitions() {
    let json5 = r#"{ config: { components: [
        { name: "a", type: "T" },
        { name: "a", type: "T" },
    ] } }"#;
    let err = ConfigDocument::load_from_str(json5).unwrap_err();
    match err {
        ConfigError::DuplicateName { instance, .. } => assert_eq!(instance, "a"),
        other => panic!("unexpected error: {other:?}"),
    }
}

/// Inheriting from an undefined record is an unknown reference.
#[test]
fn rejects_missing_inherit_base() {
    let json5 = r#"{ config: { components: [ { name: "a", inherit: "ghost" } ] } }"#;
    let err = ConfigDocument::load_from_str(json5).unwrap_err();
    match err {
        ConfigError::UnknownReference { instance, field, .. } => {
            assert_eq!(instance, "a");
            assert_eq!(field.as_deref(), Some("inherit"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

/// A component without type or inherit is malformed.
#[test]
fn requires_type_or_inherit() {
    let json5 = r#"{ config: { components: [ { name: "a" } ] } }"#;
    let err = ConfigDocument::load_from_str(json5).unwrap_err();
    assert!(matches!(err, ConfigError::ConfigurationSyntax { .. }));
}

/// Nested arrays are not valid property values.
#[test]
fn rejects_nested_list_values() {
    let json5 = r#"{ config: { components: [
        { name: "a", type: "T", properties: { items: [ [ "x" ] ] } },
    ] } }"#;
    let err = ConfigDocument::load_from_str(json5).unwrap_err();
    assert!(format!("{err}").contains("properties.items[0]"));
}

/// Invalid global names are rejected while loading.
#[test]
fn rejects_invalid_global_name() {
    let json5 = r#"{ config: { "global-properties": { "bad name": "x" } } }"#;
    let err = ConfigDocument::load_from_str(json5).unwrap_err();
    assert!(matches!(err, ConfigError::ConfigurationSyntax { .. }));
}

/// Included files load before the including document's own components.
#[test]
fn loads_included_files_relative_to_parent() {
    let temp = TempDir::new().expect("tmp");
    let root = temp.path();
    write_json5(
        &root.join("parts/base.json5"),
        r#"{ config: {
            "global-properties": { greeting: "Hi" },
            components: [ { name: "base", type: "Greeter", properties: { message: "x" } } ],
        } }"#,
    );
    let main = root.join("main.json5");
    write_json5(
        &main,
        r#"{ config: {
            files: [ { name: "base", value: "parts/base.json5" } ],
            components: [ { name: "child", inherit: "base" } ],
        } }"#,
    );

    let document = ConfigDocument::load_from_path(&main).expect("document");
    assert_eq!(document.record_names().collect::<Vec<_>>(), vec!["base", "child"]);
    assert_eq!(document.globals.raw("greeting"), Some("Hi"));
    assert_eq!(document.record("child").expect("child").type_name, "Greeter");
}

/// A file that includes itself is a cycle.
#[test]
fn rejects_include_cycles() {
    let temp = TempDir::new().expect("tmp");
    let main = temp.path().join("loop.json5");
    write_json5(&main, r#"{ config: { files: [ { value: "loop.json5" } ] } }"#);
    let err = ConfigDocument::load_from_path(&main).unwrap_err();
    assert!(matches!(err, ConfigError::Cycle { .. }));
}

/// Writing and reloading keeps records, flags, and shapes.
#[test]
fn written_document_reloads_identically() {
    let document = ConfigDocument::load_from_str(SAMPLE).expect("document");
    let temp = TempDir::new().expect("tmp");
    let path = temp.path().join("out/saved.json");
    document.save_to_path(&path).expect("save");

    let reloaded = ConfigDocument::load_from_path(&path).expect("reload");
    assert_eq!(reloaded, document);
}

/// Records with no properties still carry an empty properties map.
#[test]
fn empty_records_keep_properties_block() {
    let mut document = ConfigDocument::new();
    document
        .push_record(RawRecord::new("svc", "Service").importable(true))
        .expect("push");
    let value = document.to_value();
    let component = &value["config"]["components"][0];
    assert_eq!(component["properties"], serde_json::json!({}));
    assert_eq!(component["import"], serde_json::json!(true));
}
