//! Shape validation for configuration documents.

use super::{
    COMPONENTS_KEY, CONFIG_KEY, ENTRIES_KEY, EXPORT_KEY, FILES_KEY, GLOBALS_KEY, IMPORT_KEY,
    INHERIT_KEY, ITEM_KEY, LEASE_KEY, NAME_KEY, PROPERTIES_KEY, TYPE_KEY, VALUE_KEY,
};
use crate::ConfigError;
use serde_json::{Map, Value};

/// Validate a whole document before any record is built.
pub(super) fn validate_document(value: &Value, label: &str) -> Result<(), ConfigError> {
    let root = expect_object(value, label, "")?;
    ensure_allowed_keys(root, &["$schema", CONFIG_KEY], label, "")?;

    let Some(config) = root.get(CONFIG_KEY) else {
        return Err(invalid_field(label, CONFIG_KEY, "missing required field"));
    };
    let config = expect_object(config, label, CONFIG_KEY)?;
    ensure_allowed_keys(config, &[GLOBALS_KEY, COMPONENTS_KEY, FILES_KEY], label, CONFIG_KEY)?;

    if let Some(value) = config.get(GLOBALS_KEY) {
        validate_globals(value, label, &join_path(CONFIG_KEY, GLOBALS_KEY))?;
    }
    if let Some(value) = config.get(COMPONENTS_KEY) {
        let path = join_path(CONFIG_KEY, COMPONENTS_KEY);
        let components = expect_array(value, label, &path)?;
        for (idx, component) in components.iter().enumerate() {
            validate_component(component, label, &format!("{path}[{idx}]"))?;
        }
    }
    if let Some(value) = config.get(FILES_KEY) {
        let path = join_path(CONFIG_KEY, FILES_KEY);
        let files = expect_array(value, label, &path)?;
        for (idx, file) in files.iter().enumerate() {
            validate_file(file, label, &format!("{path}[{idx}]"))?;
        }
    }
    Ok(())
}

/// Validate the global property block.
fn validate_globals(value: &Value, label: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, label, path)?;
    for (name, value) in map {
        expect_scalar(value, label, &join_path(path, name))?;
    }
    Ok(())
}

/// Validate a single component definition.
fn validate_component(value: &Value, label: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, label, path)?;
    let allowed = [
        NAME_KEY,
        TYPE_KEY,
        INHERIT_KEY,
        EXPORT_KEY,
        IMPORT_KEY,
        LEASE_KEY,
        ENTRIES_KEY,
        PROPERTIES_KEY,
    ];
    ensure_allowed_keys(map, &allowed, label, path)?;

    let name_path = join_path(path, NAME_KEY);
    let Some(name) = map.get(NAME_KEY) else {
        return Err(invalid_field(label, &name_path, "missing required field"));
    };
    expect_string(name, label, &name_path)?;

    for key in [TYPE_KEY, INHERIT_KEY, ENTRIES_KEY] {
        if let Some(value) = map.get(key) {
            expect_string(value, label, &join_path(path, key))?;
        }
    }
    if let Some(value) = map.get(PROPERTIES_KEY) {
        let props_path = join_path(path, PROPERTIES_KEY);
        let props = expect_object(value, label, &props_path)?;
        for (key, value) in props {
            validate_property(value, label, &join_path(&props_path, key))?;
        }
    }
    Ok(())
}

/// Validate one property value: scalar, item list, or string map.
fn validate_property(value: &Value, label: &str, path: &str) -> Result<(), ConfigError> {
    match value {
        Value::Array(items) => {
            for (idx, item) in items.iter().enumerate() {
                let item_path = format!("{path}[{idx}]");
                match item {
                    Value::Object(map) => {
                        ensure_allowed_keys(map, &[ITEM_KEY, TYPE_KEY], label, &item_path)?;
                        if map.len() != 1 {
                            return Err(invalid_field(
                                label,
                                &item_path,
                                "list item needs exactly one of 'item' or 'type'",
                            ));
                        }
                        if let Some(value) = map.get(ITEM_KEY) {
                            expect_scalar(value, label, &join_path(&item_path, ITEM_KEY))?;
                        }
                        if let Some(value) = map.get(TYPE_KEY) {
                            expect_string(value, label, &join_path(&item_path, TYPE_KEY))?;
                        }
                    }
                    other => expect_scalar(other, label, &item_path)?,
                }
            }
            Ok(())
        }
        Value::Object(map) => {
            for (key, value) in map {
                expect_scalar(value, label, &join_path(path, key))?;
            }
            Ok(())
        }
        other => expect_scalar(other, label, path),
    }
}

/// Validate a file include entry.
fn validate_file(value: &Value, label: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, label, path)?;
    ensure_allowed_keys(map, &[NAME_KEY, VALUE_KEY], label, path)?;
    let value_path = join_path(path, VALUE_KEY);
    let Some(value) = map.get(VALUE_KEY) else {
        return Err(invalid_field(label, &value_path, "missing required field"));
    };
    expect_string(value, label, &value_path)?;
    if let Some(name) = map.get(NAME_KEY) {
        expect_string(name, label, &join_path(path, NAME_KEY))?;
    }
    Ok(())
}

/// Ensure a value is an object and return its map.
pub(super) fn expect_object<'a>(
    value: &'a Value,
    label: &str,
    path: &str,
) -> Result<&'a Map<String, Value>, ConfigError> {
    value
        .as_object()
        .ok_or_else(|| invalid_field(label, path, "expected object"))
}

fn expect_array<'a>(value: &'a Value, label: &str, path: &str) -> Result<&'a Vec<Value>, ConfigError> {
    value
        .as_array()
        .ok_or_else(|| invalid_field(label, path, "expected array"))
}

fn expect_string(value: &Value, label: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_string() {
        Ok(())
    } else {
        Err(invalid_field(label, path, "expected string"))
    }
}

fn expect_scalar(value: &Value, label: &str, path: &str) -> Result<(), ConfigError> {
    match value {
        Value::String(_) | Value::Number(_) | Value::Bool(_) => Ok(()),
        _ => Err(invalid_field(label, path, "expected scalar value")),
    }
}

/// Reject keys outside the allowed set.
fn ensure_allowed_keys(
    map: &Map<String, Value>,
    allowed: &[&str],
    label: &str,
    path: &str,
) -> Result<(), ConfigError> {
    for key in map.keys() {
        if !allowed.contains(&key.as_str()) {
            return Err(invalid_field(
                label,
                &join_path(path, key),
                format!("unknown key '{key}'"),
            ));
        }
    }
    Ok(())
}

/// Build a syntax error located at `path` within the document `label`.
pub(super) fn invalid_field(label: &str, path: &str, message: impl Into<String>) -> ConfigError {
    let path = if path.is_empty() { "<root>" } else { path };
    ConfigError::syntax_at(label, path, message)
}

/// Join a dotted path segment.
pub(super) fn join_path(base: &str, key: &str) -> String {
    if base.is_empty() {
        key.to_string()
    } else {
        format!("{base}.{key}")
    }
}
