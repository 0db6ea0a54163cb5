//! JSON5 document loader with inheritance and file includes.
//!
//! Validates the document shape, resolves `inherit` chains against records
//! defined earlier, and pulls in `files` entries relative to the including
//! document before its own globals and components.

mod inherit;
mod io;
mod schema;
mod utils;

#[cfg(test)]
mod tests;

use crate::{ConfigDocument, ConfigError, ListItem, PropertyValue, RawRecord};
use log::{debug, info};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default config filename.
pub const DEFAULT_CONFIG_FILE: &str = "confgraph.json5";
/// Default config directory under the user's home.
pub const DEFAULT_CONFIG_DIR: &str = ".confgraph";

pub(crate) const CONFIG_KEY: &str = "config";
pub(crate) const GLOBALS_KEY: &str = "global-properties";
pub(crate) const COMPONENTS_KEY: &str = "components";
pub(crate) const FILES_KEY: &str = "files";
pub(crate) const NAME_KEY: &str = "name";
pub(crate) const TYPE_KEY: &str = "type";
pub(crate) const INHERIT_KEY: &str = "inherit";
pub(crate) const EXPORT_KEY: &str = "export";
pub(crate) const IMPORT_KEY: &str = "import";
pub(crate) const LEASE_KEY: &str = "leasetime";
pub(crate) const ENTRIES_KEY: &str = "entries";
pub(crate) const PROPERTIES_KEY: &str = "properties";
pub(crate) const ITEM_KEY: &str = "item";
pub(crate) const VALUE_KEY: &str = "value";

impl ConfigDocument {
    /// Load a document from a path, following `files` includes.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = utils::normalize_path(path.as_ref())?;
        info!("loading config from path: {}", path.display());
        let value = io::read_document(&path)?;
        let mut builder = DocumentBuilder::default();
        builder.include_stack.push(utils::unique_path(&path));
        builder.ingest(&value, &path.display().to_string(), path.parent())?;
        let document = builder.document;
        info!(
            "config loaded (globals={}, components={})",
            document.globals.len(),
            document.records.len()
        );
        Ok(document)
    }

    /// Load a document from JSON5 contents.
    ///
    /// Relative `files` entries resolve against the current directory.
    pub fn load_from_str(contents: &str) -> Result<Self, ConfigError> {
        debug!("loading config from raw contents (len={})", contents.len());
        let value: Value = json5::from_str(contents)?;
        Self::load_from_value(&value, "config")
    }

    /// Build a document from an already parsed value.
    pub fn load_from_value(value: &Value, label: &str) -> Result<Self, ConfigError> {
        let mut builder = DocumentBuilder::default();
        builder.ingest(value, label, None)?;
        Ok(builder.document)
    }

    /// Default document location under the user's home directory.
    pub fn default_path() -> Option<PathBuf> {
        io::default_config_path()
    }
}

/// Accumulates one document, including every file it pulls in.
#[derive(Default)]
struct DocumentBuilder {
    document: ConfigDocument,
    /// Files currently being loaded, for include cycle detection.
    include_stack: Vec<PathBuf>,
}

impl DocumentBuilder {
    fn ingest(
        &mut self,
        value: &Value,
        label: &str,
        base_dir: Option<&Path>,
    ) -> Result<(), ConfigError> {
        schema::validate_document(value, label)?;
        let Some(config) = value.get(CONFIG_KEY).and_then(Value::as_object) else {
            return Err(schema::invalid_field(label, CONFIG_KEY, "missing config object"));
        };

        if let Some(files) = config.get(FILES_KEY).and_then(Value::as_array) {
            for entry in files {
                let Some(target) = entry.get(VALUE_KEY).and_then(Value::as_str) else {
                    continue;
                };
                self.include(target, label, base_dir)?;
            }
        }

        if let Some(globals) = config.get(GLOBALS_KEY).and_then(Value::as_object) {
            for (name, value) in globals {
                let path = schema::join_path(GLOBALS_KEY, name);
                let text = scalar_text(value, label, &path)?;
                self.document.globals.set_value(name.clone(), text)?;
            }
        }

        if let Some(components) = config.get(COMPONENTS_KEY).and_then(Value::as_array) {
            for (idx, component) in components.iter().enumerate() {
                let path = format!("{COMPONENTS_KEY}[{idx}]");
                let record = self.build_record(component, label, &path)?;
                debug!(
                    "parsed component (name={}, type={}, properties={})",
                    record.instance_name,
                    record.type_name,
                    record.properties.len()
                );
                self.document.push_record(record)?;
            }
        }
        Ok(())
    }

    fn include(
        &mut self,
        target: &str,
        label: &str,
        base_dir: Option<&Path>,
    ) -> Result<(), ConfigError> {
        let path = utils::resolve_include(base_dir, target);
        let unique = utils::unique_path(&path);
        if self.include_stack.contains(&unique) {
            return Err(ConfigError::cycle(
                label,
                Some(FILES_KEY),
                format!("file '{}' includes itself", path.display()),
            ));
        }
        debug!("including config file: {}", path.display());
        let value = io::read_document(&path)?;
        self.include_stack.push(unique);
        let result = self.ingest(&value, &path.display().to_string(), path.parent());
        self.include_stack.pop();
        result
    }

    fn build_record(
        &self,
        component: &Value,
        label: &str,
        path: &str,
    ) -> Result<RawRecord, ConfigError> {
        let map = schema::expect_object(component, label, path)?;
        let name = required_str(map, NAME_KEY, label, path)?;
        let declared_type = map.get(TYPE_KEY).and_then(Value::as_str);

        let mut record = match map.get(INHERIT_KEY).and_then(Value::as_str) {
            Some(base_name) => {
                let base = self.document.record(base_name).ok_or_else(|| {
                    ConfigError::unknown_reference(
                        name,
                        Some(INHERIT_KEY),
                        format!("inherited component '{base_name}' is not defined"),
                    )
                })?;
                inherit::derive_record(base, name, declared_type)
            }
            None => {
                let Some(type_name) = declared_type else {
                    return Err(ConfigError::syntax_at(
                        name,
                        TYPE_KEY,
                        "component must declare a type or inherit one",
                    ));
                };
                RawRecord::new(name, type_name)
            }
        };

        record.exportable = flag(map, EXPORT_KEY, label, path)?;
        record.importable = flag(map, IMPORT_KEY, label, path)?;
        if let Some(lease) = map.get(LEASE_KEY) {
            record.lease_millis = Some(lease_millis(lease, label, &schema::join_path(path, LEASE_KEY))?);
        }
        if let Some(entries) = map.get(ENTRIES_KEY).and_then(Value::as_str) {
            record.entries_group = Some(entries.to_string());
        }

        if let Some(properties) = map.get(PROPERTIES_KEY).and_then(Value::as_object) {
            let mut own = BTreeMap::new();
            for (key, value) in properties {
                let prop_path = schema::join_path(&schema::join_path(path, PROPERTIES_KEY), key);
                own.insert(key.clone(), property_value(value, label, &prop_path)?);
            }
            inherit::overlay_properties(&mut record.properties, own);
        }
        Ok(record)
    }
}

fn required_str<'a>(
    map: &'a Map<String, Value>,
    key: &str,
    label: &str,
    path: &str,
) -> Result<&'a str, ConfigError> {
    map.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| schema::invalid_field(label, &schema::join_path(path, key), "missing required field"))
}

fn flag(map: &Map<String, Value>, key: &str, label: &str, path: &str) -> Result<bool, ConfigError> {
    match map.get(key) {
        None => Ok(false),
        Some(Value::Bool(flag)) => Ok(*flag),
        Some(Value::String(text)) => Ok(text.eq_ignore_ascii_case("true")),
        Some(_) => Err(schema::invalid_field(
            label,
            &schema::join_path(path, key),
            "expected boolean",
        )),
    }
}

fn lease_millis(value: &Value, label: &str, path: &str) -> Result<u64, ConfigError> {
    let parsed = match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse::<u64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| schema::invalid_field(label, path, "expected non-negative integer"))
}

/// Text form of a scalar JSON value.
fn scalar_text(value: &Value, label: &str, path: &str) -> Result<String, ConfigError> {
    match value {
        Value::String(text) => Ok(text.clone()),
        Value::Number(number) => Ok(number.to_string()),
        Value::Bool(flag) => Ok(flag.to_string()),
        _ => Err(schema::invalid_field(label, path, "expected scalar value")),
    }
}

/// Convert a property value: scalar, list of items, or string map.
fn property_value(value: &Value, label: &str, path: &str) -> Result<PropertyValue, ConfigError> {
    match value {
        Value::Array(items) => {
            let mut parsed = Vec::with_capacity(items.len());
            for (idx, item) in items.iter().enumerate() {
                parsed.push(list_item(item, label, &format!("{path}[{idx}]"))?);
            }
            Ok(PropertyValue::List(parsed))
        }
        Value::Object(entries) => {
            let mut parsed = BTreeMap::new();
            for (key, entry) in entries {
                let text = scalar_text(entry, label, &schema::join_path(path, key))?;
                parsed.insert(key.clone(), text);
            }
            Ok(PropertyValue::Map(parsed))
        }
        other => Ok(PropertyValue::Text(scalar_text(other, label, path)?)),
    }
}

fn list_item(value: &Value, label: &str, path: &str) -> Result<ListItem, ConfigError> {
    match value {
        Value::Object(map) => {
            if let Some(item) = map.get(ITEM_KEY) {
                return Ok(ListItem::Value(scalar_text(item, label, path)?));
            }
            match map.get(TYPE_KEY).and_then(Value::as_str) {
                Some(type_name) => Ok(ListItem::TypeRef(type_name.to_string())),
                None => Err(schema::invalid_field(label, path, "list item needs 'item' or 'type'")),
            }
        }
        other => Ok(ListItem::Value(scalar_text(other, label, path)?)),
    }
}
