//! Serialization of documents back into the loader's JSON shape.

use crate::loader::{
    COMPONENTS_KEY, CONFIG_KEY, ENTRIES_KEY, EXPORT_KEY, GLOBALS_KEY, IMPORT_KEY, ITEM_KEY,
    LEASE_KEY, NAME_KEY, PROPERTIES_KEY, TYPE_KEY,
};
use crate::{ConfigDocument, ConfigError, ListItem, PropertyValue, RawRecord};
use log::debug;
use serde_json::{Map, Value, json};
use std::fs;
use std::io::Write;
use std::path::Path;

impl ConfigDocument {
    /// Render the document as a JSON value in loader shape.
    pub fn to_value(&self) -> Value {
        let mut globals = Map::new();
        for (name, value) in self.globals.iter() {
            globals.insert(name.to_string(), Value::String(value.to_string()));
        }
        let components = self.records.iter().map(record_to_value).collect::<Vec<_>>();
        json!({
            CONFIG_KEY: {
                GLOBALS_KEY: Value::Object(globals),
                COMPONENTS_KEY: components,
            }
        })
    }

    /// Render the document as pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(&self.to_value())?)
    }

    /// Write the document as pretty-printed JSON.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<(), ConfigError> {
        serde_json::to_writer_pretty(&mut writer, &self.to_value())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    /// Write the document to a file, creating parent directories.
    pub fn save_to_path(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        debug!(
            "saving config (path={}, components={})",
            path.display(),
            self.records.len()
        );
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = fs::File::create(path)?;
        self.write_to(std::io::BufWriter::new(file))
    }
}

/// Render one record. Records without properties keep an empty map.
pub fn record_to_value(record: &RawRecord) -> Value {
    let mut map = Map::new();
    map.insert(NAME_KEY.to_string(), Value::String(record.instance_name.clone()));
    map.insert(TYPE_KEY.to_string(), Value::String(record.type_name.clone()));
    if record.exportable {
        map.insert(EXPORT_KEY.to_string(), Value::Bool(true));
    }
    if record.importable {
        map.insert(IMPORT_KEY.to_string(), Value::Bool(true));
    }
    if let Some(lease) = record.lease_millis {
        map.insert(LEASE_KEY.to_string(), Value::from(lease));
    }
    if let Some(entries) = &record.entries_group {
        map.insert(ENTRIES_KEY.to_string(), Value::String(entries.clone()));
    }
    let properties = record
        .properties
        .iter()
        .map(|(name, value)| (name.clone(), property_to_value(value)))
        .collect::<Map<_, _>>();
    map.insert(PROPERTIES_KEY.to_string(), Value::Object(properties));
    Value::Object(map)
}

fn property_to_value(value: &PropertyValue) -> Value {
    match value {
        PropertyValue::Text(text) => Value::String(text.clone()),
        PropertyValue::List(items) => Value::Array(
            items
                .iter()
                .map(|item| match item {
                    ListItem::Value(value) => json!({ ITEM_KEY: value }),
                    ListItem::TypeRef(type_name) => json!({ TYPE_KEY: type_name }),
                })
                .collect(),
        ),
        PropertyValue::Map(entries) => Value::Object(
            entries
                .iter()
                .map(|(key, value)| (key.clone(), Value::String(value.clone())))
                .collect(),
        ),
    }
}
