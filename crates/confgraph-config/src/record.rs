//! Raw component records as loaded from a configuration document.

use crate::{ConfigError, GlobalProperties};
use std::collections::BTreeMap;
use std::fmt;

/// Default lease for registry registrations, in milliseconds.
pub const DEFAULT_LEASE_MILLIS: u64 = 100_000;

/// One entry of a list property.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ListItem {
    /// A literal value or instance name.
    Value(String),
    /// Every current instance of the named type.
    TypeRef(String),
}

impl ListItem {
    /// Literal value, if this item is not a type reference.
    pub fn as_value(&self) -> Option<&str> {
        match self {
            Self::Value(value) => Some(value),
            Self::TypeRef(_) => None,
        }
    }
}

impl From<&str> for ListItem {
    fn from(value: &str) -> Self {
        Self::Value(value.to_string())
    }
}

impl From<String> for ListItem {
    fn from(value: String) -> Self {
        Self::Value(value)
    }
}

/// Unresolved value of a single property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    /// Scalar text, possibly containing `${name}` tokens.
    Text(String),
    /// Ordered list of items.
    List(Vec<ListItem>),
    /// String-keyed map.
    Map(BTreeMap<String, String>),
}

impl PropertyValue {
    /// Build a list of literal values.
    pub fn list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(
            items
                .into_iter()
                .map(|item| ListItem::Value(item.into()))
                .collect(),
        )
    }

    /// Build a map from key/value pairs.
    pub fn map<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::Map(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }

    /// Scalar text, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Short shape label used in error messages.
    pub fn shape(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<ListItem>> for PropertyValue {
    fn from(items: Vec<ListItem>) -> Self {
        Self::List(items)
    }
}

impl From<BTreeMap<String, String>> for PropertyValue {
    fn from(entries: BTreeMap<String, String>) -> Self {
        Self::Map(entries)
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => write!(f, "{text}"),
            Self::List(items) => {
                let rendered = items
                    .iter()
                    .map(|item| match item {
                        ListItem::Value(value) => value.clone(),
                        ListItem::TypeRef(type_name) => format!("type:{type_name}"),
                    })
                    .collect::<Vec<_>>();
                write!(f, "[{}]", rendered.join(", "))
            }
            Self::Map(entries) => {
                let rendered = entries
                    .iter()
                    .map(|(key, value)| format!("{key}={value}"))
                    .collect::<Vec<_>>();
                write!(f, "{{{}}}", rendered.join(", "))
            }
        }
    }
}

/// Declarative data for one component instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// Unique instance name.
    pub instance_name: String,
    /// Name of the component type to construct.
    pub type_name: String,
    /// Unresolved property values by field name.
    pub properties: BTreeMap<String, PropertyValue>,
    /// Publish the constructed instance to the registry.
    pub exportable: bool,
    /// Prefer satisfying this instance from the registry.
    pub importable: bool,
    /// Registry lease duration in milliseconds.
    pub lease_millis: Option<u64>,
    /// Name of the record whose properties describe registry metadata.
    pub entries_group: Option<String>,
}

impl RawRecord {
    /// Create a record with no properties and default flags.
    pub fn new(instance_name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            instance_name: instance_name.into(),
            type_name: type_name.into(),
            properties: BTreeMap::new(),
            exportable: false,
            importable: false,
            lease_millis: None,
            entries_group: None,
        }
    }

    /// Add a property and return the record.
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Set the exportable flag and return the record.
    pub fn exportable(mut self, exportable: bool) -> Self {
        self.exportable = exportable;
        self
    }

    /// Set the importable flag and return the record.
    pub fn importable(mut self, importable: bool) -> Self {
        self.importable = importable;
        self
    }

    /// Set the registry lease and return the record.
    pub fn lease_millis(mut self, millis: u64) -> Self {
        self.lease_millis = Some(millis);
        self
    }

    /// Set the registry metadata group and return the record.
    pub fn entries_group(mut self, name: impl Into<String>) -> Self {
        self.entries_group = Some(name.into());
        self
    }

    /// Raw value of a property.
    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    /// Replace a property value, returning the previous one.
    pub fn set_property(
        &mut self,
        name: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Option<PropertyValue> {
        self.properties.insert(name.into(), value.into())
    }

    /// Remove a property, returning its value.
    pub fn remove_property(&mut self, name: &str) -> Option<PropertyValue> {
        self.properties.remove(name)
    }

    /// Property names in sorted order.
    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    /// Imported from the registry only, with nothing to construct locally.
    pub fn is_import_only(&self) -> bool {
        self.importable && self.properties.is_empty()
    }

    /// Effective registry lease in milliseconds.
    pub fn effective_lease_millis(&self) -> u64 {
        self.lease_millis.unwrap_or(DEFAULT_LEASE_MILLIS)
    }

    /// Copy of this record with global tokens substituted in scalar values.
    ///
    /// List and map elements are left untouched; they are substituted when a
    /// typed accessor reads them.
    pub fn flatten(&self, globals: &GlobalProperties) -> Result<RawRecord, ConfigError> {
        let mut flattened = self.clone();
        for (name, value) in flattened.properties.iter_mut() {
            if let PropertyValue::Text(text) = value {
                let resolved =
                    globals.replace_global_properties(&self.instance_name, Some(name), text)?;
                *text = resolved;
            }
        }
        Ok(flattened)
    }

    /// Configuration equality: same property key sets.
    pub fn config_eq(&self, other: &RawRecord) -> bool {
        self.properties.len() == other.properties.len()
            && self
                .properties
                .keys()
                .all(|key| other.properties.contains_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn flatten_substitutes_scalars_only() {
        let mut globals = GlobalProperties::new();
        globals.set_value("greeting", "Hello").expect("set");
        let record = RawRecord::new("A", "Greeter")
            .with_property("message", "${greeting} World")
            .with_property("items", PropertyValue::list(["${greeting}"]));

        let flat = record.flatten(&globals).expect("flatten");
        assert_eq!(
            flat.property("message"),
            Some(&PropertyValue::Text("Hello World".to_string()))
        );
        assert_eq!(
            flat.property("items"),
            Some(&PropertyValue::list(["${greeting}"]))
        );
    }

    #[test]
    fn flatten_reports_instance_and_field() {
        let record = RawRecord::new("A", "Greeter").with_property("message", "${nope}");
        let err = record.flatten(&GlobalProperties::new()).unwrap_err();
        assert_eq!(err.instance_name(), Some("A"));
        assert_eq!(err.field_name(), Some("message"));
    }

    #[test]
    fn config_equality_compares_key_sets() {
        let left = RawRecord::new("A", "Greeter").with_property("message", "x");
        let right = RawRecord::new("A", "Greeter").with_property("message", "y");
        let other = RawRecord::new("A", "Greeter").with_property("repeat", "1");
        assert!(left.config_eq(&right));
        assert!(!left.config_eq(&other));
    }

    #[test]
    fn import_only_requires_empty_properties() {
        let record = RawRecord::new("svc", "Service").importable(true);
        assert!(record.is_import_only());
        let record = record.with_property("port", "80");
        assert!(!record.is_import_only());
        assert_eq!(record.effective_lease_millis(), DEFAULT_LEASE_MILLIS);
    }
}
