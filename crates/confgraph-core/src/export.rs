//! Field values written out by a live component for import.

use crate::component::{ComponentHandle, ComponentType};
use confgraph_config::PropertyValue;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// One exported field value.
#[derive(Debug, Clone)]
pub enum ExportedValue {
    /// Plain value copied verbatim.
    Value(PropertyValue),
    /// Nested component, imported under `{name}-{field}`.
    Component(ComponentHandle),
    /// Component list, imported under `{name}-{field}-{index}`.
    Components(Vec<ComponentHandle>),
    /// Component map, imported under `{name}-{field}-{key}`.
    ComponentMap(BTreeMap<String, ComponentHandle>),
}

/// Collects a component's current field values.
#[derive(Debug, Default)]
pub struct ExportedProperties {
    values: Vec<(String, ExportedValue)>,
}

impl ExportedProperties {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a raw property value.
    pub fn value(&mut self, name: &str, value: impl Into<PropertyValue>) -> &mut Self {
        self.push(name, ExportedValue::Value(value.into()))
    }

    /// Record a scalar through its `Display` form.
    pub fn text(&mut self, name: &str, value: impl ToString) -> &mut Self {
        self.value(name, PropertyValue::Text(value.to_string()))
    }

    /// Record a path.
    pub fn path(&mut self, name: &str, value: &Path) -> &mut Self {
        self.text(name, value.display())
    }

    /// Record a list of scalars.
    pub fn list<I, T>(&mut self, name: &str, items: I) -> &mut Self
    where
        I: IntoIterator<Item = T>,
        T: ToString,
    {
        self.value(
            name,
            PropertyValue::list(items.into_iter().map(|item| item.to_string())),
        )
    }

    /// Record a map of scalars.
    pub fn map<I, K, V>(&mut self, name: &str, entries: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: ToString,
        V: ToString,
    {
        self.value(
            name,
            PropertyValue::map(
                entries
                    .into_iter()
                    .map(|(key, value)| (key.to_string(), value.to_string())),
            ),
        )
    }

    /// Record a nested component.
    pub fn component(&mut self, name: &str, handle: &ComponentHandle) -> &mut Self {
        self.push(name, ExportedValue::Component(handle.clone()))
    }

    /// Record a nested component held by its concrete type.
    pub fn component_arc<T: ComponentType>(&mut self, name: &str, component: &Arc<RwLock<T>>) -> &mut Self {
        self.component(name, &ComponentHandle::from_arc(component.clone()))
    }

    /// Record a list of nested components.
    pub fn components<'a, I>(&mut self, name: &str, handles: I) -> &mut Self
    where
        I: IntoIterator<Item = &'a ComponentHandle>,
    {
        let handles = handles.into_iter().cloned().collect();
        self.push(name, ExportedValue::Components(handles))
    }

    /// Record a map of nested components.
    pub fn component_map<'a, I>(&mut self, name: &str, entries: I) -> &mut Self
    where
        I: IntoIterator<Item = (&'a String, &'a ComponentHandle)>,
    {
        let entries = entries
            .into_iter()
            .map(|(key, handle)| (key.clone(), handle.clone()))
            .collect();
        self.push(name, ExportedValue::ComponentMap(entries))
    }

    /// Exported entries in recording order.
    pub fn entries(&self) -> &[(String, ExportedValue)] {
        &self.values
    }

    /// Consume into entries.
    pub fn into_entries(self) -> Vec<(String, ExportedValue)> {
        self.values
    }

    fn push(&mut self, name: &str, value: ExportedValue) -> &mut Self {
        self.values.retain(|(existing, _)| existing != name);
        self.values.push((name.to_string(), value));
        self
    }
}
