use super::ConfigurationManager;
use crate::component::{ComponentHandle, ComponentId};
use crate::export::{ExportedProperties, ExportedValue};
use crate::sheet::PropertySheet;
use confgraph_config::{ConfigError, ListItem, PropertyValue, RawRecord};
use log::{debug, info};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// A record captured from a live instance, waiting to be committed.
struct Captured {
    record: RawRecord,
    component: ComponentHandle,
}

impl ConfigurationManager {
    /// Capture a live component, and the components it holds, as records.
    ///
    /// Nested components are named `{name}-{field}`, list elements
    /// `{name}-{field}-{index}` and map entries `{name}-{field}-{key}`.
    /// Instances this manager already knows keep their existing names. Every
    /// captured record is bound to its live instance. Returns the name the
    /// top-level component is managed under.
    pub fn import_configurable(
        &self,
        component: &ComponentHandle,
        name: &str,
    ) -> Result<String, ConfigError> {
        let mut visiting = HashMap::new();
        let mut captured = Vec::new();
        let assigned = self.capture(component, name, &mut visiting, &mut captured)?;
        if captured.is_empty() {
            return Ok(assigned);
        }

        let mut bound = Vec::with_capacity(captured.len());
        for Captured { record, component } in captured {
            let descriptor = self.descriptor_for(&record)?;
            bound.push((record, descriptor, component));
        }

        let added = {
            let mut state = self.state.write();
            let mut seen = HashSet::new();
            for (record, _, _) in &bound {
                if state.records.contains_key(&record.instance_name)
                    || !seen.insert(record.instance_name.clone())
                {
                    return Err(ConfigError::duplicate(
                        &record.instance_name,
                        format!("component '{}' is already defined", record.instance_name),
                    ));
                }
            }
            let mut added = Vec::with_capacity(bound.len());
            for (record, descriptor, component) in bound {
                let name = record.instance_name.clone();
                let sheet = PropertySheet::bind(descriptor.clone(), record.clone())?;
                sheet.bind_owner(component.clone());
                state.insert_record(record, &descriptor);
                state.sheets.insert(name.clone(), Arc::new(sheet));
                state.instances.insert(component.id(), name.clone());
                state.added.insert(name.clone());
                added.push((name, descriptor.type_name().to_string()));
            }
            added
        };

        info!(
            "imported live component (name={assigned}, records={})",
            added.len()
        );
        for (name, type_name) in &added {
            self.listeners
                .notify(|listener| listener.component_added(name, type_name));
        }
        Ok(assigned)
    }

    fn capture(
        &self,
        component: &ComponentHandle,
        name: &str,
        visiting: &mut HashMap<ComponentId, String>,
        captured: &mut Vec<Captured>,
    ) -> Result<String, ConfigError> {
        if let Some(existing) = self.name_of(component) {
            debug!("import reuses managed instance (name={existing})");
            return Ok(existing);
        }
        if let Some(existing) = visiting.get(&component.id()) {
            return Ok(existing.clone());
        }
        visiting.insert(component.id(), name.to_string());

        let mut exported = ExportedProperties::new();
        component.read().export(&mut exported);

        let mut record = RawRecord::new(name, component.type_name());
        for (field, value) in exported.into_entries() {
            let value = match value {
                ExportedValue::Value(value) => value,
                ExportedValue::Component(child) => {
                    let child_name = format!("{name}-{field}");
                    PropertyValue::Text(self.capture(&child, &child_name, visiting, captured)?)
                }
                ExportedValue::Components(children) => {
                    let mut items = Vec::with_capacity(children.len());
                    for (index, child) in children.iter().enumerate() {
                        let child_name = format!("{name}-{field}-{index}");
                        items.push(ListItem::Value(
                            self.capture(child, &child_name, visiting, captured)?,
                        ));
                    }
                    PropertyValue::List(items)
                }
                ExportedValue::ComponentMap(children) => {
                    let mut entries = Vec::with_capacity(children.len());
                    for (key, child) in &children {
                        let child_name = format!("{name}-{field}-{key}");
                        entries.push((
                            key.clone(),
                            self.capture(child, &child_name, visiting, captured)?,
                        ));
                    }
                    PropertyValue::map(entries)
                }
            };
            record.set_property(field, value);
        }
        captured.push(Captured {
            record,
            component: component.clone(),
        });
        Ok(name.to_string())
    }
}
