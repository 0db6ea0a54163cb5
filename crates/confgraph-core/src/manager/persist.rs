use super::{ConfigurationManager, ManagerState};
use crate::listener::ListenerSet;
use crate::registry::RegistryBinding;
use crate::worker::WorkerSet;
use confgraph_config::{ConfigDocument, ConfigError, GLOBAL_SCOPE, RawRecord};
use log::info;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::Ordering;

impl ConfigurationManager {
    /// Current configuration as a document.
    ///
    /// Instantiated and programmatically added records come first, then, with
    /// `write_all`, every other record. Both groups keep declaration order.
    pub fn to_document(&self, write_all: bool) -> ConfigDocument {
        let state = self.state.read();
        let live = |name: &str| {
            state.added.contains(name)
                || state
                    .sheets
                    .get(name)
                    .is_some_and(|sheet| sheet.is_instantiated())
        };
        let record_of = |name: &String| {
            state.sheets.get(name).map(|sheet| sheet.to_record()).or_else(|| state.records.get(name).cloned())
        };
        let mut records = state
            .order
            .iter()
            .filter(|name| live(name))
            .filter_map(record_of)
            .collect::<Vec<_>>();
        if write_all {
            records.extend(
                state
                    .order
                    .iter()
                    .filter(|name| !live(name))
                    .filter_map(record_of),
            );
        }
        ConfigDocument {
            globals: state.globals.clone(),
            records,
        }
    }

    /// Write the configuration as JSON.
    pub fn save<W: Write>(&self, writer: W, write_all: bool) -> Result<(), ConfigError> {
        self.to_document(write_all).write_to(writer)
    }

    /// Write the configuration to a file.
    pub fn save_to_path(&self, path: impl AsRef<Path>, write_all: bool) -> Result<(), ConfigError> {
        self.to_document(write_all).save_to_path(path)
    }

    /// Configuration equality: same globals, names, types, and property key sets.
    ///
    /// Instantiation state is ignored.
    pub fn config_eq(&self, other: &ConfigurationManager) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        let ours = self.state.read();
        let theirs = other.state.read();
        ours.globals == theirs.globals
            && ours.records.len() == theirs.records.len()
            && ours.records.iter().all(|(name, record)| {
                theirs.records.get(name).is_some_and(|other| {
                    record.type_name == other.type_name && record.config_eq(other)
                })
            })
    }

    /// Copy another manager's globals and records into this one.
    ///
    /// Without `overwrite`, any name present in both is a `DuplicateName`
    /// error and nothing is merged. With it, incoming records replace existing
    /// ones and drop their cached instances.
    pub fn merge(&self, other: &ConfigurationManager, overwrite: bool) -> Result<(), ConfigError> {
        if std::ptr::eq(self, other) {
            return Ok(());
        }
        let (globals, records) = {
            let theirs = other.state.read();
            let records = theirs
                .order
                .iter()
                .filter_map(|name| theirs.records.get(name).cloned())
                .collect::<Vec<RawRecord>>();
            (theirs.globals.clone(), records)
        };

        let mut descriptors = Vec::with_capacity(records.len());
        for record in &records {
            descriptors.push(self.descriptor_for(record)?);
        }
        if !overwrite {
            let ours = self.state.read();
            if let Some(record) = records
                .iter()
                .find(|record| ours.records.contains_key(&record.instance_name))
            {
                return Err(ConfigError::duplicate(
                    &record.instance_name,
                    format!("component '{}' is already defined", record.instance_name),
                ));
            }
            if let Some(name) = globals
                .names()
                .find(|name| ours.globals.raw(name).is_some())
            {
                return Err(ConfigError::duplicate(
                    GLOBAL_SCOPE,
                    format!("global property '{name}' is already defined"),
                ));
            }
        }

        let mut replaced = Vec::new();
        let mut added = Vec::new();
        {
            let mut state = self.state.write();
            state.globals.put_all(&globals);
            for (record, descriptor) in records.into_iter().zip(&descriptors) {
                let name = record.instance_name.clone();
                if state.records.contains_key(&name) {
                    if let Some(sheet) = state.sheets.remove(&name) {
                        sheet.mark_removed();
                    }
                    state.instances.retain(|_, instance| *instance != name);
                    replaced.push(name);
                } else {
                    added.push((name, record.type_name.clone()));
                }
                state.insert_record(record, descriptor);
            }
        }
        info!(
            "merged configuration (added={}, replaced={})",
            added.len(),
            replaced.len()
        );
        for (name, type_name) in &added {
            self.listeners
                .notify(|listener| listener.component_added(name, type_name));
        }
        Ok(())
    }
}

impl Clone for ConfigurationManager {
    /// Unbound copy: records, globals, and added names are duplicated; cached
    /// instances, workers, listeners, and a configured registry are not.
    fn clone(&self) -> Self {
        let state = self.state.read();
        let registry = match &*self.registry.read() {
            RegistryBinding::Direct(registry) => RegistryBinding::Direct(registry.clone()),
            _ => RegistryBinding::Absent,
        };
        let sheets = state
            .sheets
            .iter()
            .map(|(name, sheet)| (name.clone(), Arc::new(sheet.clone_unbound())))
            .collect::<HashMap<_, _>>();
        Self {
            id: super::NEXT_MANAGER_ID.fetch_add(1, Ordering::Relaxed),
            catalog: self.catalog.clone(),
            state: RwLock::new(ManagerState {
                globals: state.globals.clone(),
                records: state.records.clone(),
                order: state.order.clone(),
                sheets,
                instances: HashMap::new(),
                added: state.added.clone(),
                references: state.references.clone(),
            }),
            registry: RwLock::new(registry),
            registrations: Mutex::new(Vec::new()),
            workers: WorkerSet::default(),
            listeners: ListenerSet::default(),
        }
    }
}
