//! Configuration manager: the symbol table of records, sheets, and instances.

mod import;
mod lookup;
mod persist;
mod references;
mod rename;

use crate::catalog::TypeCatalog;
use crate::component::{ComponentHandle, ComponentId};
use crate::descriptor::ComponentDescriptor;
use crate::listener::{ConfigurationChangeListener, ListenerSet};
use crate::registry::{ComponentRegistry, Registration, RegistrationHandle, RegistryBinding};
use crate::sheet::{PropertySheet, check_declared};
use crate::worker::WorkerSet;
use confgraph_config::{
    ConfigDocument, ConfigError, GLOBAL_SCOPE, GlobalProperties, MAX_SUBSTITUTION_PASSES,
    PropertyValue, RawRecord,
};
use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use references::ReferenceIndex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

/// Instance name that installs a configured registry backend.
pub const REGISTRY_COMPONENT: &str = "registry";

static NEXT_MANAGER_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Default)]
struct ManagerState {
    globals: GlobalProperties,
    records: HashMap<String, RawRecord>,
    /// Record names in declaration order.
    order: Vec<String>,
    sheets: HashMap<String, Arc<PropertySheet>>,
    instances: HashMap<ComponentId, String>,
    added: HashSet<String>,
    references: ReferenceIndex,
}

impl ManagerState {
    fn insert_record(&mut self, record: RawRecord, descriptor: &ComponentDescriptor) {
        self.references.reindex(&record, descriptor);
        if !self.records.contains_key(&record.instance_name) {
            self.order.push(record.instance_name.clone());
        }
        self.records.insert(record.instance_name.clone(), record);
    }

    fn remove_record(&mut self, name: &str) -> Option<(RawRecord, Option<Arc<PropertySheet>>)> {
        let record = self.records.remove(name)?;
        self.order.retain(|existing| existing != name);
        self.added.remove(name);
        self.instances.retain(|_, instance| instance != name);
        self.references.forget(name);
        Some((record, self.sheets.remove(name)))
    }
}

/// Resolves records into live components and keeps them consistent.
///
/// Records come from documents or programmatic edits. Each record is bound to
/// its type descriptor in a [`PropertySheet`] on first access, and its owner is
/// constructed on first lookup. Change listeners are notified after internal
/// locks are released.
pub struct ConfigurationManager {
    id: u64,
    catalog: Arc<TypeCatalog>,
    state: RwLock<ManagerState>,
    registry: RwLock<RegistryBinding>,
    registrations: Mutex<Vec<(String, RegistrationHandle)>>,
    workers: WorkerSet,
    listeners: ListenerSet,
}

impl ConfigurationManager {
    /// Empty manager over a type catalog.
    pub fn new(catalog: TypeCatalog) -> Self {
        Self::with_catalog(Arc::new(catalog))
    }

    /// Empty manager sharing a type catalog.
    pub fn with_catalog(catalog: Arc<TypeCatalog>) -> Self {
        Self {
            id: NEXT_MANAGER_ID.fetch_add(1, Ordering::Relaxed),
            catalog,
            state: RwLock::new(ManagerState::default()),
            registry: RwLock::new(RegistryBinding::Absent),
            registrations: Mutex::new(Vec::new()),
            workers: WorkerSet::default(),
            listeners: ListenerSet::default(),
        }
    }

    /// Manager holding the records and globals of `document`.
    pub fn from_document(
        catalog: TypeCatalog,
        document: ConfigDocument,
    ) -> Result<Self, ConfigError> {
        let manager = Self::new(catalog);
        manager.load_document(document)?;
        Ok(manager)
    }

    /// Manager loaded from a JSON5 file.
    pub fn load_path(catalog: TypeCatalog, path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let document = ConfigDocument::load_from_path(path)?;
        Self::from_document(catalog, document)
    }

    /// Manager loaded from JSON5 text.
    pub fn load_str(catalog: TypeCatalog, contents: &str) -> Result<Self, ConfigError> {
        let document = ConfigDocument::load_from_str(contents)?;
        Self::from_document(catalog, document)
    }

    /// Add a document's globals and records.
    ///
    /// Every record is checked first; on any error nothing is retained. A
    /// record named `registry` whose type exposes a registry becomes this
    /// manager's registry backend.
    pub fn load_document(&self, document: ConfigDocument) -> Result<(), ConfigError> {
        let ConfigDocument { globals, records } = document;
        let mut descriptors = Vec::with_capacity(records.len());
        {
            let state = self.state.read();
            let mut seen = HashSet::new();
            for record in &records {
                if state.records.contains_key(&record.instance_name)
                    || !seen.insert(record.instance_name.as_str())
                {
                    return Err(ConfigError::duplicate(
                        &record.instance_name,
                        format!("component '{}' is already defined", record.instance_name),
                    ));
                }
                descriptors.push(self.descriptor_for(record)?);
            }
        }

        let names = records
            .iter()
            .map(|record| record.instance_name.clone())
            .collect::<Vec<_>>();
        let previous_globals = {
            let mut state = self.state.write();
            let previous = state.globals.clone();
            state.globals.put_all(&globals);
            for (record, descriptor) in records.into_iter().zip(&descriptors) {
                state.insert_record(record, descriptor);
            }
            previous
        };
        if let Err(err) = self.setup_registry() {
            self.roll_back_load(&names, previous_globals);
            return Err(err);
        }
        info!(
            "loaded configuration (components={}, globals={})",
            names.len(),
            globals.len()
        );
        Ok(())
    }

    /// Undo a load whose registry setup failed.
    fn roll_back_load(&self, names: &[String], previous_globals: GlobalProperties) {
        let sheets = {
            let mut state = self.state.write();
            state.globals = previous_globals;
            names
                .iter()
                .filter_map(|name| state.remove_record(name))
                .filter_map(|(_, sheet)| sheet)
                .collect::<Vec<_>>()
        };
        for sheet in sheets {
            sheet.mark_removed();
        }
        for name in names {
            self.withdraw(name);
            self.workers.release(name);
        }
        warn!("rolled back failed load (components={})", names.len());
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// Type catalog used to bind records.
    pub fn catalog(&self) -> &TypeCatalog {
        &self.catalog
    }

    pub(crate) fn with_globals<R>(&self, f: impl FnOnce(&GlobalProperties) -> R) -> R {
        f(&self.state.read().globals)
    }

    /// Look up or construct a component, reusing a cached instance.
    ///
    /// A name beginning with `$` is first resolved through the global table.
    /// Returns `None` when no record has the name, or when an import-only
    /// record is not found in the registry.
    pub fn lookup(&self, name: &str) -> Result<Option<ComponentHandle>, ConfigError> {
        self.lookup_with(name, true)
    }

    /// Look up a component; with `reuse` false a fresh instance replaces the cached one.
    pub fn lookup_with(
        &self,
        name: &str,
        reuse: bool,
    ) -> Result<Option<ComponentHandle>, ConfigError> {
        let name = self.resolve_instance_name(name)?;
        let Some(sheet) = self.property_sheet(&name)? else {
            debug!("lookup of unknown component (name={name})");
            return Ok(None);
        };
        let resolution = sheet.get_owner(self, reuse)?;
        let Some(handle) = resolution.handle else {
            return Ok(None);
        };
        let known = self.state.read().instances.contains_key(&handle.id());
        if !known {
            let mut state = self.state.write();
            state.instances.retain(|_, instance| *instance != name);
            state.instances.insert(handle.id(), name.clone());
        }
        if resolution.created {
            self.after_construction(&name, &sheet, &handle)?;
        }
        Ok(Some(handle))
    }

    fn after_construction(
        &self,
        name: &str,
        sheet: &PropertySheet,
        handle: &ComponentHandle,
    ) -> Result<(), ConfigError> {
        let record = sheet.to_record();
        if record.exportable {
            self.export_component(&record, sheet.descriptor(), handle)?;
        }
        let task = handle.read().start_task();
        if let Some(task) = task {
            self.workers.spawn(name, task)?;
        }
        Ok(())
    }

    fn resolve_instance_name(&self, name: &str) -> Result<String, ConfigError> {
        let mut current = name.to_string();
        let mut passes = 0;
        while current.starts_with('$') {
            passes += 1;
            if passes > MAX_SUBSTITUTION_PASSES {
                return Err(ConfigError::cycle(
                    name,
                    None,
                    "instance name does not resolve to a plain name",
                ));
            }
            let stripped = GlobalProperties::stripped_name(&current).to_string();
            current = self
                .with_globals(|globals| globals.resolved(&stripped))?
                .ok_or_else(|| {
                    ConfigError::unknown_reference(
                        name,
                        None,
                        format!("unknown global property '{stripped}'"),
                    )
                })?;
        }
        Ok(current)
    }

    /// Sheet for an instance name, binding it on first access.
    pub fn property_sheet(&self, name: &str) -> Result<Option<Arc<PropertySheet>>, ConfigError> {
        if let Some(sheet) = self.state.read().sheets.get(name) {
            return Ok(Some(sheet.clone()));
        }
        let mut state = self.state.write();
        if let Some(sheet) = state.sheets.get(name) {
            return Ok(Some(sheet.clone()));
        }
        let Some(record) = state.records.get(name) else {
            return Ok(None);
        };
        let descriptor = self.descriptor_for(record)?;
        let sheet = Arc::new(PropertySheet::bind(descriptor, record.clone())?);
        debug!(
            "bound property sheet (name={name}, type={})",
            sheet.type_name()
        );
        state.sheets.insert(name.to_string(), sheet.clone());
        Ok(Some(sheet))
    }

    /// Check a record against the catalog.
    fn descriptor_for(&self, record: &RawRecord) -> Result<Arc<ComponentDescriptor>, ConfigError> {
        let descriptor = self.catalog.get(&record.type_name).ok_or_else(|| {
            ConfigError::unknown_reference(
                &record.instance_name,
                None,
                format!("unknown component type '{}'", record.type_name),
            )
        })?;
        check_declared(&descriptor, record)?;
        Ok(descriptor)
    }

    /// Add a record programmatically.
    pub fn add_record(&self, record: RawRecord) -> Result<(), ConfigError> {
        if record.instance_name.is_empty() {
            return Err(ConfigError::syntax(
                &record.instance_name,
                "instance names cannot be empty",
            ));
        }
        let descriptor = self.descriptor_for(&record)?;
        let name = record.instance_name.clone();
        let type_name = record.type_name.clone();
        {
            let mut state = self.state.write();
            if state.records.contains_key(&name) {
                return Err(ConfigError::duplicate(
                    &name,
                    format!("component '{name}' is already defined"),
                ));
            }
            state.insert_record(record, &descriptor);
            state.added.insert(name.clone());
        }
        info!("added component (name={name}, type={type_name})");
        self.listeners
            .notify(|listener| listener.component_added(&name, &type_name));
        Ok(())
    }

    /// Add a component of `type_name` with raw property values.
    pub fn add_component<I, K, V>(
        &self,
        type_name: &str,
        name: &str,
        properties: I,
    ) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<PropertyValue>,
    {
        let mut record = RawRecord::new(name, type_name);
        for (key, value) in properties {
            record.set_property(key, value);
        }
        self.add_record(record)
    }

    /// Add a live component under `name`, importing its nested components.
    pub fn add_configurable(
        &self,
        component: &ComponentHandle,
        name: &str,
    ) -> Result<(), ConfigError> {
        if self.contains(name) {
            return Err(ConfigError::duplicate(
                name,
                format!("component '{name}' is already defined"),
            ));
        }
        let assigned = self.import_configurable(component, name)?;
        if assigned != name {
            return Err(ConfigError::duplicate(
                name,
                format!("instance is already managed as '{assigned}'"),
            ));
        }
        Ok(())
    }

    /// Evict a component and everything recorded about it.
    ///
    /// Its worker thread, if any, keeps running and stays joinable under the
    /// old name until it exits. Returns false when the name is unknown.
    pub fn remove(&self, name: &str) -> bool {
        let removed = self.state.write().remove_record(name);
        let Some((_, sheet)) = removed else {
            return false;
        };
        let owner = sheet.and_then(|sheet| {
            let owner = sheet.owner();
            sheet.mark_removed();
            owner
        });
        self.withdraw(name);
        self.workers.release(name);
        info!("removed component (name={name})");
        self.listeners
            .notify(|listener| listener.component_removed(name, owner.as_ref()));
        true
    }

    /// Re-apply configuration to a managed instance.
    pub fn reconfigure(&self, component: &ComponentHandle) -> Result<(), ConfigError> {
        let name = self.name_of(component).ok_or_else(|| {
            ConfigError::unknown_reference(
                component.type_name(),
                None,
                "component is not managed by this configuration manager",
            )
        })?;
        if let Some(sheet) = self.property_sheet(&name)? {
            sheet.reconfigure(self)?;
        }
        Ok(())
    }

    /// Drop a cached instance so the next lookup resolves it again.
    pub fn invalidate(&self, name: &str) -> bool {
        let sheet = self.state.read().sheets.get(name).cloned();
        let Some(sheet) = sheet else {
            return false;
        };
        let previous = sheet.clear_owner();
        if let Some(previous) = &previous {
            self.state.write().instances.remove(&previous.id());
        }
        debug!("invalidated component (name={name})");
        previous.is_some()
    }

    /// Edit one property of a record.
    ///
    /// An instantiated owner is reconfigured with the new value. When that
    /// fails, the previous value is restored and re-applied.
    pub fn set_property(
        &self,
        instance: &str,
        property: &str,
        value: impl Into<PropertyValue>,
    ) -> Result<(), ConfigError> {
        let previous = self
            .record(instance)
            .and_then(|record| record.property(property).cloned());
        let sheet = self.write_property(instance, property, Some(value.into()))?;
        if let Some(sheet) = sheet {
            if let Err(err) = sheet.reconfigure(self) {
                warn!(
                    "restoring property after failed edit (name={instance}, property={property})"
                );
                self.write_property(instance, property, previous)?;
                if let Err(restore) = sheet.reconfigure(self) {
                    warn!(
                        "failed to re-apply restored property (name={instance}, error={restore})"
                    );
                }
                return Err(err);
            }
        }
        self.listeners
            .notify(|listener| listener.configuration_changed(instance, property));
        Ok(())
    }

    /// Store a raw property value, or remove it with `None`.
    fn write_property(
        &self,
        instance: &str,
        property: &str,
        value: Option<PropertyValue>,
    ) -> Result<Option<Arc<PropertySheet>>, ConfigError> {
        let mut state = self.state.write();
        let Some(record) = state.records.get(instance) else {
            return Err(ConfigError::unknown_reference(
                instance,
                Some(property),
                format!("no component named '{instance}'"),
            ));
        };
        let descriptor = self.descriptor_for(record)?;
        if descriptor.field(property).is_none() {
            return Err(ConfigError::unknown_property(
                instance,
                property,
                format!("is not a property of {}", descriptor.type_name()),
            ));
        }
        let update = |record: &mut RawRecord| {
            match &value {
                Some(value) => record.set_property(property, value.clone()),
                None => record.remove_property(property),
            };
        };
        let mut record = record.clone();
        update(&mut record);
        state.references.reindex(&record, &descriptor);
        state.records.insert(instance.to_string(), record);
        let sheet = state.sheets.get(instance).cloned();
        if let Some(sheet) = &sheet {
            sheet.update_record(update);
        }
        Ok(sheet)
    }

    /// Fully resolved value of a global property.
    pub fn global_property(&self, name: &str) -> Result<Option<String>, ConfigError> {
        self.with_globals(|globals| globals.resolved(GlobalProperties::stripped_name(name)))
    }

    /// Snapshot of the global table.
    pub fn global_properties(&self) -> GlobalProperties {
        self.with_globals(Clone::clone)
    }

    /// Set a global property and re-apply configuration to every instantiated component.
    ///
    /// The value must resolve before it is stored. If re-applying fails, the
    /// previous value is restored.
    pub fn set_global_property(&self, name: &str, value: &str) -> Result<(), ConfigError> {
        let previous = {
            let mut state = self.state.write();
            let mut staged = state.globals.clone();
            staged.set_value(name, value)?;
            staged.resolved(name)?;
            let previous = state.globals.raw(name).map(str::to_string);
            state.globals = staged;
            previous
        };
        if let Err(err) = self.reconfigure_instantiated() {
            warn!("restoring global property after failed edit (name={name})");
            {
                let mut state = self.state.write();
                match previous {
                    Some(previous) => state.globals.set_value(name, previous)?,
                    None => {
                        state.globals.remove(name);
                    }
                }
            }
            if let Err(restore) = self.reconfigure_instantiated() {
                warn!("failed to re-apply restored globals (name={name}, error={restore})");
            }
            return Err(err);
        }
        self.listeners
            .notify(|listener| listener.configuration_changed(GLOBAL_SCOPE, name));
        Ok(())
    }

    /// Remove a global property, returning its raw value.
    pub fn remove_global_property(&self, name: &str) -> Option<String> {
        self.state.write().globals.remove(name)
    }

    fn reconfigure_instantiated(&self) -> Result<(), ConfigError> {
        let sheets = {
            let state = self.state.read();
            state
                .order
                .iter()
                .filter_map(|name| state.sheets.get(name).cloned())
                .collect::<Vec<_>>()
        };
        for sheet in sheets {
            sheet.reconfigure(self)?;
        }
        Ok(())
    }

    /// Record names in declaration order.
    pub fn component_names(&self) -> Vec<String> {
        self.state.read().order.clone()
    }

    /// Names of components with a cached instance, in declaration order.
    pub fn instantiated_names(&self) -> Vec<String> {
        let state = self.state.read();
        state
            .order
            .iter()
            .filter(|name| {
                state
                    .sheets
                    .get(name.as_str())
                    .is_some_and(|sheet| sheet.is_instantiated())
            })
            .cloned()
            .collect()
    }

    /// Number of components with a cached instance.
    pub fn num_instantiated(&self) -> usize {
        self.instantiated_names().len()
    }

    /// Raw record by instance name.
    pub fn record(&self, name: &str) -> Option<RawRecord> {
        self.state.read().records.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.state.read().records.contains_key(name)
    }

    /// Whether the record was added programmatically.
    pub fn is_added(&self, name: &str) -> bool {
        self.state.read().added.contains(name)
    }

    /// Instance name of a managed component.
    pub fn name_of(&self, component: &ComponentHandle) -> Option<String> {
        self.state.read().instances.get(&component.id()).cloned()
    }

    /// Register a change listener.
    pub fn add_listener(&self, listener: Arc<dyn ConfigurationChangeListener>) {
        self.listeners.add(listener);
    }

    /// Unregister a change listener by identity.
    pub fn remove_listener(&self, listener: &Arc<dyn ConfigurationChangeListener>) -> bool {
        self.listeners.remove(listener)
    }

    /// Block until the worker thread of `name` exits.
    ///
    /// Returns false when the component has no worker.
    pub fn join(&self, name: &str) -> Result<bool, ConfigError> {
        self.workers.join(name)
    }

    /// Request cancellation of the worker thread of `name`.
    pub fn cancel(&self, name: &str) -> bool {
        self.workers.cancel(name)
    }

    /// Whether the worker of `name` finished, or `None` when it has none.
    pub fn is_done(&self, name: &str) -> Option<bool> {
        self.workers.is_done(name)
    }

    /// Cancel every worker and withdraw every registration made here.
    pub fn shutdown(&self) {
        self.workers.cancel_all();
        let registrations = std::mem::take(&mut *self.registrations.lock());
        let binding = self.registry.read().clone();
        for (name, handle) in registrations {
            if let Some(Err(err)) = binding.with_any(|registry| registry.unregister(&handle)) {
                warn!("failed to unregister component (name={name}, error={err})");
            }
        }
        info!("configuration manager shut down (id={})", self.id);
    }

    /// Shut down, then wait for every worker thread to exit.
    pub fn close(&self) -> Result<(), ConfigError> {
        self.shutdown();
        let joined = self.workers.join_all()?;
        info!("configuration manager closed (id={}, workers={joined})", self.id);
        Ok(())
    }

    /// Install a registry backend.
    pub fn set_registry(&self, registry: Arc<dyn ComponentRegistry>) {
        *self.registry.write() = RegistryBinding::Direct(registry);
    }

    /// Remove the registry backend.
    pub fn clear_registry(&self) {
        *self.registry.write() = RegistryBinding::Absent;
    }

    /// Whether lookups may be satisfied from a registry.
    pub fn has_active_registry(&self) -> bool {
        self.registry.read().with_active(|_| ()).is_some()
    }

    /// Renew every lease held for components exported here.
    pub fn renew_leases(&self) -> Result<usize, ConfigError> {
        let registrations = self.registrations.lock().clone();
        let binding = self.registry.read().clone();
        let mut renewed = 0;
        for (_, handle) in &registrations {
            if let Some(result) = binding.with_any(|registry| registry.renew_lease(handle)) {
                result?;
                renewed += 1;
            }
        }
        Ok(renewed)
    }

    fn setup_registry(&self) -> Result<(), ConfigError> {
        if !matches!(*self.registry.read(), RegistryBinding::Absent)
            || !self.contains(REGISTRY_COMPONENT)
        {
            return Ok(());
        }
        let Some(handle) = self.lookup(REGISTRY_COMPONENT)? else {
            return Ok(());
        };
        let exposes = handle.read().as_registry().is_some();
        if exposes {
            info!("installed configured registry (type={})", handle.type_name());
            *self.registry.write() = RegistryBinding::Component(handle);
        } else {
            warn!(
                "component named registry does not expose a registry (type={})",
                handle.type_name()
            );
        }
        Ok(())
    }

    /// Whether the registry should be asked for this record before constructing it.
    pub(crate) fn consults_registry(
        &self,
        record: &RawRecord,
        descriptor: &ComponentDescriptor,
    ) -> bool {
        if record.exportable || !self.has_active_registry() {
            return false;
        }
        (record.properties.is_empty() && descriptor.remote_capable()) || record.importable
    }

    /// Ask the registry for an instance, retrying per its lookup policy.
    pub(crate) fn registry_lookup(
        &self,
        record: &RawRecord,
    ) -> Result<Option<ComponentHandle>, ConfigError> {
        let matchers = match &record.entries_group {
            Some(group) => Some(self.entries_metadata(&record.instance_name, group)?),
            None => None,
        };
        let binding = self.registry.read().clone();
        let found = binding.with_active(|registry| {
            let policy = registry.lookup_policy();
            let tries = policy.tries.max(1);
            for attempt in 1..=tries {
                let found = match &matchers {
                    Some(matchers) => registry.lookup_by_properties(&record.type_name, matchers),
                    None => registry
                        .lookup_by_type(&record.type_name, 1)
                        .into_iter()
                        .next(),
                };
                if found.is_some() {
                    return found;
                }
                if attempt < tries {
                    thread::sleep(policy.wait);
                }
            }
            debug!(
                "registry lookup exhausted (name={}, type={}, tries={tries})",
                record.instance_name, record.type_name
            );
            None
        });
        Ok(found.flatten())
    }

    fn export_component(
        &self,
        record: &RawRecord,
        descriptor: &ComponentDescriptor,
        handle: &ComponentHandle,
    ) -> Result<(), ConfigError> {
        let metadata = match &record.entries_group {
            Some(group) => self.entries_metadata(&record.instance_name, group)?,
            None => BTreeMap::new(),
        };
        let registration = Registration {
            instance_name: record.instance_name.clone(),
            component: handle.clone(),
            type_names: descriptor.type_names(),
            lease: Duration::from_millis(record.effective_lease_millis()),
            metadata,
        };
        let binding = self.registry.read().clone();
        match binding.with_active(|registry| registry.register(registration)) {
            Some(result) => {
                let registered = result?;
                self.registrations
                    .lock()
                    .push((record.instance_name.clone(), registered));
            }
            None => debug!(
                "no active registry, component not exported (name={})",
                record.instance_name
            ),
        }
        Ok(())
    }

    /// Scalar properties of the record named by an `entries` group.
    fn entries_metadata(
        &self,
        instance: &str,
        group: &str,
    ) -> Result<BTreeMap<String, String>, ConfigError> {
        let state = self.state.read();
        let record = state.records.get(group).ok_or_else(|| {
            ConfigError::unknown_reference(
                instance,
                Some("entries"),
                format!("no component named '{group}'"),
            )
        })?;
        let flattened = record.flatten(&state.globals)?;
        Ok(flattened
            .properties
            .iter()
            .map(|(key, value)| (key.clone(), value.to_string()))
            .collect())
    }

    /// Withdraw registry registrations made for `name`.
    fn withdraw(&self, name: &str) {
        let withdrawn = {
            let mut registrations = self.registrations.lock();
            let (withdrawn, kept): (Vec<_>, Vec<_>) = registrations
                .drain(..)
                .partition(|(instance, _)| instance == name);
            *registrations = kept;
            withdrawn
        };
        if withdrawn.is_empty() {
            return;
        }
        let binding = self.registry.read().clone();
        for (_, handle) in withdrawn {
            if let Some(Err(err)) = binding.with_any(|registry| registry.unregister(&handle)) {
                warn!("failed to unregister component (name={name}, error={err})");
            }
        }
    }
}

impl std::fmt::Debug for ConfigurationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("ConfigurationManager")
            .field("id", &self.id)
            .field("components", &state.order)
            .field("globals", &state.globals.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
