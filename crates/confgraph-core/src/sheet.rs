//! Property sheets: one record bound to its type descriptor and lazy owner.

use crate::component::ComponentHandle;
use crate::descriptor::ComponentDescriptor;
use crate::manager::ConfigurationManager;
use crate::properties::PropertySet;
use confgraph_config::{ConfigError, PropertyValue, RawRecord};
use log::{debug, info};
use parking_lot::{Mutex, RwLock};
use std::cell::RefCell;
use std::sync::Arc;

/// Lifecycle of a property sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetStatus {
    /// Record bound to its descriptor, nothing constructed yet.
    Bound,
    /// Owner constructed (or obtained from a registry).
    Instantiated,
    /// Configuration re-applied to the existing owner.
    Reconfigured,
    /// Cached owner dropped; the next lookup re-resolves.
    Cleared,
    /// Evicted from its manager.
    Removed,
}

/// Outcome of resolving a sheet's owner.
pub(crate) struct OwnerResolution {
    pub(crate) handle: Option<ComponentHandle>,
    /// Constructed locally by this call.
    pub(crate) created: bool,
}

thread_local! {
    static CONSTRUCTING: RefCell<Vec<(u64, String)>> = const { RefCell::new(Vec::new()) };
}

/// Marks an instance as under construction on the current thread.
struct ConstructionGuard;

impl ConstructionGuard {
    fn enter(manager: u64, name: &str) -> Result<Self, ConfigError> {
        CONSTRUCTING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.iter().any(|(owner, active)| *owner == manager && active == name) {
                let chain = stack
                    .iter()
                    .filter(|(owner, _)| *owner == manager)
                    .map(|(_, active)| active.as_str())
                    .chain(std::iter::once(name))
                    .collect::<Vec<_>>()
                    .join(" -> ");
                return Err(ConfigError::cycle(
                    name,
                    None,
                    format!("component reference cycle: {chain}"),
                ));
            }
            stack.push((manager, name.to_string()));
            Ok(Self)
        })
    }
}

impl Drop for ConstructionGuard {
    fn drop(&mut self) {
        CONSTRUCTING.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// A raw record bound to the field metadata of its type.
pub struct PropertySheet {
    descriptor: Arc<ComponentDescriptor>,
    record: RwLock<RawRecord>,
    owner: Mutex<Option<ComponentHandle>>,
    status: RwLock<SheetStatus>,
}

impl std::fmt::Debug for PropertySheet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertySheet")
            .field("instance_name", &self.record.read().instance_name)
            .field("type_name", &self.descriptor.type_name())
            .field("status", &self.status())
            .finish()
    }
}

impl PropertySheet {
    /// Bind a record, rejecting properties the type does not declare.
    pub(crate) fn bind(
        descriptor: Arc<ComponentDescriptor>,
        record: RawRecord,
    ) -> Result<Self, ConfigError> {
        check_declared(&descriptor, &record)?;
        Ok(Self {
            descriptor,
            record: RwLock::new(record),
            owner: Mutex::new(None),
            status: RwLock::new(SheetStatus::Bound),
        })
    }

    pub fn instance_name(&self) -> String {
        self.record.read().instance_name.clone()
    }

    pub fn type_name(&self) -> &str {
        self.descriptor.type_name()
    }

    pub fn descriptor(&self) -> &Arc<ComponentDescriptor> {
        &self.descriptor
    }

    pub fn status(&self) -> SheetStatus {
        *self.status.read()
    }

    /// Whether an owner is currently cached.
    pub fn is_instantiated(&self) -> bool {
        matches!(
            self.status(),
            SheetStatus::Instantiated | SheetStatus::Reconfigured
        )
    }

    /// Cached owner, without constructing.
    pub fn owner(&self) -> Option<ComponentHandle> {
        self.owner.lock().clone()
    }

    /// Raw, unresolved value of a property.
    pub fn raw_property(&self, name: &str) -> Option<PropertyValue> {
        self.record.read().property(name).cloned()
    }

    /// The raw, unresolved record.
    pub fn to_record(&self) -> RawRecord {
        self.record.read().clone()
    }

    /// Unbound duplicate: same record, no owner.
    pub fn clone_unbound(&self) -> PropertySheet {
        PropertySheet {
            descriptor: self.descriptor.clone(),
            record: RwLock::new(self.to_record()),
            owner: Mutex::new(None),
            status: RwLock::new(SheetStatus::Bound),
        }
    }

    /// Shallow configuration equality: same type and property key sets.
    pub fn config_eq(&self, other: &PropertySheet) -> bool {
        self.type_name() == other.type_name() && self.record.read().config_eq(&other.record.read())
    }

    pub(crate) fn update_record(&self, update: impl FnOnce(&mut RawRecord)) {
        update(&mut self.record.write());
    }

    pub(crate) fn bind_owner(&self, handle: ComponentHandle) {
        *self.owner.lock() = Some(handle);
        *self.status.write() = SheetStatus::Instantiated;
    }

    /// Drop the cached owner so the next lookup re-resolves.
    pub(crate) fn clear_owner(&self) -> Option<ComponentHandle> {
        let previous = self.owner.lock().take();
        *self.status.write() = SheetStatus::Cleared;
        previous
    }

    pub(crate) fn mark_removed(&self) {
        self.owner.lock().take();
        *self.status.write() = SheetStatus::Removed;
    }

    /// Return the cached owner or resolve a new one.
    ///
    /// Concurrent callers for the same sheet are serialized; a thread that
    /// re-enters an instance it is already constructing gets a `Cycle` error.
    pub(crate) fn get_owner(
        &self,
        manager: &ConfigurationManager,
        reuse: bool,
    ) -> Result<OwnerResolution, ConfigError> {
        if reuse {
            let cached = self.owner.try_lock().and_then(|owner| owner.clone());
            if let Some(handle) = cached {
                return Ok(OwnerResolution {
                    handle: Some(handle),
                    created: false,
                });
            }
        }

        let name = self.instance_name();
        let _guard = ConstructionGuard::enter(manager.id(), &name)?;
        let mut owner = self.owner.lock();
        if let (true, Some(handle)) = (reuse, owner.as_ref()) {
            return Ok(OwnerResolution {
                handle: Some(handle.clone()),
                created: false,
            });
        }

        let record = self.to_record();
        if manager.consults_registry(&record, &self.descriptor) {
            if let Some(handle) = manager.registry_lookup(&record)? {
                info!("resolved component from registry (name={name})");
                *owner = Some(handle.clone());
                *self.status.write() = SheetStatus::Instantiated;
                return Ok(OwnerResolution {
                    handle: Some(handle),
                    created: false,
                });
            }
            if record.is_import_only() {
                debug!("import-only component not found in registry (name={name})");
                return Ok(OwnerResolution {
                    handle: None,
                    created: false,
                });
            }
        }

        self.check_mandatory(&record)?;
        let handle = self.descriptor.instantiate().ok_or_else(|| {
            ConfigError::construction(
                &name,
                format!("{} has no local constructor", self.descriptor.type_name()),
            )
        })?;
        self.apply(manager, &handle, &record)?;
        debug!(
            "constructed component (name={name}, type={})",
            self.descriptor.type_name()
        );
        *owner = Some(handle.clone());
        *self.status.write() = SheetStatus::Instantiated;
        Ok(OwnerResolution {
            handle: Some(handle),
            created: true,
        })
    }

    /// Re-apply current values to the existing owner.
    ///
    /// Returns false when nothing is instantiated.
    pub(crate) fn reconfigure(&self, manager: &ConfigurationManager) -> Result<bool, ConfigError> {
        let Some(handle) = self.owner() else {
            return Ok(false);
        };
        let record = self.to_record();
        self.check_mandatory(&record)?;
        self.apply(manager, &handle, &record)?;
        *self.status.write() = SheetStatus::Reconfigured;
        debug!("reconfigured component (name={})", record.instance_name);
        Ok(true)
    }

    fn apply(
        &self,
        manager: &ConfigurationManager,
        handle: &ComponentHandle,
        record: &RawRecord,
    ) -> Result<(), ConfigError> {
        let props = PropertySet::new(manager, &self.descriptor, record)?;
        let mut component = handle.write();
        component.configure(&props)?;
        component.post_config()
    }

    fn check_mandatory(&self, record: &RawRecord) -> Result<(), ConfigError> {
        match self.descriptor.fields().iter().find(|field| {
            field.mandatory && field.default.is_none() && record.property(&field.name).is_none()
        }) {
            Some(field) => Err(ConfigError::mandatory(&record.instance_name, &field.name)),
            None => Ok(()),
        }
    }
}

/// Reject properties the descriptor does not declare.
pub(crate) fn check_declared(
    descriptor: &ComponentDescriptor,
    record: &RawRecord,
) -> Result<(), ConfigError> {
    match record
        .property_names()
        .find(|name| descriptor.field(name).is_none())
    {
        Some(name) => Err(ConfigError::unknown_property(
            &record.instance_name,
            name,
            format!("is not a property of {}", descriptor.type_name()),
        )),
        None => Ok(()),
    }
}
