//! Typed read access to a record while a component configures itself.

use crate::component::{ComponentHandle, ComponentType};
use crate::convert::{self, FromProperty, ResolveContext, Resolved};
use crate::descriptor::{ComponentDescriptor, FieldSpec};
use crate::manager::ConfigurationManager;
use confgraph_config::{ConfigError, PropertyValue, RawRecord};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// Resolved view over one record, handed to [`Configurable::configure`].
///
/// Scalar values are already substituted against the global table. List and
/// map elements are substituted when read. Every accessor rejects names the
/// component type does not declare.
///
/// [`Configurable::configure`]: crate::Configurable::configure
pub struct PropertySet<'a> {
    manager: &'a ConfigurationManager,
    descriptor: &'a ComponentDescriptor,
    record: RawRecord,
}

impl<'a> PropertySet<'a> {
    pub(crate) fn new(
        manager: &'a ConfigurationManager,
        descriptor: &'a ComponentDescriptor,
        record: &RawRecord,
    ) -> Result<Self, ConfigError> {
        let record = manager.with_globals(|globals| record.flatten(globals))?;
        Ok(Self {
            manager,
            descriptor,
            record,
        })
    }

    /// Instance being configured.
    pub fn instance_name(&self) -> &str {
        &self.record.instance_name
    }

    /// Declared type of the instance.
    pub fn type_name(&self) -> &str {
        self.descriptor.type_name()
    }

    /// Manager that owns the instance.
    pub fn manager(&self) -> &ConfigurationManager {
        self.manager
    }

    /// Names of every declared field, in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.descriptor
            .fields()
            .iter()
            .map(|field| field.name.as_str())
    }

    /// Whether the field has a value or a default.
    pub fn has(&self, name: &str) -> bool {
        self.descriptor
            .field(name)
            .is_some_and(|field| self.record.property(name).is_some() || field.default.is_some())
    }

    /// Raw value of a field after scalar substitution, falling back to its default.
    pub fn raw(&self, name: &str) -> Result<Option<&PropertyValue>, ConfigError> {
        let field = self.field(name)?;
        Ok(self.record.property(name).or(field.default.as_ref()))
    }

    /// Converted value of a field, or `None` when it has no value and no default.
    pub fn resolve(&self, name: &str) -> Result<Option<Resolved>, ConfigError> {
        let field = self.field(name)?;
        match self.record.property(name).or(field.default.as_ref()) {
            Some(raw) => convert::resolve(self, field, raw).map(Some),
            None if field.mandatory => Err(ConfigError::mandatory(self.instance_name(), name)),
            None => Ok(None),
        }
    }

    /// Converted value of a field as `T`.
    pub fn get<T: FromProperty>(&self, name: &str) -> Result<Option<T>, ConfigError> {
        match self.resolve(name)? {
            Some(value) => T::from_resolved(value)
                .map(Some)
                .map_err(|message| ConfigError::conversion(self.instance_name(), name, message)),
            None => Ok(None),
        }
    }

    /// Converted value of a field that must be present.
    pub fn require<T: FromProperty>(&self, name: &str) -> Result<T, ConfigError> {
        self.get(name)?
            .ok_or_else(|| ConfigError::mandatory(self.instance_name(), name))
    }

    /// Overwrite `target` when the field has a value; leave it untouched otherwise.
    pub fn assign<T: FromProperty>(&self, name: &str, target: &mut T) -> Result<(), ConfigError> {
        if let Some(value) = self.get(name)? {
            *target = value;
        }
        Ok(())
    }

    pub fn string(&self, name: &str) -> Result<Option<String>, ConfigError> {
        self.get(name)
    }

    pub fn integer(&self, name: &str) -> Result<Option<i64>, ConfigError> {
        self.get(name)
    }

    pub fn float(&self, name: &str) -> Result<Option<f64>, ConfigError> {
        self.get(name)
    }

    pub fn boolean(&self, name: &str) -> Result<Option<bool>, ConfigError> {
        self.get(name)
    }

    pub fn path(&self, name: &str) -> Result<Option<PathBuf>, ConfigError> {
        self.get(name)
    }

    /// List of strings, empty when absent.
    pub fn string_list(&self, name: &str) -> Result<Vec<String>, ConfigError> {
        Ok(self.get(name)?.unwrap_or_default())
    }

    /// Referenced component, constructed on demand.
    pub fn component(&self, name: &str) -> Result<Option<ComponentHandle>, ConfigError> {
        self.get(name)
    }

    /// Referenced component as its concrete type.
    pub fn component_as<T: ComponentType>(
        &self,
        name: &str,
    ) -> Result<Option<Arc<RwLock<T>>>, ConfigError> {
        match self.component(name)? {
            Some(handle) => self.downcast(name, &handle).map(Some),
            None => Ok(None),
        }
    }

    /// Referenced components, empty when absent.
    pub fn components(&self, name: &str) -> Result<Vec<ComponentHandle>, ConfigError> {
        Ok(self.get(name)?.unwrap_or_default())
    }

    /// Referenced components as their concrete type.
    pub fn components_as<T: ComponentType>(
        &self,
        name: &str,
    ) -> Result<Vec<Arc<RwLock<T>>>, ConfigError> {
        self.components(name)?
            .iter()
            .map(|handle| self.downcast(name, handle))
            .collect()
    }

    /// Referenced components keyed by map entry, empty when absent.
    pub fn component_map(
        &self,
        name: &str,
    ) -> Result<BTreeMap<String, ComponentHandle>, ConfigError> {
        Ok(self.get(name)?.unwrap_or_default())
    }

    /// Enum variant parsed into `E`.
    pub fn enumeration<E: FromStr>(&self, name: &str) -> Result<Option<E>, ConfigError> {
        match self.string(name)? {
            Some(variant) => self.parse_variant(name, &variant).map(Some),
            None => Ok(None),
        }
    }

    /// Enum-set variants parsed into `E`, empty when absent.
    pub fn enum_set<E: FromStr + Ord>(&self, name: &str) -> Result<BTreeSet<E>, ConfigError> {
        self.string_list(name)?
            .iter()
            .map(|variant| self.parse_variant(name, variant))
            .collect()
    }

    fn parse_variant<E: FromStr>(&self, name: &str, variant: &str) -> Result<E, ConfigError> {
        variant.parse::<E>().map_err(|_| {
            ConfigError::conversion(
                self.instance_name(),
                name,
                format!("'{variant}' does not name a variant"),
            )
        })
    }

    fn downcast<T: ComponentType>(
        &self,
        name: &str,
        handle: &ComponentHandle,
    ) -> Result<Arc<RwLock<T>>, ConfigError> {
        handle.downcast::<T>().ok_or_else(|| {
            ConfigError::conversion(
                self.instance_name(),
                name,
                format!("expected a {}, found a {}", T::TYPE_NAME, handle.type_name()),
            )
        })
    }

    fn field(&self, name: &str) -> Result<&FieldSpec, ConfigError> {
        self.descriptor.field(name).ok_or_else(|| {
            ConfigError::unknown_property(
                self.instance_name(),
                name,
                format!("is not a property of {}", self.descriptor.type_name()),
            )
        })
    }
}

impl ResolveContext for PropertySet<'_> {
    fn instance_name(&self) -> &str {
        &self.record.instance_name
    }

    fn substitute(&self, field: &str, text: &str) -> Result<String, ConfigError> {
        self.manager.with_globals(|globals| {
            globals.replace_global_properties(&self.record.instance_name, Some(field), text)
        })
    }

    fn component(&self, field: &str, name: &str) -> Result<ComponentHandle, ConfigError> {
        self.manager.lookup(name)?.ok_or_else(|| {
            ConfigError::unknown_reference(
                &self.record.instance_name,
                Some(field),
                format!("no component named '{name}'"),
            )
        })
    }

    fn components_of_type(
        &self,
        _field: &str,
        type_name: &str,
    ) -> Result<Vec<ComponentHandle>, ConfigError> {
        self.manager.lookup_all(type_name)
    }

    fn conforms(&self, actual: &str, expected: &str) -> bool {
        self.manager.catalog().conforms(actual, expected)
    }
}
