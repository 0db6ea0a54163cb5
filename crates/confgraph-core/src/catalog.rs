//! Registry of component types known to a configuration manager.

use crate::component::ComponentType;
use crate::descriptor::ComponentDescriptor;
use confgraph_config::ConfigError;
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;

/// How a type name is known to the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    /// A constructible component type.
    Concrete,
    /// An interface-shaped type: registered without a constructor or only
    /// named as an implemented interface.
    Interface,
    /// Not known at all.
    Unknown,
}

/// Component type descriptors keyed by type name.
#[derive(Debug, Default, Clone)]
pub struct TypeCatalog {
    types: HashMap<String, Arc<ComponentDescriptor>>,
}

impl TypeCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a concrete component type.
    pub fn register<T: ComponentType>(&mut self) -> Result<&mut Self, ConfigError> {
        self.register_descriptor(ComponentDescriptor::of::<T>())
    }

    /// Register an interface-shaped type with no local constructor.
    pub fn register_interface(
        &mut self,
        type_name: &str,
        remote_capable: bool,
    ) -> Result<&mut Self, ConfigError> {
        self.register_descriptor(
            ComponentDescriptor::interface(type_name).with_remote_capable(remote_capable),
        )
    }

    /// Register a prepared descriptor.
    pub fn register_descriptor(
        &mut self,
        descriptor: ComponentDescriptor,
    ) -> Result<&mut Self, ConfigError> {
        descriptor.validate()?;
        let type_name = descriptor.type_name().to_string();
        if self.types.contains_key(&type_name) {
            return Err(ConfigError::duplicate(
                type_name.clone(),
                format!("component type '{type_name}' is already registered"),
            ));
        }
        debug!(
            "registering component type (name={}, fields={})",
            type_name,
            descriptor.fields().len()
        );
        self.types.insert(type_name, Arc::new(descriptor));
        Ok(self)
    }

    /// Descriptor for a type name.
    pub fn get(&self, type_name: &str) -> Option<Arc<ComponentDescriptor>> {
        self.types.get(type_name).cloned()
    }

    /// Registered type names, sorted.
    pub fn type_names(&self) -> Vec<String> {
        let mut names = self.types.keys().cloned().collect::<Vec<_>>();
        names.sort();
        names
    }

    /// Classify a type name.
    pub fn classify(&self, type_name: &str) -> TypeKind {
        match self.types.get(type_name) {
            Some(descriptor) if descriptor.is_interface() => TypeKind::Interface,
            Some(_) => TypeKind::Concrete,
            None if self
                .types
                .values()
                .any(|descriptor| descriptor.implements(type_name)) =>
            {
                TypeKind::Interface
            }
            None => TypeKind::Unknown,
        }
    }

    /// Whether instances of `actual` may be used where `expected` is declared.
    pub fn conforms(&self, actual: &str, expected: &str) -> bool {
        if actual == expected {
            return true;
        }
        self.types
            .get(actual)
            .is_some_and(|descriptor| descriptor.implements(expected))
    }

    /// Concrete types that implement `interface`, sorted.
    pub fn implementers(&self, interface: &str) -> Vec<String> {
        let mut names = self
            .types
            .values()
            .filter(|descriptor| !descriptor.is_interface() && descriptor.implements(interface))
            .map(|descriptor| descriptor.type_name().to_string())
            .collect::<Vec<_>>();
        names.sort();
        names
    }
}
