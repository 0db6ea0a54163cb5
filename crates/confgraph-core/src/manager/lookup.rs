use super::ConfigurationManager;
use crate::catalog::TypeKind;
use crate::component::{ComponentHandle, ComponentType};
use confgraph_config::ConfigError;
use parking_lot::RwLock;
use rand::seq::SliceRandom;
use std::collections::BTreeMap;
use std::sync::Arc;

impl ConfigurationManager {
    /// Look up a component as its concrete type.
    pub fn lookup_as<T: ComponentType>(
        &self,
        name: &str,
    ) -> Result<Option<Arc<RwLock<T>>>, ConfigError> {
        match self.lookup(name)? {
            Some(handle) => handle.downcast::<T>().map(Some).ok_or_else(|| {
                ConfigError::TypeConversion {
                    instance: name.to_string(),
                    field: None,
                    message: format!("expected a {}, found a {}", T::TYPE_NAME, handle.type_name()),
                }
            }),
            None => Ok(None),
        }
    }

    /// Every instance of a type.
    ///
    /// A concrete type gathers the local records declared with exactly that
    /// type, in declaration order. An interface type asks the registry when
    /// one is active and otherwise the records whose concrete type implements
    /// it, never both. Importable records are skipped locally.
    pub fn lookup_all(&self, type_name: &str) -> Result<Vec<ComponentHandle>, ConfigError> {
        if self.catalog.classify(type_name) == TypeKind::Concrete || !self.has_active_registry() {
            let mut found = Vec::new();
            for name in self.instance_names(type_name) {
                if let Some(handle) = self.lookup(&name)? {
                    found.push(handle);
                }
            }
            return Ok(found);
        }
        let binding = self.registry.read().clone();
        Ok(binding
            .with_active(|registry| registry.lookup_by_type(type_name, usize::MAX))
            .unwrap_or_default())
    }

    /// Local instances of a type keyed by instance name.
    pub fn lookup_all_map(
        &self,
        type_name: &str,
    ) -> Result<BTreeMap<String, ComponentHandle>, ConfigError> {
        let mut found = BTreeMap::new();
        for name in self.instance_names(type_name) {
            if let Some(handle) = self.lookup(&name)? {
                found.insert(name, handle);
            }
        }
        Ok(found)
    }

    /// The only instance of a type.
    ///
    /// Returns `None` when there is none, and `DuplicateName` when more than
    /// one instance provides the type.
    pub fn lookup_singleton(&self, type_name: &str) -> Result<Option<ComponentHandle>, ConfigError> {
        let mut found = self.lookup_all(type_name)?;
        if found.len() > 1 {
            return Err(ConfigError::duplicate(
                type_name,
                format!("{} instances of {type_name} exist, expected one", found.len()),
            ));
        }
        Ok(found.pop())
    }

    /// Every instance of `T`, by its type name.
    pub fn lookup_all_as<T: ComponentType>(&self) -> Result<Vec<Arc<RwLock<T>>>, ConfigError> {
        Ok(self
            .lookup_all(T::TYPE_NAME)?
            .iter()
            .filter_map(|handle| handle.downcast::<T>())
            .collect())
    }

    /// Any one instance of a type.
    ///
    /// Follows the sources of [`lookup_all`](Self::lookup_all); local
    /// candidates are picked at random.
    pub fn lookup_by_type(&self, type_name: &str) -> Result<Option<ComponentHandle>, ConfigError> {
        if self.catalog.classify(type_name) == TypeKind::Concrete || !self.has_active_registry() {
            let mut names = self.instance_names(type_name);
            names.shuffle(&mut rand::rng());
            for name in names {
                if let Some(handle) = self.lookup(&name)? {
                    return Ok(Some(handle));
                }
            }
            return Ok(None);
        }
        let binding = self.registry.read().clone();
        Ok(binding
            .with_active(|registry| registry.lookup_by_type(type_name, 1).into_iter().next())
            .flatten())
    }

    /// Names of local, non-importable records that provide `type_name`.
    ///
    /// Concrete types match exactly; interface types match every concretely
    /// typed record that implements them.
    pub fn instance_names(&self, type_name: &str) -> Vec<String> {
        let exact = self.catalog.classify(type_name) == TypeKind::Concrete;
        let state = self.state.read();
        state
            .order
            .iter()
            .filter_map(|name| state.records.get(name))
            .filter(|record| !record.importable)
            .filter(|record| {
                if exact {
                    record.type_name == type_name
                } else {
                    self.catalog.classify(&record.type_name) == TypeKind::Concrete
                        && self.catalog.conforms(&record.type_name, type_name)
                }
            })
            .map(|record| record.instance_name.clone())
            .collect()
    }
}
