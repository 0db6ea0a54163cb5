//! Component traits and the shared handle used to reach constructed instances.

use crate::descriptor::FieldSpec;
use crate::export::ExportedProperties;
use crate::properties::PropertySet;
use crate::registry::ComponentRegistry;
use crate::worker::StartTask;
use confgraph_config::ConfigError;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Object-safe access to `Any` for trait objects.
pub trait AsAny: Any {
    /// Borrow as `&dyn Any`.
    fn as_any(&self) -> &dyn Any;
    /// Borrow as `&mut dyn Any`.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A component whose fields are assigned from configuration.
pub trait Configurable: AsAny + Send + Sync {
    /// Assign fields from resolved property values.
    ///
    /// Called once after construction and again on every reconfiguration.
    fn configure(&mut self, props: &PropertySet<'_>) -> Result<(), ConfigError>;

    /// Hook invoked after every successful `configure`.
    fn post_config(&mut self) -> Result<(), ConfigError> {
        Ok(())
    }

    /// Write current field values back out, for importing a live instance.
    fn export(&self, _out: &mut ExportedProperties) {}

    /// Work to run on a dedicated worker thread once constructed.
    fn start_task(&self) -> Option<StartTask> {
        None
    }

    /// Registry backend exposed by this component, if it is one.
    fn as_registry(&self) -> Option<&dyn ComponentRegistry> {
        None
    }
}

/// A concrete component type that can be registered in a type catalog.
pub trait ComponentType: Configurable + Default + Sized {
    /// Name used for this type in configuration documents.
    const TYPE_NAME: &'static str;

    /// Declared configurable fields.
    fn fields() -> Vec<FieldSpec>;

    /// Interface names this type implements.
    fn interfaces() -> Vec<String> {
        Vec::new()
    }

    /// Whether instances may be satisfied from a remote registry.
    fn remote_capable() -> bool {
        false
    }
}

/// Identity of a constructed instance, stable for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(usize);

/// Shared, type-erased reference to a constructed component.
#[derive(Clone)]
pub struct ComponentHandle {
    type_name: Arc<str>,
    any: Arc<dyn Any + Send + Sync>,
    dynamic: Arc<RwLock<dyn Configurable>>,
}

impl ComponentHandle {
    /// Wrap a freshly built component.
    pub fn new<T: ComponentType>(component: T) -> Self {
        Self::from_arc(Arc::new(RwLock::new(component)))
    }

    /// Wrap an already shared component.
    pub fn from_arc<T: ComponentType>(component: Arc<RwLock<T>>) -> Self {
        let dynamic: Arc<RwLock<dyn Configurable>> = component.clone();
        Self {
            type_name: Arc::from(T::TYPE_NAME),
            any: component,
            dynamic,
        }
    }

    /// Type name of the wrapped component.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Identity of the wrapped component.
    pub fn id(&self) -> ComponentId {
        ComponentId(Arc::as_ptr(&self.any) as *const () as usize)
    }

    /// Whether both handles point at the same instance.
    pub fn ptr_eq(&self, other: &ComponentHandle) -> bool {
        self.id() == other.id()
    }

    /// Shared access to the component.
    pub fn read(&self) -> RwLockReadGuard<'_, dyn Configurable> {
        self.dynamic.read()
    }

    /// Exclusive access to the component.
    pub fn write(&self) -> RwLockWriteGuard<'_, dyn Configurable> {
        self.dynamic.write()
    }

    /// Typed shared reference, if the component is a `T`.
    pub fn downcast<T: ComponentType>(&self) -> Option<Arc<RwLock<T>>> {
        self.any.clone().downcast::<RwLock<T>>().ok()
    }

    /// Whether the component is a `T`.
    pub fn is<T: ComponentType>(&self) -> bool {
        self.any.is::<RwLock<T>>()
    }

    /// Run `f` against the component as a `T`.
    pub fn with<T: ComponentType, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let guard = self.dynamic.read();
        (*guard).as_any().downcast_ref::<T>().map(f)
    }
}

impl PartialEq for ComponentHandle {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for ComponentHandle {}

impl fmt::Debug for ComponentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentHandle")
            .field("type_name", &self.type_name)
            .field("id", &self.id())
            .finish()
    }
}
