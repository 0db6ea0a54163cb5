//! Pluggable component registry backends.
//!
//! A registry publishes exportable components and satisfies importable ones.
//! The manager talks to it only through [`ComponentRegistry`]; with no backend
//! installed it behaves as if the registry were always empty.

mod memory;
mod noop;

pub use memory::InMemoryRegistry;
pub use noop::NoRegistry;

use crate::component::ComponentHandle;
use confgraph_config::ConfigError;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Default number of registry lookup attempts.
pub const DEFAULT_LOOKUP_TRIES: u32 = 50;
/// Default wait between registry lookup attempts.
pub const DEFAULT_LOOKUP_WAIT: Duration = Duration::from_millis(2);

/// Retry policy for registry lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookupPolicy {
    /// Attempts before giving up.
    pub tries: u32,
    /// Wait between attempts.
    pub wait: Duration,
}

impl Default for LookupPolicy {
    fn default() -> Self {
        Self {
            tries: DEFAULT_LOOKUP_TRIES,
            wait: DEFAULT_LOOKUP_WAIT,
        }
    }
}

/// Opaque handle to one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationHandle(Uuid);

impl RegistrationHandle {
    /// Fresh random handle.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RegistrationHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RegistrationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A component offered to a registry.
#[derive(Debug, Clone)]
pub struct Registration {
    /// Instance name in the publishing manager.
    pub instance_name: String,
    /// The published instance.
    pub component: ComponentHandle,
    /// Concrete type name followed by implemented interfaces.
    pub type_names: Vec<String>,
    /// Lease after which the registration lapses unless renewed.
    pub lease: Duration,
    /// Descriptive entries matched by property lookups.
    pub metadata: BTreeMap<String, String>,
}

impl Registration {
    /// Whether the registration satisfies `type_name`.
    pub fn provides(&self, type_name: &str) -> bool {
        self.type_names.iter().any(|name| name == type_name)
    }

    /// Whether every matcher appears in the metadata.
    pub fn matches(&self, matchers: &BTreeMap<String, String>) -> bool {
        matchers
            .iter()
            .all(|(key, value)| self.metadata.get(key) == Some(value))
    }
}

/// Registry backend used to publish and discover components.
pub trait ComponentRegistry: Send + Sync {
    /// Whether lookups may return anything. An inactive registry is never
    /// consulted.
    fn is_active(&self) -> bool {
        true
    }

    /// Retry policy the manager applies to lookups.
    fn lookup_policy(&self) -> LookupPolicy {
        LookupPolicy::default()
    }

    /// Publish a component.
    fn register(&self, registration: Registration) -> Result<RegistrationHandle, ConfigError>;

    /// Up to `max` live components providing `type_name`.
    fn lookup_by_type(&self, type_name: &str, max: usize) -> Vec<ComponentHandle>;

    /// First live component providing `type_name` whose metadata matches.
    fn lookup_by_properties(
        &self,
        type_name: &str,
        matchers: &BTreeMap<String, String>,
    ) -> Option<ComponentHandle>;

    /// Extend a registration's lease.
    fn renew_lease(&self, handle: &RegistrationHandle) -> Result<(), ConfigError>;

    /// Withdraw a registration.
    fn unregister(&self, handle: &RegistrationHandle) -> Result<(), ConfigError>;
}

/// Where a manager finds its registry.
#[derive(Clone, Default)]
pub(crate) enum RegistryBinding {
    #[default]
    Absent,
    /// Installed programmatically.
    Direct(Arc<dyn ComponentRegistry>),
    /// A configured component that exposes a registry.
    Component(ComponentHandle),
}

impl RegistryBinding {
    /// Run `f` against the bound registry when it is active.
    pub(crate) fn with_active<R>(&self, f: impl FnOnce(&dyn ComponentRegistry) -> R) -> Option<R> {
        match self {
            Self::Absent => None,
            Self::Direct(registry) if registry.is_active() => Some(f(registry.as_ref())),
            Self::Direct(_) => None,
            Self::Component(handle) => {
                let component = handle.read();
                match (*component).as_registry() {
                    Some(registry) if registry.is_active() => Some(f(registry)),
                    _ => None,
                }
            }
        }
    }

    /// Run `f` against the bound registry, active or not.
    pub(crate) fn with_any<R>(&self, f: impl FnOnce(&dyn ComponentRegistry) -> R) -> Option<R> {
        match self {
            Self::Absent => None,
            Self::Direct(registry) => Some(f(registry.as_ref())),
            Self::Component(handle) => {
                let component = handle.read();
                (*component).as_registry().map(f)
            }
        }
    }
}
