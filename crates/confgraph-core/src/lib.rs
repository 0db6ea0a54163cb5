//! Object-graph assembly for confgraph.
//!
//! This crate turns raw records into live components: per-type field
//! descriptors, the type catalog, the conversion engine, property sheets, and
//! the configuration manager with its registry, listener, and worker plumbing.

pub mod catalog;
pub mod component;
mod convert;
pub mod descriptor;
pub mod export;
pub mod listener;
pub mod manager;
pub mod properties;
pub mod registry;
pub mod sheet;
mod worker;

/// Type catalog.
pub use catalog::{TypeCatalog, TypeKind};
/// Component traits and handles.
pub use component::{AsAny, ComponentHandle, ComponentId, ComponentType, Configurable};
/// Resolved values and typed conversion.
pub use convert::{FromProperty, Resolved};
/// Field metadata.
pub use descriptor::{
    ComponentDescriptor, Factory, FieldCategory, FieldKind, FieldSpec, FileChecks,
};
/// Live-instance export.
pub use export::{ExportedProperties, ExportedValue};
pub use listener::ConfigurationChangeListener;
/// Configuration manager.
pub use manager::{ConfigurationManager, REGISTRY_COMPONENT};
pub use properties::PropertySet;
/// Registry backends.
pub use registry::{
    ComponentRegistry, DEFAULT_LOOKUP_TRIES, DEFAULT_LOOKUP_WAIT, InMemoryRegistry, LookupPolicy,
    NoRegistry, Registration, RegistrationHandle,
};
pub use sheet::{PropertySheet, SheetStatus};
/// Worker thread context for startable components.
pub use worker::{StartTask, WorkerContext};

/// Configuration data types re-exported for component authors.
pub use confgraph_config::{ConfigError, GlobalProperties, ListItem, PropertyValue, RawRecord};
