//! Declarative configuration data for confgraph.
//!
//! This crate owns the error taxonomy, the global property table with `${name}`
//! substitution, raw component records, and the JSON5 document loader and
//! writer used by the configuration manager.

mod error;
mod global;
mod loader;
mod model;
mod record;
mod writer;

/// Public error type returned by every configuration API.
pub use error::ConfigError;
/// Global property table and substitution limits.
pub use global::{GLOBAL_SCOPE, GlobalProperties, HOST_NAME_PROPERTY, MAX_SUBSTITUTION_PASSES};
/// Default document locations.
pub use loader::{DEFAULT_CONFIG_DIR, DEFAULT_CONFIG_FILE};
/// In-memory document model.
pub use model::ConfigDocument;
/// Raw record types.
pub use record::{DEFAULT_LEASE_MILLIS, ListItem, PropertyValue, RawRecord};
/// Record serialization helper.
pub use writer::record_to_value;
