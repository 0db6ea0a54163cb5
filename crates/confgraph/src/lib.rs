//! Public SDK surface for confgraph.
//!
//! This crate re-exports the configuration and assembly crates and provides
//! document inspection helpers shared by the `confgraph` binary.

/// Re-export for convenience.
pub use confgraph_config as config;
/// Re-export for convenience.
pub use confgraph_core as core;

pub use confgraph_config::{ConfigDocument, ConfigError, GlobalProperties, PropertyValue, RawRecord};
pub use confgraph_core::{ComponentHandle, ConfigurationManager, TypeCatalog};

pub mod inspect;

#[inline]
/// Initialize logging using env_logger if the "logging" feature is enabled.
///
/// This is a no-op if the feature is not enabled. Binaries are still expected
/// to call this early in startup to ensure log output is wired up.
pub fn init_logging() {
    #[cfg(feature = "logging")]
    {
        let _ = env_logger::builder()
            .format_timestamp_millis()
            .parse_default_env()
            .try_init();
    }
}
