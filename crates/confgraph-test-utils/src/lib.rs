//! Test helpers shared across confgraph crates.

pub mod components;
pub mod listener;

pub use components::{
    Clock, Directory, Echo, Entries, Feature, FileSink, Greeter, Mode, Node, Pipeline,
    REMOTE_SERVICE, SERVICE, SlowCounter, Ticker,
};
pub use listener::{ChangeEvent, RecordingListener};

use confgraph_core::{ConfigurationManager, InMemoryRegistry, TypeCatalog};
use log::debug;

/// Catalog with every sample component type and both sample interfaces.
pub fn sample_catalog() -> TypeCatalog {
    let mut catalog = TypeCatalog::new();
    let registered = catalog
        .register::<Greeter>()
        .and_then(|catalog| catalog.register::<Echo>())
        .and_then(|catalog| catalog.register::<Clock>())
        .and_then(|catalog| catalog.register::<Pipeline>())
        .and_then(|catalog| catalog.register::<Node>())
        .and_then(|catalog| catalog.register::<FileSink>())
        .and_then(|catalog| catalog.register::<Ticker>())
        .and_then(|catalog| catalog.register::<SlowCounter>())
        .and_then(|catalog| catalog.register::<Directory>())
        .and_then(|catalog| catalog.register::<Entries>())
        .and_then(|catalog| catalog.register::<InMemoryRegistry>())
        .and_then(|catalog| catalog.register_interface(SERVICE, false))
        .and_then(|catalog| catalog.register_interface(REMOTE_SERVICE, true))
        .map(|_| ());
    if let Err(err) = registered {
        panic!("sample catalog is inconsistent: {err}");
    }
    debug!("built sample catalog (types={})", catalog.type_names().len());
    catalog
}

/// Manager over the sample catalog, loaded from JSON5 text.
pub fn manager_from(contents: &str) -> ConfigurationManager {
    match ConfigurationManager::load_str(sample_catalog(), contents) {
        Ok(manager) => manager,
        Err(err) => panic!("test configuration failed to load: {err}"),
    }
}

/// Empty manager over the sample catalog.
pub fn empty_manager() -> ConfigurationManager {
    ConfigurationManager::new(sample_catalog())
}
