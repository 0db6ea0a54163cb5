use super::{ComponentRegistry, Registration, RegistrationHandle};
use crate::component::ComponentHandle;
use confgraph_config::ConfigError;
use log::debug;
use std::collections::BTreeMap;

/// Registry that publishes nothing and finds nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRegistry;

impl ComponentRegistry for NoRegistry {
    fn is_active(&self) -> bool {
        false
    }

    fn register(&self, registration: Registration) -> Result<RegistrationHandle, ConfigError> {
        debug!(
            "registry disabled, not publishing component (name={})",
            registration.instance_name
        );
        Ok(RegistrationHandle::new())
    }

    fn lookup_by_type(&self, _type_name: &str, _max: usize) -> Vec<ComponentHandle> {
        Vec::new()
    }

    fn lookup_by_properties(
        &self,
        _type_name: &str,
        _matchers: &BTreeMap<String, String>,
    ) -> Option<ComponentHandle> {
        None
    }

    fn renew_lease(&self, _handle: &RegistrationHandle) -> Result<(), ConfigError> {
        Ok(())
    }

    fn unregister(&self, _handle: &RegistrationHandle) -> Result<(), ConfigError> {
        Ok(())
    }
}
