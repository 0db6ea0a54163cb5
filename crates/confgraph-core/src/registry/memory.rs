use super::{ComponentRegistry, LookupPolicy, Registration, RegistrationHandle};
use crate::component::{ComponentHandle, ComponentType, Configurable};
use crate::descriptor::FieldSpec;
use crate::export::ExportedProperties;
use crate::properties::PropertySet;
use confgraph_config::ConfigError;
use log::{debug, info};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

struct Entry {
    handle: RegistrationHandle,
    registration: Registration,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// In-process, lease-aware registry.
///
/// Also a component type, so a document can configure one under the name
/// `registry`. Lookups return live registrations in registration order.
#[derive(Default)]
pub struct InMemoryRegistry {
    entries: Mutex<Vec<Entry>>,
    policy: LookupPolicy,
}

impl InMemoryRegistry {
    /// Registry with the default lookup policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with a custom lookup policy.
    pub fn with_policy(policy: LookupPolicy) -> Self {
        Self {
            entries: Mutex::default(),
            policy,
        }
    }

    /// Number of live registrations.
    pub fn live_count(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .iter()
            .filter(|entry| entry.is_live(now))
            .count()
    }

    /// Instance names of live registrations, in registration order.
    pub fn registered_names(&self) -> Vec<String> {
        let now = Instant::now();
        self.entries
            .lock()
            .iter()
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.registration.instance_name.clone())
            .collect()
    }
}

impl ComponentRegistry for InMemoryRegistry {
    fn lookup_policy(&self) -> LookupPolicy {
        self.policy
    }

    fn register(&self, registration: Registration) -> Result<RegistrationHandle, ConfigError> {
        let handle = RegistrationHandle::new();
        info!(
            "registered component (name={}, handle={handle}, lease_ms={})",
            registration.instance_name,
            registration.lease.as_millis()
        );
        let mut entries = self.entries.lock();
        let now = Instant::now();
        entries.retain(|entry| entry.is_live(now));
        entries.push(Entry {
            handle,
            expires_at: now + registration.lease,
            registration,
        });
        Ok(handle)
    }

    fn lookup_by_type(&self, type_name: &str, max: usize) -> Vec<ComponentHandle> {
        let now = Instant::now();
        self.entries
            .lock()
            .iter()
            .filter(|entry| entry.is_live(now) && entry.registration.provides(type_name))
            .take(max)
            .map(|entry| entry.registration.component.clone())
            .collect()
    }

    fn lookup_by_properties(
        &self,
        type_name: &str,
        matchers: &BTreeMap<String, String>,
    ) -> Option<ComponentHandle> {
        let now = Instant::now();
        self.entries
            .lock()
            .iter()
            .find(|entry| {
                entry.is_live(now)
                    && entry.registration.provides(type_name)
                    && entry.registration.matches(matchers)
            })
            .map(|entry| entry.registration.component.clone())
    }

    fn renew_lease(&self, handle: &RegistrationHandle) -> Result<(), ConfigError> {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        let entry = entries
            .iter_mut()
            .find(|entry| entry.handle == *handle && entry.is_live(now))
            .ok_or_else(|| ConfigError::Registry(format!("no live registration {handle}")))?;
        entry.expires_at = now + entry.registration.lease;
        debug!(
            "renewed lease (name={}, handle={handle})",
            entry.registration.instance_name
        );
        Ok(())
    }

    fn unregister(&self, handle: &RegistrationHandle) -> Result<(), ConfigError> {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|entry| entry.handle != *handle);
        if entries.len() == before {
            return Err(ConfigError::Registry(format!("no registration {handle}")));
        }
        debug!("unregistered component (handle={handle})");
        Ok(())
    }
}

impl Configurable for InMemoryRegistry {
    fn configure(&mut self, props: &PropertySet<'_>) -> Result<(), ConfigError> {
        let tries: u32 = props.require("lookupTries")?;
        let wait: u64 = props.require("lookupWait")?;
        self.policy = LookupPolicy {
            tries,
            wait: Duration::from_millis(wait),
        };
        Ok(())
    }

    fn export(&self, out: &mut ExportedProperties) {
        out.text("lookupTries", self.policy.tries)
            .text("lookupWait", self.policy.wait.as_millis());
    }

    fn as_registry(&self) -> Option<&dyn ComponentRegistry> {
        Some(self)
    }
}

impl ComponentType for InMemoryRegistry {
    const TYPE_NAME: &'static str = "InMemoryRegistry";

    fn fields() -> Vec<FieldSpec> {
        vec![
            FieldSpec::integer_in("lookupTries", 1, 10_000)
                .default_value("50")
                .describe("registry lookup attempts before giving up"),
            FieldSpec::integer_in("lookupWait", 0, 60_000)
                .default_value("2")
                .describe("milliseconds between registry lookup attempts"),
        ]
    }
}
