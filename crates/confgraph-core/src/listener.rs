//! Change notifications fired by a configuration manager.

use crate::component::ComponentHandle;
use parking_lot::RwLock;
use std::sync::Arc;

/// Observer of configuration edits. All methods default to no-ops.
///
/// Notifications are delivered after the manager has released its internal
/// locks, so listeners may call back into the manager.
pub trait ConfigurationChangeListener: Send + Sync {
    /// A property of `instance_name` was edited.
    fn configuration_changed(&self, _instance_name: &str, _property: &str) {}

    /// A component was added programmatically.
    fn component_added(&self, _instance_name: &str, _type_name: &str) {}

    /// A component was removed; `owner` is its cached instance, if any.
    fn component_removed(&self, _instance_name: &str, _owner: Option<&ComponentHandle>) {}

    /// A component was renamed.
    fn component_renamed(&self, _old_name: &str, _new_name: &str) {}
}

/// Registered listeners in registration order.
#[derive(Default)]
pub(crate) struct ListenerSet {
    listeners: RwLock<Vec<Arc<dyn ConfigurationChangeListener>>>,
}

impl ListenerSet {
    pub(crate) fn add(&self, listener: Arc<dyn ConfigurationChangeListener>) {
        self.listeners.write().push(listener);
    }

    /// Remove by identity. Returns false when the listener was not registered.
    pub(crate) fn remove(&self, listener: &Arc<dyn ConfigurationChangeListener>) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|existing| !same_listener(existing, listener));
        listeners.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.read().len()
    }

    /// Call `notify` on a snapshot of the listeners.
    pub(crate) fn notify(&self, notify: impl Fn(&dyn ConfigurationChangeListener)) {
        let snapshot = self.listeners.read().clone();
        for listener in &snapshot {
            notify(listener.as_ref());
        }
    }
}

fn same_listener(
    left: &Arc<dyn ConfigurationChangeListener>,
    right: &Arc<dyn ConfigurationChangeListener>,
) -> bool {
    std::ptr::eq(
        Arc::as_ptr(left) as *const (),
        Arc::as_ptr(right) as *const (),
    )
}
