use confgraph_core::{ComponentHandle, ConfigurationChangeListener};
use parking_lot::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    Changed { instance: String, property: String },
    Added { instance: String, type_name: String },
    Removed { instance: String, had_owner: bool },
    Renamed { old: String, new: String },
}

/// Listener that records every notification in order.
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<ChangeEvent>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ChangeEvent> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    fn push(&self, event: ChangeEvent) {
        self.events.lock().push(event);
    }
}

impl ConfigurationChangeListener for RecordingListener {
    fn configuration_changed(&self, instance_name: &str, property: &str) {
        self.push(ChangeEvent::Changed {
            instance: instance_name.to_string(),
            property: property.to_string(),
        });
    }

    fn component_added(&self, instance_name: &str, type_name: &str) {
        self.push(ChangeEvent::Added {
            instance: instance_name.to_string(),
            type_name: type_name.to_string(),
        });
    }

    fn component_removed(&self, instance_name: &str, owner: Option<&ComponentHandle>) {
        self.push(ChangeEvent::Removed {
            instance: instance_name.to_string(),
            had_owner: owner.is_some(),
        });
    }

    fn component_renamed(&self, old_name: &str, new_name: &str) {
        self.push(ChangeEvent::Renamed {
            old: old_name.to_string(),
            new: new_name.to_string(),
        });
    }
}
