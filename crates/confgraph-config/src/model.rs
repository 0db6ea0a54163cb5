//! In-memory form of a configuration document.

use crate::{ConfigError, GlobalProperties, RawRecord};

/// Global properties plus component records in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigDocument {
    /// Global string macros.
    pub globals: GlobalProperties,
    /// Component records in declaration order.
    pub records: Vec<RawRecord>,
}

impl ConfigDocument {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a record by instance name.
    pub fn record(&self, name: &str) -> Option<&RawRecord> {
        self.records
            .iter()
            .find(|record| record.instance_name == name)
    }

    /// Whether a record with this instance name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.record(name).is_some()
    }

    /// Append a record, rejecting duplicate instance names.
    pub fn push_record(&mut self, record: RawRecord) -> Result<(), ConfigError> {
        if self.contains(&record.instance_name) {
            return Err(ConfigError::duplicate(
                record.instance_name.clone(),
                format!("duplicate definition of '{}'", record.instance_name),
            ));
        }
        self.records.push(record);
        Ok(())
    }

    /// Instance names in declaration order.
    pub fn record_names(&self) -> impl Iterator<Item = &str> {
        self.records
            .iter()
            .map(|record| record.instance_name.as_str())
    }
}
