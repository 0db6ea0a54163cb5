use super::ConfigurationManager;
use super::references::rewrite_references;
use confgraph_config::ConfigError;
use log::{debug, info};

impl ConfigurationManager {
    /// Rename a component throughout the graph.
    ///
    /// Every component field that references `old` is rewritten to `new`, as
    /// is every global property whose resolved value equals `old`. A cached
    /// instance, worker thread, and registry registration move with the name.
    pub fn rename(&self, old: &str, new: &str) -> Result<(), ConfigError> {
        if new.is_empty() {
            return Err(ConfigError::syntax(old, "instance names cannot be empty"));
        }
        {
            let mut state = self.state.write();
            if !state.records.contains_key(old) {
                return Err(ConfigError::unknown_reference(
                    old,
                    None,
                    format!("no component named '{old}'"),
                ));
            }
            if state.records.contains_key(new) {
                return Err(ConfigError::duplicate(
                    new,
                    format!("component '{new}' is already defined"),
                ));
            }

            let referrers = state.references.referrers(old);
            if let Some(mut record) = state.records.remove(old) {
                record.instance_name = new.to_string();
                state.records.insert(new.to_string(), record);
            }
            for name in state.order.iter_mut() {
                if name == old {
                    *name = new.to_string();
                }
            }
            if let Some(sheet) = state.sheets.remove(old) {
                sheet.update_record(|record| record.instance_name = new.to_string());
                state.sheets.insert(new.to_string(), sheet);
            }
            if state.added.remove(old) {
                state.added.insert(new.to_string());
            }
            for instance in state.instances.values_mut() {
                if instance == old {
                    *instance = new.to_string();
                }
            }

            let mut touched = vec![new.to_string()];
            for (referrer, field) in referrers {
                let referrer = if referrer == old {
                    new.to_string()
                } else {
                    referrer
                };
                if let Some(value) = state
                    .records
                    .get_mut(&referrer)
                    .and_then(|record| record.properties.get_mut(&field))
                {
                    rewrite_references(value, old, new);
                }
                if let Some(sheet) = state.sheets.get(&referrer) {
                    sheet.update_record(|record| {
                        if let Some(value) = record.properties.get_mut(&field) {
                            rewrite_references(value, old, new);
                        }
                    });
                }
                debug!("rewrote reference (referrer={referrer}, field={field}, old={old}, new={new})");
                touched.push(referrer);
            }

            state.references.forget(old);
            for name in touched {
                let Some(record) = state.records.get(&name).cloned() else {
                    continue;
                };
                if let Some(descriptor) = self.catalog.get(&record.type_name) {
                    state.references.reindex(&record, &descriptor);
                }
            }

            let aliases = state
                .globals
                .names()
                .filter(|name| {
                    matches!(state.globals.resolved(name), Ok(Some(value)) if value == old)
                })
                .map(str::to_string)
                .collect::<Vec<_>>();
            for alias in aliases {
                debug!("retargeting global property (name={alias}, old={old}, new={new})");
                state.globals.set_value(alias, new)?;
            }
        }

        self.workers.rename(old, new);
        for (instance, _) in self.registrations.lock().iter_mut() {
            if instance == old {
                *instance = new.to_string();
            }
        }
        info!("renamed component (old={old}, new={new})");
        self.listeners
            .notify(|listener| listener.component_renamed(old, new));
        Ok(())
    }
}
