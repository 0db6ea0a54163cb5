//! Reverse index from instance names to the fields that reference them.

use crate::descriptor::ComponentDescriptor;
use confgraph_config::{ListItem, PropertyValue, RawRecord};
use std::collections::{BTreeSet, HashMap};

/// `(referrer, field)` pairs per referenced name, and the reverse.
///
/// Built from raw values, so a reference written as `${global}` is tracked
/// under the token text rather than the name it resolves to.
#[derive(Debug, Default, Clone)]
pub(crate) struct ReferenceIndex {
    incoming: HashMap<String, BTreeSet<(String, String)>>,
    outgoing: HashMap<String, BTreeSet<(String, String)>>,
}

impl ReferenceIndex {
    /// Replace every entry contributed by `record`.
    pub(crate) fn reindex(&mut self, record: &RawRecord, descriptor: &ComponentDescriptor) {
        let referrer = record.instance_name.as_str();
        self.forget(referrer);
        let mut targets = BTreeSet::new();
        for field in descriptor
            .fields()
            .iter()
            .filter(|field| field.kind.references_components())
        {
            let Some(value) = record.property(&field.name) else {
                continue;
            };
            for target in referenced_names(value) {
                self.incoming
                    .entry(target.to_string())
                    .or_default()
                    .insert((referrer.to_string(), field.name.clone()));
                targets.insert((field.name.clone(), target.to_string()));
            }
        }
        if !targets.is_empty() {
            self.outgoing.insert(referrer.to_string(), targets);
        }
    }

    /// Drop every entry contributed by `referrer`.
    pub(crate) fn forget(&mut self, referrer: &str) {
        let Some(targets) = self.outgoing.remove(referrer) else {
            return;
        };
        for (field, target) in targets {
            if let Some(sources) = self.incoming.get_mut(&target) {
                sources.remove(&(referrer.to_string(), field));
                if sources.is_empty() {
                    self.incoming.remove(&target);
                }
            }
        }
    }

    /// Fields that reference `target`, as `(referrer, field)`.
    pub(crate) fn referrers(&self, target: &str) -> Vec<(String, String)> {
        self.incoming
            .get(target)
            .map(|sources| sources.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Names referenced by `referrer`, without duplicates.
    pub(crate) fn targets(&self, referrer: &str) -> BTreeSet<String> {
        self.outgoing
            .get(referrer)
            .map(|targets| targets.iter().map(|(_, target)| target.clone()).collect())
            .unwrap_or_default()
    }
}

/// Instance names held by a component-reference value.
fn referenced_names(value: &PropertyValue) -> Vec<&str> {
    match value {
        PropertyValue::Text(name) => vec![name.as_str()],
        PropertyValue::List(items) => items.iter().filter_map(ListItem::as_value).collect(),
        PropertyValue::Map(entries) => entries.values().map(String::as_str).collect(),
    }
}

/// Rewrite occurrences of `old` in a component-reference value.
pub(crate) fn rewrite_references(value: &mut PropertyValue, old: &str, new: &str) -> bool {
    let mut changed = false;
    match value {
        PropertyValue::Text(name) => {
            if name == old {
                *name = new.to_string();
                changed = true;
            }
        }
        PropertyValue::List(items) => {
            for item in items.iter_mut() {
                match item {
                    ListItem::Value(name) if name == old => {
                        *name = new.to_string();
                        changed = true;
                    }
                    _ => {}
                }
            }
        }
        PropertyValue::Map(entries) => {
            for name in entries.values_mut() {
                if name == old {
                    *name = new.to_string();
                    changed = true;
                }
            }
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{ComponentDescriptor, FieldSpec};
    use pretty_assertions::assert_eq;

    fn pipeline() -> ComponentDescriptor {
        ComponentDescriptor::custom(
            "Pipeline",
            vec![
                FieldSpec::component("head", "Stage"),
                FieldSpec::component_list("stages", "Stage"),
                FieldSpec::string("label"),
            ],
            None,
        )
    }

    #[test]
    fn tracks_component_fields_only() {
        let record = RawRecord::new("p", "Pipeline")
            .with_property("head", "a")
            .with_property("stages", PropertyValue::list(["a", "b"]))
            .with_property("label", "a");
        let mut index = ReferenceIndex::default();
        index.reindex(&record, &pipeline());

        assert_eq!(
            index.referrers("a"),
            vec![
                ("p".to_string(), "head".to_string()),
                ("p".to_string(), "stages".to_string()),
            ]
        );
        assert_eq!(index.targets("p").len(), 2);

        index.forget("p");
        assert!(index.referrers("a").is_empty());
    }

    #[test]
    fn rewrites_lists_and_maps() {
        let mut list = PropertyValue::List(vec![
            ListItem::Value("a".to_string()),
            ListItem::TypeRef("a".to_string()),
        ]);
        assert!(rewrite_references(&mut list, "a", "z"));
        assert_eq!(
            list,
            PropertyValue::List(vec![
                ListItem::Value("z".to_string()),
                ListItem::TypeRef("a".to_string()),
            ])
        );

        let mut map = PropertyValue::map([("k", "a")]);
        assert!(rewrite_references(&mut map, "a", "z"));
        assert!(!rewrite_references(&mut map, "a", "z"));
    }
}
