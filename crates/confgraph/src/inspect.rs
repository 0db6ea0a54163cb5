//! Read-only views of a configuration document.

use confgraph_config::{
    ConfigDocument, ConfigError, GlobalProperties, ListItem, PropertyValue, record_to_value,
};
use confgraph_core::{
    ComponentDescriptor, ComponentHandle, ComponentType, Configurable, ConfigurationManager,
    Factory, FieldKind, FieldSpec, InMemoryRegistry, PropertySet, TypeCatalog,
};
use log::{debug, info};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One component record, without its property values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub exportable: bool,
    pub importable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease_millis: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entries: Option<String>,
    pub properties: Vec<String>,
}

/// One global property with its resolution outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GlobalSummary {
    pub name: String,
    pub raw: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Summaries of every record, in declaration order.
pub fn summarize_records(document: &ConfigDocument) -> Vec<RecordSummary> {
    document
        .records
        .iter()
        .map(|record| RecordSummary {
            name: record.instance_name.clone(),
            type_name: record.type_name.clone(),
            exportable: record.exportable,
            importable: record.importable,
            lease_millis: record.lease_millis,
            entries: record.entries_group.clone(),
            properties: record.property_names().map(str::to_string).collect(),
        })
        .collect()
}

/// Every global property, resolved where possible.
///
/// A property that fails to resolve is reported with its error instead of
/// aborting the listing.
pub fn summarize_globals(globals: &GlobalProperties) -> Vec<GlobalSummary> {
    globals
        .iter()
        .map(|(name, raw)| {
            let (resolved, error) = match globals.resolved(name) {
                Ok(resolved) => (resolved, None),
                Err(err) => (None, Some(err.to_string())),
            };
            GlobalSummary {
                name: name.to_string(),
                raw: raw.to_string(),
                resolved,
                error,
            }
        })
        .collect()
}

/// A record as JSON with every `${name}` token substituted, including list
/// and map elements.
pub fn resolve_record(document: &ConfigDocument, name: &str) -> Result<Value, ConfigError> {
    let record = document.record(name).ok_or_else(|| {
        ConfigError::unknown_reference(name, None, format!("no component named '{name}'"))
    })?;
    let mut resolved = record.flatten(&document.globals)?;
    for (property, value) in resolved.properties.iter_mut() {
        let substitute = |text: &str| {
            document
                .globals
                .replace_global_properties(name, Some(property.as_str()), text)
        };
        match value {
            PropertyValue::Text(_) => {}
            PropertyValue::List(items) => {
                for item in items.iter_mut() {
                    if let ListItem::Value(text) = item {
                        *text = substitute(text.as_str())?;
                    }
                }
            }
            PropertyValue::Map(entries) => {
                for text in entries.values_mut() {
                    *text = substitute(text.as_str())?;
                }
            }
        }
    }
    debug!("resolved record for display (name={name})");
    Ok(record_to_value(&resolved))
}

/// Outcome of assembling every component of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    pub components: usize,
    pub instantiated: usize,
    pub registry_active: bool,
}

/// Stand-in component for record types with no implementation in this binary.
///
/// Configuring it resolves every declared field, so substitution and
/// component references are checked the same way a real type would see them.
#[derive(Debug, Default)]
pub struct DocumentComponent {
    /// Fields that resolved to a value.
    pub resolved: Vec<String>,
}

impl Configurable for DocumentComponent {
    fn configure(&mut self, props: &PropertySet<'_>) -> Result<(), ConfigError> {
        let mut resolved = Vec::new();
        for name in props.field_names() {
            if props.resolve(name)?.is_some() {
                resolved.push(name.to_string());
            }
        }
        self.resolved = resolved;
        Ok(())
    }
}

impl ComponentType for DocumentComponent {
    const TYPE_NAME: &'static str = "DocumentComponent";

    fn fields() -> Vec<FieldSpec> {
        Vec::new()
    }
}

/// Catalog covering every type a document declares.
///
/// `InMemoryRegistry` records use the real registry type. Every other type
/// becomes a [`DocumentComponent`] whose fields are the property names used
/// with it; a list holding `{ type: ... }` items is a component list.
pub fn document_catalog(document: &ConfigDocument) -> Result<TypeCatalog, ConfigError> {
    let mut types: BTreeMap<&str, BTreeMap<&str, FieldSpec>> = BTreeMap::new();
    for record in &document.records {
        let fields = types.entry(record.type_name.as_str()).or_default();
        for (name, value) in &record.properties {
            fields
                .entry(name.as_str())
                .or_insert_with(|| field_for(name, value));
        }
    }

    let mut catalog = TypeCatalog::new();
    for (type_name, fields) in types {
        if type_name == InMemoryRegistry::TYPE_NAME {
            catalog.register::<InMemoryRegistry>()?;
            continue;
        }
        let factory: Factory = Arc::new(|| ComponentHandle::new(DocumentComponent::default()));
        catalog.register_descriptor(ComponentDescriptor::custom(
            type_name,
            fields.into_values().collect(),
            Some(factory),
        ))?;
    }
    debug!(
        "built document catalog (types={})",
        catalog.type_names().len()
    );
    Ok(catalog)
}

fn field_for(name: &str, value: &PropertyValue) -> FieldSpec {
    match value {
        PropertyValue::Text(_) => FieldSpec::string(name),
        PropertyValue::List(items)
            if items
                .iter()
                .any(|item| matches!(item, ListItem::TypeRef(_))) =>
        {
            FieldSpec::list(name, FieldKind::any_component())
        }
        PropertyValue::List(_) => FieldSpec::list(name, FieldKind::string()),
        PropertyValue::Map(_) => FieldSpec::map(name, FieldKind::string()),
    }
}

/// Load a document into a manager over its own [`document_catalog`].
pub fn load_manager(document: &ConfigDocument) -> Result<ConfigurationManager, ConfigError> {
    let catalog = document_catalog(document)?;
    ConfigurationManager::from_document(catalog, document.clone())
}

/// Load a document and construct every component it declares.
pub fn check_document(document: &ConfigDocument) -> Result<CheckReport, ConfigError> {
    let manager = load_manager(document)?;
    let names = manager.component_names();
    for name in &names {
        manager.lookup(name)?;
    }
    let report = CheckReport {
        components: names.len(),
        instantiated: manager.num_instantiated(),
        registry_active: manager.has_active_registry(),
    };
    manager.close()?;
    info!(
        "checked document (components={}, instantiated={})",
        report.components, report.instantiated
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn document() -> ConfigDocument {
        ConfigDocument::load_from_str(
            r#"{
                config: {
                    "global-properties": { zone: "east", home: "${zone}-1", broken: "${nothing}" },
                    components: [
                        { name: "dir", type: "Directory", export: true, entries: "meta", properties: { zone: "${zone}" } },
                        { name: "pipe", type: "Pipeline", properties: { tags: [ "${home}", "x" ], weights: { a: "${zone}" } } },
                    ],
                },
            }"#,
        )
        .expect("document parses")
    }

    /// Record summaries keep declaration order and flags.
    #[test]
    fn summarizes_records() {
        let summaries = summarize_records(&document());
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].name, "dir");
        assert!(summaries[0].exportable);
        assert_eq!(summaries[0].entries.as_deref(), Some("meta"));
        assert_eq!(summaries[1].properties, vec!["tags", "weights"]);

        let value = serde_json::to_value(&summaries[1]).expect("serialize");
        assert_eq!(value["type"], json!("Pipeline"));
        assert!(value.get("lease_millis").is_none());
    }

    /// Unresolvable globals are reported rather than failing the listing.
    #[test]
    fn summarizes_globals_with_errors() {
        let summaries = summarize_globals(&document().globals);
        let home = summaries
            .iter()
            .find(|summary| summary.name == "home")
            .expect("home listed");
        assert_eq!(home.resolved.as_deref(), Some("east-1"));
        let broken = summaries
            .iter()
            .find(|summary| summary.name == "broken")
            .expect("broken listed");
        assert!(broken.resolved.is_none());
        assert!(broken.error.is_some());
    }

    /// Resolution reaches into list and map elements.
    #[test]
    fn resolves_collection_elements() {
        let value = resolve_record(&document(), "pipe").expect("resolve pipe");
        let text = value.to_string();
        assert!(text.contains("east-1"), "{text}");
        assert!(!text.contains("${"), "{text}");

        let err = resolve_record(&document(), "ghost").expect_err("unknown record");
        assert!(matches!(err, ConfigError::UnknownReference { .. }));
    }

    const GRAPH: &str = r#"{
        config: {
            "global-properties": { zone: "east" },
            components: [
                { name: "registry", type: "InMemoryRegistry", properties: { lookupTries: "2", lookupWait: "1" } },
                { name: "store", type: "Store", properties: { zone: "${zone}" } },
                { name: "front", type: "Front", properties: { backends: [ "store", { type: "Store" } ], tags: { a: "${zone}" } } },
            ],
        },
    }"#;

    /// Every record of a well-formed document assembles.
    #[test]
    fn checks_every_component() {
        let document = ConfigDocument::load_from_str(GRAPH).expect("document parses");
        let report = check_document(&document).expect("document checks");
        assert_eq!(
            report,
            CheckReport {
                components: 3,
                instantiated: 3,
                registry_active: true,
            }
        );

        let manager = load_manager(&document).expect("load");
        let front = manager.lookup("front").expect("lookup").expect("present");
        let resolved = front
            .with(|component: &DocumentComponent| component.resolved.clone())
            .expect("document component");
        assert_eq!(resolved, vec!["backends", "tags"]);
    }

    /// Dangling globals and invalid registry settings surface as errors.
    #[test]
    fn check_reports_graph_errors() {
        let dangling = ConfigDocument::load_from_str(
            r#"{ config: { components: [ { name: "store", type: "Store", properties: { zone: "${nowhere}" } } ] } }"#,
        )
        .expect("document parses");
        let err = check_document(&dangling).expect_err("unknown global");
        assert!(matches!(err, ConfigError::UnknownReference { .. }));

        let bad_registry = ConfigDocument::load_from_str(
            r#"{ config: { components: [ { name: "registry", type: "InMemoryRegistry", properties: { lookupTries: "abc" } } ] } }"#,
        )
        .expect("document parses");
        let err = load_manager(&bad_registry).expect_err("lookupTries is not an integer");
        assert!(matches!(err, ConfigError::TypeConversion { .. }));
    }
}
