//! Integration tests for component lookup and construction.

use confgraph_config::ConfigDocument;
use confgraph_core::{ConfigError, ConfigurationManager, PropertyValue, SheetStatus};
use confgraph_test_utils::{
    ChangeEvent, Clock, Echo, Feature, FileSink, Greeter, Mode, Node, Pipeline,
    RecordingListener, manager_from, sample_catalog,
};
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;
use std::sync::Arc;
use tempfile::tempdir;

const SERVICES: &str = r#"{
    config: {
        "global-properties": { greeting: "Hello", label: "main-line", target: "greeter" },
        components: [
            { name: "greeter", type: "Greeter", properties: { message: "${greeting} World" } },
            { name: "echo", type: "Echo" },
            { name: "clock", type: "Clock", properties: { zone: "local" } },
            {
                name: "pipe",
                type: "Pipeline",
                properties: {
                    head: "greeter",
                    stages: [ "echo", { type: "Clock" } ],
                    routes: { main: "greeter" },
                    label: "${label}",
                    tags: [ "a", "${label}" ],
                    mode: "fast",
                    features: [ "trace", "CACHE", "TRACE" ],
                    weights: { a: "0.25" },
                    ratio: "0.75",
                    enabled: "yes",
                },
            },
        ],
    },
}"#;

/// A global reference inside a property is substituted before configure runs.
#[test]
fn substitutes_global_properties_into_values() {
    let manager = manager_from(SERVICES);
    let greeter = manager
        .lookup_as::<Greeter>("greeter")
        .expect("lookup greeter")
        .expect("greeter present");
    assert_eq!(greeter.read().message, "Hello World");
    assert_eq!(greeter.read().repeat, 1);
}

/// Looking a component up twice returns the same cached instance.
#[test]
fn reuses_cached_instances() {
    let manager = manager_from(SERVICES);
    let first = manager.lookup("greeter").expect("lookup").expect("present");
    let second = manager.lookup("greeter").expect("lookup").expect("present");
    assert!(first.ptr_eq(&second));
    assert_eq!(first.with(|greeter: &Greeter| greeter.configured), Some(1));
    assert_eq!(manager.instantiated_names(), vec!["greeter".to_string()]);
}

/// Disabling reuse builds a fresh instance that replaces the cached one.
#[test]
fn lookup_without_reuse_builds_fresh_instance() {
    let manager = manager_from(SERVICES);
    let first = manager.lookup("greeter").expect("lookup").expect("present");
    let fresh = manager
        .lookup_with("greeter", false)
        .expect("lookup")
        .expect("present");
    assert!(!first.ptr_eq(&fresh));
    let cached = manager.lookup("greeter").expect("lookup").expect("present");
    assert!(cached.ptr_eq(&fresh));
}

/// Unknown names are absent rather than errors.
#[test]
fn unknown_names_are_absent() {
    let manager = manager_from(SERVICES);
    assert!(manager.lookup("missing").expect("lookup").is_none());
}

/// A name starting with `$` is resolved through the global table.
#[test]
fn dollar_names_resolve_through_globals() {
    let manager = manager_from(SERVICES);
    let direct = manager.lookup("greeter").expect("lookup").expect("present");
    let indirect = manager.lookup("${target}").expect("lookup").expect("present");
    assert!(direct.ptr_eq(&indirect));

    let err = manager.lookup("${nowhere}").expect_err("unknown global");
    assert!(matches!(err, ConfigError::UnknownReference { .. }));
}

/// Every field category converts into the expected typed value.
#[test]
fn converts_every_field_category() {
    let manager = manager_from(SERVICES);
    let pipeline = manager
        .lookup_as::<Pipeline>("pipe")
        .expect("lookup pipe")
        .expect("pipe present");
    let greeter = manager.lookup("greeter").expect("lookup").expect("present");
    let echo = manager.lookup("echo").expect("lookup").expect("present");
    let clock = manager.lookup("clock").expect("lookup").expect("present");

    let pipeline = pipeline.read();
    assert!(pipeline.head.as_ref().is_some_and(|head| head.ptr_eq(&greeter)));
    assert_eq!(pipeline.stages, vec![echo, clock]);
    assert_eq!(pipeline.stage_names(), vec!["Echo", "Clock"]);
    assert!(pipeline.routes["main"].ptr_eq(&greeter));
    assert_eq!(pipeline.label, "main-line");
    assert_eq!(pipeline.tags, vec!["a".to_string(), "main-line".to_string()]);
    assert_eq!(pipeline.mode, Mode::Fast);
    assert_eq!(
        pipeline.features.iter().copied().collect::<Vec<_>>(),
        vec![Feature::Cache, Feature::Trace]
    );
    assert_eq!(pipeline.weights, BTreeMap::from([("a".to_string(), 0.25)]));
    assert_eq!(pipeline.ratio, 0.75);
    assert!(!pipeline.enabled);
}

/// Unset fields with defaults take the default value.
#[test]
fn applies_declared_defaults() {
    let manager = manager_from(SERVICES);
    let echo = manager
        .lookup_as::<Echo>("echo")
        .expect("lookup")
        .expect("present");
    assert_eq!(echo.read().prefix, "echo");

    let clock = manager
        .lookup_as::<Clock>("clock")
        .expect("lookup")
        .expect("present");
    assert_eq!(clock.read().zone, "local");
}

/// A missing mandatory property fails construction and caches nothing.
#[test]
fn mandatory_property_must_be_present() {
    let manager = manager_from(
        r#"{ config: { components: [ { name: "quiet", type: "Greeter" } ] } }"#,
    );
    let err = manager.lookup("quiet").expect_err("message is mandatory");
    match err {
        ConfigError::MandatoryValueMissing { instance, field, .. } => {
            assert_eq!(instance, "quiet");
            assert_eq!(field.as_deref(), Some("message"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(manager.instantiated_names().is_empty());
}

/// Values outside a declared range or allowed set are conversion errors.
#[test]
fn rejects_out_of_range_values() {
    let manager = manager_from(
        r#"{
            config: {
                components: [
                    { name: "loud", type: "Greeter", properties: { message: "hi", repeat: "11" } },
                    { name: "mars", type: "Clock", properties: { zone: "mars" } },
                    { name: "odd", type: "Pipeline", properties: { ratio: "1.5" } },
                ],
            },
        }"#,
    );
    for name in ["loud", "mars", "odd"] {
        let err = manager.lookup(name).expect_err("value is rejected");
        assert!(
            matches!(err, ConfigError::TypeConversion { .. }),
            "{name}: {err}"
        );
    }
}

/// A component reference must name a component of the declared type.
#[test]
fn rejects_references_of_the_wrong_type() {
    let manager = manager_from(
        r#"{
            config: {
                components: [
                    { name: "node", type: "Node" },
                    { name: "pipe", type: "Pipeline", properties: { head: "node" } },
                ],
            },
        }"#,
    );
    let err = manager.lookup("pipe").expect_err("node is not a service");
    assert!(matches!(err, ConfigError::TypeConversion { .. }));
}

/// A reference to a component nobody declared is an unknown reference.
#[test]
fn rejects_dangling_references() {
    let manager = manager_from(
        r#"{ config: { components: [ { name: "pipe", type: "Pipeline", properties: { head: "ghost" } } ] } }"#,
    );
    let err = manager.lookup("pipe").expect_err("ghost is undefined");
    assert!(matches!(err, ConfigError::UnknownReference { .. }));
}

/// Errors raised by post-configuration validation surface as construction errors.
#[test]
fn post_config_failures_are_reported() {
    let manager = manager_from(
        r#"{ config: { components: [ { name: "blank", type: "Greeter", properties: { message: "  " } } ] } }"#,
    );
    let err = manager.lookup("blank").expect_err("blank message");
    assert!(matches!(err, ConfigError::Construction { .. }));
}

/// Components that reference each other in a loop are reported as a cycle.
#[test]
fn detects_reference_cycles() {
    let manager = manager_from(
        r#"{
            config: {
                components: [
                    { name: "a", type: "Node", properties: { next: "b" } },
                    { name: "b", type: "Node", properties: { next: "a" } },
                    { name: "self", type: "Node", properties: { next: "self" } },
                ],
            },
        }"#,
    );
    for name in ["a", "self"] {
        let err = manager.lookup(name).expect_err("cycle");
        assert!(matches!(err, ConfigError::Cycle { .. }), "{name}: {err}");
    }
    assert!(manager.instantiated_names().is_empty());
}

/// A chain of references without a loop resolves every link.
#[test]
fn resolves_reference_chains() {
    let manager = manager_from(
        r#"{
            config: {
                components: [
                    { name: "a", type: "Node", properties: { next: "b", label: "first" } },
                    { name: "b", type: "Node", properties: { next: "c", label: "second" } },
                    { name: "c", type: "Node", properties: { label: "last" } },
                ],
            },
        }"#,
    );
    let a = manager.lookup_as::<Node>("a").expect("lookup").expect("present");
    let b = a.read().next.clone().expect("a links to b");
    let c = b.read().next.clone().expect("b links to c");
    assert_eq!(c.read().label, "last");
    assert!(c.read().next.is_none());

    let cached = manager.lookup_as::<Node>("c").expect("lookup").expect("present");
    assert!(Arc::ptr_eq(&cached, &c));
}

/// Global properties that reference each other cannot be resolved.
#[test]
fn detects_global_property_cycles() {
    let manager = manager_from(
        r#"{
            config: {
                "global-properties": { a: "${b}", b: "${a}" },
                components: [ { name: "loop", type: "Greeter", properties: { message: "${a}" } } ],
            },
        }"#,
    );
    let err = manager.lookup("loop").expect_err("global cycle");
    assert!(matches!(err, ConfigError::Cycle { .. }));
}

/// Looking up an interface returns every implementer in declaration order.
#[test]
fn lookup_all_gathers_interface_implementers() {
    let manager = manager_from(SERVICES);
    let services = manager.lookup_all("Service").expect("lookup all");
    let names = services
        .iter()
        .map(|service| manager.name_of(service).expect("managed"))
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["greeter", "echo", "clock"]);

    manager
        .add_component("Greeter", "late", [("message", "late")])
        .expect("add late greeter");
    let again = manager.lookup_all("Service").expect("lookup all");
    assert_eq!(again.len(), 4);
    for (before, after) in services.iter().zip(&again) {
        assert!(before.ptr_eq(after));
    }
    assert_eq!(manager.name_of(&again[3]).as_deref(), Some("late"));
}

/// Concrete type lookups match exactly and typed lookups downcast.
#[test]
fn lookup_all_by_concrete_type() {
    let manager = manager_from(SERVICES);
    let greeters = manager.lookup_all_as::<Greeter>().expect("lookup greeters");
    assert_eq!(greeters.len(), 1);
    assert_eq!(manager.instance_names("Pipeline"), vec!["pipe".to_string()]);

    let any = manager
        .lookup_by_type("Service")
        .expect("lookup by type")
        .expect("some service");
    assert!(manager.name_of(&any).is_some());
}

/// Singleton and keyed lookups over the same candidates as `lookup_all`.
#[test]
fn singleton_and_keyed_lookups() {
    let manager = manager_from(SERVICES);
    assert_eq!(manager.num_instantiated(), 0);

    let pipe = manager
        .lookup_singleton("Pipeline")
        .expect("one pipeline")
        .expect("present");
    assert_eq!(manager.name_of(&pipe).as_deref(), Some("pipe"));
    assert_eq!(manager.lookup_singleton("Node").expect("no nodes"), None);
    let err = manager
        .lookup_singleton("Service")
        .expect_err("three services");
    assert!(matches!(err, ConfigError::DuplicateName { .. }));

    let services = manager.lookup_all_map("Service").expect("keyed services");
    assert_eq!(
        services.keys().cloned().collect::<Vec<_>>(),
        vec!["clock", "echo", "greeter"]
    );
    let greeter = manager.lookup("greeter").expect("lookup").expect("present");
    assert!(services["greeter"].ptr_eq(&greeter));
    assert_eq!(manager.num_instantiated(), 4);
}

/// Editing a property reconfigures the live instance in place.
#[test]
fn set_property_reconfigures_live_instance() {
    let manager = manager_from(SERVICES);
    let listener = Arc::new(RecordingListener::new());
    manager.add_listener(listener.clone());
    let greeter = manager
        .lookup_as::<Greeter>("greeter")
        .expect("lookup")
        .expect("present");

    manager
        .set_property("greeter", "message", "Bye")
        .expect("set message");
    assert_eq!(greeter.read().message, "Bye");
    assert_eq!(greeter.read().configured, 2);
    assert_eq!(
        listener.events(),
        vec![ChangeEvent::Changed {
            instance: "greeter".to_string(),
            property: "message".to_string(),
        }]
    );
    let sheet = manager
        .property_sheet("greeter")
        .expect("sheet")
        .expect("present");
    assert_eq!(sheet.status(), SheetStatus::Reconfigured);

    let err = manager
        .set_property("greeter", "volume", "11")
        .expect_err("undeclared property");
    assert!(matches!(err, ConfigError::UnknownProperty { .. }));
}

/// Changing a global property reconfigures instances that use it.
#[test]
fn set_global_property_reconfigures_dependents() {
    let manager = manager_from(SERVICES);
    let greeter = manager
        .lookup_as::<Greeter>("greeter")
        .expect("lookup")
        .expect("present");
    manager
        .set_global_property("greeting", "Howdy")
        .expect("set global");
    assert_eq!(greeter.read().message, "Howdy World");
    assert_eq!(
        manager.global_property("greeting").expect("resolve"),
        Some("Howdy".to_string())
    );

    let err = manager
        .set_global_property("not valid", "x")
        .expect_err("invalid name");
    assert!(matches!(err, ConfigError::ConfigurationSyntax { .. }));
}

/// A rejected property edit leaves the previous value in place.
#[test]
fn failed_property_edit_restores_previous_value() {
    let manager = manager_from(SERVICES);
    let greeter = manager
        .lookup_as::<Greeter>("greeter")
        .expect("lookup")
        .expect("present");

    let err = manager
        .set_property("greeter", "repeat", "99")
        .expect_err("repeat is out of range");
    assert!(matches!(err, ConfigError::TypeConversion { .. }));
    assert_eq!(
        manager
            .record("greeter")
            .and_then(|record| record.property("repeat").cloned()),
        None
    );
    assert_eq!(greeter.read().repeat, 1);

    manager
        .set_property("greeter", "repeat", "3")
        .expect("valid repeat");
    assert_eq!(greeter.read().repeat, 3);
    manager
        .set_property("greeter", "repeat", "0")
        .expect_err("repeat is out of range");
    assert_eq!(greeter.read().repeat, 3);
    assert_eq!(
        manager
            .record("greeter")
            .and_then(|record| record.property("repeat").cloned()),
        Some(PropertyValue::Text("3".to_string()))
    );
}

/// A global edit that cannot resolve or re-apply is not kept.
#[test]
fn failed_global_edit_restores_previous_value() {
    let manager = manager_from(SERVICES);
    let greeter = manager
        .lookup_as::<Greeter>("greeter")
        .expect("lookup")
        .expect("present");

    let err = manager
        .set_global_property("loop", "${loop}")
        .expect_err("self reference");
    assert!(matches!(err, ConfigError::Cycle { .. }));
    assert_eq!(manager.global_properties().raw("loop"), None);

    let err = manager
        .set_global_property("greeting", "${nowhere}")
        .expect_err("unknown reference");
    assert!(matches!(err, ConfigError::UnknownReference { .. }));
    assert_eq!(manager.global_properties().raw("greeting"), Some("Hello"));
    assert_eq!(greeter.read().message, "Hello World");

    let counted = manager_from(
        r#"{
            config: {
                "global-properties": { times: "2" },
                components: [
                    { name: "greeter", type: "Greeter", properties: { message: "hi", repeat: "${times}" } },
                ],
            },
        }"#,
    );
    let greeter = counted
        .lookup_as::<Greeter>("greeter")
        .expect("lookup")
        .expect("present");
    let err = counted
        .set_global_property("times", "99")
        .expect_err("repeat is out of range");
    assert!(matches!(err, ConfigError::TypeConversion { .. }));
    assert_eq!(counted.global_properties().raw("times"), Some("2"));
    assert_eq!(greeter.read().repeat, 2);
}

/// Invalidating a cached instance forces the next lookup to rebuild it.
#[test]
fn invalidate_drops_cached_instance() {
    let manager = manager_from(SERVICES);
    let first = manager.lookup("echo").expect("lookup").expect("present");
    assert!(manager.invalidate("echo"));
    assert!(!manager.invalidate("echo"));
    let sheet = manager
        .property_sheet("echo")
        .expect("sheet")
        .expect("present");
    assert_eq!(sheet.status(), SheetStatus::Cleared);
    assert!(!sheet.is_instantiated());
    let second = manager.lookup("echo").expect("lookup").expect("present");
    assert!(!first.ptr_eq(&second));
    assert_eq!(manager.name_of(&first), None);
}

/// File fields are checked against the filesystem.
#[test]
fn checks_file_properties() {
    let dir = tempdir().expect("tempdir");
    let output = dir.path().join("out.txt");
    let contents = format!(
        r#"{{
            config: {{
                components: [
                    {{ name: "sink", type: "FileSink", properties: {{ output: "{out}", root: "{root}" }} }},
                    {{ name: "orphan", type: "FileSink", properties: {{ output: "{orphan}" }} }},
                    {{ name: "flat", type: "FileSink", properties: {{ output: "{out}", root: "{out}" }} }},
                ],
            }},
        }}"#,
        out = output.display(),
        root = dir.path().display(),
        orphan = dir.path().join("missing").join("out.txt").display(),
    );
    let manager = manager_from(&contents);

    let sink = manager
        .lookup_as::<FileSink>("sink")
        .expect("lookup sink")
        .expect("sink present");
    assert_eq!(sink.read().output, output);
    assert_eq!(sink.read().root.as_deref(), Some(dir.path()));

    let err = manager.lookup("orphan").expect_err("parent is missing");
    assert!(matches!(err, ConfigError::TypeConversion { .. }));

    std::fs::write(&output, "data").expect("write output");
    let err = manager.lookup("flat").expect_err("root must be a directory");
    assert!(matches!(err, ConfigError::TypeConversion { .. }));
}

/// Loading rejects undeclared properties without keeping any record.
#[test]
fn load_rejects_unknown_properties() {
    let err = ConfigurationManager::load_str(
        sample_catalog(),
        r#"{
            config: {
                components: [
                    { name: "ok", type: "Echo" },
                    { name: "bad", type: "Greeter", properties: { message: "hi", volume: "11" } },
                ],
            },
        }"#,
    )
    .expect_err("volume is not declared");
    assert!(matches!(err, ConfigError::UnknownProperty { .. }));

    let manager = manager_from(r#"{ config: { components: [ { name: "kept", type: "Echo" } ] } }"#);
    let document = ConfigDocument::load_from_str(
        r#"{
            config: {
                components: [
                    { name: "fresh", type: "Echo" },
                    { name: "broken", type: "Greeter", properties: { volume: "11" } },
                ],
            },
        }"#,
    )
    .expect("document parses");
    assert!(manager.load_document(document).is_err());
    assert_eq!(manager.component_names(), vec!["kept".to_string()]);
}

/// A registry component that fails to construct undoes the whole load.
#[test]
fn failed_registry_setup_rolls_back_load() {
    let manager = manager_from(
        r#"{
            config: {
                "global-properties": { keep: "yes" },
                components: [ { name: "kept", type: "Echo" } ],
            },
        }"#,
    );
    let document = ConfigDocument::load_from_str(
        r#"{
            config: {
                "global-properties": { g: "x", keep: "no" },
                components: [
                    { name: "a", type: "Greeter", properties: { message: "hi" } },
                    { name: "registry", type: "InMemoryRegistry", properties: { lookupTries: "abc" } },
                ],
            },
        }"#,
    )
    .expect("document parses");

    let err = manager.load_document(document).expect_err("lookupTries is not an integer");
    assert!(matches!(err, ConfigError::TypeConversion { .. }));
    assert_eq!(manager.component_names(), vec!["kept".to_string()]);
    assert_eq!(manager.global_property("g").expect("resolve"), None);
    assert_eq!(
        manager.global_property("keep").expect("resolve"),
        Some("yes".to_string())
    );
    assert!(!manager.has_active_registry());
    assert_eq!(manager.num_instantiated(), 0);
}

/// A record naming a type the catalog does not know is rejected.
#[test]
fn load_rejects_unknown_types() {
    let err = ConfigurationManager::load_str(
        sample_catalog(),
        r#"{ config: { components: [ { name: "x", type: "Teleporter" } ] } }"#,
    )
    .expect_err("unknown type");
    assert!(matches!(err, ConfigError::UnknownReference { .. }));
}
