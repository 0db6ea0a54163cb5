use confgraph_core::{
    ComponentHandle, ComponentType, ConfigError, Configurable, ExportedProperties, FieldKind,
    FieldSpec, FileChecks, PropertySet, StartTask, WorkerContext,
};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

pub const SERVICE: &str = "Service";
pub const REMOTE_SERVICE: &str = "RemoteService";

/// Says `message`, `repeat` times. Implements `Service`.
#[derive(Debug, Default)]
pub struct Greeter {
    pub message: String,
    pub repeat: i64,
    pub configured: usize,
}

impl Greeter {
    pub fn with_message(message: &str) -> Self {
        Self {
            message: message.to_string(),
            repeat: 1,
            configured: 0,
        }
    }

    pub fn greet(&self) -> String {
        vec![self.message.as_str(); self.repeat.max(0) as usize].join(" ")
    }
}

impl Configurable for Greeter {
    fn configure(&mut self, props: &PropertySet<'_>) -> Result<(), ConfigError> {
        self.message = props.require("message")?;
        self.repeat = props.require("repeat")?;
        self.configured += 1;
        Ok(())
    }

    fn post_config(&mut self) -> Result<(), ConfigError> {
        if self.message.trim().is_empty() {
            return Err(ConfigError::construction(
                "Greeter",
                "message cannot be blank",
            ));
        }
        Ok(())
    }

    fn export(&self, out: &mut ExportedProperties) {
        out.text("message", &self.message).text("repeat", self.repeat);
    }
}

impl ComponentType for Greeter {
    const TYPE_NAME: &'static str = "Greeter";

    fn fields() -> Vec<FieldSpec> {
        vec![
            FieldSpec::string("message").mandatory(),
            FieldSpec::integer_in("repeat", 1, 10).default_value("1"),
        ]
    }

    fn interfaces() -> Vec<String> {
        vec![SERVICE.to_string()]
    }
}

/// Prefixes its input. Implements `Service`.
#[derive(Debug, Default)]
pub struct Echo {
    pub prefix: String,
}

impl Configurable for Echo {
    fn configure(&mut self, props: &PropertySet<'_>) -> Result<(), ConfigError> {
        self.prefix = props.require("prefix")?;
        Ok(())
    }

    fn export(&self, out: &mut ExportedProperties) {
        out.text("prefix", &self.prefix);
    }
}

impl ComponentType for Echo {
    const TYPE_NAME: &'static str = "Echo";

    fn fields() -> Vec<FieldSpec> {
        vec![FieldSpec::string("prefix").default_value("echo")]
    }

    fn interfaces() -> Vec<String> {
        vec![SERVICE.to_string()]
    }
}

/// Reports a time zone. Implements `Service`.
#[derive(Debug, Default)]
pub struct Clock {
    pub zone: String,
}

impl Configurable for Clock {
    fn configure(&mut self, props: &PropertySet<'_>) -> Result<(), ConfigError> {
        self.zone = props.require("zone")?;
        Ok(())
    }

    fn export(&self, out: &mut ExportedProperties) {
        out.text("zone", &self.zone);
    }
}

impl ComponentType for Clock {
    const TYPE_NAME: &'static str = "Clock";

    fn fields() -> Vec<FieldSpec> {
        vec![FieldSpec::string_in("zone", ["utc", "local"]).default_value("utc")]
    }

    fn interfaces() -> Vec<String> {
        vec![SERVICE.to_string()]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Mode {
    Fast,
    #[default]
    Safe,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "FAST" => Ok(Self::Fast),
            "SAFE" => Ok(Self::Safe),
            other => Err(format!("unknown mode '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Feature {
    Cache,
    Trace,
}

impl FromStr for Feature {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "CACHE" => Ok(Self::Cache),
            "TRACE" => Ok(Self::Trace),
            other => Err(format!("unknown feature '{other}'")),
        }
    }
}

/// Wires services together; exercises every field category.
#[derive(Debug, Default)]
pub struct Pipeline {
    pub head: Option<ComponentHandle>,
    pub stages: Vec<ComponentHandle>,
    pub routes: BTreeMap<String, ComponentHandle>,
    pub label: String,
    pub tags: Vec<String>,
    pub mode: Mode,
    pub features: BTreeSet<Feature>,
    pub weights: BTreeMap<String, f64>,
    pub ratio: f64,
    pub enabled: bool,
}

impl Pipeline {
    pub fn stage_names(&self) -> Vec<String> {
        self.stages
            .iter()
            .map(|stage| stage.type_name().to_string())
            .collect()
    }
}

impl Configurable for Pipeline {
    fn configure(&mut self, props: &PropertySet<'_>) -> Result<(), ConfigError> {
        self.head = props.component("head")?;
        self.stages = props.components("stages")?;
        self.routes = props.component_map("routes")?;
        self.label = props.string("label")?.unwrap_or_default();
        self.tags = props.string_list("tags")?;
        self.mode = props.enumeration("mode")?.unwrap_or_default();
        self.features = props.enum_set("features")?;
        self.weights = props.get("weights")?.unwrap_or_default();
        props.assign("ratio", &mut self.ratio)?;
        props.assign("enabled", &mut self.enabled)?;
        Ok(())
    }

    fn export(&self, out: &mut ExportedProperties) {
        if let Some(head) = &self.head {
            out.component("head", head);
        }
        if !self.stages.is_empty() {
            out.components("stages", &self.stages);
        }
        if !self.routes.is_empty() {
            out.component_map("routes", &self.routes);
        }
        out.text("label", &self.label)
            .text("ratio", self.ratio)
            .text("enabled", self.enabled);
    }
}

impl ComponentType for Pipeline {
    const TYPE_NAME: &'static str = "Pipeline";

    fn fields() -> Vec<FieldSpec> {
        vec![
            FieldSpec::component("head", SERVICE),
            FieldSpec::component_list("stages", SERVICE),
            FieldSpec::component_map("routes", SERVICE),
            FieldSpec::string("label"),
            FieldSpec::list("tags", FieldKind::string()),
            FieldSpec::enumeration("mode", ["FAST", "SAFE"]).default_value("SAFE"),
            FieldSpec::enum_set("features", ["CACHE", "TRACE"]),
            FieldSpec::map("weights", FieldKind::float()),
            FieldSpec::float_in("ratio", 0.0, 1.0).default_value("0.5"),
            FieldSpec::boolean("enabled").default_value("true"),
        ]
    }
}

/// Linked node; used to build reference chains and cycles.
#[derive(Debug, Default)]
pub struct Node {
    pub next: Option<Arc<RwLock<Node>>>,
    pub label: String,
}

impl Configurable for Node {
    fn configure(&mut self, props: &PropertySet<'_>) -> Result<(), ConfigError> {
        self.next = props.component_as::<Node>("next")?;
        self.label = props.string("label")?.unwrap_or_default();
        Ok(())
    }

    fn export(&self, out: &mut ExportedProperties) {
        if let Some(next) = &self.next {
            out.component_arc("next", next);
        }
        out.text("label", &self.label);
    }
}

impl ComponentType for Node {
    const TYPE_NAME: &'static str = "Node";

    fn fields() -> Vec<FieldSpec> {
        vec![
            FieldSpec::component("next", "Node"),
            FieldSpec::string("label"),
        ]
    }
}

/// Writes to a file inside a directory.
#[derive(Debug, Default)]
pub struct FileSink {
    pub output: PathBuf,
    pub root: Option<PathBuf>,
}

impl Configurable for FileSink {
    fn configure(&mut self, props: &PropertySet<'_>) -> Result<(), ConfigError> {
        self.output = props.require("output")?;
        self.root = props.path("root")?;
        Ok(())
    }

    fn export(&self, out: &mut ExportedProperties) {
        out.path("output", &self.output);
        if let Some(root) = &self.root {
            out.path("root", root);
        }
    }
}

impl ComponentType for FileSink {
    const TYPE_NAME: &'static str = "FileSink";

    fn fields() -> Vec<FieldSpec> {
        vec![
            FieldSpec::file("output", FileChecks::none().writable()).mandatory(),
            FieldSpec::file("root", FileChecks::none().exists().directory()),
        ]
    }
}

/// Counts on its worker thread until cancelled.
#[derive(Debug, Default)]
pub struct Ticker {
    pub interval_ms: u64,
    pub ticks: Arc<AtomicUsize>,
}

impl Ticker {
    pub fn ticks(&self) -> usize {
        self.ticks.load(Ordering::SeqCst)
    }
}

impl Configurable for Ticker {
    fn configure(&mut self, props: &PropertySet<'_>) -> Result<(), ConfigError> {
        self.interval_ms = props.require("interval")?;
        Ok(())
    }

    fn start_task(&self) -> Option<StartTask> {
        let ticks = self.ticks.clone();
        let interval = Duration::from_millis(self.interval_ms);
        Some(Box::new(move |ctx: WorkerContext| {
            while !ctx.is_cancelled() {
                ticks.fetch_add(1, Ordering::SeqCst);
                thread::sleep(interval);
            }
        }))
    }
}

impl ComponentType for Ticker {
    const TYPE_NAME: &'static str = "Ticker";

    fn fields() -> Vec<FieldSpec> {
        vec![FieldSpec::integer_in("interval", 0, 1_000).default_value("1")]
    }
}

/// Takes a while to configure; counts how often it was configured.
#[derive(Debug, Default)]
pub struct SlowCounter {
    pub configured: usize,
}

impl Configurable for SlowCounter {
    fn configure(&mut self, props: &PropertySet<'_>) -> Result<(), ConfigError> {
        let delay: u64 = props.require("delay")?;
        thread::sleep(Duration::from_millis(delay));
        self.configured += 1;
        Ok(())
    }
}

impl ComponentType for SlowCounter {
    const TYPE_NAME: &'static str = "SlowCounter";

    fn fields() -> Vec<FieldSpec> {
        vec![FieldSpec::integer_in("delay", 0, 10_000).default_value("20")]
    }
}

/// Directory service that may be satisfied from a registry.
#[derive(Debug, Default)]
pub struct Directory {
    pub zone: String,
}

impl Configurable for Directory {
    fn configure(&mut self, props: &PropertySet<'_>) -> Result<(), ConfigError> {
        self.zone = props.string("zone")?.unwrap_or_else(|| "local".to_string());
        Ok(())
    }

    fn export(&self, out: &mut ExportedProperties) {
        out.text("zone", &self.zone);
    }
}

impl ComponentType for Directory {
    const TYPE_NAME: &'static str = "Directory";

    fn fields() -> Vec<FieldSpec> {
        vec![FieldSpec::string("zone")]
    }

    fn interfaces() -> Vec<String> {
        vec![REMOTE_SERVICE.to_string()]
    }

    fn remote_capable() -> bool {
        true
    }
}

/// Metadata holder referenced by `entries` groups.
#[derive(Debug, Default)]
pub struct Entries {
    pub zone: Option<String>,
}

impl Configurable for Entries {
    fn configure(&mut self, props: &PropertySet<'_>) -> Result<(), ConfigError> {
        self.zone = props.string("zone")?;
        Ok(())
    }
}

impl ComponentType for Entries {
    const TYPE_NAME: &'static str = "Entries";

    fn fields() -> Vec<FieldSpec> {
        vec![FieldSpec::string("zone")]
    }
}
