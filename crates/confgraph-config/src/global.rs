//! Global property table and `${name}` macro substitution.

use crate::ConfigError;
use log::{debug, warn};
use regex::Regex;
use std::collections::HashMap;
use std::sync::{LazyLock, OnceLock};

/// Computed global property holding the local host name.
pub const HOST_NAME_PROPERTY: &str = "gp.hostName";

/// Scope label used for errors raised while resolving the table itself.
pub const GLOBAL_SCOPE: &str = "global-properties";

/// Upper bound on nested substitution passes for a single value.
pub const MAX_SUBSTITUTION_PASSES: usize = 64;

/// Matches `${name}` tokens and captures the name.
static SYMBOL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([\w.-]+)\}").expect("symbol pattern compiles"));

/// Matches a value that is exactly one `${name}` token.
static REFERENCE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\$\{([\w.-]+)\}$").expect("reference pattern compiles"));

/// Matches a valid global property name.
static NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w.-]+$").expect("name pattern compiles"));

/// Ordered table of global string macros.
#[derive(Debug, Clone, Default)]
pub struct GlobalProperties {
    /// Raw values keyed by name.
    values: HashMap<String, String>,
    /// Names in insertion order.
    order: Vec<String>,
    /// Lazily computed host name.
    host_name: OnceLock<String>,
}

impl PartialEq for GlobalProperties {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl GlobalProperties {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `name` is a valid global property name.
    pub fn is_valid_name(name: &str) -> bool {
        NAME_PATTERN.is_match(name)
    }

    /// Whether `value` contains at least one `${name}` token.
    pub fn has_tokens(value: &str) -> bool {
        SYMBOL_PATTERN.is_match(value)
    }

    /// Whether `value` is exactly one `${name}` token.
    pub fn is_reference(value: &str) -> bool {
        REFERENCE_PATTERN.is_match(value)
    }

    /// Strip `${...}` wrappers from a name until a bare name remains.
    pub fn stripped_name(name: &str) -> &str {
        let mut current = name;
        while let Some(captures) = REFERENCE_PATTERN.captures(current) {
            match captures.get(1) {
                Some(inner) => current = &current[inner.start()..inner.end()],
                None => break,
            }
        }
        current
    }

    /// Value of a global property, including computed ones.
    pub fn get(&self, name: &str) -> Option<String> {
        if let Some(value) = self.values.get(name) {
            return Some(value.clone());
        }
        if name == HOST_NAME_PROPERTY {
            return Some(self.host_name().to_string());
        }
        None
    }

    /// Raw stored value, ignoring computed properties.
    pub fn raw(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Whether a property with this name is stored or computed.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name) || name == HOST_NAME_PROPERTY
    }

    /// Set a property, rejecting names outside the macro-name grammar.
    pub fn set_value(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), ConfigError> {
        let name = name.into();
        if !Self::is_valid_name(&name) {
            return Err(ConfigError::syntax_at(
                GLOBAL_SCOPE,
                name.clone(),
                format!("'{name}' is not a valid global property name"),
            ));
        }
        let value = value.into();
        debug!("setting global property (name={name})");
        if self.values.insert(name.clone(), value).is_none() {
            self.order.push(name);
        }
        Ok(())
    }

    /// Remove a property, returning its raw value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let removed = self.values.remove(name);
        if removed.is_some() {
            self.order.retain(|existing| existing != name);
        }
        removed
    }

    /// Copy every property of `other` into this table, overwriting.
    pub fn put_all(&mut self, other: &GlobalProperties) {
        for (name, value) in other.iter() {
            if self.values.insert(name.to_string(), value.to_string()).is_none() {
                self.order.push(name.to_string());
            }
        }
    }

    /// Stored property names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Stored `(name, raw value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.order.iter().filter_map(|name| {
            self.values
                .get(name)
                .map(|value| (name.as_str(), value.as_str()))
        })
    }

    /// Number of stored properties.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no properties are stored.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Import environment variables whose names are valid property names.
    ///
    /// Existing entries win. With a prefix, only matching variables are
    /// imported and the prefix is stripped from the property name.
    pub fn import_environment(&mut self, prefix: Option<&str>) -> usize {
        let mut imported = 0;
        for (key, value) in std::env::vars() {
            let name = match prefix {
                Some(prefix) => match key.strip_prefix(prefix) {
                    Some(rest) if !rest.is_empty() => rest.to_string(),
                    _ => continue,
                },
                None => key,
            };
            if !Self::is_valid_name(&name) || self.values.contains_key(&name) {
                continue;
            }
            self.order.push(name.clone());
            self.values.insert(name, value);
            imported += 1;
        }
        debug!("imported environment into global properties (count={imported})");
        imported
    }

    /// Fully resolved value of a property.
    pub fn resolved(&self, name: &str) -> Result<Option<String>, ConfigError> {
        match self.get(name) {
            Some(value) => self
                .replace_global_properties(GLOBAL_SCOPE, Some(name), &value)
                .map(Some),
            None => Ok(None),
        }
    }

    /// Substitute every `${name}` token in `raw`, recursively.
    ///
    /// `scope` and `property` only label errors. Unknown names fail with
    /// `UnknownReference`; a name that expands into itself fails with `Cycle`.
    pub fn replace_global_properties(
        &self,
        scope: &str,
        property: Option<&str>,
        raw: &str,
    ) -> Result<String, ConfigError> {
        let mut in_progress = Vec::new();
        if scope == GLOBAL_SCOPE {
            in_progress.extend(property.map(str::to_string));
        }
        self.expand(scope, property, raw, &mut in_progress, 0)
    }

    fn expand(
        &self,
        scope: &str,
        property: Option<&str>,
        text: &str,
        in_progress: &mut Vec<String>,
        pass: usize,
    ) -> Result<String, ConfigError> {
        if !SYMBOL_PATTERN.is_match(text) {
            return Ok(text.to_string());
        }
        if pass >= MAX_SUBSTITUTION_PASSES {
            warn!("global substitution exceeded pass limit (scope={scope})");
            return Err(ConfigError::cycle(
                scope,
                property,
                format!("substitution did not terminate after {MAX_SUBSTITUTION_PASSES} passes"),
            ));
        }

        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for captures in SYMBOL_PATTERN.captures_iter(text) {
            let (Some(token), Some(name)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            let name = name.as_str();
            out.push_str(&text[last..token.start()]);
            if in_progress.iter().any(|active| active == name) {
                let mut chain = in_progress.clone();
                chain.push(name.to_string());
                return Err(ConfigError::cycle(
                    scope,
                    property,
                    format!("global property cycle: {}", chain.join(" -> ")),
                ));
            }
            let value = self.get(name).ok_or_else(|| {
                ConfigError::unknown_reference(
                    scope,
                    property,
                    format!("unknown global property '{name}'"),
                )
            })?;
            in_progress.push(name.to_string());
            let expanded = self.expand(scope, property, &value, in_progress, pass + 1);
            in_progress.pop();
            out.push_str(&expanded?);
            last = token.end();
        }
        out.push_str(&text[last..]);

        // Concatenation can form new tokens.
        self.expand(scope, property, &out, in_progress, pass + 1)
    }

    fn host_name(&self) -> &str {
        self.host_name.get_or_init(|| {
            hostname::get()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_else(|_| "localhost".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table(pairs: &[(&str, &str)]) -> GlobalProperties {
        let mut globals = GlobalProperties::new();
        for (name, value) in pairs {
            globals.set_value(*name, *value).expect("set");
        }
        globals
    }

    #[test]
    fn substitutes_nested_references() {
        let globals = table(&[("greeting", "Hello"), ("who", "World"), ("both", "${greeting} ${who}")]);
        let value = globals
            .replace_global_properties("A", Some("message"), "${both}!")
            .expect("resolved");
        assert_eq!(value, "Hello World!");
    }

    #[test]
    fn acyclic_chain_terminates_without_tokens() {
        let mut globals = GlobalProperties::new();
        globals.set_value("p0", "end").expect("set");
        for idx in 1..20 {
            globals
                .set_value(format!("p{idx}"), format!("${{p{}}}", idx - 1))
                .expect("set");
        }
        let value = globals
            .replace_global_properties("A", None, "${p19}")
            .expect("resolved");
        assert_eq!(value, "end");
        assert!(!GlobalProperties::has_tokens(&value));
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let globals = table(&[("loop", "x ${loop}")]);
        let err = globals
            .replace_global_properties("A", Some("field"), "${loop}")
            .unwrap_err();
        match err {
            ConfigError::Cycle { instance, field, .. } => {
                assert_eq!(instance, "A");
                assert_eq!(field.as_deref(), Some("field"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn indirect_cycle_is_detected() {
        let globals = table(&[("a", "${b}"), ("b", "${c}"), ("c", "${a}")]);
        let err = globals.resolved("a").unwrap_err();
        assert!(err.to_string().contains("a -> b -> c -> a"));
    }

    #[test]
    fn unknown_global_fails() {
        let globals = GlobalProperties::new();
        let err = globals
            .replace_global_properties("A", Some("message"), "${missing}")
            .unwrap_err();
        match err {
            ConfigError::UnknownReference { message, .. } => {
                assert!(message.contains("missing"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn concatenated_tokens_are_rescanned() {
        let globals = table(&[("open", "${"), ("target", "done")]);
        let value = globals
            .replace_global_properties("A", None, "${open}target}")
            .expect("resolved");
        assert_eq!(value, "done");
    }

    #[test]
    fn rejects_invalid_names() {
        let mut globals = GlobalProperties::new();
        assert!(globals.set_value("bad name", "x").is_err());
        assert!(globals.set_value("ok.name-1", "x").is_ok());
    }

    #[test]
    fn strips_reference_wrappers() {
        assert_eq!(GlobalProperties::stripped_name("${name}"), "name");
        assert_eq!(GlobalProperties::stripped_name("plain"), "plain");
    }

    #[test]
    fn host_name_is_computed_unless_overridden() {
        let mut globals = GlobalProperties::new();
        assert!(globals.get(HOST_NAME_PROPERTY).is_some());
        assert!(globals.names().next().is_none());
        globals.set_value(HOST_NAME_PROPERTY, "box").expect("set");
        assert_eq!(globals.get(HOST_NAME_PROPERTY).as_deref(), Some("box"));
    }

    #[test]
    fn preserves_insertion_order_and_equality_ignores_it() {
        let first = table(&[("b", "2"), ("a", "1")]);
        let second = table(&[("a", "1"), ("b", "2")]);
        assert_eq!(first.names().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(first, second);
    }
}
