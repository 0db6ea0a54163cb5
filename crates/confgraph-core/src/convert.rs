//! String-to-typed conversion with range, allowed-set, and file checks.

use crate::component::ComponentHandle;
use crate::descriptor::{FieldKind, FieldSpec, FileChecks};
use confgraph_config::{ConfigError, ListItem, PropertyValue};
use log::warn;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fs;
use std::hash::Hash;
use std::path::{Path, PathBuf};

/// A property value after substitution, conversion, and validation.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    /// Boolean value.
    Boolean(bool),
    /// Integer value.
    Integer(i64),
    /// Float value.
    Float(f64),
    /// Text, string, or enum variant.
    Text(String),
    /// Filesystem path.
    Path(PathBuf),
    /// Constructed component.
    Component(ComponentHandle),
    /// List or set elements, or enum-set variants.
    List(Vec<Resolved>),
    /// Map entries.
    Map(BTreeMap<String, Resolved>),
}

impl Resolved {
    /// Short kind label used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Boolean(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Path(_) => "path",
            Self::Component(_) => "component",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }
}

/// Lookups the converter needs from its surroundings.
pub(crate) trait ResolveContext {
    /// Instance whose field is being resolved.
    fn instance_name(&self) -> &str;
    /// Substitute global tokens in a value read from `field`.
    fn substitute(&self, field: &str, text: &str) -> Result<String, ConfigError>;
    /// Resolve an instance name to a constructed component.
    fn component(&self, field: &str, name: &str) -> Result<ComponentHandle, ConfigError>;
    /// Every current instance of a type.
    fn components_of_type(
        &self,
        field: &str,
        type_name: &str,
    ) -> Result<Vec<ComponentHandle>, ConfigError>;
    /// Whether `actual` satisfies a declared `expected` type.
    fn conforms(&self, actual: &str, expected: &str) -> bool;
}

/// Convert a raw value according to the field's metadata.
pub(crate) fn resolve(
    ctx: &dyn ResolveContext,
    field: &FieldSpec,
    raw: &PropertyValue,
) -> Result<Resolved, ConfigError> {
    let mismatch = |expected: &str| {
        ConfigError::conversion(
            ctx.instance_name(),
            &field.name,
            format!("expected a {expected}, found a {}", raw.shape()),
        )
    };
    match (&field.kind, raw) {
        (FieldKind::List(element), PropertyValue::List(items)) => {
            Ok(Resolved::List(resolve_items(ctx, field, element, items)?))
        }
        (FieldKind::Set(element), PropertyValue::List(items)) => {
            let mut unique = Vec::with_capacity(items.len());
            for value in resolve_items(ctx, field, element, items)? {
                if !unique.contains(&value) {
                    unique.push(value);
                }
            }
            Ok(Resolved::List(unique))
        }
        (FieldKind::EnumSet { variants }, PropertyValue::List(items)) => {
            let mut chosen: Vec<Resolved> = Vec::with_capacity(items.len());
            for item in items {
                let ListItem::Value(value) = item else {
                    return Err(ConfigError::conversion(
                        ctx.instance_name(),
                        &field.name,
                        "type references are only valid in component collections",
                    ));
                };
                let text = ctx.substitute(&field.name, value)?;
                let variant = Resolved::Text(match_variant(ctx, field, variants, &text)?);
                if !chosen.contains(&variant) {
                    chosen.push(variant);
                }
            }
            Ok(Resolved::List(chosen))
        }
        (FieldKind::Map(element), PropertyValue::Map(entries)) => {
            let mut resolved = BTreeMap::new();
            for (key, value) in entries {
                let text = ctx.substitute(&field.name, value)?;
                resolved.insert(key.clone(), scalar(ctx, field, element, &text)?);
            }
            Ok(Resolved::Map(resolved))
        }
        (FieldKind::List(_) | FieldKind::Set(_) | FieldKind::EnumSet { .. }, _) => {
            Err(mismatch("list"))
        }
        (FieldKind::Map(_), _) => Err(mismatch("map")),
        (kind, PropertyValue::Text(text)) => {
            let text = ctx.substitute(&field.name, text)?;
            scalar(ctx, field, kind, &text)
        }
        (_, _) => Err(mismatch("single value")),
    }
}

fn resolve_items(
    ctx: &dyn ResolveContext,
    field: &FieldSpec,
    element: &FieldKind,
    items: &[ListItem],
) -> Result<Vec<Resolved>, ConfigError> {
    let mut resolved = Vec::with_capacity(items.len());
    for item in items {
        match item {
            ListItem::Value(value) => {
                let text = ctx.substitute(&field.name, value)?;
                resolved.push(scalar(ctx, field, element, &text)?);
            }
            ListItem::TypeRef(type_name) => {
                let FieldKind::Component { type_name: expected } = element else {
                    return Err(ConfigError::conversion(
                        ctx.instance_name(),
                        &field.name,
                        "type references are only valid in component collections",
                    ));
                };
                for handle in ctx.components_of_type(&field.name, type_name)? {
                    check_component_type(ctx, field, expected.as_deref(), type_name, &handle)?;
                    resolved.push(Resolved::Component(handle));
                }
            }
        }
    }
    Ok(resolved)
}

fn scalar(
    ctx: &dyn ResolveContext,
    field: &FieldSpec,
    kind: &FieldKind,
    text: &str,
) -> Result<Resolved, ConfigError> {
    let fail = |message: String| ConfigError::conversion(ctx.instance_name(), &field.name, message);
    match kind {
        FieldKind::Boolean => Ok(Resolved::Boolean(text.trim().eq_ignore_ascii_case("true"))),
        FieldKind::Integer { min, max } => {
            let value = text
                .trim()
                .parse::<i64>()
                .map_err(|_| fail(format!("'{text}' is not an integer")))?;
            if value < *min || value > *max {
                return Err(fail(format!("{value} is outside the range [{min}, {max}]")));
            }
            Ok(Resolved::Integer(value))
        }
        FieldKind::Float { min, max } => {
            let value = text
                .trim()
                .parse::<f64>()
                .map_err(|_| fail(format!("'{text}' is not a number")))?;
            if !(*min..=*max).contains(&value) {
                return Err(fail(format!("{value} is outside the range [{min}, {max}]")));
            }
            Ok(Resolved::Float(value))
        }
        FieldKind::String { allowed } => {
            if !allowed.is_empty() && !allowed.iter().any(|candidate| candidate == text) {
                return Err(fail(format!(
                    "'{text}' is not one of [{}]",
                    allowed.join(", ")
                )));
            }
            Ok(Resolved::Text(text.to_string()))
        }
        FieldKind::Enum { variants } => {
            Ok(Resolved::Text(match_variant(ctx, field, variants, text)?))
        }
        FieldKind::File(checks) => {
            check_file(ctx, field, checks, Path::new(text))?;
            Ok(Resolved::Path(PathBuf::from(text)))
        }
        FieldKind::Component { type_name } => {
            let handle = ctx.component(&field.name, text)?;
            check_component_type(ctx, field, type_name.as_deref(), text, &handle)?;
            Ok(Resolved::Component(handle))
        }
        FieldKind::List(_) | FieldKind::Set(_) | FieldKind::Map(_) | FieldKind::EnumSet { .. } => {
            Err(fail("collections cannot nest collections".to_string()))
        }
    }
}

/// Exact variant match, falling back to an upper-case match.
fn match_variant(
    ctx: &dyn ResolveContext,
    field: &FieldSpec,
    variants: &[String],
    text: &str,
) -> Result<String, ConfigError> {
    let text = text.trim();
    if let Some(variant) = variants.iter().find(|variant| *variant == text) {
        return Ok(variant.clone());
    }
    let upper = text.to_uppercase();
    if let Some(variant) = variants.iter().find(|variant| **variant == upper) {
        return Ok(variant.clone());
    }
    Err(ConfigError::conversion(
        ctx.instance_name(),
        &field.name,
        format!("'{text}' is not one of [{}]", variants.join(", ")),
    ))
}

fn check_component_type(
    ctx: &dyn ResolveContext,
    field: &FieldSpec,
    expected: Option<&str>,
    reference: &str,
    handle: &ComponentHandle,
) -> Result<(), ConfigError> {
    match expected {
        Some(expected) if !ctx.conforms(handle.type_name(), expected) => {
            Err(ConfigError::conversion(
                ctx.instance_name(),
                &field.name,
                format!(
                    "'{reference}' resolved to a {} but a {expected} is required",
                    handle.type_name()
                ),
            ))
        }
        _ => Ok(()),
    }
}

fn check_file(
    ctx: &dyn ResolveContext,
    field: &FieldSpec,
    checks: &FileChecks,
    path: &Path,
) -> Result<(), ConfigError> {
    let fail = |message: String| ConfigError::conversion(ctx.instance_name(), &field.name, message);
    let shown = path.display();
    match fs::metadata(path) {
        Ok(metadata) => {
            if checks.directory && !metadata.is_dir() {
                return Err(fail(format!("{shown} is not a directory")));
            }
            if checks.readable {
                let readable = if metadata.is_dir() {
                    fs::read_dir(path).is_ok()
                } else {
                    fs::File::open(path).is_ok()
                };
                if !readable {
                    return Err(fail(format!("{shown} is not readable")));
                }
            }
            if checks.writable && metadata.permissions().readonly() {
                return Err(fail(format!("{shown} is not writable")));
            }
            Ok(())
        }
        Err(_) => {
            if checks.exists {
                return Err(fail(format!("{shown} does not exist")));
            }
            if checks.readable {
                warn!(
                    "readable file does not exist yet (instance={}, field={}, path={shown})",
                    ctx.instance_name(),
                    field.name
                );
            }
            if checks.writable {
                let parent = match path.parent() {
                    Some(parent) if !parent.as_os_str().is_empty() => parent,
                    _ => Path::new("."),
                };
                let writable_parent = fs::metadata(parent)
                    .map(|metadata| metadata.is_dir() && !metadata.permissions().readonly())
                    .unwrap_or(false);
                if !writable_parent {
                    return Err(fail(format!(
                        "{shown} does not exist and its parent directory is not writable"
                    )));
                }
            }
            Ok(())
        }
    }
}

/// Conversion from a resolved value into a Rust type.
pub trait FromProperty: Sized {
    /// Convert, returning a description of the mismatch on failure.
    fn from_resolved(value: Resolved) -> Result<Self, String>;
}

fn mismatch(expected: &str, found: &Resolved) -> String {
    format!("expected {expected}, found {}", found.kind_name())
}

impl FromProperty for Resolved {
    fn from_resolved(value: Resolved) -> Result<Self, String> {
        Ok(value)
    }
}

impl FromProperty for bool {
    fn from_resolved(value: Resolved) -> Result<Self, String> {
        match value {
            Resolved::Boolean(flag) => Ok(flag),
            other => Err(mismatch("boolean", &other)),
        }
    }
}

impl FromProperty for i64 {
    fn from_resolved(value: Resolved) -> Result<Self, String> {
        match value {
            Resolved::Integer(number) => Ok(number),
            other => Err(mismatch("integer", &other)),
        }
    }
}

macro_rules! impl_from_property_int {
    ($($ty:ty),*) => {
        $(
            impl FromProperty for $ty {
                fn from_resolved(value: Resolved) -> Result<Self, String> {
                    let number = i64::from_resolved(value)?;
                    <$ty>::try_from(number).map_err(|_| {
                        format!("{number} does not fit in {}", stringify!($ty))
                    })
                }
            }
        )*
    };
}

impl_from_property_int!(i8, i16, i32, isize, u8, u16, u32, u64, usize);

impl FromProperty for f64 {
    fn from_resolved(value: Resolved) -> Result<Self, String> {
        match value {
            Resolved::Float(number) => Ok(number),
            Resolved::Integer(number) => Ok(number as f64),
            other => Err(mismatch("float", &other)),
        }
    }
}

impl FromProperty for f32 {
    fn from_resolved(value: Resolved) -> Result<Self, String> {
        f64::from_resolved(value).map(|number| number as f32)
    }
}

impl FromProperty for String {
    fn from_resolved(value: Resolved) -> Result<Self, String> {
        match value {
            Resolved::Text(text) => Ok(text),
            other => Err(mismatch("text", &other)),
        }
    }
}

impl FromProperty for PathBuf {
    fn from_resolved(value: Resolved) -> Result<Self, String> {
        match value {
            Resolved::Path(path) => Ok(path),
            Resolved::Text(text) => Ok(PathBuf::from(text)),
            other => Err(mismatch("path", &other)),
        }
    }
}

impl FromProperty for ComponentHandle {
    fn from_resolved(value: Resolved) -> Result<Self, String> {
        match value {
            Resolved::Component(handle) => Ok(handle),
            other => Err(mismatch("component", &other)),
        }
    }
}

impl<T: FromProperty> FromProperty for Vec<T> {
    fn from_resolved(value: Resolved) -> Result<Self, String> {
        match value {
            Resolved::List(items) => items.into_iter().map(T::from_resolved).collect(),
            other => Err(mismatch("list", &other)),
        }
    }
}

impl<T: FromProperty + Ord> FromProperty for BTreeSet<T> {
    fn from_resolved(value: Resolved) -> Result<Self, String> {
        Vec::<T>::from_resolved(value).map(|items| items.into_iter().collect())
    }
}

impl<T: FromProperty + Eq + Hash> FromProperty for HashSet<T> {
    fn from_resolved(value: Resolved) -> Result<Self, String> {
        Vec::<T>::from_resolved(value).map(|items| items.into_iter().collect())
    }
}

impl<T: FromProperty> FromProperty for BTreeMap<String, T> {
    fn from_resolved(value: Resolved) -> Result<Self, String> {
        match value {
            Resolved::Map(entries) => entries
                .into_iter()
                .map(|(key, value)| T::from_resolved(value).map(|value| (key, value)))
                .collect(),
            other => Err(mismatch("map", &other)),
        }
    }
}

impl<T: FromProperty> FromProperty for HashMap<String, T> {
    fn from_resolved(value: Resolved) -> Result<Self, String> {
        BTreeMap::<String, T>::from_resolved(value).map(|entries| entries.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::FieldSpec;
    use confgraph_config::GlobalProperties;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    /// Context with globals and no components.
    struct Plain {
        globals: GlobalProperties,
    }

    impl Plain {
        fn new() -> Self {
            let mut globals = GlobalProperties::new();
            globals.set_value("level", "7").expect("set");
            Self { globals }
        }
    }

    impl ResolveContext for Plain {
        fn instance_name(&self) -> &str {
            "inst"
        }

        fn substitute(&self, field: &str, text: &str) -> Result<String, ConfigError> {
            self.globals
                .replace_global_properties("inst", Some(field), text)
        }

        fn component(&self, field: &str, name: &str) -> Result<ComponentHandle, ConfigError> {
            Err(ConfigError::unknown_reference(
                "inst",
                Some(field),
                format!("no component '{name}'"),
            ))
        }

        fn components_of_type(
            &self,
            _field: &str,
            _type_name: &str,
        ) -> Result<Vec<ComponentHandle>, ConfigError> {
            Ok(Vec::new())
        }

        fn conforms(&self, actual: &str, expected: &str) -> bool {
            actual == expected
        }
    }

    fn text(value: &str) -> PropertyValue {
        PropertyValue::Text(value.to_string())
    }

    #[test]
    fn integers_respect_range_and_globals() {
        let ctx = Plain::new();
        let field = FieldSpec::integer_in("count", 0, 10);
        assert_eq!(
            resolve(&ctx, &field, &text("${level}")).expect("value"),
            Resolved::Integer(7)
        );
        let err = resolve(&ctx, &field, &text("11")).unwrap_err();
        match err {
            ConfigError::TypeConversion { instance, field, message } => {
                assert_eq!(instance, "inst");
                assert_eq!(field.as_deref(), Some("count"));
                assert!(message.contains("outside the range"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(resolve(&ctx, &field, &text("seven")).is_err());
    }

    #[test]
    fn floats_reject_out_of_range_and_nan() {
        let ctx = Plain::new();
        let field = FieldSpec::float_in("ratio", 0.0, 1.0);
        assert_eq!(
            resolve(&ctx, &field, &text("0.25")).expect("value"),
            Resolved::Float(0.25)
        );
        assert!(resolve(&ctx, &field, &text("1.5")).is_err());
        assert!(resolve(&ctx, &field, &text("NaN")).is_err());
    }

    #[test]
    fn booleans_follow_parse_boolean() {
        let ctx = Plain::new();
        let field = FieldSpec::boolean("flag");
        assert_eq!(
            resolve(&ctx, &field, &text("TRUE")).expect("value"),
            Resolved::Boolean(true)
        );
        assert_eq!(
            resolve(&ctx, &field, &text("yes")).expect("value"),
            Resolved::Boolean(false)
        );
    }

    #[test]
    fn strings_respect_allowed_set() {
        let ctx = Plain::new();
        let field = FieldSpec::string_in("mode", ["fast", "safe"]);
        assert!(resolve(&ctx, &field, &text("fast")).is_ok());
        let err = resolve(&ctx, &field, &text("slow")).unwrap_err();
        assert!(err.to_string().contains("not one of [fast, safe]"));
    }

    #[test]
    fn enums_fall_back_to_upper_case() {
        let ctx = Plain::new();
        let field = FieldSpec::enumeration("mode", ["FAST", "SAFE"]);
        assert_eq!(
            resolve(&ctx, &field, &text("fast")).expect("value"),
            Resolved::Text("FAST".to_string())
        );
        assert!(resolve(&ctx, &field, &text("slow")).is_err());

        let set = FieldSpec::enum_set("modes", ["FAST", "SAFE"]);
        let value = resolve(&ctx, &set, &PropertyValue::list(["safe", "SAFE", "fast"]))
            .expect("value");
        assert_eq!(
            value,
            Resolved::List(vec![
                Resolved::Text("SAFE".to_string()),
                Resolved::Text("FAST".to_string()),
            ])
        );
    }

    #[test]
    fn lists_substitute_elements_lazily_and_sets_dedupe() {
        let ctx = Plain::new();
        let list = FieldSpec::list("levels", FieldKind::integer());
        let value = resolve(&ctx, &list, &PropertyValue::list(["1", "${level}", "1"])).expect("list");
        assert_eq!(
            Vec::<i64>::from_resolved(value).expect("ints"),
            vec![1, 7, 1]
        );

        let set = FieldSpec::set("levels", FieldKind::integer());
        let value = resolve(&ctx, &set, &PropertyValue::list(["1", "${level}", "1"])).expect("set");
        assert_eq!(Vec::<i64>::from_resolved(value).expect("ints"), vec![1, 7]);
    }

    #[test]
    fn maps_convert_values() {
        let ctx = Plain::new();
        let field = FieldSpec::map("weights", FieldKind::float());
        let value = resolve(&ctx, &field, &PropertyValue::map([("a", "0.5"), ("b", "${level}")]))
            .expect("map");
        let weights = BTreeMap::<String, f64>::from_resolved(value).expect("weights");
        assert_eq!(weights.get("b"), Some(&7.0));
    }

    #[test]
    fn shape_mismatches_are_conversion_errors() {
        let ctx = Plain::new();
        let list = FieldSpec::list("names", FieldKind::string());
        assert!(matches!(
            resolve(&ctx, &list, &text("x")).unwrap_err(),
            ConfigError::TypeConversion { .. }
        ));
        let scalar = FieldSpec::string("name");
        assert!(matches!(
            resolve(&ctx, &scalar, &PropertyValue::list(["x"])).unwrap_err(),
            ConfigError::TypeConversion { .. }
        ));
        let type_ref = PropertyValue::List(vec![ListItem::TypeRef("Service".to_string())]);
        assert!(resolve(&ctx, &list, &type_ref).is_err());
    }

    #[test]
    fn file_checks_cover_existence_and_directories() {
        let temp = TempDir::new().expect("tmp");
        let dir = temp.path().display().to_string();
        let missing = temp.path().join("missing.txt").display().to_string();
        let ctx = Plain::new();

        let must_exist = FieldSpec::file("input", FileChecks::none().exists());
        assert!(resolve(&ctx, &must_exist, &text(&missing)).is_err());

        let readable = FieldSpec::file("input", FileChecks::none().readable());
        assert_eq!(
            resolve(&ctx, &readable, &text(&missing)).expect("warn only"),
            Resolved::Path(PathBuf::from(&missing))
        );

        let writable = FieldSpec::file("output", FileChecks::none().writable());
        assert!(resolve(&ctx, &writable, &text(&missing)).is_ok());

        let directory = FieldSpec::file("root", FileChecks::none().directory());
        assert!(resolve(&ctx, &directory, &text(&dir)).is_ok());
        fs::write(temp.path().join("file.txt"), "x").expect("write");
        let file = temp.path().join("file.txt").display().to_string();
        assert!(resolve(&ctx, &directory, &text(&file)).is_err());
    }

    #[test]
    fn narrowing_conversions_check_bounds() {
        assert_eq!(u8::from_resolved(Resolved::Integer(200)), Ok(200));
        assert!(u8::from_resolved(Resolved::Integer(300)).is_err());
        assert!(String::from_resolved(Resolved::Integer(1)).is_err());
    }
}
