//! Per-type field metadata describing how a component is configured.
//!
//! A [`ComponentDescriptor`] is built once per component type and replaces
//! runtime introspection: it lists every configurable field with its category,
//! mandatory flag, default, and range or allowed set, plus the factory used to
//! construct a default instance.

use crate::component::{ComponentHandle, ComponentType};
use confgraph_config::{ConfigError, PropertyValue};
use log::warn;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Checks applied to file and path fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileChecks {
    /// The path must exist.
    pub exists: bool,
    /// The path must be readable; a missing path only warns.
    pub readable: bool,
    /// The path must be writable; a missing path needs a writable parent.
    pub writable: bool,
    /// An existing path must be a directory.
    pub directory: bool,
}

impl FileChecks {
    /// No checks.
    pub fn none() -> Self {
        Self::default()
    }

    /// Require the path to exist.
    pub fn exists(mut self) -> Self {
        self.exists = true;
        self
    }

    /// Require the path to be readable.
    pub fn readable(mut self) -> Self {
        self.readable = true;
        self
    }

    /// Require the path to be writable.
    pub fn writable(mut self) -> Self {
        self.writable = true;
        self
    }

    /// Require an existing path to be a directory.
    pub fn directory(mut self) -> Self {
        self.directory = true;
        self
    }
}

/// Value kind of a field or of a collection's elements.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// `true` (case-insensitive) or anything else for `false`.
    Boolean,
    /// Signed integer within an inclusive range.
    Integer { min: i64, max: i64 },
    /// Floating point number within an inclusive range.
    Float { min: f64, max: f64 },
    /// Text, optionally restricted to an allowed set.
    String { allowed: Vec<String> },
    /// One of a fixed set of variants.
    Enum { variants: Vec<String> },
    /// Any subset of a fixed set of variants.
    EnumSet { variants: Vec<String> },
    /// Filesystem path with optional checks.
    File(FileChecks),
    /// Reference to another component, optionally of a declared type.
    Component { type_name: Option<String> },
    /// Ordered list of scalar elements.
    List(Box<FieldKind>),
    /// Duplicate-free list of scalar elements.
    Set(Box<FieldKind>),
    /// String-keyed map of scalar elements.
    Map(Box<FieldKind>),
}

/// Coarse field category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldCategory {
    /// Boolean, number, or string.
    Scalar,
    /// List of scalars.
    List,
    /// Set of scalars.
    Set,
    /// Map of scalars.
    Map,
    /// Single component reference.
    Component,
    /// List, set, or map of component references.
    ComponentCollection,
    /// Single enum variant.
    Enum,
    /// Set of enum variants.
    EnumSet,
    /// File or directory path.
    File,
}

impl FieldKind {
    /// Integer with no range restriction.
    pub fn integer() -> Self {
        Self::Integer {
            min: i64::MIN,
            max: i64::MAX,
        }
    }

    /// Float with no range restriction.
    pub fn float() -> Self {
        Self::Float {
            min: f64::MIN,
            max: f64::MAX,
        }
    }

    /// Unrestricted string.
    pub fn string() -> Self {
        Self::String {
            allowed: Vec::new(),
        }
    }

    /// Reference to a component of the given type.
    pub fn component(type_name: impl Into<String>) -> Self {
        Self::Component {
            type_name: Some(type_name.into()),
        }
    }

    /// Reference to a component of any type.
    pub fn any_component() -> Self {
        Self::Component { type_name: None }
    }

    /// Category of this kind.
    pub fn category(&self) -> FieldCategory {
        match self {
            Self::Boolean | Self::Integer { .. } | Self::Float { .. } | Self::String { .. } => {
                FieldCategory::Scalar
            }
            Self::Enum { .. } => FieldCategory::Enum,
            Self::EnumSet { .. } => FieldCategory::EnumSet,
            Self::File(_) => FieldCategory::File,
            Self::Component { .. } => FieldCategory::Component,
            Self::List(element) | Self::Set(element) | Self::Map(element)
                if element.is_component() =>
            {
                FieldCategory::ComponentCollection
            }
            Self::List(_) => FieldCategory::List,
            Self::Set(_) => FieldCategory::Set,
            Self::Map(_) => FieldCategory::Map,
        }
    }

    /// Whether this is a single component reference.
    pub fn is_component(&self) -> bool {
        matches!(self, Self::Component { .. })
    }

    /// Whether values of this kind hold instance names.
    pub fn references_components(&self) -> bool {
        match self {
            Self::Component { .. } => true,
            Self::List(element) | Self::Set(element) | Self::Map(element) => {
                element.is_component()
            }
            _ => false,
        }
    }

    /// Whether this kind can be a collection element.
    fn is_element(&self) -> bool {
        !matches!(
            self,
            Self::List(_) | Self::Set(_) | Self::Map(_) | Self::EnumSet { .. }
        )
    }
}

/// Metadata for one configurable field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    /// Property name as it appears in records.
    pub name: String,
    /// Value kind.
    pub kind: FieldKind,
    /// Construction fails when no value and no default exist.
    pub mandatory: bool,
    /// Raw default used when the record has no value.
    pub default: Option<PropertyValue>,
    /// Optional human-readable description.
    pub description: Option<String>,
}

impl FieldSpec {
    /// Field of an arbitrary kind.
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            mandatory: false,
            default: None,
            description: None,
        }
    }

    /// Boolean field.
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Boolean)
    }

    /// Unbounded integer field.
    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::integer())
    }

    /// Integer field within an inclusive range.
    pub fn integer_in(name: impl Into<String>, min: i64, max: i64) -> Self {
        Self::new(name, FieldKind::Integer { min, max })
    }

    /// Unbounded float field.
    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::float())
    }

    /// Float field within an inclusive range.
    pub fn float_in(name: impl Into<String>, min: f64, max: f64) -> Self {
        Self::new(name, FieldKind::Float { min, max })
    }

    /// Unrestricted string field.
    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::string())
    }

    /// String field restricted to an allowed set.
    pub fn string_in<I, S>(name: impl Into<String>, allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            name,
            FieldKind::String {
                allowed: allowed.into_iter().map(Into::into).collect(),
            },
        )
    }

    /// Enum field.
    pub fn enumeration<I, S>(name: impl Into<String>, variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            name,
            FieldKind::Enum {
                variants: variants.into_iter().map(Into::into).collect(),
            },
        )
    }

    /// Enum-set field.
    pub fn enum_set<I, S>(name: impl Into<String>, variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            name,
            FieldKind::EnumSet {
                variants: variants.into_iter().map(Into::into).collect(),
            },
        )
    }

    /// File or directory field.
    pub fn file(name: impl Into<String>, checks: FileChecks) -> Self {
        Self::new(name, FieldKind::File(checks))
    }

    /// Component reference of a declared type.
    pub fn component(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::component(type_name))
    }

    /// Component reference of any type.
    pub fn any_component(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::any_component())
    }

    /// List of components of a declared type.
    pub fn component_list(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::List(Box::new(FieldKind::component(type_name))))
    }

    /// Map of components of a declared type.
    pub fn component_map(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Map(Box::new(FieldKind::component(type_name))))
    }

    /// Ordered list field.
    pub fn list(name: impl Into<String>, element: FieldKind) -> Self {
        Self::new(name, FieldKind::List(Box::new(element)))
    }

    /// Set field.
    pub fn set(name: impl Into<String>, element: FieldKind) -> Self {
        Self::new(name, FieldKind::Set(Box::new(element)))
    }

    /// Map field.
    pub fn map(name: impl Into<String>, element: FieldKind) -> Self {
        Self::new(name, FieldKind::Map(Box::new(element)))
    }

    /// Mark the field mandatory.
    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    /// Set the raw default value.
    pub fn default_value(mut self, value: impl Into<PropertyValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Attach a description.
    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Field category.
    pub fn category(&self) -> FieldCategory {
        self.kind.category()
    }
}

/// Builds a fresh, unconfigured instance.
pub type Factory = Arc<dyn Fn() -> ComponentHandle + Send + Sync>;

/// Everything the manager needs to know about one component type.
#[derive(Clone)]
pub struct ComponentDescriptor {
    type_name: String,
    interfaces: Vec<String>,
    fields: Vec<FieldSpec>,
    remote_capable: bool,
    factory: Option<Factory>,
}

impl fmt::Debug for ComponentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDescriptor")
            .field("type_name", &self.type_name)
            .field("interfaces", &self.interfaces)
            .field("fields", &self.fields)
            .field("remote_capable", &self.remote_capable)
            .field("constructible", &self.factory.is_some())
            .finish()
    }
}

impl ComponentDescriptor {
    /// Descriptor for a concrete component type.
    pub fn of<T: ComponentType>() -> Self {
        Self {
            type_name: T::TYPE_NAME.to_string(),
            interfaces: T::interfaces(),
            fields: T::fields(),
            remote_capable: T::remote_capable(),
            factory: Some(Arc::new(|| ComponentHandle::new(T::default()))),
        }
    }

    /// Descriptor for an interface-shaped type with no local constructor.
    pub fn interface(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            interfaces: Vec::new(),
            fields: Vec::new(),
            remote_capable: false,
            factory: None,
        }
    }

    /// Descriptor built from parts, for types registered without a Rust type.
    pub fn custom(
        type_name: impl Into<String>,
        fields: Vec<FieldSpec>,
        factory: Option<Factory>,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            interfaces: Vec::new(),
            fields,
            remote_capable: false,
            factory,
        }
    }

    /// Add implemented interfaces.
    pub fn with_interfaces<I, S>(mut self, interfaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.interfaces
            .extend(interfaces.into_iter().map(Into::into));
        self
    }

    /// Set the remote-capable flag.
    pub fn with_remote_capable(mut self, remote_capable: bool) -> Self {
        self.remote_capable = remote_capable;
        self
    }

    /// Type name.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Implemented interface names.
    pub fn interfaces(&self) -> &[String] {
        &self.interfaces
    }

    /// All declared fields.
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Field metadata by name.
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Whether instances may be satisfied from a remote registry.
    pub fn remote_capable(&self) -> bool {
        self.remote_capable
    }

    /// Whether the type has no local constructor.
    pub fn is_interface(&self) -> bool {
        self.factory.is_none()
    }

    /// Whether the type is or implements `type_name`.
    pub fn implements(&self, type_name: &str) -> bool {
        self.type_name == type_name || self.interfaces.iter().any(|iface| iface == type_name)
    }

    /// Type name followed by interface names.
    pub fn type_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.interfaces.len() + 1);
        names.push(self.type_name.clone());
        names.extend(self.interfaces.iter().cloned());
        names
    }

    /// Build a fresh, unconfigured instance.
    pub fn instantiate(&self) -> Option<ComponentHandle> {
        self.factory.as_ref().map(|factory| factory())
    }

    /// Check field metadata for internal consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(ConfigError::duplicate(
                    self.type_name.clone(),
                    format!("field '{}' is declared twice", field.name),
                ));
            }
            let invalid = |message: String| {
                Err(ConfigError::construction(self.type_name.clone(), message).with_field(&field.name))
            };
            match &field.kind {
                FieldKind::List(element) | FieldKind::Set(element) | FieldKind::Map(element)
                    if !element.is_element() =>
                {
                    return invalid("collections cannot nest collections".to_string());
                }
                FieldKind::Integer { min, max } if min > max => {
                    return invalid(format!("empty range [{min}, {max}]"));
                }
                FieldKind::Float { min, max } if min > max => {
                    return invalid(format!("empty range [{min}, {max}]"));
                }
                FieldKind::Enum { variants } | FieldKind::EnumSet { variants }
                    if variants.is_empty() =>
                {
                    return invalid("enum fields need at least one variant".to_string());
                }
                _ => {}
            }
            if field.mandatory && field.default.is_some() {
                warn!(
                    "mandatory field has a default (type={}, field={})",
                    self.type_name,
                    field.name
                );
            }
        }
        Ok(())
    }
}
