//! Error types for configuration loading, substitution, and assembly.

use thiserror::Error;

/// Errors returned while loading, resolving, or assembling configuration.
///
/// Every variant that describes a configuration problem carries the instance
/// name it concerns, the field name when one applies, and a message.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading a config file failed.
    #[error("failed to read config: {0}")]
    ReadFailed(#[from] std::io::Error),
    /// Parsing a config file failed.
    #[error("failed to parse config: {0}")]
    ParseFailed(#[from] json5::Error),
    /// Encoding or decoding JSON values failed.
    #[error("failed to decode config: {0}")]
    DecodeFailed(#[from] serde_json::Error),
    /// A record or document is malformed.
    #[error("configuration syntax error at {}: {message}", location(.instance, .field))]
    ConfigurationSyntax {
        instance: String,
        field: Option<String>,
        message: String,
    },
    /// A property is not declared by the component type.
    #[error("unknown property at {}: {message}", location(.instance, .field))]
    UnknownProperty {
        instance: String,
        field: Option<String>,
        message: String,
    },
    /// A mandatory property has neither a value nor a default.
    #[error("mandatory value missing at {}: {message}", location(.instance, .field))]
    MandatoryValueMissing {
        instance: String,
        field: Option<String>,
        message: String,
    },
    /// A value could not be converted, is out of range, or is not allowed.
    #[error("type conversion failed at {}: {message}", location(.instance, .field))]
    TypeConversion {
        instance: String,
        field: Option<String>,
        message: String,
    },
    /// An instance, type, or global property name could not be resolved.
    #[error("unknown reference at {}: {message}", location(.instance, .field))]
    UnknownReference {
        instance: String,
        field: Option<String>,
        message: String,
    },
    /// A component or global property name is already taken.
    #[error("duplicate name at {}: {message}", location(.instance, .field))]
    DuplicateName {
        instance: String,
        field: Option<String>,
        message: String,
    },
    /// A component could not be constructed or its hooks failed.
    #[error("construction failed at {}: {message}", location(.instance, .field))]
    Construction {
        instance: String,
        field: Option<String>,
        message: String,
    },
    /// A global property or component graph references itself.
    #[error("cycle detected at {}: {message}", location(.instance, .field))]
    Cycle {
        instance: String,
        field: Option<String>,
        message: String,
    },
    /// The component registry backend failed.
    #[error("registry error: {0}")]
    Registry(String),
}

fn location(instance: &str, field: &Option<String>) -> String {
    match field {
        Some(field) => format!("{instance}.{field}"),
        None => instance.to_string(),
    }
}

impl ConfigError {
    /// Malformed record or document.
    pub fn syntax(instance: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigurationSyntax {
            instance: instance.into(),
            field: None,
            message: message.into(),
        }
    }

    /// Malformed value at a specific path within a record or document.
    pub fn syntax_at(
        instance: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::ConfigurationSyntax {
            instance: instance.into(),
            field: Some(field.into()),
            message: message.into(),
        }
    }

    /// Property not declared by the owning type.
    pub fn unknown_property(
        instance: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::UnknownProperty {
            instance: instance.into(),
            field: Some(field.into()),
            message: message.into(),
        }
    }

    /// Mandatory property with no value.
    pub fn mandatory(instance: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MandatoryValueMissing {
            instance: instance.into(),
            field: Some(field.into()),
            message: "is mandatory in configuration".to_string(),
        }
    }

    /// Conversion, range, or allowed-set failure.
    pub fn conversion(
        instance: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::TypeConversion {
            instance: instance.into(),
            field: Some(field.into()),
            message: message.into(),
        }
    }

    /// Unresolvable instance, type, or global name.
    pub fn unknown_reference(
        instance: impl Into<String>,
        field: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        Self::UnknownReference {
            instance: instance.into(),
            field: field.map(str::to_string),
            message: message.into(),
        }
    }

    /// Name collision.
    pub fn duplicate(instance: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DuplicateName {
            instance: instance.into(),
            field: None,
            message: message.into(),
        }
    }

    /// Construction or hook failure.
    pub fn construction(instance: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Construction {
            instance: instance.into(),
            field: None,
            message: message.into(),
        }
    }

    /// Self-referential substitution or construction.
    pub fn cycle(
        instance: impl Into<String>,
        field: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        Self::Cycle {
            instance: instance.into(),
            field: field.map(str::to_string),
            message: message.into(),
        }
    }

    /// Instance name the error concerns, if any.
    pub fn instance_name(&self) -> Option<&str> {
        match self {
            Self::ConfigurationSyntax { instance, .. }
            | Self::UnknownProperty { instance, .. }
            | Self::MandatoryValueMissing { instance, .. }
            | Self::TypeConversion { instance, .. }
            | Self::UnknownReference { instance, .. }
            | Self::DuplicateName { instance, .. }
            | Self::Construction { instance, .. }
            | Self::Cycle { instance, .. } => Some(instance),
            _ => None,
        }
    }

    /// Field name the error concerns, if any.
    pub fn field_name(&self) -> Option<&str> {
        match self {
            Self::ConfigurationSyntax { field, .. }
            | Self::UnknownProperty { field, .. }
            | Self::MandatoryValueMissing { field, .. }
            | Self::TypeConversion { field, .. }
            | Self::UnknownReference { field, .. }
            | Self::DuplicateName { field, .. }
            | Self::Construction { field, .. }
            | Self::Cycle { field, .. } => field.as_deref(),
            _ => None,
        }
    }

    /// Attach a field name when the error does not carry one yet.
    pub fn with_field(mut self, name: &str) -> Self {
        match &mut self {
            Self::ConfigurationSyntax { field, .. }
            | Self::UnknownProperty { field, .. }
            | Self::MandatoryValueMissing { field, .. }
            | Self::TypeConversion { field, .. }
            | Self::UnknownReference { field, .. }
            | Self::DuplicateName { field, .. }
            | Self::Construction { field, .. }
            | Self::Cycle { field, .. } => {
                if field.is_none() {
                    *field = Some(name.to_string());
                }
            }
            _ => {}
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::ConfigError;
    use pretty_assertions::assert_eq;

    #[test]
    fn display_includes_instance_and_field() {
        let err = ConfigError::mandatory("greeter", "message");
        assert_eq!(
            err.to_string(),
            "mandatory value missing at greeter.message: is mandatory in configuration"
        );
        assert_eq!(err.instance_name(), Some("greeter"));
        assert_eq!(err.field_name(), Some("message"));
    }

    #[test]
    fn with_field_keeps_existing_field() {
        let err = ConfigError::conversion("a", "count", "bad").with_field("other");
        assert_eq!(err.field_name(), Some("count"));
        let err = ConfigError::construction("a", "boom").with_field("child");
        assert_eq!(err.field_name(), Some("child"));
    }
}
