//! Application definition schema.
//!
//! The schema is a static table: one [`SectionSpec`] per section, each
//! listing its [`FieldSpec`]s. A single generic routine in
//! [`crate::validate`] consumes the table, so adding a key is a table edit.

use serde_yaml_ng::Value;
use std::fmt;

/// Shape of a section container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// The section is a single node.
    Mapping,
    /// The section is a list of nodes.
    List,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mapping => write!(f, "mapping"),
            Self::List => write!(f, "list"),
        }
    }
}

/// Declared type of a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    /// A string.
    Str,
    /// An integer.
    Int,
    /// A boolean.
    Bool,
    /// A list of strings. A single string is promoted to a one-element list.
    StrList,
}

impl ValueType {
    /// Name used in error messages.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Str => "str",
            Self::Int => "int",
            Self::Bool => "bool",
            Self::StrList => "list of str",
        }
    }

    /// Whether a non-null scalar value has this type.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::Str => value.is_string(),
            Self::Int => value.is_i64() || value.is_u64(),
            Self::Bool => value.is_bool(),
            Self::StrList => value
                .as_sequence()
                .is_some_and(|items| items.iter().all(Value::is_string)),
        }
    }
}

/// Default value of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultValue {
    /// No default (null).
    None,
    /// String default.
    Str(&'static str),
    /// Integer default.
    Int(i64),
    /// Boolean default.
    Bool(bool),
}

impl DefaultValue {
    /// The default as a YAML value.
    pub fn to_value(self) -> Value {
        match self {
            Self::None => Value::Null,
            Self::Str(s) => Value::String(s.to_string()),
            Self::Int(i) => Value::Number(i.into()),
            Self::Bool(b) => Value::Bool(b),
        }
    }
}

/// Schema of one key in a node.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Key name.
    pub name: &'static str,
    /// Declared value type.
    pub value_type: ValueType,
    /// Whether the key must resolve to a non-null value.
    pub required: bool,
    /// Value used when the key is absent.
    pub default: DefaultValue,
    /// Permitted values. Empty means unrestricted.
    pub values: &'static [&'static str],
    /// Human readable description.
    pub description: &'static str,
}

impl FieldSpec {
    const fn new(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            value_type: ValueType::Str,
            required: false,
            default: DefaultValue::None,
            values: &[],
            description,
        }
    }

    const fn required(self) -> Self {
        Self {
            required: true,
            ..self
        }
    }

    const fn typed(self, value_type: ValueType) -> Self {
        Self { value_type, ..self }
    }

    const fn default(self, default: DefaultValue) -> Self {
        Self { default, ..self }
    }

    const fn one_of(self, values: &'static [&'static str]) -> Self {
        Self { values, ..self }
    }

    /// The default as a YAML value (`Null` when there is none).
    pub fn default_value(&self) -> Value {
        self.default.to_value()
    }
}

/// Schema of one section of the definition.
#[derive(Debug, Clone, Copy)]
pub struct SectionSpec {
    /// Section name.
    pub name: &'static str,
    /// Container kind.
    pub kind: NodeKind,
    /// Keys of each node.
    pub fields: &'static [FieldSpec],
}

impl SectionSpec {
    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Whether `name` is a schema key (anything else is an environment name).
    pub fn is_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }
}

const APPLICATION: &[FieldSpec] = &[
    FieldSpec::new("name", "Application name").required(),
    FieldSpec::new("version", "Application version").required(),
    FieldSpec::new("type", "Application type")
        .required()
        .default(DefaultValue::Str("container_service")),
    FieldSpec::new(
        "entry_point",
        "Application entry point, depends on the application type",
    ),
];

const PACKAGE: &[FieldSpec] = &[
    FieldSpec::new("type", "Type of package").default(DefaultValue::Str("container_image")),
    FieldSpec::new("name", "Package name or ID").required(),
    FieldSpec::new("version", "Package version, latest available if not specified"),
    FieldSpec::new(
        "repository",
        "Package repository, only required for a non standard repository",
    ),
];

const FIREWALL_RULES: &[FieldSpec] = &[
    FieldSpec::new("start_port", "Start of port range to allow")
        .required()
        .typed(ValueType::Int),
    FieldSpec::new("end_port", "End of port range to allow")
        .required()
        .typed(ValueType::Int),
    FieldSpec::new("protocol", "Protocol to allow")
        .one_of(&["tcp", "udp", "all"])
        .default(DefaultValue::Str("tcp")),
    FieldSpec::new("direction", "Direction to allow")
        .one_of(&["ingress", "egress"])
        .default(DefaultValue::Str("ingress")),
];

const FPGA: &[FieldSpec] = &[
    FieldSpec::new(
        "image",
        "FPGA bitstream image, a single string or one per FPGA slot",
    )
    .required()
    .typed(ValueType::StrList),
    FieldSpec::new("type", "Type of FPGA to use if multiple available"),
    FieldSpec::new("driver", "FPGA driver, defaults to the Linux kernel driver"),
    FieldSpec::new("driver_version", "FPGA driver version, latest if not specified"),
    FieldSpec::new("count", "Number of FPGA devices required")
        .typed(ValueType::Int)
        .default(DefaultValue::Int(1)),
];

const ACCELIZE_DRM: &[FieldSpec] = &[
    FieldSpec::new("use_service", "Use the Accelize DRM service to handle the DRM")
        .typed(ValueType::Bool)
        .default(DefaultValue::Bool(true)),
    FieldSpec::new("conf_path", "Accelize DRM configuration file path"),
];

/// The definition schema, in validation order.
pub const SCHEMA: &[SectionSpec] = &[
    SectionSpec {
        name: "application",
        kind: NodeKind::Mapping,
        fields: APPLICATION,
    },
    SectionSpec {
        name: "package",
        kind: NodeKind::Mapping,
        fields: PACKAGE,
    },
    SectionSpec {
        name: "firewall_rules",
        kind: NodeKind::List,
        fields: FIREWALL_RULES,
    },
    SectionSpec {
        name: "fpga",
        kind: NodeKind::Mapping,
        fields: FPGA,
    },
    SectionSpec {
        name: "accelize_drm",
        kind: NodeKind::Mapping,
        fields: ACCELIZE_DRM,
    },
];

/// Look up a section by name.
pub fn section(name: &str) -> Option<&'static SectionSpec> {
    SCHEMA.iter().find(|s| s.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_order() {
        let names: Vec<_> = SCHEMA.iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            ["application", "package", "firewall_rules", "fpga", "accelize_drm"]
        );
    }

    #[test]
    fn test_firewall_rules_is_list() {
        assert_eq!(section("firewall_rules").unwrap().kind, NodeKind::List);
        assert_eq!(section("fpga").unwrap().kind, NodeKind::Mapping);
        assert!(section("nope").is_none());
    }

    #[test]
    fn test_field_defaults() {
        let fpga = section("fpga").unwrap();
        assert_eq!(fpga.field("count").unwrap().default_value(), Value::Number(1.into()));
        assert_eq!(fpga.field("driver").unwrap().default_value(), Value::Null);
        assert!(fpga.is_field("image"));
        assert!(!fpga.is_field("my_provider"));
    }

    #[test]
    fn test_value_type_matches() {
        assert!(ValueType::Int.matches(&Value::Number(3.into())));
        assert!(!ValueType::Int.matches(&Value::String("3".into())));
        assert!(!ValueType::Int.matches(&Value::Bool(true)));
        assert!(ValueType::StrList.matches(&Value::Sequence(vec![Value::String("a".into())])));
        assert!(!ValueType::StrList.matches(&Value::Sequence(vec![Value::Number(1.into())])));
    }
}
