//! Schema-driven validation of raw definition documents.

use std::collections::{BTreeMap, BTreeSet};

use serde_yaml_ng::{Mapping, Value};

use crate::error::{Error, Result};
use crate::node::{Fields, Node, Section};
use crate::schema::{FieldSpec, NodeKind, SectionSpec, ValueType};

/// Render a value for an error message.
pub(crate) fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => serde_yaml_ng::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|_| format!("{other:?}")),
    }
}

/// Normalize one value against its schema field.
///
/// The enum check runs first and accepts the field default. A single string
/// given for a list of strings is promoted to a one-element list.
pub(crate) fn check_value(section: &str, field: &FieldSpec, value: Value) -> Result<Value> {
    if !field.values.is_empty()
        && value != field.default_value()
        && !value.as_str().is_some_and(|v| field.values.contains(&v))
    {
        return Err(Error::InvalidValue {
            section: section.to_string(),
            key: field.name.to_string(),
            value: render(&value),
            allowed: field.values.iter().map(|v| v.to_string()).collect(),
        });
    }

    if value.is_null() {
        return Ok(value);
    }

    if field.value_type == ValueType::StrList && value.is_string() {
        return Ok(Value::Sequence(vec![value]));
    }

    if !field.value_type.matches(&value) {
        return Err(Error::InvalidType {
            section: section.to_string(),
            key: field.name.to_string(),
            expected: field.value_type.describe(),
            value: render(&value),
        });
    }

    Ok(value)
}

fn key_string(section: &str, key: &Value) -> Result<String> {
    match key {
        Value::String(s) => Ok(s.clone()),
        other => Err(Error::InvalidKey {
            section: section.to_string(),
            key: render(other),
        }),
    }
}

/// Validate one raw node mapping.
///
/// Environment names found in the node are added to `environments`.
pub(crate) fn validate_node(
    spec: &SectionSpec,
    raw: &Mapping,
    environments: &mut BTreeSet<String>,
) -> Result<Node> {
    let mut defaults = Fields::new();
    let mut raw_overrides = Vec::new();

    for (key, value) in raw {
        let key = key_string(spec.name, key)?;
        if spec.is_field(&key) {
            defaults.insert(key, value.clone());
        } else {
            raw_overrides.push((key, value));
        }
    }

    for field in spec.fields {
        let value = defaults
            .remove(field.name)
            .unwrap_or_else(|| field.default_value());
        let value = check_value(spec.name, field, value)?;
        defaults.insert(field.name.to_string(), value);
    }

    let mut overrides = BTreeMap::new();
    for (env, value) in raw_overrides {
        let Value::Mapping(raw_fields) = value else {
            return Err(Error::InvalidEnvironment {
                section: spec.name.to_string(),
                env,
            });
        };
        log::trace!("Section '{}' overridden for '{}'", spec.name, env);

        let mut explicit = Fields::new();
        for (key, value) in raw_fields {
            let key = key_string(spec.name, key)?;
            if let Some(field) = spec.field(&key) {
                explicit.insert(key, check_value(spec.name, field, value.clone())?);
            } else {
                log::debug!(
                    "Ignoring unknown key '{}' in '{}' override of section '{}'",
                    key,
                    env,
                    spec.name
                );
            }
        }

        for field in spec.fields.iter().filter(|f| f.required) {
            let effective = explicit.get(field.name).or_else(|| defaults.get(field.name));
            if effective.is_none_or(Value::is_null) {
                return Err(Error::RequiredForEnvironment {
                    section: spec.name.to_string(),
                    key: field.name.to_string(),
                    env,
                });
            }
        }

        environments.insert(env.clone());
        overrides.insert(env, explicit);
    }

    if overrides.is_empty() {
        for field in spec.fields.iter().filter(|f| f.required) {
            if defaults.get(field.name).is_none_or(Value::is_null) {
                return Err(Error::Required {
                    section: spec.name.to_string(),
                    key: field.name.to_string(),
                });
            }
        }
    }

    Ok(Node::new(defaults, overrides))
}

/// Validate one raw section. An absent section is synthesized empty.
pub(crate) fn validate_section(
    spec: &SectionSpec,
    raw: Option<&Value>,
    environments: &mut BTreeSet<String>,
) -> Result<Section> {
    let empty_mapping = Value::Mapping(Mapping::new());
    let empty_list = Value::Sequence(Vec::new());
    let raw = match (raw, spec.kind) {
        (Some(Value::Null) | None, NodeKind::Mapping) => &empty_mapping,
        (Some(Value::Null) | None, NodeKind::List) => &empty_list,
        (Some(value), _) => value,
    };

    match (spec.kind, raw) {
        (NodeKind::Mapping, Value::Mapping(mapping)) => {
            Ok(Section::Mapping(validate_node(spec, mapping, environments)?))
        }
        (NodeKind::List, Value::Sequence(items)) => {
            let mut nodes = Vec::with_capacity(items.len());
            for item in items {
                let Value::Mapping(mapping) = item else {
                    return Err(Error::NodeKind {
                        section: spec.name.to_string(),
                    });
                };
                nodes.push(validate_node(spec, mapping, environments)?);
            }
            Ok(Section::List(nodes))
        }
        (expected, _) => Err(Error::SectionKind {
            section: spec.name.to_string(),
            expected,
        }),
    }
}
