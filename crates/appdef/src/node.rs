//! Definition nodes with per-environment overrides.

use std::collections::BTreeMap;

use serde_yaml_ng::{Mapping, Value};

use crate::schema::SectionSpec;

/// Key/value fields of a node.
pub type Fields = BTreeMap<String, Value>;

/// One node of a section.
///
/// `defaults` holds every schema key of the default environment (missing
/// keys hold their schema default, possibly null). `overrides` holds, per
/// environment, only the keys the document sets explicitly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Node {
    defaults: Fields,
    overrides: BTreeMap<String, Fields>,
}

impl Node {
    pub(crate) fn new(defaults: Fields, overrides: BTreeMap<String, Fields>) -> Self {
        Self {
            defaults,
            overrides,
        }
    }

    /// Default environment fields.
    pub fn defaults(&self) -> &Fields {
        &self.defaults
    }

    /// Explicit fields of every override environment.
    pub fn overrides(&self) -> &BTreeMap<String, Fields> {
        &self.overrides
    }

    /// Names of the environments overriding this node.
    pub fn environments(&self) -> impl Iterator<Item = &str> {
        self.overrides.keys().map(String::as_str)
    }

    /// Value of `key` for `env`: the override if the environment sets it,
    /// else the default environment value.
    pub fn get(&self, key: &str, env: Option<&str>) -> Option<&Value> {
        env.and_then(|env| self.overrides.get(env))
            .and_then(|fields| fields.get(key))
            .or_else(|| self.defaults.get(key))
    }

    /// Default fields merged with the `env` override.
    pub fn resolve(&self, env: Option<&str>) -> Fields {
        let mut fields = self.defaults.clone();
        if let Some(over) = env.and_then(|env| self.overrides.get(env)) {
            for (key, value) in over {
                fields.insert(key.clone(), value.clone());
            }
        }
        fields
    }

    pub(crate) fn defaults_mut(&mut self) -> &mut Fields {
        &mut self.defaults
    }

    pub(crate) fn override_mut(&mut self, env: &str) -> &mut Fields {
        self.overrides.entry(env.to_string()).or_default()
    }

    /// Serialize back to the document form: schema keys first in schema
    /// order, then one nested mapping per environment. Null defaults are
    /// omitted since validation restores them.
    pub fn to_mapping(&self, spec: &SectionSpec) -> Mapping {
        let mut mapping = Mapping::new();
        for field in spec.fields {
            if let Some(value) = self.defaults.get(field.name)
                && !value.is_null()
            {
                mapping.insert(Value::String(field.name.to_string()), value.clone());
            }
        }
        for (env, fields) in &self.overrides {
            let mut over = Mapping::new();
            for field in spec.fields {
                if let Some(value) = fields.get(field.name) {
                    over.insert(Value::String(field.name.to_string()), value.clone());
                }
            }
            mapping.insert(Value::String(env.clone()), Value::Mapping(over));
        }
        mapping
    }
}

/// A validated section: a single node or a list of nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum Section {
    /// Mapping section.
    Mapping(Node),
    /// List section.
    List(Vec<Node>),
}

impl Section {
    /// Every node of the section.
    pub fn nodes(&self) -> &[Node] {
        match self {
            Self::Mapping(node) => std::slice::from_ref(node),
            Self::List(nodes) => nodes,
        }
    }

    /// Serialize back to the document form.
    pub fn to_value(&self, spec: &SectionSpec) -> Value {
        match self {
            Self::Mapping(node) => Value::Mapping(node.to_mapping(spec)),
            Self::List(nodes) => Value::Sequence(
                nodes
                    .iter()
                    .map(|node| Value::Mapping(node.to_mapping(spec)))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;

    fn node() -> Node {
        let mut defaults = Fields::new();
        defaults.insert("image".into(), Value::Sequence(vec!["img".into()]));
        defaults.insert("count".into(), Value::Number(1.into()));
        defaults.insert("driver".into(), Value::Null);
        let mut over = Fields::new();
        over.insert("image".into(), Value::Sequence(vec!["img2".into()]));
        let mut overrides = BTreeMap::new();
        overrides.insert("aws".to_string(), over);
        Node::new(defaults, overrides)
    }

    #[test]
    fn test_get_prefers_override() {
        let node = node();
        assert_eq!(
            node.get("image", Some("aws")),
            Some(&Value::Sequence(vec!["img2".into()]))
        );
        assert_eq!(node.get("count", Some("aws")), Some(&Value::Number(1.into())));
        assert_eq!(
            node.get("image", Some("unknown")),
            Some(&Value::Sequence(vec!["img".into()]))
        );
        assert_eq!(node.get("missing", None), None);
    }

    #[test]
    fn test_resolve_merges_override() {
        let fields = node().resolve(Some("aws"));
        assert_eq!(fields["image"], Value::Sequence(vec!["img2".into()]));
        assert_eq!(fields["count"], Value::Number(1.into()));
    }

    #[test]
    fn test_to_mapping_skips_null_defaults() {
        let spec = schema::section("fpga").unwrap();
        let mapping = node().to_mapping(spec);
        assert!(mapping.get("driver").is_none());
        assert!(mapping.get("count").is_some());
        assert!(mapping.get("aws").unwrap().is_mapping());
    }

    #[test]
    fn test_section_nodes() {
        let section = Section::Mapping(node());
        assert_eq!(section.nodes().len(), 1);
        assert!(Section::List(Vec::new()).nodes().is_empty());
    }
}
