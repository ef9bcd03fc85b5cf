//! # appdef
//!
//! Application definition loading and validation.
//!
//! An application definition is a YAML document describing an FPGA
//! accelerated application: its package, firewall rules, FPGA requirements
//! and DRM settings. Any node can be overridden per environment (usually a
//! provider name) by nesting a mapping under the environment name:
//!
//! ```yaml
//! fpga:
//!   image: default_image
//!   aws_f1:
//!     image: aws_image
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use appdef::Definition;
//!
//! let definition = Definition::load("application.yml").expect("invalid definition");
//! let image = definition.get_str_list("fpga", "image", Some("aws_f1")).unwrap();
//! println!("{image:?}");
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod node;
pub mod schema;
mod validate;

pub use error::{Error, Result};
pub use node::{Fields, Node, Section};
pub use schema::{FieldSpec, NodeKind, SCHEMA, SectionSpec, ValueType};

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml_ng::{Mapping, Value};

/// A validated application definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Definition {
    path: Option<PathBuf>,
    sections: BTreeMap<&'static str, Section>,
    /// Top level entries that are not schema sections, kept for `save`.
    extra: Mapping,
    environments: BTreeSet<String>,
}

impl Definition {
    // =========================================================================
    // Loading
    // =========================================================================

    /// Load and validate a definition file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("Loading application definition {}", path.display());
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let mut definition = Self::from_yaml_str(&text)?;
        definition.path = Some(path.to_path_buf());
        Ok(definition)
    }

    /// Validate a definition from YAML text.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let value: Value = serde_yaml_ng::from_str(text)?;
        Self::from_value(value)
    }

    /// Validate a definition from a parsed YAML document.
    ///
    /// An empty document is treated as an empty mapping.
    pub fn from_value(value: Value) -> Result<Self> {
        let mut document = match value {
            Value::Mapping(mapping) => mapping,
            Value::Null => Mapping::new(),
            _ => return Err(Error::NotAMapping),
        };

        let mut sections = BTreeMap::new();
        let mut environments = BTreeSet::new();
        for spec in SCHEMA {
            let raw = document.remove(spec.name);
            let section = validate::validate_section(spec, raw.as_ref(), &mut environments)?;
            sections.insert(spec.name, section);
        }

        if !document.is_empty() {
            log::debug!("Keeping {} unknown top level entries", document.len());
        }

        Ok(Self {
            path: None,
            sections,
            extra: document,
            environments,
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Path the definition was loaded from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Every environment name found across all sections.
    pub fn environments(&self) -> &BTreeSet<String> {
        &self.environments
    }

    /// A validated section.
    pub fn section(&self, name: &str) -> Result<&Section> {
        self.sections
            .get(name)
            .ok_or_else(|| Error::UnknownSection(name.to_string()))
    }

    /// Every node of a section.
    pub fn nodes(&self, section: &str) -> Result<&[Node]> {
        Ok(self.section(section)?.nodes())
    }

    /// The node of a mapping section.
    pub fn node(&self, section: &str) -> Result<&Node> {
        match self.section(section)? {
            Section::Mapping(node) => Ok(node),
            Section::List(_) => Err(Error::ListSection(section.to_string())),
        }
    }

    /// Value of `key` in `section` for `env`, falling back to the default
    /// environment value.
    pub fn get(&self, section: &str, key: &str, env: Option<&str>) -> Result<&Value> {
        self.node(section)?
            .get(key, env)
            .ok_or_else(|| Error::KeyNotFound {
                section: section.to_string(),
                key: key.to_string(),
            })
    }

    /// String value, `None` when null.
    pub fn get_str(&self, section: &str, key: &str, env: Option<&str>) -> Result<Option<&str>> {
        Ok(self.get(section, key, env)?.as_str())
    }

    /// Boolean value, `None` when null.
    pub fn get_bool(&self, section: &str, key: &str, env: Option<&str>) -> Result<Option<bool>> {
        Ok(self.get(section, key, env)?.as_bool())
    }

    /// Integer value, `None` when null.
    pub fn get_i64(&self, section: &str, key: &str, env: Option<&str>) -> Result<Option<i64>> {
        Ok(self.get(section, key, env)?.as_i64())
    }

    /// List of strings value, empty when null.
    pub fn get_str_list(&self, section: &str, key: &str, env: Option<&str>) -> Result<Vec<String>> {
        let value = self.get(section, key, env)?;
        Ok(value
            .as_sequence()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Section content resolved for `env`: a mapping for mapping sections,
    /// a sequence of mappings for list sections. Null values are dropped.
    pub fn resolved(&self, section: &str, env: Option<&str>) -> Result<Value> {
        let to_mapping = |node: &Node| {
            Value::Mapping(
                node.resolve(env)
                    .into_iter()
                    .filter(|(_, value)| !value.is_null())
                    .map(|(key, value)| (Value::String(key), value))
                    .collect(),
            )
        };
        Ok(match self.section(section)? {
            Section::Mapping(node) => to_mapping(node),
            Section::List(nodes) => Value::Sequence(nodes.iter().map(to_mapping).collect()),
        })
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Set `key` in a mapping section, for `env` or the default environment.
    ///
    /// The section is re-validated; on error the definition is unchanged.
    pub fn set(&mut self, section: &str, key: &str, env: Option<&str>, value: Value) -> Result<()> {
        let spec = schema::section(section)
            .ok_or_else(|| Error::UnknownSection(section.to_string()))?;
        let field = spec.field(key).ok_or_else(|| Error::KeyNotFound {
            section: section.to_string(),
            key: key.to_string(),
        })?;
        let value = validate::check_value(section, field, value)?;

        let mut node = self.node(section)?.clone();
        match env {
            Some(env) => {
                node.override_mut(env).insert(key.to_string(), value);
            }
            None => {
                node.defaults_mut().insert(key.to_string(), value);
            }
        }

        let raw = Value::Mapping(node.to_mapping(spec));
        let mut environments = self.environments.clone();
        let section_value = validate::validate_section(spec, Some(&raw), &mut environments)?;
        self.sections.insert(spec.name, section_value);
        self.environments = environments;
        Ok(())
    }

    // =========================================================================
    // Saving
    // =========================================================================

    /// The normalized document.
    pub fn to_value(&self) -> Value {
        let mut document = Mapping::new();
        for spec in SCHEMA {
            if let Some(section) = self.sections.get(spec.name) {
                document.insert(Value::String(spec.name.to_string()), section.to_value(spec));
            }
        }
        for (key, value) in &self.extra {
            document.insert(key.clone(), value.clone());
        }
        Value::Mapping(document)
    }

    /// The normalized document as YAML text.
    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml_ng::to_string(&self.to_value())?)
    }

    /// Write the normalized document to `path`, or back to the file it was
    /// loaded from. Comments and formatting of the original are not kept.
    pub fn save(&self, path: Option<&Path>) -> Result<()> {
        let path = path.or(self.path.as_deref()).ok_or(Error::NoPath)?;
        log::debug!("Saving application definition to {}", path.display());
        let text = self.to_yaml_string()?;
        fs::write(path, text).map_err(|e| Error::io(path, e))
    }
}

impl serde::Serialize for Definition {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// Validate a definition file, discarding the result.
pub fn lint(path: impl AsRef<Path>) -> Result<()> {
    Definition::load(path).map(|_| ())
}
