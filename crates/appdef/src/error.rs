//! Error types for application definition handling.
//!
//! Every variant describes a configuration problem: the definition file is
//! unreadable, malformed, or does not satisfy the schema.

use std::io;
use std::path::PathBuf;

use crate::schema::NodeKind;

/// Result type alias for definition operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading, validating or editing a definition.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A section does not have the container kind the schema expects.
    #[error("The section '{section}' must be a {expected}")]
    SectionKind {
        /// Section name.
        section: String,
        /// Expected container kind.
        expected: NodeKind,
    },

    /// An element of a list section is not a mapping.
    #[error("The section '{section}' must contain mappings only")]
    NodeKind {
        /// Section name.
        section: String,
    },

    /// An environment override is not a mapping.
    #[error("The '{env}' override in section '{section}' must be a mapping")]
    InvalidEnvironment {
        /// Section name.
        section: String,
        /// Environment name.
        env: String,
    },

    /// A required key resolves to null.
    #[error("The '{key}' key in '{section}' section is required")]
    Required {
        /// Section name.
        section: String,
        /// Key name.
        key: String,
    },

    /// A required key resolves to null for one environment.
    #[error("The '{key}' key in '{section}' section is required for the '{env}' environment")]
    RequiredForEnvironment {
        /// Section name.
        section: String,
        /// Key name.
        key: String,
        /// Environment name.
        env: String,
    },

    /// A value is not one of the permitted values.
    #[error(
        "Invalid value '{value}' for '{key}' key in '{section}' section, possible values are: {}",
        allowed.join(", ")
    )]
    InvalidValue {
        /// Section name.
        section: String,
        /// Key name.
        key: String,
        /// Offending value, rendered.
        value: String,
        /// Permitted values.
        allowed: Vec<String>,
    },

    /// A value has the wrong type.
    #[error("Invalid type for '{key}' key in '{section}' section, expected {expected}, got '{value}'")]
    InvalidType {
        /// Section name.
        section: String,
        /// Key name.
        key: String,
        /// Expected type name.
        expected: &'static str,
        /// Offending value, rendered.
        value: String,
    },

    /// A mapping key is not a string.
    #[error("Invalid key '{key}' in '{section}' section, keys must be strings")]
    InvalidKey {
        /// Section name.
        section: String,
        /// Offending key, rendered.
        key: String,
    },

    /// The document root is not a mapping.
    #[error("The application definition must be a mapping")]
    NotAMapping,

    /// The key is neither overridden nor defaulted.
    #[error("No '{key}' key in '{section}' section")]
    KeyNotFound {
        /// Section name.
        section: String,
        /// Key name.
        key: String,
    },

    /// The section is not part of the schema.
    #[error("Unknown section '{0}'")]
    UnknownSection(String),

    /// The section is a list and cannot be addressed by key.
    #[error("The section '{0}' is a list and cannot be accessed by key")]
    ListSection(String),

    /// The definition was not loaded from a file and no path was given.
    #[error("No path to save the application definition to")]
    NoPath,

    /// IO error with path context.
    #[error("Unable to access '{path}': {source}")]
    Io {
        /// Path involved in the error.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },

    /// YAML syntax or serialization error.
    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl Error {
    /// Create an IO error with path context.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_value_lists_allowed() {
        let err = Error::InvalidValue {
            section: "firewall_rules".to_string(),
            key: "protocol".to_string(),
            value: "icmp".to_string(),
            allowed: vec!["tcp".to_string(), "udp".to_string(), "all".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("icmp"));
        assert!(msg.contains("tcp, udp, all"));
    }

    #[test]
    fn test_section_kind_display() {
        let err = Error::SectionKind {
            section: "firewall_rules".to_string(),
            expected: NodeKind::List,
        };
        assert_eq!(err.to_string(), "The section 'firewall_rules' must be a list");
    }

    #[test]
    fn test_required_for_environment_display() {
        let err = Error::RequiredForEnvironment {
            section: "fpga".to_string(),
            key: "image".to_string(),
            env: "aws".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("image"));
        assert!(msg.contains("aws"));
    }
}
