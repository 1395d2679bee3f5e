//! Per-entity configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Configuration passed to an entity at construction.
///
/// Deserializes from `{"mappings": {"<command>": "<event>"}}`; every field
/// is optional.
///
/// # Examples
///
/// ```
/// use eventfold_entity::EntityConfig;
///
/// let config = EntityConfig::default().with_mapping("rename", "NameChanged");
/// assert_eq!(config.mapping("rename"), Some("NameChanged"));
///
/// let parsed = EntityConfig::from_json(r#"{"mappings": {"rename": "NameChanged"}}"#).unwrap();
/// assert_eq!(parsed, config);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityConfig {
    /// Explicit event names, keyed by command name. Takes precedence over
    /// the derived past-tense name.
    pub mappings: BTreeMap<String, String>,
}

impl EntityConfig {
    /// Map `command` to record events named `event`.
    ///
    /// # Returns
    ///
    /// The updated `EntityConfig` for chaining.
    pub fn with_mapping(mut self, command: impl Into<String>, event: impl Into<String>) -> Self {
        self.mappings.insert(command.into(), event.into());
        self
    }

    /// The explicit event name for `command`, if any.
    pub fn mapping(&self, command: &str) -> Option<&str> {
        self.mappings.get(command).map(String::as_str)
    }

    /// Parse a configuration from JSON text.
    ///
    /// # Errors
    ///
    /// Returns `serde_json::Error` if the text is not a valid configuration.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_no_mappings() {
        let config = EntityConfig::default();
        assert!(config.mappings.is_empty());
        assert_eq!(config.mapping("rename"), None);
    }

    #[test]
    fn later_mapping_wins() {
        let config = EntityConfig::default()
            .with_mapping("rename", "NameChanged")
            .with_mapping("rename", "Relabelled");
        assert_eq!(config.mapping("rename"), Some("Relabelled"));
    }

    #[test]
    fn empty_object_parses_to_default() {
        let config = EntityConfig::from_json("{}").unwrap();
        assert_eq!(config, EntityConfig::default());
    }

    #[test]
    fn rejects_non_string_mapping() {
        assert!(EntityConfig::from_json(r#"{"mappings": {"rename": 5}}"#).is_err());
    }
}
