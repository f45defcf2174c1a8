use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Configuration attached to a sequence run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceConfig {
    /// Name recorded on the tracing span of each run.
    pub label: String,

    /// Unique identifier for this run.
    pub run_id: Uuid,

    /// Tags for filtering and categorization.
    #[serde(default)]
    pub tags: Vec<String>,

    /// Arbitrary metadata key-value pairs.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            label: "sequence".into(),
            run_id: Uuid::new_v4(),
            tags: Vec::new(),
            metadata: HashMap::new(),
        }
    }
}

impl SequenceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = run_id;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = SequenceConfig::default();
        assert_eq!(config.label, "sequence");
        assert!(config.tags.is_empty());
        assert!(config.metadata.is_empty());
    }

    #[test]
    fn builder_methods() {
        let config = SequenceConfig::new()
            .with_label("provider-setup")
            .with_tag("startup")
            .with_tag("debug")
            .with_metadata("node", serde_json::json!("provider-1"));

        assert_eq!(config.label, "provider-setup");
        assert_eq!(config.tags, vec!["startup", "debug"]);
        assert_eq!(config.metadata["node"], serde_json::json!("provider-1"));
    }

    #[test]
    fn run_id_uniqueness() {
        let config1 = SequenceConfig::new();
        let config2 = SequenceConfig::new();
        assert_ne!(config1.run_id, config2.run_id);
    }

    #[test]
    fn with_explicit_run_id() {
        let id = Uuid::new_v4();
        let config = SequenceConfig::new().with_run_id(id);
        assert_eq!(config.run_id, id);
    }

    #[test]
    fn deserialize_without_optional_fields() {
        let id = Uuid::new_v4();
        let json = format!(r#"{{"label":"boot","run_id":"{id}"}}"#);
        let config: SequenceConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config.label, "boot");
        assert_eq!(config.run_id, id);
        assert!(config.tags.is_empty());
        assert!(config.metadata.is_empty());
    }

    #[test]
    fn serde_roundtrip() {
        let config = SequenceConfig::new()
            .with_tag("test")
            .with_metadata("foo", serde_json::json!(42));
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: SequenceConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.label, config.label);
        assert_eq!(deserialized.tags, config.tags);
        assert_eq!(deserialized.metadata, config.metadata);
        assert_eq!(deserialized.run_id, config.run_id);
    }
}
