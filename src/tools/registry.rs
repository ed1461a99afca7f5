//! Source registry
//!
//! Maintains the set of configured APIs a caller may route requests to.

use crate::config::Config;
use crate::tools::types::ToolSchema;
use std::collections::BTreeMap;

/// Source registry
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    /// Map of source name to schema, sorted by name
    tools: BTreeMap<String, ToolSchema>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every source in the configuration
    pub fn from_config(config: &Config) -> Self {
        let mut registry = Self::new();
        for (name, source) in &config.sources {
            registry.register(ToolSchema {
                name: name.clone(),
                description: source.display_name.clone(),
                base_url: source.base_url.clone(),
                rate_limit_key: name.clone(),
                rate_per_second: source.rate_limit,
            });
        }
        registry
    }

    /// Add or replace a source
    pub fn register(&mut self, schema: ToolSchema) {
        self.tools.insert(schema.name.clone(), schema);
    }

    /// Get source schema by name
    pub fn get(&self, name: &str) -> Option<&ToolSchema> {
        self.tools.get(name)
    }

    /// Check if source exists
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// All source names in sorted order
    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn schemas(&self) -> Vec<&ToolSchema> {
        self.tools.values().collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
