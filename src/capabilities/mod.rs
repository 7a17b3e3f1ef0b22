//! Data capability trait and registry
//!
//! Capabilities are the named external data-retrieval operations DATA steps
//! invoke. They return a structured payload or an explicit error; ordinary
//! failure modes (bad ticker, rate limiting, missing field) never panic.

use crate::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

pub mod finance;
pub use finance::{create_default_registry, FinanceApiClient};

/// Trait for a single data capability.
#[async_trait::async_trait]
pub trait Capability: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    async fn invoke(&self, parameters: &Value) -> Result<Value>;
}

/// Registry for looking up capabilities by name.
pub struct CapabilityRegistry {
    capabilities: HashMap<String, Arc<dyn Capability>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self {
            capabilities: HashMap::new(),
        }
    }

    pub fn register(&mut self, capability: Arc<dyn Capability>) {
        self.capabilities
            .insert(capability.name().to_string(), capability);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Capability>> {
        self.capabilities.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.capabilities.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// One line per capability, for the planner prompt.
    pub fn descriptions_for_prompt(&self) -> String {
        let mut entries: Vec<(&str, &str)> = self
            .capabilities
            .values()
            .map(|c| (c.name(), c.description()))
            .collect();
        entries.sort_unstable_by_key(|(name, _)| *name);

        entries
            .iter()
            .map(|(name, desc)| format!("- {}: {}", name, desc))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Require a string parameter, with a descriptive error naming the field.
pub(crate) fn require_str_param<'a>(parameters: &'a Value, key: &str) -> Result<&'a str> {
    parameters
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| {
            crate::error::AgentError::InvalidCapabilityInput(format!(
                "Expected non-empty '{}' parameter",
                key
            ))
        })
}
