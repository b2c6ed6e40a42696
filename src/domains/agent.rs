use std::sync::Arc;

use serde_json::Value;

use crate::interfaces::capabilities::{tool_spec, Capability};

/// A named persona: instruction template plus the capabilities the model may call.
#[derive(Clone)]
pub struct AgentDefinition {
    pub id: &'static str,
    pub display_name: &'static str,
    pub instructions: String,
    pub default_prompt: String,
    pub capabilities: Vec<Arc<dyn Capability>>,
}

impl AgentDefinition {
    pub fn capability(&self, name: &str) -> Option<Arc<dyn Capability>> {
        self.capabilities
            .iter()
            .find(|capability| capability.name() == name)
            .cloned()
    }

    pub fn tool_specs(&self) -> Vec<Value> {
        self.capabilities
            .iter()
            .map(|capability| tool_spec(capability.as_ref()))
            .collect()
    }
}

impl std::fmt::Debug for AgentDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.capabilities.iter().map(|c| c.name()).collect();
        f.debug_struct("AgentDefinition")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("capabilities", &names)
            .finish()
    }
}
