use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::Result;

/// A data-producing function an agent exposes to the model as a tool.
#[async_trait]
pub trait Capability: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }
    async fn invoke(&self, args: Value) -> Result<Value>;
}

pub fn tool_spec(capability: &dyn Capability) -> Value {
    json!({
        "type": "function",
        "name": capability.name(),
        "description": capability.description(),
        "parameters": capability.parameters(),
    })
}
