pub mod atlasfx;
pub mod cryptonova;
pub mod janemacro;
pub mod maxmentor;
pub mod quantedge;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::charts::ChartRenderer;
use crate::domains::agent::AgentDefinition;
use crate::error::{AgentDeskError, Result};
use crate::interfaces::capabilities::Capability;

/// Every agent the desk knows about, in display order.
#[derive(Debug, Clone)]
pub struct AgentRegistry {
    agents: Vec<AgentDefinition>,
}

impl AgentRegistry {
    pub fn new(agents: Vec<AgentDefinition>) -> Self {
        Self { agents }
    }

    pub fn builtin(renderer: Arc<ChartRenderer>) -> Self {
        Self::new(vec![
            atlasfx::definition(renderer),
            cryptonova::definition(),
            janemacro::definition(),
            maxmentor::definition(),
            quantedge::definition(),
        ])
    }

    pub fn get(&self, id: &str) -> Option<&AgentDefinition> {
        self.agents.iter().find(|agent| agent.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AgentDefinition> {
        self.agents.iter()
    }

    pub fn ids(&self) -> Vec<&'static str> {
        self.agents.iter().map(|agent| agent.id).collect()
    }
}

type Handler = fn(&Value) -> Result<Value>;

/// A synchronous capability backed by a plain function.
pub struct FnCapability {
    name: &'static str,
    description: &'static str,
    parameters: Value,
    handler: Handler,
}

impl FnCapability {
    pub fn new(name: &'static str, description: &'static str, handler: Handler) -> Self {
        Self {
            name,
            description,
            parameters: json!({"type": "object", "properties": {}}),
            handler,
        }
    }

    /// Declares a single optional string argument.
    pub fn with_text_arg(mut self, arg: &'static str, description: &'static str) -> Self {
        let mut properties = serde_json::Map::new();
        properties.insert(
            arg.to_string(),
            json!({"type": "string", "description": description}),
        );
        self.parameters = json!({"type": "object", "properties": properties});
        self
    }
}

#[async_trait]
impl Capability for FnCapability {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        self.description
    }

    fn parameters(&self) -> Value {
        self.parameters.clone()
    }

    async fn invoke(&self, args: Value) -> Result<Value> {
        (self.handler)(&args)
    }
}

/// Reads an optional string argument, tolerating a missing or null `args`.
pub(crate) fn text_arg<'a>(args: &'a Value, key: &str) -> &'a str {
    args.get(key).and_then(Value::as_str).unwrap_or_default()
}

/// Uniform draw in `[min, max)`, rounded to cents.
pub(crate) fn random_price(min: f64, max: f64) -> Result<f64> {
    if !(min.is_finite() && max.is_finite() && min < max) {
        return Err(AgentDeskError::Runtime(format!(
            "invalid price range {min}..{max}"
        )));
    }
    let price: f64 = rand::random_range(min..max);
    Ok((price * 100.0).round() / 100.0)
}
