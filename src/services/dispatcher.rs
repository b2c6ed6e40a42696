use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use crate::agents::AgentRegistry;
use crate::config::Config;
use crate::domains::agent::AgentDefinition;
use crate::error::{AgentDeskError, Result};
use crate::interfaces::providers::{LlmProvider, ToolCall};

/// Sends a user message to an agent's persona and drives the tool loop
/// until the model answers in plain text.
pub struct PromptDispatcher {
    provider: Arc<dyn LlmProvider>,
    registry: Arc<AgentRegistry>,
    max_tool_rounds: usize,
    request_timeout: Duration,
}

impl PromptDispatcher {
    pub fn new(provider: Arc<dyn LlmProvider>, registry: Arc<AgentRegistry>) -> Self {
        Self {
            provider,
            registry,
            max_tool_rounds: 8,
            request_timeout: Duration::from_secs(60),
        }
    }

    pub fn from_config(
        provider: Arc<dyn LlmProvider>,
        registry: Arc<AgentRegistry>,
        config: &Config,
    ) -> Self {
        Self::new(provider, registry)
            .with_max_tool_rounds(config.max_tool_rounds)
            .with_request_timeout(Duration::from_secs(config.request_timeout_secs))
    }

    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds.max(1);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    #[instrument(skip(self, message), fields(message_len = message.len()))]
    pub async fn dispatch(&self, agent_id: &str, message: &str) -> Result<String> {
        let agent = self
            .registry
            .get(agent_id)
            .ok_or_else(|| AgentDeskError::Dispatch(format!("unknown agent: {agent_id}")))?;

        let tool_specs = agent.tool_specs();
        let mut prompt = message.to_string();
        let mut last_text = String::new();

        for round in 0..self.max_tool_rounds {
            let response = self.complete(agent, &prompt, tool_specs.clone()).await?;
            if response.tool_calls.is_empty() {
                debug!(agent = agent.id, round, "Agent answered");
                return Ok(response.text);
            }
            if !response.text.trim().is_empty() {
                last_text = response.text;
            }

            let results = self.execute_tool_calls(agent, &response.tool_calls).await;
            let serialized = serde_json::to_string_pretty(&results)
                .map_err(|e| AgentDeskError::Serialization(e.to_string()))?;
            prompt.push_str("\n\nOBSERVATION:\n");
            prompt.push_str(&serialized);
            prompt.push_str("\n\nContinue. If done, provide the final response.\n");
        }

        if last_text.trim().is_empty() {
            return Err(AgentDeskError::Dispatch(format!(
                "{} produced no final response after {} tool rounds",
                agent.display_name, self.max_tool_rounds
            )));
        }
        warn!(agent = agent.id, "Tool rounds exhausted, returning last text");
        Ok(last_text)
    }

    async fn complete(
        &self,
        agent: &AgentDefinition,
        prompt: &str,
        tools: Vec<Value>,
    ) -> Result<crate::interfaces::providers::LlmResponse> {
        let call = self
            .provider
            .generate_with_tools(prompt, &agent.instructions, tools);
        match tokio::time::timeout(self.request_timeout, call).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(AgentDeskError::Dispatch(message))) => Err(AgentDeskError::Dispatch(message)),
            Ok(Err(err)) => Err(AgentDeskError::Dispatch(format!(
                "{} completion failed: {err}",
                agent.display_name
            ))),
            Err(_) => Err(AgentDeskError::Dispatch(format!(
                "{} completion timed out after {}s",
                agent.display_name,
                self.request_timeout.as_secs()
            ))),
        }
    }

    async fn execute_tool_calls(&self, agent: &AgentDefinition, calls: &[ToolCall]) -> Vec<Value> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            let name = call.name.trim();
            let Some(capability) = agent.capability(name) else {
                info!(agent = agent.id, tool = %name, status = "not_found", "Tool result");
                results.push(json!({
                    "tool": name,
                    "status": "error",
                    "message": "Tool not found",
                }));
                continue;
            };

            let args = if call.arguments.is_null() {
                json!({})
            } else {
                call.arguments.clone()
            };
            match capability.invoke(args).await {
                Ok(result) => {
                    info!(agent = agent.id, tool = %name, status = "ok", "Tool result");
                    results.push(json!({
                        "tool": name,
                        "status": "ok",
                        "result": result,
                    }));
                }
                Err(err) => {
                    info!(agent = agent.id, tool = %name, status = "error", error = %err, "Tool result");
                    results.push(json!({
                        "tool": name,
                        "status": "error",
                        "message": err.to_string(),
                    }));
                }
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::ChartRenderer;
    use crate::interfaces::providers::LlmResponse;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct Scripted {
        replies: Mutex<VecDeque<Result<LlmResponse>>>,
        prompts: Mutex<Vec<(String, String, usize)>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<LlmResponse>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for Scripted {
        async fn generate_with_tools(
            &self,
            prompt: &str,
            system_prompt: &str,
            tools: Vec<Value>,
        ) -> Result<LlmResponse> {
            self.prompts
                .lock()
                .await
                .push((prompt.to_string(), system_prompt.to_string(), tools.len()));
            self.replies
                .lock()
                .await
                .pop_front()
                .unwrap_or_else(|| Ok(LlmResponse::default()))
        }
    }

    struct Stalled;

    #[async_trait]
    impl LlmProvider for Stalled {
        async fn generate_with_tools(&self, _: &str, _: &str, _: Vec<Value>) -> Result<LlmResponse> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(LlmResponse::default())
        }
    }

    fn registry() -> Arc<AgentRegistry> {
        Arc::new(AgentRegistry::builtin(Arc::new(ChartRenderer::new(
            std::env::temp_dir().join("agent-desk-dispatcher-tests"),
        ))))
    }

    fn text(reply: &str) -> Result<LlmResponse> {
        Ok(LlmResponse {
            text: reply.to_string(),
            tool_calls: Vec::new(),
        })
    }

    fn calls(names: &[(&str, Value)]) -> Result<LlmResponse> {
        Ok(LlmResponse {
            text: String::new(),
            tool_calls: names
                .iter()
                .map(|(name, arguments)| ToolCall {
                    name: name.to_string(),
                    arguments: arguments.clone(),
                })
                .collect(),
        })
    }

    #[tokio::test]
    async fn plain_answer_uses_agent_instructions_and_tools() {
        let provider = Scripted::new(vec![text("Macro is steady.")]);
        let dispatcher = PromptDispatcher::new(provider.clone(), registry());
        let out = dispatcher.dispatch("janemacro", "update?").await.unwrap();
        assert_eq!(out, "Macro is steady.");

        let prompts = provider.prompts.lock().await;
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].0, "update?");
        assert!(prompts[0].1.contains("JaneMacro"));
        assert_eq!(prompts[0].2, 3);
    }

    #[tokio::test]
    async fn tool_results_and_errors_become_observations() {
        let provider = Scripted::new(vec![
            calls(&[
                ("fetch_quantsignal_data", Value::Null),
                ("launch_rockets", json!({})),
            ]),
            text("Digest ready."),
        ]);
        let dispatcher = PromptDispatcher::new(provider.clone(), registry());
        let out = dispatcher.dispatch("quantedge", "signals").await.unwrap();
        assert_eq!(out, "Digest ready.");

        let prompts = provider.prompts.lock().await;
        let second = &prompts[1].0;
        assert!(second.starts_with("signals\n\nOBSERVATION:\n"));
        assert!(second.contains("MACD bullish crossover"));
        assert!(second.contains("Tool not found"));
    }

    #[tokio::test]
    async fn unknown_agent_is_a_dispatch_error() {
        let dispatcher = PromptDispatcher::new(Scripted::new(vec![]), registry());
        let err = dispatcher.dispatch("nobody", "hi").await.unwrap_err();
        assert!(matches!(err, AgentDeskError::Dispatch(_)));
    }

    #[tokio::test]
    async fn provider_failure_propagates() {
        let provider = Scripted::new(vec![Err(AgentDeskError::Http(
            "Chat completion failed (500 Internal Server Error): boom".to_string(),
        ))]);
        let dispatcher = PromptDispatcher::new(provider, registry());
        let err = dispatcher.dispatch("cryptonova", "hi").await.unwrap_err();
        match err {
            AgentDeskError::Dispatch(message) => assert!(message.contains("500")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_endpoint_times_out() {
        let dispatcher = PromptDispatcher::new(Arc::new(Stalled), registry())
            .with_request_timeout(Duration::from_secs(5));
        let err = dispatcher.dispatch("maxmentor", "hi").await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn exhausted_rounds_without_text_fail() {
        let provider = Scripted::new(vec![
            calls(&[("summarize_edge_cases", json!({}))]),
            calls(&[("summarize_edge_cases", json!({}))]),
        ]);
        let dispatcher =
            PromptDispatcher::new(provider, registry()).with_max_tool_rounds(2);
        assert!(dispatcher.dispatch("quantedge", "edge").await.is_err());
    }
}
