use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContent,
    ChatCompletionTool, ChatCompletionTools, CreateChatCompletionRequest,
    CreateChatCompletionRequestArgs, FunctionObject,
};

use crate::config::Config;
use crate::error::{AgentDeskError, Result};
use crate::interfaces::providers::{LlmProvider, LlmResponse, ToolCall};

#[derive(Clone)]
pub struct OpenAiProvider {
    model: String,
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl OpenAiProvider {
    fn is_openai_function_name(name: &str) -> bool {
        let trimmed = name.trim();
        !trimmed.is_empty()
            && trimmed
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-')
    }

    pub fn new(
        api_key: String,
        model: Option<String>,
        base_url: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let model = model.unwrap_or_else(|| crate::config::DEFAULT_MODEL.to_string());
        let base_url = base_url.unwrap_or_else(|| crate::config::DEFAULT_BASE_URL.to_string());
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AgentDeskError::Http(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            model,
            http,
            api_key,
            base_url,
            timeout,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.api_key()?,
            Some(config.model()),
            Some(config.base_url()),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn raw_chat_completion(&self, request: &CreateChatCompletionRequest) -> Result<Value> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        debug!(%url, model = %self.model, "Sending chat completion");
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AgentDeskError::Http(format!(
                        "Chat completion timed out after {}s",
                        self.timeout.as_secs()
                    ))
                } else {
                    AgentDeskError::Http(format!("Chat completion transport failed: {e}"))
                }
            })?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AgentDeskError::Http(format!("Chat completion read failed: {e}")))?;

        if status != StatusCode::OK {
            return Err(AgentDeskError::Http(format!(
                "Chat completion failed ({status}): {body}"
            )));
        }

        serde_json::from_str(&body).map_err(|e| {
            AgentDeskError::Serialization(format!("Chat completion decode failed: {e}"))
        })
    }

    fn first_message(response: &Value) -> Result<&Value> {
        response
            .get("choices")
            .and_then(|v| v.get(0))
            .and_then(|choice| choice.get("message"))
            .ok_or_else(|| AgentDeskError::Http("No choices returned".to_string()))
    }

    fn extract_text_from_value(message: &Value) -> String {
        message
            .get("content")
            .and_then(|content| content.as_str())
            .unwrap_or_default()
            .to_string()
    }

    fn parse_arguments(arguments: Option<&Value>) -> Value {
        match arguments {
            Some(Value::String(text)) if text.trim().is_empty() => Value::Object(Default::default()),
            Some(Value::String(text)) => {
                serde_json::from_str(text).unwrap_or(Value::String(text.clone()))
            }
            Some(value) => value.clone(),
            None => Value::Null,
        }
    }

    fn extract_tool_calls_from_value(message: &Value) -> Vec<ToolCall> {
        let Some(calls) = message.get("tool_calls").and_then(|calls| calls.as_array()) else {
            if let Some(function_call) = message.get("function_call") {
                if let Some(name) = function_call.get("name").and_then(|value| value.as_str()) {
                    return vec![ToolCall {
                        name: name.to_string(),
                        arguments: Self::parse_arguments(function_call.get("arguments")),
                    }];
                }
            }
            return Vec::new();
        };

        calls
            .iter()
            .filter_map(|call| {
                let function = call.get("function")?;
                let name = function.get("name")?.as_str()?.to_string();
                let arguments = Self::parse_arguments(function.get("arguments"));
                Some(ToolCall { name, arguments })
            })
            .collect()
    }

    fn build_system_message(system_prompt: &str) -> Result<Option<ChatCompletionRequestMessage>> {
        if system_prompt.is_empty() {
            return Ok(None);
        }
        let message = ChatCompletionRequestSystemMessageArgs::default()
            .content(system_prompt)
            .build()
            .map_err(|e| AgentDeskError::Runtime(e.to_string()))?;
        Ok(Some(ChatCompletionRequestMessage::System(message)))
    }

    fn build_user_text_message(prompt: &str) -> Result<ChatCompletionRequestMessage> {
        let message = ChatCompletionRequestUserMessageArgs::default()
            .content(ChatCompletionRequestUserMessageContent::Text(
                prompt.to_string(),
            ))
            .build()
            .map_err(|e| AgentDeskError::Runtime(e.to_string()))?;
        Ok(ChatCompletionRequestMessage::User(message))
    }

    fn convert_tools(tools: Vec<Value>) -> Vec<ChatCompletionTools> {
        tools
            .into_iter()
            .filter_map(|tool| {
                let tool_type = tool
                    .get("type")
                    .and_then(|v| v.as_str())
                    .unwrap_or("function");
                if tool_type != "function" {
                    return None;
                }
                let function_obj = tool.get("function").cloned().unwrap_or(tool);
                let name = function_obj.get("name")?.as_str()?.trim().to_string();
                if !Self::is_openai_function_name(&name) {
                    warn!(tool_name = %name, "Skipping invalid function tool name");
                    return None;
                }
                let description = function_obj
                    .get("description")
                    .and_then(|v| v.as_str())
                    .map(|v| v.to_string());
                let parameters = function_obj
                    .get("parameters")
                    .cloned()
                    .filter(|value| value.is_object())
                    .or_else(|| {
                        Some(serde_json::json!({
                            "type": "object",
                            "properties": {},
                            "additionalProperties": true
                        }))
                    });
                let function = FunctionObject {
                    name,
                    description,
                    parameters,
                    strict: Some(false),
                };
                Some(ChatCompletionTools::Function(ChatCompletionTool {
                    function,
                }))
            })
            .collect()
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn generate_with_tools(
        &self,
        prompt: &str,
        system_prompt: &str,
        tools: Vec<Value>,
    ) -> Result<LlmResponse> {
        let mut messages = Vec::new();
        if let Some(system) = Self::build_system_message(system_prompt)? {
            messages.push(system);
        }
        messages.push(Self::build_user_text_message(prompt)?);

        let tools = Self::convert_tools(tools);
        let mut builder = CreateChatCompletionRequestArgs::default();
        builder.model(self.model.clone());
        builder.messages(messages);
        if !tools.is_empty() {
            builder.tools(tools);
        }

        let request = builder
            .build()
            .map_err(|e| AgentDeskError::Runtime(e.to_string()))?;

        let raw = self.raw_chat_completion(&request).await?;
        let message = Self::first_message(&raw)?;
        Ok(LlmResponse {
            text: Self::extract_text_from_value(message),
            tool_calls: Self::extract_tool_calls_from_value(message),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::OpenAiProvider;
    use async_openai::types::chat::ChatCompletionTools;
    use serde_json::json;

    #[test]
    fn convert_tools_emits_boolean_strict_and_object_parameters() {
        let tools = OpenAiProvider::convert_tools(vec![json!({
            "type": "function",
            "name": "fetch_fx_data",
            "description": "fx quotes",
            "parameters": {"type": "object", "properties": {}}
        })]);

        assert_eq!(tools.len(), 1);
        match &tools[0] {
            ChatCompletionTools::Function(tool) => {
                assert_eq!(tool.function.name, "fetch_fx_data");
                assert_eq!(tool.function.strict, Some(false));
                assert!(tool
                    .function
                    .parameters
                    .as_ref()
                    .is_some_and(|p| p.is_object()));
            }
            _ => panic!("expected function tool"),
        }
    }

    #[test]
    fn convert_tools_skips_invalid_function_names() {
        let tools = OpenAiProvider::convert_tools(vec![
            json!({"type":"function","name":"fx.fetch","parameters":{}}),
            json!({"type":"function","name":"fetch_fx_data","parameters":{}}),
        ]);

        assert_eq!(tools.len(), 1);
        match &tools[0] {
            ChatCompletionTools::Function(tool) => {
                assert_eq!(tool.function.name, "fetch_fx_data");
            }
            _ => panic!("expected function tool"),
        }
    }

    #[test]
    fn extracts_tool_calls_with_string_arguments() {
        let message = json!({
            "content": null,
            "tool_calls": [
                {"id": "1", "type": "function", "function": {"name": "fetch_fx_data", "arguments": "{\"pair\":\"EUR/USD\"}"}},
                {"id": "2", "type": "function", "function": {"name": "fetch_crypto_data", "arguments": ""}}
            ]
        });
        let calls = OpenAiProvider::extract_tool_calls_from_value(&message);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].arguments["pair"], json!("EUR/USD"));
        assert_eq!(calls[1].arguments, json!({}));
        assert_eq!(OpenAiProvider::extract_text_from_value(&message), "");
    }

    #[test]
    fn legacy_function_call_is_understood() {
        let message = json!({
            "content": "",
            "function_call": {"name": "summarize_macro_news", "arguments": "{}"}
        });
        let calls = OpenAiProvider::extract_tool_calls_from_value(&message);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "summarize_macro_news");
    }
}
