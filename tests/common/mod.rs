#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::Mutex;

use agent_desk::config::Config;
use agent_desk::error::{AgentDeskError, Result};
use agent_desk::interfaces::providers::{LlmProvider, LlmResponse, ToolCall};
use agent_desk::services::desk::AgentDesk;

pub const CALM_REPLY: &str = "All calm. ChartData: {\"chart_data\":[{\"pair\":\"USD/JPY\",\"price\":150.5,\"source\":\"Sim\"}]}";

/// Hands out scripted replies in order; falls back to an empty answer.
pub struct QueueLlmProvider {
    replies: Mutex<VecDeque<Result<LlmResponse>>>,
    pub prompts: Mutex<Vec<String>>,
}

impl QueueLlmProvider {
    pub fn new(replies: Vec<Result<LlmResponse>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl LlmProvider for QueueLlmProvider {
    async fn generate_with_tools(
        &self,
        prompt: &str,
        _system_prompt: &str,
        _tools: Vec<Value>,
    ) -> Result<LlmResponse> {
        self.prompts.lock().await.push(prompt.to_string());
        self.replies
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok(LlmResponse::default()))
    }
}

/// Answers by persona: picks the reply whose display name appears in the
/// system prompt, so concurrent fan-out runs stay deterministic.
#[derive(Default)]
pub struct PersonaLlmProvider {
    replies: HashMap<&'static str, std::result::Result<String, String>>,
    pub system_prompts: std::sync::Mutex<Vec<String>>,
}

impl PersonaLlmProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, display_name: &'static str, text: &str) -> Self {
        self.replies.insert(display_name, Ok(text.to_string()));
        self
    }

    pub fn fail(mut self, display_name: &'static str, error: &str) -> Self {
        self.replies.insert(display_name, Err(error.to_string()));
        self
    }
}

#[async_trait]
impl LlmProvider for PersonaLlmProvider {
    async fn generate_with_tools(
        &self,
        _prompt: &str,
        system_prompt: &str,
        _tools: Vec<Value>,
    ) -> Result<LlmResponse> {
        self.system_prompts
            .lock()
            .unwrap()
            .push(system_prompt.to_string());
        let found = self
            .replies
            .iter()
            .find(|(name, _)| system_prompt.contains(&format!("You are {name}")));
        match found {
            Some((_, Ok(text))) => Ok(text_reply(text)),
            Some((_, Err(error))) => Err(AgentDeskError::Http(error.clone())),
            None => Ok(text_reply("No news.")),
        }
    }
}

impl PersonaLlmProvider {
    /// How many completions were requested for `display_name`.
    pub fn calls_for(&self, display_name: &str) -> usize {
        let needle = format!("You are {display_name}");
        self.system_prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|prompt| prompt.contains(&needle))
            .count()
    }
}

pub fn text_reply(text: &str) -> LlmResponse {
    LlmResponse {
        text: text.to_string(),
        tool_calls: Vec::new(),
    }
}

pub fn tool_reply(name: &str, arguments: Value) -> LlmResponse {
    LlmResponse {
        text: String::new(),
        tool_calls: vec![ToolCall {
            name: name.to_string(),
            arguments,
        }],
    }
}

pub fn test_config(dir: &TempDir, with_db: bool) -> Config {
    Config {
        api_key: Some("key".to_string()),
        charts_dir: dir.path().join("charts").to_string_lossy().to_string(),
        database_path: with_db.then(|| dir.path().join("desk.db").to_string_lossy().to_string()),
        ..Config::default()
    }
}

pub async fn make_desk(
    dir: &TempDir,
    provider: Arc<dyn LlmProvider>,
    with_db: bool,
) -> Arc<AgentDesk> {
    let config = test_config(dir, with_db);
    Arc::new(AgentDesk::from_config(&config, provider).await.unwrap())
}

pub fn chart_files(dir: &TempDir) -> Vec<String> {
    match std::fs::read_dir(dir.path().join("charts")) {
        Ok(entries) => entries
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect(),
        Err(_) => Vec::new(),
    }
}
