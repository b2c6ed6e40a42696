use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::agents::AgentRegistry;
use crate::charts::ChartRenderer;
use crate::chatlog::{ChatLogStore, SYSTEM_USER_ID};
use crate::config::Config;
use crate::error::{AgentDeskError, Result};
use crate::interfaces::providers::LlmProvider;
use crate::services::assembler::{AgentResponse, ResultAssembler};
use crate::services::dispatcher::PromptDispatcher;
use crate::services::parser::parse_response;

/// Per-agent result of a fan-out run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AgentOutcome {
    Success(AgentResponse),
    Failure { error: String },
}

impl AgentOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

impl From<Result<AgentResponse>> for AgentOutcome {
    fn from(result: Result<AgentResponse>) -> Self {
        match result {
            Ok(response) => Self::Success(response),
            Err(err) => Self::Failure {
                error: err.to_string(),
            },
        }
    }
}

/// Dispatch, parse, render and assemble, plus optional chat logging.
pub struct AgentDesk {
    dispatcher: PromptDispatcher,
    assembler: ResultAssembler,
    chat_log: Option<Arc<ChatLogStore>>,
}

impl AgentDesk {
    pub fn new(dispatcher: PromptDispatcher, assembler: ResultAssembler) -> Self {
        Self {
            dispatcher,
            assembler,
            chat_log: None,
        }
    }

    pub fn with_chat_log(mut self, store: Arc<ChatLogStore>) -> Self {
        self.chat_log = Some(store);
        self
    }

    /// Wires the built-in agents around `provider`; opens the chat log when a
    /// database path is configured.
    pub async fn from_config(config: &Config, provider: Arc<dyn LlmProvider>) -> Result<Self> {
        let renderer = Arc::new(ChartRenderer::from_config(config));
        renderer.ensure_output_dir()?;
        let registry = Arc::new(AgentRegistry::builtin(Arc::clone(&renderer)));
        let dispatcher = PromptDispatcher::from_config(provider, registry, config);
        let assembler = ResultAssembler::from_config(renderer, config);
        let desk = Self::new(dispatcher, assembler);

        match config.database_path.as_deref() {
            Some(path) => {
                let store = ChatLogStore::new(path).await?;
                store.ensure_default_user().await?;
                info!(path, "Chat log enabled");
                Ok(desk.with_chat_log(Arc::new(store)))
            }
            None => Ok(desk),
        }
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        self.dispatcher.registry()
    }

    pub fn chat_log(&self) -> Option<&Arc<ChatLogStore>> {
        self.chat_log.as_ref()
    }

    pub fn assembler(&self) -> &ResultAssembler {
        &self.assembler
    }

    async fn run(&self, agent_id: &str, message: &str) -> Result<AgentResponse> {
        let raw = self.dispatcher.dispatch(agent_id, message).await?;
        let parsed = parse_response(&raw);
        Ok(self.assembler.assemble(parsed).await)
    }

    /// Runs one agent for an interactive caller.
    pub async fn run_agent(&self, agent_id: &str, message: &str) -> Result<AgentResponse> {
        self.log(message, false).await;
        self.run_and_log_summary(agent_id, message).await
    }

    /// Runs every agent concurrently; the map is keyed by display name.
    /// The user message is logged once, each summary once per agent.
    pub async fn run_all(&self, message: &str) -> BTreeMap<String, AgentOutcome> {
        self.log(message, false).await;
        let runs = self.registry().iter().map(|agent| async move {
            let outcome = AgentOutcome::from(self.run_and_log_summary(agent.id, message).await);
            if let AgentOutcome::Failure { error } = &outcome {
                warn!(agent = agent.id, %error, "Agent run failed");
            }
            (agent.display_name.to_string(), outcome)
        });
        join_all(runs).await.into_iter().collect()
    }

    /// Runs an agent with its default prompt, as the scheduler does.
    pub async fn run_unattended(&self, agent_id: &str) -> Result<AgentResponse> {
        let agent = self
            .registry()
            .get(agent_id)
            .ok_or_else(|| AgentDeskError::Dispatch(format!("unknown agent: {agent_id}")))?;
        let display_name = agent.display_name;
        let prompt = agent.default_prompt.clone();

        let response = self.run(agent_id, &prompt).await?;
        self.log(&format!("[{display_name}] {}", response.summary), true)
            .await;
        Ok(response)
    }

    async fn run_and_log_summary(&self, agent_id: &str, message: &str) -> Result<AgentResponse> {
        let response = self.run(agent_id, message).await?;
        self.log(&response.summary, true).await;
        Ok(response)
    }

    async fn log(&self, message: &str, is_ai_response: bool) {
        let Some(store) = &self.chat_log else {
            return;
        };
        if let Err(err) = store
            .record_message(SYSTEM_USER_ID, message, is_ai_response)
            .await
        {
            warn!(error = %err, "Chat log write failed");
        }
    }
}
