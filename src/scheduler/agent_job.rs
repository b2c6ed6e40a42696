use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::error::Result;
use crate::interfaces::scheduler::ScheduledJob;
use crate::services::desk::AgentDesk;

/// Runs one agent with its default prompt on every tick.
pub struct AgentRunJob {
    name: String,
    agent_id: &'static str,
    interval: Duration,
    desk: Arc<AgentDesk>,
}

impl AgentRunJob {
    pub fn new(desk: Arc<AgentDesk>, agent_id: &'static str, interval: Duration) -> Self {
        Self {
            name: format!("agent:{agent_id}"),
            agent_id,
            interval,
            desk,
        }
    }

    /// One job per registered agent.
    pub fn for_all(desk: &Arc<AgentDesk>, interval: Duration) -> Vec<Self> {
        desk.registry()
            .ids()
            .into_iter()
            .map(|id| Self::new(Arc::clone(desk), id, interval))
            .collect()
    }
}

#[async_trait]
impl ScheduledJob for AgentRunJob {
    fn name(&self) -> &str {
        &self.name
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn run(&self) -> Result<()> {
        info!(agent = self.agent_id, "Running scheduled agent");
        let response = self.desk.run_unattended(self.agent_id).await?;
        info!(
            agent = self.agent_id,
            charts = response.chart_urls.len(),
            summary = %response.summary,
            "Scheduled agent finished"
        );
        Ok(())
    }
}
