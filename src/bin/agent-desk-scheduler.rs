use std::sync::Arc;
use std::time::Duration;

use agent_desk::config::Config;
use agent_desk::error::Result;
use agent_desk::providers::openai::OpenAiProvider;
use agent_desk::scheduler::{AgentRunJob, Scheduler};
use agent_desk::services::desk::AgentDesk;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "agent-desk-scheduler")]
#[command(about = "Runs every Agent Desk agent unattended on a fixed interval")]
struct Cli {
    #[arg(long, env = "AGENT_DESK_CONFIG")]
    config: Option<String>,

    /// Overrides `schedule_interval_secs`.
    #[arg(long)]
    interval_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    agent_desk::logging::init_tracing("agent_desk_scheduler");
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?;
    let provider = Arc::new(OpenAiProvider::from_config(&config)?);
    let desk = Arc::new(AgentDesk::from_config(&config, provider).await?);

    let interval = Duration::from_secs(
        cli.interval_secs
            .unwrap_or(config.schedule_interval_secs)
            .max(1),
    );
    let mut scheduler = Scheduler::new();
    for job in AgentRunJob::for_all(&desk, interval) {
        scheduler.register_job(Arc::new(job));
    }
    scheduler.start();
    tracing::info!(
        interval_secs = interval.as_secs(),
        "Scheduler started; every agent runs now and then on each interval"
    );

    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("Stopping scheduler");
    scheduler.stop().await;
    Ok(())
}
