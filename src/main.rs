use std::sync::Arc;

use agent_desk::config::Config;
use agent_desk::daemon::{self, AppState};
use agent_desk::error::Result;
use agent_desk::providers::openai::OpenAiProvider;
use agent_desk::services::desk::AgentDesk;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "agent-desk")]
#[command(about = "Agent Desk HTTP daemon")]
struct Cli {
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value_t = 8000)]
    port: u16,

    /// Optional JSON config file; environment variables override it.
    #[arg(long, env = "AGENT_DESK_CONFIG")]
    config: Option<String>,

    /// Also run every agent unattended on the configured interval.
    #[arg(long)]
    with_scheduler: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    agent_desk::logging::init_tracing("agent_desk");
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?;
    let provider = Arc::new(OpenAiProvider::from_config(&config)?);
    tracing::info!(model = provider.model(), "Completion provider ready");
    let desk = Arc::new(AgentDesk::from_config(&config, provider).await?);

    let state = AppState {
        desk,
        token: config.api_token.clone(),
    };
    let schedule = cli
        .with_scheduler
        .then(|| std::time::Duration::from_secs(config.schedule_interval_secs.max(1)));

    daemon::run_with_shutdown(&cli.host, cli.port, state, schedule, async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Shutdown requested");
    })
    .await
}
