use clap::Parser;
use tracing::info;
use traintastic_server::config::{Cli, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = ServerConfig::load(&cli)?;
    traintastic_server::init_tracing(&config.log_filter);

    info!(name = %config.name, "starting traintastic-server");
    let server = traintastic_server::start(&config).await?;

    tokio::signal::ctrl_c().await?;
    info!(sessions = server.sessions.session_count().await, "shutting down");
    Ok(())
}
