//! Process-lifecycle glue: config/CLI parsing, logging setup, world
//! executor startup, discovery responder, and session acceptor —
//! launching the in-process world executor rather than a child process.

pub mod config;

use std::sync::Arc;
use tracing::info;
use traintastic_core::World;
use traintastic_net::{DiscoveryResponder, OpenAuth, SessionServer};

use crate::config::ServerConfig;

pub fn init_tracing(filter: &str) {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();
}

/// A running server: the world plus the two external surfaces bound to
/// it (§4.10, §6). Dropping this does not tear anything down — callers
/// that need a clean shutdown should stop the discovery/session tasks
/// explicitly (left to the binary's signal handler, since the core
/// crates never assume a particular shutdown signal).
pub struct RunningServer {
    pub world: Arc<World>,
    pub discovery: Arc<DiscoveryResponder>,
    pub sessions: Arc<SessionServer>,
}

/// Builds the world and binds the discovery responder and session
/// acceptor to the configured ports. Does not block; the caller decides
/// how long to keep the process alive (typically until a shutdown
/// signal).
pub async fn start(config: &ServerConfig) -> anyhow::Result<RunningServer> {
    let world = Arc::new(World::new());

    let discovery = Arc::new(DiscoveryResponder::bind_port(config.name.clone(), config.discovery_port).await?);
    tokio::spawn(discovery.clone().run());
    info!(port = config.discovery_port, name = %config.name, "discovery responder listening");

    let sessions = SessionServer::new(Arc::new(OpenAuth));
    sessions.bind(config.session_port).await?;
    info!(port = config.session_port, "session acceptor listening");

    Ok(RunningServer { world, discovery, sessions })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn start_binds_both_surfaces_on_ephemeral_ports() {
        let mut config = ServerConfig::default();
        // Port 0 lets the OS assign an ephemeral port so the test suite
        // can run concurrently without clashing with a real server.
        config.discovery_port = 0;
        config.session_port = 0;

        let server = start(&config).await;
        assert!(server.is_ok());
        assert_eq!(server.unwrap().world.interfaces_online(), 0);
    }
}
