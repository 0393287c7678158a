//! Server configuration: a `clap`-parsed CLI merged with an optional
//! JSON config file, following the ambient-stack's "config-with-
//! overrides" pattern (§1.1). CLI flags that were actually passed win
//! over the file; the file wins over built-in defaults.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "traintastic-server", version, about = "Model-railway layout control server")]
pub struct Cli {
    /// Path to a JSON config file merged underneath these CLI flags.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Display name advertised to clients over UDP discovery.
    #[arg(long)]
    pub name: Option<String>,

    /// UDP port the discovery responder binds.
    #[arg(long)]
    pub discovery_port: Option<u16>,

    /// TCP port the session acceptor binds.
    #[arg(long)]
    pub session_port: Option<u16>,

    /// Default discovery client TTL, in seconds, before an unconfirmed
    /// server entry is pruned (§4.10, S1). Only meaningful to a client
    /// embedded in the same binary for testing; the server side never
    /// prunes itself.
    #[arg(long)]
    pub discovery_default_ttl: Option<u32>,

    /// Log filter passed to `tracing_subscriber::EnvFilter`, e.g.
    /// `traintastic_net=debug,info`.
    #[arg(long)]
    pub log_filter: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub name: String,
    pub discovery_port: u16,
    pub session_port: u16,
    pub discovery_default_ttl: u32,
    pub log_filter: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            name: "Traintastic".to_string(),
            discovery_port: traintastic_net::DISCOVERY_PORT,
            session_port: traintastic_net::SESSION_PORT,
            discovery_default_ttl: 5,
            log_filter: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Builds the effective config: defaults, overridden by an optional
    /// config file, overridden by any CLI flags that were actually
    /// supplied.
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let mut config = match &cli.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                serde_json::from_str(&text)?
            }
            None => ServerConfig::default(),
        };

        if let Some(name) = &cli.name {
            config.name = name.clone();
        }
        if let Some(port) = cli.discovery_port {
            config.discovery_port = port;
        }
        if let Some(port) = cli.session_port {
            config.session_port = port;
        }
        if let Some(ttl) = cli.discovery_default_ttl {
            config.discovery_default_ttl = ttl;
        }
        if let Some(filter) = &cli.log_filter {
            config.log_filter = filter.clone();
        }
        Ok(config)
    }
}
