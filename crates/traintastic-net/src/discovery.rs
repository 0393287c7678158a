//! UDP broadcast discovery (§4.10, §6). A server binds a UDP socket on
//! [`DISCOVERY_PORT`] and answers every `Discover` request with its
//! display name; a client broadcasts a request and keeps a `URL → (name,
//! TTL)` table that is reset on every reply and ticked down once a
//! second, matching the reference implementation's
//! `DiscoveryServerThread`/`discover.cpp` pair. Socket handling follows
//! this crate's own `io::udp` module, with the reply loop run as a
//! spawned background task.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

pub const DISCOVERY_PORT: u16 = 15740;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryKind {
    Request,
    Response,
}

/// The wire payload of a discovery datagram. Only one `command` exists
/// today (`Discover`), carried explicitly so the format can grow without
/// breaking older clients/servers silently misinterpreting bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryMessage {
    pub command: DiscoveryCommand,
    pub kind: DiscoveryKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryCommand {
    Discover,
}

impl DiscoveryMessage {
    pub fn request() -> Self {
        DiscoveryMessage { command: DiscoveryCommand::Discover, kind: DiscoveryKind::Request, name: None }
    }

    pub fn response(name: impl Into<String>) -> Self {
        DiscoveryMessage { command: DiscoveryCommand::Discover, kind: DiscoveryKind::Response, name: Some(name.into()) }
    }

    pub fn encode(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("discovery message is always serializable")
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| Error::ProtocolError(format!("malformed discovery datagram: {e}")))
    }
}

/// Server-side responder: listens for `Discover` requests and replies
/// with the server's display name. Runs until the returned task is
/// aborted or the process exits; independent of the session/TCP
/// surface, per §4.10.
pub struct DiscoveryResponder {
    socket: Arc<UdpSocket>,
    name: Arc<Mutex<String>>,
}

impl DiscoveryResponder {
    pub async fn bind(name: impl Into<String>) -> Result<Self> {
        Self::bind_port(name, DISCOVERY_PORT).await
    }

    pub async fn bind_port(name: impl Into<String>, port: u16) -> Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", port))
            .await
            .map_err(|e| Error::TransportError(format!("failed to bind discovery port {port}: {e}")))?;
        socket.set_broadcast(true).map_err(|e| Error::TransportError(e.to_string()))?;
        Ok(DiscoveryResponder { socket: Arc::new(socket), name: Arc::new(Mutex::new(name.into())) })
    }

    pub async fn set_name(&self, name: impl Into<String>) {
        *self.name.lock().await = name.into();
    }

    /// Runs the request/reply loop. Intended to be spawned as a
    /// background task by the server binary; returns only on a fatal
    /// socket error.
    pub async fn run(self: Arc<Self>) {
        let mut buf = [0u8; 512];
        loop {
            let (n, peer) = match self.socket.recv_from(&mut buf).await {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, "discovery socket read failed");
                    return;
                }
            };
            let Ok(request) = DiscoveryMessage::decode(&buf[..n]) else {
                debug!(%peer, "ignoring malformed discovery datagram");
                continue;
            };
            if request.kind != DiscoveryKind::Request {
                continue;
            }
            let name = self.name.lock().await.clone();
            let response = DiscoveryMessage::response(name).encode();
            if let Err(e) = self.socket.send_to(&response, peer).await {
                warn!(%peer, error = %e, "failed to send discovery response");
            }
        }
    }
}

#[derive(Debug, Clone)]
struct DiscoveredServer {
    name: String,
    ttl: u32,
}

/// Client-side: broadcasts `Discover` requests and maintains a `URL →
/// (name, TTL)` table, decremented once per second and pruned at zero
/// (§4.10, scenario S1).
pub struct DiscoveryClient {
    socket: UdpSocket,
    default_ttl: u32,
    servers: Mutex<HashMap<SocketAddr, DiscoveredServer>>,
}

impl DiscoveryClient {
    pub async fn bind(default_ttl: u32) -> Result<Self> {
        let socket =
            UdpSocket::bind(("0.0.0.0", 0)).await.map_err(|e| Error::TransportError(format!("failed to bind discovery client socket: {e}")))?;
        socket.set_broadcast(true).map_err(|e| Error::TransportError(e.to_string()))?;
        Ok(DiscoveryClient { socket, default_ttl, servers: Mutex::new(HashMap::new()) })
    }

    pub async fn broadcast_request(&self, broadcast_addr: SocketAddr) -> Result<()> {
        let request = DiscoveryMessage::request().encode();
        self.socket.send_to(&request, broadcast_addr).await.map_err(|e| Error::TransportError(e.to_string()))?;
        Ok(())
    }

    /// Reads one datagram, if any is pending, and refreshes (or
    /// inserts) the replying server's TTL to `default_ttl`. Not
    /// blocking if nothing has arrived is the caller's responsibility
    /// (use `tokio::select!` alongside the tick timer).
    pub async fn receive_reply(&self) -> Result<()> {
        let mut buf = [0u8; 512];
        let (n, peer) = self.socket.recv_from(&mut buf).await.map_err(|e| Error::TransportError(e.to_string()))?;
        let Ok(message) = DiscoveryMessage::decode(&buf[..n]) else {
            return Ok(());
        };
        if message.kind != DiscoveryKind::Response {
            return Ok(());
        }
        let name = message.name.unwrap_or_default();
        let mut servers = self.servers.lock().await;
        match servers.get_mut(&peer) {
            Some(entry) => {
                entry.name = name;
                entry.ttl = self.default_ttl;
            }
            None => {
                info!(%peer, %name, "discovered server");
                servers.insert(peer, DiscoveredServer { name, ttl: self.default_ttl });
            }
        }
        Ok(())
    }

    /// Decrements every entry's TTL by one and removes any that reach
    /// zero. Called once per second by the owning task's tick timer.
    pub async fn tick(&self) {
        let mut servers = self.servers.lock().await;
        servers.retain(|peer, entry| {
            entry.ttl = entry.ttl.saturating_sub(1);
            let keep = entry.ttl > 0;
            if !keep {
                info!(%peer, name = %entry.name, "discovery entry expired");
            }
            keep
        });
    }

    pub async fn servers(&self) -> Vec<(SocketAddr, String, u32)> {
        self.servers.lock().await.iter().map(|(addr, s)| (*addr, s.name.clone(), s.ttl)).collect()
    }

    /// Runs the one-second tick loop until cancelled. Split out from
    /// `tick` so tests can call `tick()` directly without waiting on a
    /// real clock.
    pub async fn run_tick_loop(&self) {
        let mut ticker = interval(Duration::from_secs(1));
        loop {
            ticker.tick().await;
            self.tick().await;
        }
    }
}
