//! TCP session surface (§6): after UDP discovery, a client connects to
//! the server's default TCP port and performs `NewSession(username,
//! password)`. Each accepted connection is handled by its own spawned
//! dispatch task, one per authenticated client session.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::{Error, Result};

pub const SESSION_PORT: u16 = 5741;

/// Lifecycle states visible to a connecting client (§6). The server
/// side only ever observes `Connected`/`Disconnected` directly; the
/// remaining variants describe states a *client* implementation walks
/// through, but are modelled here too since a server-embedded test
/// harness drives both ends of the same state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
    SocketError,
    ErrorAuthenticationFailed,
    ErrorNewSessionFailed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSessionRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "result")]
pub enum NewSessionResponse {
    Ok { session_id: u64 },
    AuthenticationFailed,
    NewSessionFailed { reason: String },
}

/// Validates `NewSession` credentials. The core protocol is agnostic to
/// how credentials are checked; persistence/user-store details are out
/// of scope (§1), so this crate only specifies the trait kernels and
/// the server binary plug a concrete store into.
pub trait AuthProvider: Send + Sync {
    fn authenticate(&self, username: &str, password: &str) -> bool;
}

/// Accepts all credentials — used by tests and by a server run without
/// authentication configured.
pub struct OpenAuth;

impl AuthProvider for OpenAuth {
    fn authenticate(&self, _username: &str, _password: &str) -> bool {
        true
    }
}

struct SessionEntry {
    username: String,
}

/// Server-side session registry plus TCP accept loop. Each accepted
/// connection reads exactly one `NewSessionRequest` line of JSON,
/// authenticates it, and replies with a `NewSessionResponse`; sessions
/// beyond that handshake are tracked by id but this crate does not
/// specify the post-handshake wire protocol (out of scope, §1).
pub struct SessionServer {
    auth: Arc<dyn AuthProvider>,
    sessions: Mutex<HashMap<u64, SessionEntry>>,
    next_id: AtomicU64,
}

impl SessionServer {
    pub fn new(auth: Arc<dyn AuthProvider>) -> Arc<Self> {
        Arc::new(SessionServer { auth, sessions: Mutex::new(HashMap::new()), next_id: AtomicU64::new(1) })
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn bind(self: &Arc<Self>, port: u16) -> Result<()> {
        let listener =
            TcpListener::bind(("0.0.0.0", port)).await.map_err(|e| Error::TransportError(format!("failed to bind session port {port}: {e}")))?;
        let server = self.clone();
        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, peer)) => {
                        let server = server.clone();
                        tokio::spawn(async move {
                            if let Err(e) = server.handle_connection(stream).await {
                                warn!(%peer, error = %e, "session handshake failed");
                            }
                        });
                    }
                    Err(e) => {
                        warn!(error = %e, "session listener accept failed");
                        return;
                    }
                }
            }
        });
        Ok(())
    }

    async fn handle_connection(self: &Arc<Self>, stream: TcpStream) -> Result<()> {
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        let mut line = String::new();
        reader.read_line(&mut line).await.map_err(|e| Error::TransportError(e.to_string()))?;
        let request: NewSessionRequest = serde_json::from_str(line.trim())
            .map_err(|e| Error::ProtocolError(format!("malformed NewSession request: {e}")))?;

        let response = self.new_session(&request.username, &request.password).await;
        let mut payload = serde_json::to_vec(&response).expect("session response is always serializable");
        payload.push(b'\n');
        write_half.write_all(&payload).await.map_err(|e| Error::TransportError(e.to_string()))?;
        Ok(())
    }

    /// Authenticates and, on success, registers a new session entry.
    /// Exposed directly (not only via `handle_connection`) so tests and
    /// the server binary can drive the handshake without a real socket.
    pub async fn new_session(&self, username: &str, password: &str) -> NewSessionResponse {
        if username.is_empty() {
            return NewSessionResponse::NewSessionFailed { reason: "username must not be empty".into() };
        }
        if !self.auth.authenticate(username, password) {
            return NewSessionResponse::AuthenticationFailed;
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.sessions.lock().await.insert(id, SessionEntry { username: username.to_string() });
        info!(%username, session_id = id, "session established");
        NewSessionResponse::Ok { session_id: id }
    }

    pub async fn close_session(&self, session_id: u64) {
        self.sessions.lock().await.remove(&session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedAuth(&'static str, &'static str);
    impl AuthProvider for FixedAuth {
        fn authenticate(&self, username: &str, password: &str) -> bool {
            username == self.0 && password == self.1
        }
    }

    #[tokio::test]
    async fn correct_credentials_yield_a_session_id() {
        let server = SessionServer::new(Arc::new(FixedAuth("alice", "secret")));
        let response = server.new_session("alice", "secret").await;
        match response {
            NewSessionResponse::Ok { session_id } => assert_eq!(session_id, 1),
            other => panic!("expected Ok, got {other:?}"),
        }
        assert_eq!(server.session_count().await, 1);
    }

    #[tokio::test]
    async fn wrong_password_is_authentication_failed() {
        let server = SessionServer::new(Arc::new(FixedAuth("alice", "secret")));
        let response = server.new_session("alice", "wrong").await;
        assert!(matches!(response, NewSessionResponse::AuthenticationFailed));
        assert_eq!(server.session_count().await, 0);
    }

    #[tokio::test]
    async fn empty_username_is_new_session_failed() {
        let server = SessionServer::new(Arc::new(OpenAuth));
        let response = server.new_session("", "x").await;
        assert!(matches!(response, NewSessionResponse::NewSessionFailed { .. }));
    }

    #[tokio::test]
    async fn session_ids_increase_and_closing_removes_the_entry() {
        let server = SessionServer::new(Arc::new(OpenAuth));
        let a = server.new_session("a", "x").await;
        let b = server.new_session("b", "x").await;
        let (NewSessionResponse::Ok { session_id: a_id }, NewSessionResponse::Ok { session_id: b_id }) = (a, b) else {
            panic!("expected both sessions to succeed");
        };
        assert!(b_id > a_id);
        server.close_session(a_id).await;
        assert_eq!(server.session_count().await, 1);
    }
}
