use super::{io_err, FrameSender, IoHandler};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::net::UdpSocket;

/// Märklin-CAN over UDP: a local socket bound to port 15730 sends
/// requests, and a separate socket bound to 15731 receives replies and
/// broadcasts from the command station, mirroring the reference
/// implementation's split send/receive sockets.
pub struct UdpIoHandler {
    remote_addr: String,
    send_socket: Option<Arc<UdpSocket>>,
    frame_tx: FrameSender,
}

const LOCAL_SEND_PORT: u16 = 15730;
const LOCAL_RECEIVE_PORT: u16 = 15731;

impl UdpIoHandler {
    pub fn new(remote_addr: impl Into<String>, frame_tx: FrameSender) -> Self {
        UdpIoHandler { remote_addr: remote_addr.into(), send_socket: None, frame_tx }
    }
}

#[async_trait]
impl IoHandler for UdpIoHandler {
    async fn start(&mut self) -> Result<()> {
        let send_socket = UdpSocket::bind(("0.0.0.0", LOCAL_SEND_PORT))
            .await
            .map_err(|e| io_err(format!("failed to bind send socket: {e}")))?;
        send_socket
            .connect((self.remote_addr.as_str(), LOCAL_RECEIVE_PORT))
            .await
            .map_err(|e| io_err(format!("failed to target {}: {e}", self.remote_addr)))?;
        let send_socket = Arc::new(send_socket);
        self.send_socket = Some(send_socket);

        let receive_socket = UdpSocket::bind(("0.0.0.0", LOCAL_RECEIVE_PORT))
            .await
            .map_err(|e| io_err(format!("failed to bind receive socket: {e}")))?;

        let frame_tx = self.frame_tx.clone();
        tokio::spawn(async move {
            let mut buf = [0u8; 64];
            loop {
                match receive_socket.recv(&mut buf).await {
                    Ok(n) => {
                        if frame_tx.send(buf[..n].to_vec()).is_err() {
                            return;
                        }
                    }
                    Err(_) => break,
                }
            }
        });

        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        self.send_socket = None;
        Ok(())
    }

    async fn send(&self, data: &[u8]) -> Result<()> {
        let socket = self.send_socket.as_ref().ok_or_else(|| io_err("udp socket not bound"))?;
        socket.send(data).await.map(|_| ()).map_err(|e| io_err(e.to_string()))
    }
}
