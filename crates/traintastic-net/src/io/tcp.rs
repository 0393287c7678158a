use super::{io_err, FrameSender, IoHandler};
use crate::error::Result;
use crate::protocol::diy::FrameReader;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

/// A Traintastic-DIY or Märklin-CAN command station reached over a
/// plain TCP socket. Frame reassembly only matters for DIY traffic
/// (Märklin-CAN frames are fixed-size and typically sent whole); the
/// reader still runs a [`FrameReader`] either way since re-framing an
/// already-whole datagram is a no-op.
pub struct TcpIoHandler {
    hostname: String,
    port: u16,
    writer: Arc<Mutex<Option<tokio::net::tcp::OwnedWriteHalf>>>,
    frame_tx: FrameSender,
}

impl TcpIoHandler {
    pub fn new(hostname: impl Into<String>, port: u16, frame_tx: FrameSender) -> Self {
        TcpIoHandler { hostname: hostname.into(), port, writer: Arc::new(Mutex::new(None)), frame_tx }
    }
}

#[async_trait]
impl IoHandler for TcpIoHandler {
    async fn start(&mut self) -> Result<()> {
        let stream = TcpStream::connect((self.hostname.as_str(), self.port))
            .await
            .map_err(|e| io_err(format!("failed to connect to {}:{}: {e}", self.hostname, self.port)))?;
        let (mut reader, writer) = stream.into_split();
        *self.writer.lock().await = Some(writer);

        let frame_tx = self.frame_tx.clone();
        tokio::spawn(async move {
            let mut reassembler = FrameReader::new();
            let mut buf = [0u8; 512];
            loop {
                match reader.read(&mut buf).await {
                    Ok(0) => break,
                    Ok(n) => {
                        for frame in reassembler.feed(&buf[..n]) {
                            if frame_tx.send(frame).is_err() {
                                return;
                            }
                        }
                    }
                    Err(_) => break,
                }
            }
        });

        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        *self.writer.lock().await = None;
        Ok(())
    }

    async fn send(&self, data: &[u8]) -> Result<()> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or_else(|| io_err("tcp socket not connected"))?;
        writer.write_all(data).await.map_err(|e| io_err(e.to_string()))
    }
}
