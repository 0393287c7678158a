use super::{io_err, FrameSender, IoHandler};
use crate::error::Result;
use crate::protocol::diy::FrameReader;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::Mutex;
use tokio_serial::SerialPortBuilderExt;

/// A Traintastic-DIY command station reached over a serial port. The
/// line is a raw byte stream, so a [`FrameReader`] reassembles frames
/// before they're handed up to the kernel.
pub struct SerialIoHandler {
    device: String,
    baudrate: u32,
    writer: Arc<Mutex<Option<WriteHalf<tokio_serial::SerialStream>>>>,
    frame_tx: FrameSender,
}

impl SerialIoHandler {
    pub fn new(device: impl Into<String>, baudrate: u32, frame_tx: FrameSender) -> Self {
        SerialIoHandler { device: device.into(), baudrate, writer: Arc::new(Mutex::new(None)), frame_tx }
    }
}

#[async_trait]
impl IoHandler for SerialIoHandler {
    async fn start(&mut self) -> Result<()> {
        let port = tokio_serial::new(&self.device, self.baudrate)
            .open_native_async()
            .map_err(|e| io_err(format!("failed to open {}: {e}", self.device)))?;

        let (mut reader, writer): (ReadHalf<_>, WriteHalf<_>) = tokio::io::split(port);
        *self.writer.lock().await = Some(writer);

        let frame_tx = self.frame_tx.clone();
        tokio::spawn(async move {
            let mut reassembler = FrameReader::new();
            let mut buf = [0u8; 256];
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
        let writer = guard.as_mut().ok_or_else(|| io_err("serial port not open"))?;
        writer.write_all(data).await.map_err(|e| io_err(e.to_string()))
    }
}
