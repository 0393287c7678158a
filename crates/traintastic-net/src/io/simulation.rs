use super::{io_err, FrameSender, IoHandler};
use crate::error::Result;
use async_trait::async_trait;

/// Loops every sent frame back to the kernel instead of touching real
/// hardware. `send` always succeeds; per the reference simulation
/// handler, the reply does not reach the kernel synchronously but is
/// posted onto the async runtime, so callers observe the same
/// one-scheduling-hop latency a real transport would have.
pub struct SimulationIoHandler {
    frame_tx: FrameSender,
    started: bool,
}

impl SimulationIoHandler {
    pub fn new(frame_tx: FrameSender) -> Self {
        SimulationIoHandler { frame_tx, started: false }
    }
}

#[async_trait]
impl IoHandler for SimulationIoHandler {
    async fn start(&mut self) -> Result<()> {
        self.started = true;
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        self.started = false;
        Ok(())
    }

    async fn send(&self, data: &[u8]) -> Result<()> {
        if !self.started {
            return Err(io_err("simulation handler not started"));
        }
        let reply = data.to_vec();
        let tx = self.frame_tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(reply);
        });
        Ok(())
    }
}
