//! State machine for a Traintastic-DIY command station: sends
//! heartbeats, forwards input/output state, and applies the handful of
//! throttle-related messages DIY firmware understands.

use super::ConfigCache;
use crate::error::{Error, Result};
use crate::io::{FrameReceiver, IoHandler};
use crate::protocol::diy::{Message, OpCode};
use std::time::Duration;

/// Settings a DIY interface pushes down whenever its config sub-object
/// changes; there is no DIY equivalent of Märklin-CAN's richer config,
/// so this only carries the heartbeat interval.
#[derive(Debug, Clone, PartialEq)]
pub struct DiyConfig {
    pub heartbeat_interval: Duration,
}

impl Default for DiyConfig {
    fn default() -> Self {
        DiyConfig { heartbeat_interval: Duration::from_secs(1) }
    }
}

pub struct DiyKernel {
    io: Box<dyn IoHandler>,
    frame_rx: FrameReceiver,
    config: ConfigCache<DiyConfig>,
    started: bool,
}

impl DiyKernel {
    pub fn new(io: Box<dyn IoHandler>, frame_rx: FrameReceiver) -> Self {
        DiyKernel { io, frame_rx, config: ConfigCache::new(), started: false }
    }

    pub async fn start(&mut self) -> Result<()> {
        self.io.start().await?;
        self.started = true;
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<()> {
        self.io.stop().await?;
        self.started = false;
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Pushes a (possibly unchanged) config down; returns whether it
    /// actually differed from what was last applied.
    pub fn set_config(&mut self, config: DiyConfig) -> bool {
        self.config.update(config)
    }

    async fn send(&self, message: &Message) -> Result<()> {
        if !self.started {
            return Err(Error::KernelNotStarted);
        }
        self.io.send(message.as_bytes()).await
    }

    pub async fn send_heartbeat(&self) -> Result<()> {
        self.send(&Message::heartbeat()).await
    }

    pub async fn get_input_state(&self, address: u16) -> Result<()> {
        self.send(&Message::get_input_state(address)).await
    }

    pub async fn set_output_state(&self, address: u16, value: bool) -> Result<()> {
        self.send(&Message::set_output_state(address, value)).await
    }

    /// Awaits and validates the next frame off the wire, discarding
    /// anything whose checksum doesn't match rather than surfacing it
    /// as an error — a corrupted byte on a serial line is noise, not a
    /// protocol violation worth tearing the connection down for.
    pub async fn receive(&mut self) -> Option<Message> {
        loop {
            let bytes = self.frame_rx.recv().await?;
            match Message::from_bytes(bytes) {
                Some(msg) if msg.is_checksum_valid() => return Some(msg),
                _ => continue,
            }
        }
    }
}

/// Dispatches a validated incoming message to the right controller
/// callback. Kept free of `DiyKernel` so it can be unit tested without
/// a live transport.
pub fn opcode_of(message: &Message) -> Option<OpCode> {
    message.opcode()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{frame_channel, SimulationIoHandler};

    #[tokio::test]
    async fn send_before_start_is_rejected() {
        let (tx, rx) = frame_channel();
        let kernel = DiyKernel::new(Box::new(SimulationIoHandler::new(tx)), rx);
        assert!(matches!(kernel.send_heartbeat().await, Err(Error::KernelNotStarted)));
    }

    #[tokio::test]
    async fn heartbeat_round_trips_through_simulation() {
        let (tx, rx) = frame_channel();
        let mut kernel = DiyKernel::new(Box::new(SimulationIoHandler::new(tx)), rx);
        kernel.start().await.unwrap();
        kernel.send_heartbeat().await.unwrap();
        let received = kernel.receive().await.unwrap();
        assert_eq!(received.opcode(), Some(OpCode::Heartbeat));
    }

    #[test]
    fn set_config_is_idempotent() {
        let (tx, rx) = frame_channel();
        let mut kernel = DiyKernel::new(Box::new(SimulationIoHandler::new(tx)), rx);
        let config = DiyConfig::default();
        assert!(kernel.set_config(config.clone()));
        assert!(!kernel.set_config(config));
    }
}
