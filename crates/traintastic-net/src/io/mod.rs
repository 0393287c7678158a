//! Transport variants a [`crate::kernel::Kernel`] can be bound to. An
//! `IoHandler` only ever moves bytes; framing and parsing stay in the
//! protocol modules and the kernels that use them. One concrete handler
//! per transport, all implementing the same send/receive contract, each
//! split between a send half and a background receive loop that
//! forwards frames over a channel.

mod serial;
mod simulation;
mod tcp;
mod udp;

pub use serial::SerialIoHandler;
pub use simulation::SimulationIoHandler;
pub use tcp::TcpIoHandler;
pub use udp::UdpIoHandler;

use crate::error::{Error, Result};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Raw bytes received off a transport, handed to the owning kernel for
/// framing and dispatch. One channel per interface; the handler's
/// receive loop is the only writer.
pub type FrameSender = mpsc::UnboundedSender<Vec<u8>>;
pub type FrameReceiver = mpsc::UnboundedReceiver<Vec<u8>>;

pub fn frame_channel() -> (FrameSender, FrameReceiver) {
    mpsc::unbounded_channel()
}

/// Common contract every transport variant implements. `start`/`stop`
/// bound the connection's lifetime; `send` hands a fully framed message
/// to the wire. Received bytes arrive asynchronously on the
/// [`FrameSender`] passed at construction, not as a return value here.
#[async_trait]
pub trait IoHandler: Send + Sync {
    async fn start(&mut self) -> Result<()>;
    async fn stop(&mut self) -> Result<()>;
    async fn send(&self, data: &[u8]) -> Result<()>;
}

pub(crate) fn io_err(message: impl Into<String>) -> Error {
    Error::TransportError(message.into())
}
