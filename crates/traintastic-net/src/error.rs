//! Errors produced by kernels, I/O handlers, discovery and the session
//! surface. Wraps the core error so a kernel call that touches a
//! destroyed world object reports through the same type as every other
//! transport failure.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] traintastic_core::Error),

    #[error("kernel not started")]
    KernelNotStarted,

    #[error("transport error: {0}")]
    TransportError(String),

    #[error("checksum mismatch")]
    ChecksumMismatch,

    #[error("protocol error: {0}")]
    ProtocolError(String),

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("session rejected")]
    SessionRejected,

    #[error("timeout")]
    Timeout,
}

pub type Result<T> = std::result::Result<T, Error>;
