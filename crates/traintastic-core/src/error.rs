// Error types for traintastic-core

use thiserror::Error;

/// Errors produced by the property/object/world runtime.
///
/// Property setters, method invocations and world operations all return
/// `Result<_, Error>` — nothing in this crate panics or aborts the process
/// on a user-triggered mistake.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error("not writable")]
    NotWritable,

    #[error("value out of range")]
    OutOfRange,

    #[error("invalid value")]
    InvalidValue,

    #[error("conversion error")]
    ConversionError,

    #[error("object destroyed")]
    ObjectDestroyed,

    #[error("duplicate address")]
    DuplicateAddress,

    #[error("unknown address")]
    UnknownAddress,

    #[error("id already in use")]
    IdInUse,

    #[error("unknown id")]
    UnknownId,

    #[error("editing not allowed while an interface is online")]
    EditingLocked,
}

pub type Result<T> = std::result::Result<T, Error>;
