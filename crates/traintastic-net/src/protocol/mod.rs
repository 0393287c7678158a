//! Wire-level message framing for each supported command station
//! protocol. Kernels (in [`crate::kernel`]) build and parse these
//! messages; I/O handlers (in [`crate::io`]) only ever see bytes.

pub mod diy;
pub mod marklincan;
