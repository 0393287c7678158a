//! Hardware interfaces, kernels, I/O handler variants, wire framing,
//! UDP discovery, and the client session surface (C9–C10). Built atop
//! `traintastic-core`'s object runtime and `traintastic-hardware`'s
//! controller mixins.

pub mod discovery;
pub mod error;
pub mod interface;
pub mod io;
pub mod kernel;
pub mod protocol;
pub mod session;

pub use discovery::{DiscoveryClient, DiscoveryMessage, DiscoveryResponder, DISCOVERY_PORT};
pub use error::{Error, Result};
pub use interface::{Interface, InterfaceProtocol, InterfaceStatus, TransportKind};
pub use session::{AuthProvider, NewSessionRequest, NewSessionResponse, OpenAuth, SessionServer, SessionState, SESSION_PORT};
