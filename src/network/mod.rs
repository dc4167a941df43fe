//! Network Module
//!
//! Connection to the FCP peer.
//!
//! ## Architecture
//! - One `Transport` per TCP connection (blocking, timeout-bounded)
//! - One `Session` per transport, created only by a successful handshake
//! - Operations drive the session strictly one frame at a time

mod transport;
mod session;

pub use transport::{Direction, TraceSink, TracingSink, Transport};
pub use session::{check_peer_version, Session};
