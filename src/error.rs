//! Error types for fcpstore
//!
//! Provides a unified error type for all operations. Every variant is fatal to
//! the operation in progress; no retry happens inside the crate.

use std::io;

use thiserror::Error;

/// Result type alias using FcpError
pub type Result<T> = std::result::Result<T, FcpError>;

/// Unified error type for fcpstore operations
#[derive(Debug, Error)]
pub enum FcpError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Cannot connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("Timed out waiting for peer")]
    Timeout,

    #[error("Connection closed by peer")]
    ConnectionClosed,

    // -------------------------------------------------------------------------
    // Handshake Errors
    // -------------------------------------------------------------------------
    #[error("Handshake failed: {0}")]
    HandshakeFailed(String),

    #[error("Incompatible peer: {field} is {found}, need at least {required}")]
    IncompatiblePeer {
        field: &'static str,
        found: String,
        required: String,
    },

    // -------------------------------------------------------------------------
    // Framing Errors
    // -------------------------------------------------------------------------
    #[error("Protocol decode error: {0}")]
    Decode(String),

    /// A frame was requested while a declared payload was still on the wire
    #[error("{0} payload bytes must be read before the next message")]
    UnreadPayload(usize),

    // -------------------------------------------------------------------------
    // Peer-Reported Errors
    // -------------------------------------------------------------------------
    #[error("Peer protocol error {code}: {description} ({extra})")]
    Protocol {
        code: u32,
        description: String,
        extra: String,
        identifier: Option<String>,
    },

    #[error("{operation} failed with code {code}: {short} ({description})")]
    OperationFailed {
        operation: &'static str,
        code: u32,
        short: String,
        description: String,
    },

    #[error("Identifier {0} is already in use on the peer")]
    IdentifierCollision(String),

    #[error("Gave up after {hops} redirects (last target {last_uri})")]
    RedirectLoopExceeded { hops: usize, last_uri: String },

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl FcpError {
    /// Classify a socket error into the protocol taxonomy
    pub fn from_io(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => FcpError::Timeout,
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => FcpError::ConnectionClosed,
            _ => FcpError::Io(err),
        }
    }

    /// Whether the session that produced this error can no longer be used
    pub fn is_fatal_to_session(&self) -> bool {
        matches!(
            self,
            FcpError::Io(_)
                | FcpError::Timeout
                | FcpError::ConnectionClosed
                | FcpError::Decode(_)
                | FcpError::UnreadPayload(_)
                | FcpError::HandshakeFailed(_)
                | FcpError::IncompatiblePeer { .. }
        )
    }
}
