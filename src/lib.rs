//! # fcpstore
//!
//! Client for the Freenet Client Protocol (FCP 2.0) with:
//! - Text framing with declared-length binary payloads
//! - Handshake with minimum peer-version enforcement
//! - Put (single blob and multi-file directory) and get with redirect-follow
//! - A read-through, seek/read view of a remote blob hierarchy
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                RemoteStore / RangeReader                    │
//! │              (address → bytes cache, seek/read)             │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                        Node                                 │
//! │           put / put_dir / get  (ops, Demux)                 │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │   Session   │─────────▶│    Codec    │
//!   │ (handshake) │          │  (frames)   │
//!   └──────┬──────┘          └─────────────┘
//!          │
//!          ▼
//!   ┌─────────────┐
//!   │  Transport  │
//!   │    (TCP)    │
//!   └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod network;
pub mod ops;
pub mod node;
pub mod store;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{FcpError, Result};
pub use config::{Config, Endpoint, Priority};
pub use node::Node;
pub use store::{RangeReader, RemoteStore};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of fcpstore
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
