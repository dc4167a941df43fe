//! Protocol Module
//!
//! Defines the FCP 2.0 wire protocol spoken with the peer.
//!
//! ## Frame Format
//! ```text
//! <MessageName>\n
//! (<Key>=<Value>\n)*
//! <Terminator>\n          EndMessage | End | Data
//! [DataLength bytes]      present iff Terminator == Data
//! ```
//!
//! ### Client Commands
//! - `ClientHello`         - handshake, must precede everything else
//! - `ClientPut`           - single blob insert
//! - `ClientPutComplexDir` - multi-file directory insert
//! - `ClientGet`           - fetch with `ReturnType=direct`
//! - `WatchGlobal`         - subscribe to the global queue
//!
//! ### Peer Messages
//! - `NodeHello`, `SimpleProgress`, `PutSuccessful`, `PutFetchable`,
//!   `PutFailed`, `AllData`, `GetFailed`, `ProtocolError` and a set of
//!   informational notifications

mod command;
mod message;
mod codec;

pub use command::{generate_identifier, Command, DATA_LENGTH_FIELD, IDENTIFIER_FIELD};
pub use message::{
    Failure, Message, MessageName, NodeHello, Progress, RawMessage, Terminator,
};
pub use codec::{
    decode_message, encode_command, read_message, write_command, LineSource, MAX_DATA_LENGTH,
};

/// Protocol version sent in ClientHello
pub const EXPECTED_VERSION: &str = "2.0";
