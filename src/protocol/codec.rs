//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Wire Format
//!
//! ```text
//! ┌─────────────────────────┐
//! │ MessageName\n           │
//! ├─────────────────────────┤
//! │ Key=Value\n             │  zero or more
//! ├─────────────────────────┤
//! │ End | EndMessage | Data │
//! ├─────────────────────────┤
//! │ DataLength raw bytes    │  only after `Data`
//! └─────────────────────────┘
//! ```
//!
//! Decoding stops at the terminator. The payload after a `Data` line is left
//! on the stream for the caller, who knows its length from `DataLength`.

use std::collections::BTreeMap;

use crate::error::{FcpError, Result};
use crate::network::Transport;

use super::{Command, RawMessage, Terminator};

/// Largest payload a frame may declare (2 GiB)
pub const MAX_DATA_LENGTH: usize = 2 * 1024 * 1024 * 1024;

/// Anything that yields protocol lines with the terminator stripped
pub trait LineSource {
    fn next_line(&mut self) -> Result<String>;
}

impl LineSource for Transport {
    fn next_line(&mut self) -> Result<String> {
        self.read_line()
    }
}

// =============================================================================
// Command Encoding
// =============================================================================

/// Header lines of a command, terminator included
fn frame_lines(command: &Command) -> Vec<String> {
    let mut lines = Vec::with_capacity(command.fields().len() + 2);
    lines.push(command.name().to_string());
    for (key, value) in command.fields() {
        lines.push(format!("{}={}", key, value));
    }
    lines.push(command.terminator().as_str().to_string());
    lines
}

/// Encode a command, including any attached payload, to bytes
pub fn encode_command(command: &Command) -> Vec<u8> {
    let payload_len = command.payload().map(|p| p.len()).unwrap_or(0);
    let mut bytes = Vec::with_capacity(64 + payload_len);

    for line in frame_lines(command) {
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');
    }
    if let Some(payload) = command.payload() {
        bytes.extend_from_slice(payload);
    }

    bytes
}

/// Write a command and its attached payload to the transport
pub fn write_command(transport: &mut Transport, command: &Command) -> Result<()> {
    for line in frame_lines(command) {
        transport.write_line(&line)?;
    }
    if let Some(payload) = command.payload() {
        transport.write_bytes(payload)?;
    }
    transport.flush()
}

// =============================================================================
// Message Decoding
// =============================================================================

/// Read one frame, up to and including its terminator line
pub fn read_message<L: LineSource>(source: &mut L) -> Result<RawMessage> {
    let name = loop {
        let line = source.next_line()?;
        if !line.is_empty() {
            break line;
        }
    };

    if Terminator::from_line(&name).is_some() {
        return Err(FcpError::Decode(format!(
            "Frame starts with terminator {:?} instead of a message name",
            name
        )));
    }

    let mut fields = BTreeMap::new();
    let terminator = loop {
        let line = source.next_line()?;
        if line.is_empty() {
            continue;
        }
        if let Some(terminator) = Terminator::from_line(&line) {
            break terminator;
        }

        let (key, value) = line.split_once('=').ok_or_else(|| {
            FcpError::Decode(format!("{}: malformed field line {:?}", name, line))
        })?;
        if fields.insert(key.to_string(), value.to_string()).is_some() {
            tracing::warn!("{}: duplicate field {}, keeping last value", name, key);
        }
    };

    let message = RawMessage {
        name,
        fields,
        terminator,
    };

    if terminator == Terminator::Data {
        let length = message.data_length()?.ok_or_else(|| {
            FcpError::Decode(format!("{} ends with Data but has no DataLength", message.name))
        })?;
        if length > MAX_DATA_LENGTH {
            return Err(FcpError::Decode(format!(
                "{}: payload too large: {} bytes (max {})",
                message.name, length, MAX_DATA_LENGTH
            )));
        }
    }

    Ok(message)
}

/// Lines over an in-memory buffer, tracking how much was consumed
struct SliceLines<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl LineSource for SliceLines<'_> {
    fn next_line(&mut self) -> Result<String> {
        let rest = &self.bytes[self.position..];
        let end = rest
            .iter()
            .position(|&b| b == b'\n')
            .ok_or(FcpError::ConnectionClosed)?;
        self.position += end + 1;

        let line = rest[..end].strip_suffix(b"\r").unwrap_or(&rest[..end]);
        String::from_utf8(line.to_vec())
            .map_err(|_| FcpError::Decode("Line is not valid UTF-8".to_string()))
    }
}

/// Decode one frame from a buffer
///
/// Returns the message and the number of header bytes consumed; a declared
/// payload starts at that offset.
pub fn decode_message(bytes: &[u8]) -> Result<(RawMessage, usize)> {
    let mut lines = SliceLines { bytes, position: 0 };
    let message = read_message(&mut lines)?;
    Ok((message, lines.position))
}
