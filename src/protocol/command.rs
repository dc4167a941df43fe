//! Command definitions
//!
//! Outbound frames sent from the client to the peer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;

use super::Terminator;

/// Field naming the operation a frame belongs to
pub const IDENTIFIER_FIELD: &str = "Identifier";

/// Field declaring the length of the binary payload that follows a frame
pub const DATA_LENGTH_FIELD: &str = "DataLength";

/// Process-wide tiebreaker for identifiers minted within one microsecond
static IDENTIFIER_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Generate an identifier that is unique within this process
///
/// Format: `{prefix}-{unix micros}-{random:08x}-{sequence}`
pub fn generate_identifier(prefix: &str) -> String {
    let micros = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros())
        .unwrap_or_default();
    let sequence = IDENTIFIER_SEQUENCE.fetch_add(1, Ordering::Relaxed);

    format!(
        "{}-{}-{:08x}-{}",
        prefix,
        micros,
        rand::random::<u32>(),
        sequence
    )
}

/// A command frame: name, ordered fields and an optional raw payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    name: String,

    /// Insertion-ordered; keys are unique
    fields: Vec<(String, String)>,

    payload: Option<Bytes>,

    /// Set when the payload is sent separately after the frame
    data_follows: bool,
}

impl Command {
    /// Create a command with no fields
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            payload: None,
            data_follows: false,
        }
    }

    /// Builder form of [`Command::set`]
    pub fn field(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.set(key, value);
        self
    }

    /// Set a field, replacing any earlier value for the same key
    pub fn set(&mut self, key: impl Into<String>, value: impl ToString) {
        let key = key.into();
        let value = value.to_string();

        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key, value)),
        }
    }

    /// Set the `Identifier` field
    pub fn with_identifier(self, identifier: impl Into<String>) -> Self {
        self.field(IDENTIFIER_FIELD, identifier.into())
    }

    /// Attach a payload written directly after the frame
    pub fn with_payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.payload = Some(payload.into());
        self.data_follows = true;
        self
    }

    /// Mark the frame as payload-bearing without attaching the data
    pub fn data_follows(mut self) -> Self {
        self.data_follows = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn identifier(&self) -> Option<&str> {
        self.get(IDENTIFIER_FIELD)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    pub fn payload(&self) -> Option<&Bytes> {
        self.payload.as_ref()
    }

    /// `Data` when a payload follows the frame, `EndMessage` otherwise
    pub fn terminator(&self) -> Terminator {
        if self.data_follows || self.get(DATA_LENGTH_FIELD).is_some() {
            Terminator::Data
        } else {
            Terminator::EndMessage
        }
    }
}
