//! Session
//!
//! Establishes and validates the connection, then offers `send_command` and
//! `read_message` as the only primitives operations are built from.
//!
//! ## Payload Discipline
//! When a message ends with `Data`, its `DataLength` bytes are still on the
//! stream. The session remembers the pending length and refuses to read or
//! send another frame until [`Session::read_payload`] or
//! [`Session::skip_payload`] has drained it.

use bytes::Bytes;

use crate::config::{Config, VersionRequirement};
use crate::error::{FcpError, Result};
use crate::protocol::{
    generate_identifier, read_message, write_command, Command, Message, MessageName, NodeHello,
    RawMessage, Terminator, EXPECTED_VERSION,
};

use super::Transport;

/// A handshaken connection to one peer
pub struct Session {
    transport: Transport,

    /// Name sent in ClientHello
    client_name: String,

    /// Peer greeting
    node: NodeHello,

    /// Bytes of a declared payload not yet read
    pending_payload: Option<usize>,
}

impl Session {
    /// Connect to the configured endpoint and perform the handshake
    pub fn connect(config: &Config) -> Result<Self> {
        let transport = Transport::connect(&config.endpoint)?;
        Self::handshake(transport, config)
    }

    /// Perform the handshake over an existing transport
    ///
    /// Sends ClientHello, requires NodeHello back and, unless disabled,
    /// checks the advertised build numbers.
    pub fn handshake(mut transport: Transport, config: &Config) -> Result<Self> {
        let client_name = generate_identifier(&config.client_name_prefix);

        let hello = Command::new("ClientHello")
            .field("Name", &client_name)
            .field("ExpectedVersion", EXPECTED_VERSION);
        write_command(&mut transport, &hello)?;

        let raw = read_message(&mut transport)?;
        if MessageName::from_wire(&raw.name) != MessageName::NodeHello {
            return Err(FcpError::HandshakeFailed(format!(
                "expected NodeHello from {}, got {}",
                transport.peer(),
                raw.name
            )));
        }
        if raw.terminator == Terminator::Data {
            return Err(FcpError::HandshakeFailed(
                "NodeHello must not carry a payload".to_string(),
            ));
        }

        let node = match Message::parse(raw)? {
            Message::NodeHello(node) => node,
            other => {
                return Err(FcpError::HandshakeFailed(format!(
                    "unexpected greeting {}",
                    other.name()
                )))
            }
        };

        if config.check_version {
            check_peer_version(&node, &config.version)?;
        } else {
            tracing::debug!("Peer version check disabled");
        }

        tracing::info!(
            "Connected to {} as {} (build {:?}, ext build {:?})",
            transport.peer(),
            client_name,
            node.build,
            node.ext_build
        );

        Ok(Self {
            transport,
            client_name,
            node,
            pending_payload: None,
        })
    }

    // =========================================================================
    // Outbound
    // =========================================================================

    /// Encode and send a command, with its attached payload if any
    ///
    /// A command that declares `DataLength` without attaching data must be
    /// followed by [`Session::send_payload`].
    pub fn send_command(&mut self, command: &Command) -> Result<()> {
        self.ensure_drained()?;
        tracing::debug!(
            "-> {} {}",
            command.name(),
            command.identifier().unwrap_or("")
        );
        write_command(&mut self.transport, command)
    }

    /// Send a payload for a command already sent without one
    pub fn send_payload(&mut self, payload: &[u8]) -> Result<()> {
        self.transport.write_bytes(payload)?;
        self.transport.flush()
    }

    // =========================================================================
    // Inbound
    // =========================================================================

    /// Read and interpret the next message
    pub fn read_message(&mut self) -> Result<Message> {
        let raw = self.read_raw_message()?;
        Message::parse(raw)
    }

    /// Read the next frame without interpreting it
    pub fn read_raw_message(&mut self) -> Result<RawMessage> {
        self.ensure_drained()?;

        let raw = read_message(&mut self.transport)?;
        tracing::debug!("<- {} {}", raw.name, raw.identifier().unwrap_or(""));

        if raw.terminator == Terminator::Data {
            // The codec has already checked that DataLength is present
            self.pending_payload = Some(raw.data_length()?.unwrap_or(0));
        }
        Ok(raw)
    }

    /// Length of the payload that must be read before the next frame
    pub fn pending_payload(&self) -> Option<usize> {
        self.pending_payload
    }

    /// Read exactly the pending payload
    pub fn read_payload(&mut self) -> Result<Bytes> {
        let len = self.pending_payload.take().ok_or_else(|| {
            FcpError::Decode("No payload is pending on this session".to_string())
        })?;
        Ok(Bytes::from(self.transport.read_exact(len)?))
    }

    /// Discard the pending payload, if any
    pub fn skip_payload(&mut self) -> Result<()> {
        if let Some(len) = self.pending_payload {
            tracing::debug!("Discarding {} unclaimed payload bytes", len);
            self.read_payload()?;
        }
        Ok(())
    }

    fn ensure_drained(&self) -> Result<()> {
        match self.pending_payload {
            Some(len) => Err(FcpError::UnreadPayload(len)),
            None => Ok(()),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn client_name(&self) -> &str {
        &self.client_name
    }

    /// Peer greeting received during the handshake
    pub fn node(&self) -> &NodeHello {
        &self.node
    }

    pub fn transport_mut(&mut self) -> &mut Transport {
        &mut self.transport
    }

    /// Close the connection
    pub fn shutdown(mut self) {
        tracing::debug!("Closing session {}", self.client_name);
        self.transport.shutdown();
    }
}

// =============================================================================
// Version Check
// =============================================================================

/// Require the peer's build numbers to meet `required`
///
/// A `Build` exactly one below the minimum is accepted when `Revision` is the
/// custom sentinel or at least `min_revision`.
pub fn check_peer_version(node: &NodeHello, required: &VersionRequirement) -> Result<()> {
    let build = node.build.ok_or_else(|| FcpError::IncompatiblePeer {
        field: "Build",
        found: "missing".to_string(),
        required: required.min_build.to_string(),
    })?;
    let ext_build = node.ext_build.ok_or_else(|| FcpError::IncompatiblePeer {
        field: "ExtBuild",
        found: "missing".to_string(),
        required: required.min_ext_build.to_string(),
    })?;

    if build < required.min_build {
        if build + 1 != required.min_build {
            return Err(FcpError::IncompatiblePeer {
                field: "Build",
                found: build.to_string(),
                required: required.min_build.to_string(),
            });
        }
        check_revision(node.revision.as_deref(), required)?;
    }

    if ext_build < required.min_ext_build {
        return Err(FcpError::IncompatiblePeer {
            field: "ExtBuild",
            found: ext_build.to_string(),
            required: required.min_ext_build.to_string(),
        });
    }

    Ok(())
}

fn check_revision(revision: Option<&str>, required: &VersionRequirement) -> Result<()> {
    let incompatible = |found: &str| FcpError::IncompatiblePeer {
        field: "Revision",
        found: found.to_string(),
        required: required.min_revision.to_string(),
    };

    match revision {
        None => Err(incompatible("missing")),
        Some(r) if r == required.custom_revision => Ok(()),
        Some(r) => match r.trim().parse::<u32>() {
            Ok(n) if n >= required.min_revision => Ok(()),
            _ => Err(incompatible(r)),
        },
    }
}
