//! Identifier demultiplexer
//!
//! On the global queue, one connection carries messages for many requests.
//! The demux reads frames off the session and routes each one to the mailbox
//! registered for its `Identifier`.
//!
//! ```text
//!               ┌──────────────┐
//!  Session ───▶ │    Demux     │──▶ Mailbox "putdir-1"
//!               │ (Identifier) │──▶ Mailbox "putdir-2"
//!               └──────┬───────┘
//!                      └──▶ unaddressed: returned to the caller pumping
//! ```
//!
//! Payloads are read eagerly so that a frame can be parked in a mailbox
//! without blocking the stream.

use std::collections::HashMap;

use bytes::Bytes;
use crossbeam::channel::{unbounded, Receiver, Sender, TryRecvError};

use crate::error::Result;
use crate::network::Session;
use crate::protocol::{Command, Message};

/// Subscribe this connection to the peer's global queue
pub fn watch_global_command(verbosity: i32) -> Command {
    Command::new("WatchGlobal")
        .field("Global", true)
        .field("Verbosity", verbosity)
        .field("Enabled", true)
}

/// A message together with its payload, if it had one
#[derive(Debug, Clone)]
pub struct Envelope {
    pub message: Message,
    pub payload: Option<Bytes>,
}

/// Receiving end for one identifier
pub struct Mailbox {
    identifier: String,
    rx: Receiver<Envelope>,
}

impl Mailbox {
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Take a parked message without touching the stream
    pub fn try_take(&self) -> Option<Envelope> {
        match self.rx.try_recv() {
            Ok(envelope) => Some(envelope),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }
}

/// Routes messages by identifier
#[derive(Default)]
pub struct Demux {
    routes: HashMap<String, Sender<Envelope>>,
}

impl Demux {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an identifier and get its mailbox
    pub fn register(&mut self, identifier: impl Into<String>) -> Mailbox {
        let identifier = identifier.into();
        let (tx, rx) = unbounded();
        self.routes.insert(identifier.clone(), tx);
        Mailbox { identifier, rx }
    }

    pub fn unregister(&mut self, identifier: &str) {
        self.routes.remove(identifier);
    }

    /// Read one frame and route it
    ///
    /// Returns the message only when it carries no identifier. Frames for
    /// unregistered identifiers are dropped without being interpreted.
    pub fn pump(&mut self, session: &mut Session) -> Result<Option<Envelope>> {
        let raw = session.read_raw_message()?;
        let payload = match session.pending_payload() {
            Some(_) => Some(session.read_payload()?),
            None => None,
        };

        let identifier = match raw.identifier() {
            Some(identifier) => identifier.to_string(),
            None => {
                let message = Message::parse(raw)?;
                return Ok(Some(Envelope { message, payload }));
            }
        };

        match self.routes.get(&identifier) {
            Some(tx) => {
                let envelope = Envelope {
                    message: Message::parse(raw)?,
                    payload,
                };
                if tx.send(envelope).is_err() {
                    tracing::debug!("Mailbox for {} is gone, dropping message", identifier);
                }
            }
            None => tracing::trace!("Dropping {} for unrelated request {}", raw.name, identifier),
        }
        Ok(None)
    }

    /// Next message for `mailbox`, pumping the session as needed
    ///
    /// Unaddressed messages are handed to the caller as well.
    pub fn next_for(&mut self, session: &mut Session, mailbox: &Mailbox) -> Result<Envelope> {
        loop {
            if let Some(envelope) = mailbox.try_take() {
                return Ok(envelope);
            }
            if let Some(envelope) = self.pump(session)? {
                return Ok(envelope);
            }
        }
    }
}
