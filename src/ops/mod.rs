//! Operations Module
//!
//! Put and get state machines built on a [`Session`].
//!
//! ## Responsibilities
//! - Build the command for each operation
//! - Consume messages until a terminal outcome
//! - Report non-terminal messages to an [`Observer`] without changing control flow
//!
//! No operation retries on its own; retry policy belongs to the caller.

pub mod put;
pub mod dir;
pub mod get;
pub mod demux;

pub use put::{build_put_command, put};
pub use dir::{put_dir, DirectoryEntry, DirectoryInsert};
pub use get::{build_get_command, get, REDIRECT_CODES};
pub use demux::{watch_global_command, Demux, Envelope, Mailbox};

use crate::config::{Config, Priority};
use crate::error::Result;
use crate::network::Session;
use crate::protocol::{Message, MessageName, Progress};

/// Verbosity mask asking the peer for every notification
pub const VERBOSITY_ALL: i32 = -1;

/// Verbosity mask asking only for SimpleProgress
pub const VERBOSITY_PROGRESS: i32 = 1;

// =============================================================================
// Events
// =============================================================================

/// Observational event raised while an operation runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// SimpleProgress counters
    Progress { identifier: String, progress: Progress },

    /// A get is being retried against a new address
    Redirect { from: String, to: String },

    /// A known, non-terminal notification
    Info { identifier: String, name: MessageName },

    /// A message name this client does not know
    Unrecognized { identifier: String, name: String },
}

/// Receives operation events
pub trait Observer {
    fn on_event(&mut self, event: &Event);
}

impl<F: FnMut(&Event)> Observer for F {
    fn on_event(&mut self, event: &Event) {
        self(event)
    }
}

/// Observer that forwards events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl Observer for LogObserver {
    fn on_event(&mut self, event: &Event) {
        match event {
            Event::Progress {
                identifier,
                progress,
            } => tracing::info!(
                "{}: {}/{} blocks ({} total, {} fatally failed{})",
                identifier,
                progress.succeeded,
                progress.required,
                progress.total,
                progress.fatally_failed,
                if progress.finalized { ", finalized" } else { "" }
            ),
            Event::Redirect { from, to } => tracing::info!("Redirected from {} to {}", from, to),
            Event::Info { identifier, name } => tracing::debug!("{}: {}", identifier, name),
            Event::Unrecognized { identifier, name } => {
                tracing::warn!("{}: ignoring unknown message {}", identifier, name)
            }
        }
    }
}

/// Report a message the current loop does not act on
///
/// Drains any payload it carries so the stream stays aligned.
pub(crate) fn tolerate(
    session: &mut Session,
    identifier: &str,
    message: Message,
    observer: &mut dyn Observer,
) -> Result<()> {
    session.skip_payload()?;
    observer.on_event(&unhandled_event(identifier, message));
    Ok(())
}

/// Event for a message an operation loop passes over
pub(crate) fn unhandled_event(identifier: &str, message: Message) -> Event {
    let identifier = identifier.to_string();
    match message {
        Message::Unknown(raw) => Event::Unrecognized {
            identifier,
            name: raw.name,
        },
        other => Event::Info {
            identifier,
            name: other.name(),
        },
    }
}

// =============================================================================
// Options
// =============================================================================

/// Where an insert lands
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum InsertTarget {
    /// Content-hash key chosen by the peer (`CHK@`)
    #[default]
    Auto,

    /// Caller-chosen insert URI (SSK@, USK@, KSK@, ...)
    Uri(String),
}

impl InsertTarget {
    pub fn as_uri(&self) -> &str {
        match self {
            InsertTarget::Auto => "CHK@",
            InsertTarget::Uri(uri) => uri,
        }
    }
}

/// Lifetime of a request on the peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Persistence {
    /// Dropped when the connection closes
    #[default]
    Connection,
    /// Survives until the peer restarts
    Reboot,
    /// Survives peer restarts
    Forever,
}

impl Persistence {
    pub fn as_str(self) -> &'static str {
        match self {
            Persistence::Connection => "connection",
            Persistence::Reboot => "reboot",
            Persistence::Forever => "forever",
        }
    }
}

/// Options for a single-blob put
#[derive(Debug, Clone)]
pub struct PutOptions {
    pub target: InsertTarget,
    pub content_type: String,
    pub priority: Priority,
    pub max_retries: i32,
    pub dont_compress: bool,
    pub verbosity: i32,
}

impl Default for PutOptions {
    fn default() -> Self {
        Self {
            target: InsertTarget::Auto,
            content_type: "application/octet-stream".to_string(),
            priority: Priority::Interactive,
            max_retries: 5,
            dont_compress: false,
            verbosity: VERBOSITY_ALL,
        }
    }
}

impl PutOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            priority: config.priority,
            max_retries: config.max_retries,
            ..Self::default()
        }
    }
}

/// Options for a directory put
#[derive(Debug, Clone)]
pub struct DirPutOptions {
    pub target: InsertTarget,
    /// Caller-chosen identifier; generated when `None`
    pub identifier: Option<String>,
    pub priority: Priority,
    pub max_retries: i32,
    pub dont_compress: bool,
    pub verbosity: i32,
    /// Place the request on the global queue
    pub global: bool,
    pub persistence: Persistence,
}

impl Default for DirPutOptions {
    fn default() -> Self {
        Self {
            target: InsertTarget::Auto,
            identifier: None,
            priority: Priority::Interactive,
            max_retries: 5,
            dont_compress: true,
            verbosity: VERBOSITY_ALL,
            global: false,
            persistence: Persistence::Connection,
        }
    }
}

impl DirPutOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            priority: config.priority,
            max_retries: config.max_retries,
            ..Self::default()
        }
    }

    /// Global or persistent requests share the peer's queue with other clients
    pub fn uses_global_queue(&self) -> bool {
        self.global || self.persistence != Persistence::Connection
    }
}

/// Options for a get
#[derive(Debug, Clone)]
pub struct GetOptions {
    pub priority: Priority,
    pub max_retries: i32,
    pub verbosity: i32,
    /// Redirects followed before failing with `RedirectLoopExceeded`
    pub max_redirects: usize,
}

impl Default for GetOptions {
    fn default() -> Self {
        Self {
            priority: Priority::Interactive,
            max_retries: 5,
            verbosity: VERBOSITY_PROGRESS,
            max_redirects: 10,
        }
    }
}

impl GetOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            priority: config.priority,
            max_retries: config.max_retries,
            max_redirects: config.max_redirects,
            ..Self::default()
        }
    }
}
