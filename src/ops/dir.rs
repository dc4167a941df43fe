//! Directory put
//!
//! `ClientPutComplexDir` inserting several files under one URI.
//!
//! ## Payload Layout
//! ```text
//! Files.0.DataLength=5      ┌───────┬─────────┬─────┐
//! Files.1.DataLength=7  ──▶ │ hello │ <html/> │ ... │
//! ...                       └───────┴─────────┴─────┘
//! ```
//! The peer splits the payload purely by the declared lengths, so field
//! index order and concatenation order are the same list.

use std::fs;
use std::path::Path;

use bytes::{Bytes, BytesMut};

use crate::error::{FcpError, Result};
use crate::network::Session;
use crate::protocol::{generate_identifier, Command, Message};

use super::{unhandled_event, watch_global_command, Demux, DirPutOptions, Event, Observer};

/// Content type given to files picked up by [`DirectoryInsert::from_dir`]
pub const DEFAULT_FILE_CONTENT_TYPE: &str = "text/plain";

/// One file of a directory insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Path inside the inserted site
    pub name: String,
    pub data: Bytes,
    pub content_type: String,
}

/// Ordered set of files plus an optional default entry
#[derive(Debug, Clone, Default)]
pub struct DirectoryInsert {
    entries: Vec<DirectoryEntry>,
    default_name: Option<String>,
}

impl DirectoryInsert {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a file
    pub fn add(
        &mut self,
        name: impl Into<String>,
        data: impl Into<Bytes>,
        content_type: impl Into<String>,
    ) -> &mut Self {
        self.entries.push(DirectoryEntry {
            name: name.into(),
            data: data.into(),
            content_type: content_type.into(),
        });
        self
    }

    /// Append a file and make it the site's `DefaultName`
    pub fn with_default(
        &mut self,
        name: impl Into<String>,
        data: impl Into<Bytes>,
        content_type: impl Into<String>,
    ) -> &mut Self {
        let name = name.into();
        self.default_name = Some(name.clone());
        self.add(name, data, content_type)
    }

    /// Collect every file under `root`, named `{prefix}{relative path}`
    ///
    /// Files are visited in sorted order. `hgrc` (may hold private
    /// configuration), `wlock` and any name ending in `lock` are skipped.
    pub fn from_dir(root: &Path, prefix: &str) -> Result<Self> {
        let mut insert = Self::new();
        insert.collect(root, prefix)?;
        tracing::debug!(
            "Collected {} files ({} bytes) from {}",
            insert.len(),
            insert.total_len(),
            root.display()
        );
        Ok(insert)
    }

    fn collect(&mut self, dir: &Path, prefix: &str) -> Result<()> {
        let mut children: Vec<_> = fs::read_dir(dir)?.collect::<std::io::Result<_>>()?;
        children.sort_by_key(|entry| entry.file_name());

        for child in children {
            let file_name = child.file_name();
            let name = file_name.to_string_lossy();
            let path = child.path();

            if path.is_dir() {
                self.collect(&path, &format!("{}{}/", prefix, name))?;
            } else if is_private_or_volatile(&name) {
                tracing::trace!("Skipping {}", path.display());
            } else {
                let data = fs::read(&path)?;
                self.add(format!("{}{}", prefix, name), data, DEFAULT_FILE_CONTENT_TYPE);
            }
        }
        Ok(())
    }

    pub fn entries(&self) -> &[DirectoryEntry] {
        &self.entries
    }

    pub fn default_name(&self) -> Option<&str> {
        self.default_name.as_deref()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all entry sizes
    pub fn total_len(&self) -> usize {
        self.entries.iter().map(|e| e.data.len()).sum()
    }

    /// All entry data concatenated in entry order
    pub fn payload(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.total_len());
        for entry in &self.entries {
            buf.extend_from_slice(&entry.data);
        }
        buf.freeze()
    }

    /// Build the ClientPutComplexDir command with its payload attached
    pub fn build_command(&self, identifier: &str, options: &DirPutOptions) -> Command {
        let mut command = Command::new("ClientPutComplexDir")
            .with_identifier(identifier)
            .field("URI", options.target.as_uri())
            .field("Verbosity", options.verbosity)
            .field("MaxRetries", options.max_retries)
            .field("DontCompress", options.dont_compress)
            .field("PriorityClass", options.priority.class());

        if options.uses_global_queue() {
            command.set("Global", options.global);
            command.set("Persistence", options.persistence.as_str());
        }

        for (i, entry) in self.entries.iter().enumerate() {
            command.set(format!("Files.{}.Name", i), &entry.name);
            command.set(format!("Files.{}.UploadFrom", i), "direct");
            command.set(format!("Files.{}.Metadata.ContentType", i), &entry.content_type);
            command.set(format!("Files.{}.DataLength", i), entry.data.len());
        }

        if let Some(default_name) = &self.default_name {
            command.set("DefaultName", default_name);
        }

        command.with_payload(self.payload())
    }
}

fn is_private_or_volatile(name: &str) -> bool {
    name == "hgrc" || name == "wlock" || name.ends_with("lock")
}

/// Insert a directory and return the resulting URI
///
/// When the request goes on the global queue, the connection is subscribed
/// with WatchGlobal first and messages are filtered by identifier. Unknown
/// messages are reported and skipped.
pub fn put_dir(
    session: &mut Session,
    insert: &DirectoryInsert,
    options: &DirPutOptions,
    observer: &mut dyn Observer,
) -> Result<String> {
    if insert.is_empty() {
        return Err(FcpError::Config(
            "Directory insert has no entries".to_string(),
        ));
    }

    let identifier = options
        .identifier
        .clone()
        .unwrap_or_else(|| generate_identifier("putdir"));
    let command = insert.build_command(&identifier, options);

    if options.uses_global_queue() {
        session.send_command(&watch_global_command(options.verbosity))?;
    }

    let mut demux = Demux::new();
    let mailbox = demux.register(identifier.as_str());

    tracing::info!(
        "Inserting {} files ({} bytes) at {} as {}",
        insert.len(),
        insert.total_len(),
        options.target.as_uri(),
        identifier
    );
    session.send_command(&command)?;

    loop {
        let envelope = demux.next_for(session, &mailbox)?;
        match envelope.message {
            Message::PutSuccessful { uri, .. } => {
                tracing::info!("{}: directory inserted at {}", identifier, uri);
                return Ok(uri);
            }
            Message::SimpleProgress { progress, .. } => observer.on_event(&Event::Progress {
                identifier: identifier.clone(),
                progress,
            }),
            Message::ProtocolError {
                identifier: id,
                failure,
            } => return Err(failure.into_protocol_error(id)),
            Message::IdentifierCollision { .. } => {
                tracing::warn!("{}: identifier already in use on the peer", identifier);
                return Err(FcpError::IdentifierCollision(identifier));
            }
            Message::PutFailed { failure, .. } => {
                tracing::warn!("{}: directory put failed unexpectedly: {:?}", identifier, failure);
                return Err(failure.into_operation_error("ClientPutComplexDir"));
            }
            other => {
                let event = unhandled_event(&identifier, other);
                if let Event::Unrecognized { name, .. } = &event {
                    tracing::warn!("{}: unrecognized message {}", identifier, name);
                }
                observer.on_event(&event);
            }
        }
    }
}
