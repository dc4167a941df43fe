//! Node Module
//!
//! Client facade that owns one session and runs operations on it.
//!
//! ## Responsibilities
//! - Connect and handshake from a [`Config`]
//! - Derive per-operation options from configured defaults
//! - Run put, directory put and get one at a time

use bytes::Bytes;

use crate::config::Config;
use crate::error::Result;
use crate::network::Session;
use crate::ops::{
    self, DirPutOptions, DirectoryInsert, GetOptions, LogObserver, Observer, PutOptions,
};

/// A connected FCP client
///
/// ## Concurrency
/// Every method takes `&mut self`: the wire protocol has no in-band support
/// for overlapping requests on one connection, so callers sharing a node
/// must put it behind a mutex.
pub struct Node {
    session: Session,
    config: Config,
}

impl Node {
    /// Connect and handshake with the configured peer
    pub fn connect(config: Config) -> Result<Self> {
        let session = Session::connect(&config)?;
        Ok(Self::from_session(session, config))
    }

    /// Wrap an already handshaken session
    pub fn from_session(session: Session, config: Config) -> Self {
        Self { session, config }
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Insert one blob
    pub fn put(
        &mut self,
        data: impl Into<Bytes>,
        options: &PutOptions,
        observer: &mut dyn Observer,
    ) -> Result<String> {
        ops::put(&mut self.session, data, options, observer)
    }

    /// Insert one blob at a peer-chosen address with default options
    pub fn put_bytes(&mut self, data: impl Into<Bytes>, content_type: &str) -> Result<String> {
        let options = PutOptions {
            content_type: content_type.to_string(),
            ..self.put_options()
        };
        self.put(data, &options, &mut LogObserver)
    }

    /// Insert a directory
    pub fn put_dir(
        &mut self,
        insert: &DirectoryInsert,
        options: &DirPutOptions,
        observer: &mut dyn Observer,
    ) -> Result<String> {
        ops::put_dir(&mut self.session, insert, options, observer)
    }

    /// Fetch the data at `uri`
    pub fn get_with(
        &mut self,
        uri: &str,
        options: &GetOptions,
        observer: &mut dyn Observer,
    ) -> Result<Bytes> {
        ops::get(&mut self.session, uri, options, observer)
    }

    /// Fetch the data at `uri` with default options
    pub fn get(&mut self, uri: &str) -> Result<Bytes> {
        let options = self.get_options();
        self.get_with(uri, &options, &mut LogObserver)
    }

    // =========================================================================
    // Defaults
    // =========================================================================

    pub fn put_options(&self) -> PutOptions {
        PutOptions::from_config(&self.config)
    }

    pub fn dir_put_options(&self) -> DirPutOptions {
        DirPutOptions::from_config(&self.config)
    }

    pub fn get_options(&self) -> GetOptions {
        GetOptions::from_config(&self.config)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Close the connection
    pub fn shutdown(self) {
        self.session.shutdown();
    }
}
