//! Store Module
//!
//! Read-only, lazily populated view of a remote blob hierarchy.
//!
//! ## Responsibilities
//! - Resolve relative paths to addresses (`base + path`)
//! - Fetch each address at most once per store (shared cache)
//! - Hand out seek/read handles for layering a structured store on top
//!
//! Directory semantics are not provided; this layer maps names to addresses
//! and addresses to bytes.
//!
//! ```text
//! RangeReader ──read──▶ RemoteStore ──miss──▶ Node::get (redirects followed)
//!                            │
//!                            └──hit──▶ BlobCache
//! ```

mod cache;
mod reader;
mod scheme;

pub use cache::BlobCache;
pub use reader::RangeReader;
pub use scheme::{register_scheme, SchemeHandle};

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::config::Config;
use crate::error::Result;
use crate::node::Node;
use crate::ops::{GetOptions, LogObserver};

/// Cloneable handle to a remote hierarchy rooted at a base address
#[derive(Clone)]
pub struct RemoteStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    /// Serializes all traffic on the single connection
    node: Mutex<Node>,
    cache: BlobCache,
    base: String,
    options: GetOptions,
}

impl RemoteStore {
    /// Wrap a connected node; `base` is prepended verbatim to every path
    pub fn new(node: Node, base: impl Into<String>) -> Self {
        let options = node.get_options();
        let cache = BlobCache::new(node.config().cache_limit_bytes);
        Self {
            inner: Arc::new(StoreInner {
                node: Mutex::new(node),
                cache,
                base: base.into(),
                options,
            }),
        }
    }

    /// Connect to the configured peer and root the store at `base`
    pub fn connect(config: Config, base: impl Into<String>) -> Result<Self> {
        let node = Node::connect(config)?;
        Ok(Self::new(node, base))
    }

    pub fn base(&self) -> &str {
        &self.inner.base
    }

    /// Address of a path relative to the base
    pub fn address_of(&self, path: &str) -> String {
        format!("{}{}", self.inner.base, path)
    }

    /// Open a handle on a relative path; does no I/O
    pub fn open(&self, path: &str) -> RangeReader {
        RangeReader::new(self.clone(), self.address_of(path))
    }

    /// Bytes at `address`, fetched on first request only
    pub fn fetch(&self, address: &str) -> Result<Bytes> {
        if let Some(data) = self.inner.cache.get(address) {
            tracing::trace!("Cache hit for {}", address);
            return Ok(data);
        }

        let mut node = self.inner.node.lock();

        // Another handle may have fetched it while we waited for the lock
        if let Some(data) = self.inner.cache.get(address) {
            return Ok(data);
        }

        tracing::debug!("Cache miss for {}, fetching", address);
        let data = node.get_with(address, &self.inner.options, &mut LogObserver)?;
        self.inner.cache.insert(address, data.clone());
        Ok(data)
    }

    pub fn cache(&self) -> &BlobCache {
        &self.inner.cache
    }
}
