//! Blob cache
//!
//! Address → bytes map shared by every handle of a store.

use std::collections::{HashMap, VecDeque};

use bytes::Bytes;
use parking_lot::Mutex;

/// Fully materialized blobs keyed by address
///
/// Unbounded by default. With a byte limit, the oldest insertions are evicted
/// first; a single blob larger than the limit is never cached.
pub struct BlobCache {
    inner: Mutex<CacheInner>,
    limit_bytes: Option<usize>,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<String, Bytes>,
    /// Insertion order, oldest first
    order: VecDeque<String>,
    total_bytes: usize,
}

impl BlobCache {
    pub fn new(limit_bytes: Option<usize>) -> Self {
        Self {
            inner: Mutex::new(CacheInner::default()),
            limit_bytes,
        }
    }

    /// Unbounded cache
    pub fn unbounded() -> Self {
        Self::new(None)
    }

    pub fn get(&self, address: &str) -> Option<Bytes> {
        self.inner.lock().entries.get(address).cloned()
    }

    pub fn contains(&self, address: &str) -> bool {
        self.inner.lock().entries.contains_key(address)
    }

    /// Store a blob; replaces any previous value for the address
    pub fn insert(&self, address: impl Into<String>, data: Bytes) {
        let address = address.into();

        if let Some(limit) = self.limit_bytes {
            if data.len() > limit {
                tracing::debug!(
                    "Not caching {} ({} bytes exceeds limit of {})",
                    address,
                    data.len(),
                    limit
                );
                return;
            }
        }

        let mut inner = self.inner.lock();

        match inner.entries.insert(address.clone(), data.clone()) {
            Some(old) => inner.total_bytes -= old.len(),
            None => inner.order.push_back(address),
        }
        inner.total_bytes += data.len();

        if let Some(limit) = self.limit_bytes {
            while inner.total_bytes > limit {
                let Some(oldest) = inner.order.pop_front() else {
                    break;
                };
                if let Some(evicted) = inner.entries.remove(&oldest) {
                    inner.total_bytes -= evicted.len();
                    tracing::trace!("Evicted {} ({} bytes)", oldest, evicted.len());
                }
            }
        }
    }

    /// Number of cached blobs
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes held across all blobs
    pub fn total_bytes(&self) -> usize {
        self.inner.lock().total_bytes
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.order.clear();
        inner.total_bytes = 0;
    }
}

impl Default for BlobCache {
    fn default() -> Self {
        Self::unbounded()
    }
}
