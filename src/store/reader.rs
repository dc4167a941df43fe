//! Range reader
//!
//! Seek/read handle over one remote blob.
//!
//! ## States
//! ```text
//! Unfetched ──(first read / len)──▶ Fetched (data resident)
//! ```
//! `seek_to` only moves the cursor. The first read fetches the whole blob
//! through the store (cache first); later reads slice the resident buffer.

use std::io::{self, Read, Seek, SeekFrom};

use bytes::Bytes;

use crate::error::Result;

use super::RemoteStore;

/// Read-only handle on one address of a [`RemoteStore`]
pub struct RangeReader {
    store: RemoteStore,
    address: String,
    data: Option<Bytes>,
    cursor: u64,
}

impl RangeReader {
    pub(super) fn new(store: RemoteStore, address: String) -> Self {
        Self {
            store,
            address,
            data: None,
            cursor: 0,
        }
    }

    /// Fetch the blob if this handle has not seen it yet
    fn data(&mut self) -> Result<&Bytes> {
        let data = match self.data.take() {
            Some(data) => data,
            None => self.store.fetch(&self.address)?,
        };
        Ok(self.data.insert(data))
    }

    /// Move the cursor; never does I/O
    pub fn seek_to(&mut self, position: u64) {
        self.cursor = position;
    }

    /// Read up to `len` bytes from the cursor, or everything after it if `None`
    ///
    /// Fetches on first use. Returns an empty buffer at or past the end.
    pub fn read_chunk(&mut self, len: Option<usize>) -> Result<Bytes> {
        let cursor = self.cursor;
        let data = self.data()?;

        let start = usize::try_from(cursor).unwrap_or(usize::MAX).min(data.len());
        let end = match len {
            Some(n) => start.saturating_add(n).min(data.len()),
            None => data.len(),
        };
        let chunk = data.slice(start..end);

        self.cursor = (start + chunk.len()) as u64;
        Ok(chunk)
    }

    /// Total size of the blob (fetches it)
    pub fn len(&mut self) -> Result<u64> {
        Ok(self.data()?.len() as u64)
    }

    pub fn is_empty(&mut self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn position(&self) -> u64 {
        self.cursor
    }

    /// Whether the blob is resident in this handle
    pub fn is_fetched(&self) -> bool {
        self.data.is_some()
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

impl Read for RangeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let chunk = self.read_chunk(Some(buf.len())).map_err(io::Error::other)?;
        buf[..chunk.len()].copy_from_slice(&chunk);
        Ok(chunk.len())
    }
}

impl Seek for RangeReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::Current(delta) => self.cursor.checked_add_signed(delta),
            SeekFrom::End(delta) => {
                let len = self.len().map_err(io::Error::other)?;
                len.checked_add_signed(delta)
            }
        };

        match target {
            Some(position) => {
                self.seek_to(position);
                Ok(position)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek to a negative or overflowing position",
            )),
        }
    }
}
