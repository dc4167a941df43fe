//! Transport
//!
//! Owns the single stream to the peer and provides line-oriented reads plus
//! byte-exact reads and writes of binary spans.

use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};

use crate::config::Endpoint;
use crate::error::{FcpError, Result};

/// Which way a traced span travelled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outbound,
    Inbound,
}

/// Diagnostic mirror of everything crossing the transport
///
/// Sinks observe only; they cannot alter what is sent or received.
pub trait TraceSink: Send {
    /// A protocol line, without its line terminator
    fn line(&mut self, direction: Direction, line: &str);

    /// A binary span of `len` bytes
    fn payload(&mut self, direction: Direction, len: usize);
}

/// Default sink: `trace!` events under the `fcpstore::wire` target
pub struct TracingSink {
    peer: String,
}

impl TracingSink {
    pub fn new(peer: impl Into<String>) -> Self {
        Self { peer: peer.into() }
    }
}

impl TraceSink for TracingSink {
    fn line(&mut self, direction: Direction, line: &str) {
        tracing::trace!(target: "fcpstore::wire", peer = %self.peer, ?direction, "{}", line);
    }

    fn payload(&mut self, direction: Direction, len: usize) {
        tracing::trace!(target: "fcpstore::wire", peer = %self.peer, ?direction, "<{} bytes>", len);
    }
}

/// Blocking connection to one peer
pub struct Transport {
    /// Read half (buffered for line splitting)
    reader: BufReader<Box<dyn Read + Send>>,

    /// Write half (buffered, flushed once per frame)
    writer: BufWriter<Box<dyn Write + Send>>,

    /// Socket handle kept for shutdown; `None` for in-memory streams
    socket: Option<TcpStream>,

    /// Peer address for logging
    peer: String,

    trace: Box<dyn TraceSink>,
}

impl Transport {
    /// Connect to the endpoint and apply its timeout to every socket operation
    pub fn connect(endpoint: &Endpoint) -> Result<Self> {
        let addr = endpoint.addr();
        let connect_err = |source| FcpError::Connect {
            addr: addr.clone(),
            source,
        };

        let mut last_err = None;
        let mut connected = None;
        for socket_addr in addr.to_socket_addrs().map_err(connect_err)? {
            let attempt = if endpoint.timeout.is_zero() {
                TcpStream::connect(socket_addr)
            } else {
                TcpStream::connect_timeout(&socket_addr, endpoint.timeout)
            };
            match attempt {
                Ok(stream) => {
                    connected = Some(stream);
                    break;
                }
                Err(e) => {
                    tracing::debug!("Connect to {} failed: {}", socket_addr, e);
                    last_err = Some(e);
                }
            }
        }

        let stream = match connected {
            Some(stream) => stream,
            None => {
                return Err(connect_err(last_err.unwrap_or_else(|| {
                    std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        "no addresses resolved",
                    )
                })))
            }
        };

        if !endpoint.timeout.is_zero() {
            stream.set_read_timeout(Some(endpoint.timeout))?;
            stream.set_write_timeout(Some(endpoint.timeout))?;
        }

        // Disable Nagle's algorithm
        stream.set_nodelay(true)?;

        let read_stream = stream.try_clone()?;
        let write_stream = stream.try_clone()?;

        tracing::debug!("Connected to {}", addr);

        let mut transport = Self::from_streams(Box::new(read_stream), Box::new(write_stream), addr);
        transport.socket = Some(stream);
        Ok(transport)
    }

    /// Build a transport over arbitrary streams
    pub fn from_streams(
        reader: Box<dyn Read + Send>,
        writer: Box<dyn Write + Send>,
        peer: impl Into<String>,
    ) -> Self {
        let peer = peer.into();
        Self {
            reader: BufReader::new(reader),
            writer: BufWriter::new(writer),
            socket: None,
            trace: Box::new(TracingSink::new(peer.clone())),
            peer,
        }
    }

    /// Replace the trace sink
    pub fn set_trace_sink(&mut self, sink: Box<dyn TraceSink>) {
        self.trace = sink;
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Read up to the next `\n`, which is not included
    ///
    /// A trailing `\r` is dropped as well. The stream closing mid-line fails
    /// with `ConnectionClosed`.
    pub fn read_line(&mut self) -> Result<String> {
        let mut buf = Vec::new();
        let n = self
            .reader
            .read_until(b'\n', &mut buf)
            .map_err(FcpError::from_io)?;

        if n == 0 || buf.last() != Some(&b'\n') {
            return Err(FcpError::ConnectionClosed);
        }
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }

        let line = String::from_utf8(buf)
            .map_err(|_| FcpError::Decode("Line is not valid UTF-8".to_string()))?;
        self.trace.line(Direction::Inbound, &line);
        Ok(line)
    }

    /// Read exactly `len` bytes
    pub fn read_exact(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.reader.read_exact(&mut buf).map_err(FcpError::from_io)?;
        self.trace.payload(Direction::Inbound, len);
        Ok(buf)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Write a line followed by `\n`
    pub fn write_line(&mut self, line: &str) -> Result<()> {
        self.writer
            .write_all(line.as_bytes())
            .and_then(|_| self.writer.write_all(b"\n"))
            .map_err(FcpError::from_io)?;
        self.trace.line(Direction::Outbound, line);
        Ok(())
    }

    /// Write a raw binary span
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.write_all(bytes).map_err(FcpError::from_io)?;
        self.trace.payload(Direction::Outbound, bytes.len());
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush().map_err(FcpError::from_io)
    }

    /// Close the socket, aborting any blocked read on it
    pub fn shutdown(&mut self) {
        let _ = self.writer.flush();
        if let Some(socket) = self.socket.take() {
            if let Err(e) = socket.shutdown(Shutdown::Both) {
                tracing::debug!("Shutdown of {} failed: {}", self.peer, e);
            }
        }
    }

    /// Get the peer address string
    pub fn peer(&self) -> &str {
        &self.peer
    }
}
