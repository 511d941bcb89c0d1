//! Pooled Socket
//!
//! One TCP connection to a memcached node, owned by a node's pool.

use std::io::{self, IoSlice, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;

use super::SlidingBuffer;
use crate::config::SocketPoolConfig;
use crate::error::{ClusterError, Result};

/// Size of a single receive
const RECEIVE_CHUNK_SIZE: usize = 16 * 1024;

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

/// A TCP connection checked out to at most one operation at a time
pub struct PooledSocket {
    /// TCP stream (unbuffered; buffering happens in `input`)
    stream: TcpStream,

    /// Remote node address
    endpoint: SocketAddr,

    /// Bytes received but not yet consumed by a response parser
    input: SlidingBuffer,

    /// Scratch space for receives
    chunk: Box<[u8]>,

    /// Cleared on the first I/O error; never set again
    alive: bool,

    /// Process-unique id for logging
    instance_id: u64,

    receive_timeout: Duration,
}

impl PooledSocket {
    /// Open a connection to `endpoint`
    ///
    /// Applies the connect timeout, the receive timeout to both directions,
    /// and disables Nagle's algorithm.
    pub fn connect(endpoint: SocketAddr, config: &SocketPoolConfig) -> Result<Self> {
        let timeout = config.connection_timeout();

        let stream = TcpStream::connect_timeout(&endpoint, timeout).map_err(|e| match e.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => ClusterError::ConnectTimeout {
                endpoint: endpoint.to_string(),
                timeout,
            },
            _ => ClusterError::Io(e),
        })?;

        let receive_timeout = config.receive_timeout();
        if !receive_timeout.is_zero() {
            stream.set_read_timeout(Some(receive_timeout))?;
            stream.set_write_timeout(Some(receive_timeout))?;
        }
        stream.set_nodelay(true)?;

        let instance_id = NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("Socket {} connected to {}", instance_id, endpoint);

        Ok(Self {
            stream,
            endpoint,
            input: SlidingBuffer::new(),
            chunk: vec![0u8; RECEIVE_CHUNK_SIZE].into_boxed_slice(),
            alive: true,
            instance_id,
            receive_timeout,
        })
    }

    pub fn endpoint(&self) -> SocketAddr {
        self.endpoint
    }

    pub fn instance_id(&self) -> u64 {
        self.instance_id
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Flag the socket as unusable; it will be destroyed on release
    pub fn mark_dead(&mut self) {
        if self.alive {
            tracing::debug!("Socket {} to {} marked dead", self.instance_id, self.endpoint);
        }
        self.alive = false;
    }

    pub fn receive_timeout(&self) -> Duration {
        self.receive_timeout
    }

    /// Bytes already buffered and ready to be parsed
    pub fn available(&self) -> usize {
        self.input.available()
    }

    /// Input buffer, for the non-blocking response decoder
    pub fn input_mut(&mut self) -> &mut SlidingBuffer {
        &mut self.input
    }

    /// Write all segments with vectored writes
    pub fn write_segments(&mut self, segments: &[Bytes]) -> Result<()> {
        let mut pending: Vec<&[u8]> = segments
            .iter()
            .map(|s| s.as_ref())
            .filter(|s| !s.is_empty())
            .collect();
        let mut index = 0;

        while index < pending.len() {
            let slices: Vec<IoSlice<'_>> = pending[index..].iter().map(|s| IoSlice::new(s)).collect();

            let mut written = match self.stream.write_vectored(&slices) {
                Ok(0) => {
                    self.mark_dead();
                    return Err(ClusterError::Io(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "connection closed while writing",
                    )));
                }
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.mark_dead();
                    return Err(ClusterError::Io(e));
                }
            };

            while written > 0 {
                let len = pending[index].len();
                if written >= len {
                    written -= len;
                    index += 1;
                } else {
                    pending[index] = &pending[index][written..];
                    written = 0;
                }
            }
        }

        Ok(())
    }

    /// Read exactly `count` bytes, blocking up to the receive timeout per receive
    pub fn read_bytes(&mut self, count: usize) -> Result<Bytes> {
        while self.input.available() < count {
            self.receive()?;
        }
        self.input
            .take(count)
            .ok_or_else(|| ClusterError::Protocol("input buffer underflow".to_string()))
    }

    /// Read a single byte
    pub fn read_byte(&mut self) -> Result<u8> {
        let data = self.read_bytes(1)?;
        Ok(data[0])
    }

    /// Blocking receive of the next chunk into the input buffer
    ///
    /// A timeout or closed connection marks the socket dead.
    pub fn receive(&mut self) -> Result<usize> {
        loop {
            match self.stream.read(&mut self.chunk) {
                Ok(0) => {
                    self.mark_dead();
                    return Err(ClusterError::Io(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("{} closed the connection", self.endpoint),
                    )));
                }
                Ok(n) => {
                    self.input.append(&self.chunk[..n]);
                    return Ok(n);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e)
                    if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) =>
                {
                    self.mark_dead();
                    return Err(ClusterError::ReceiveTimeout(self.endpoint.to_string()));
                }
                Err(e) => {
                    self.mark_dead();
                    return Err(ClusterError::Io(e));
                }
            }
        }
    }

    /// Non-blocking receive; returns 0 when nothing is pending
    pub fn try_receive(&mut self) -> Result<usize> {
        self.stream.set_nonblocking(true)?;
        let outcome = self.stream.read(&mut self.chunk);
        self.stream.set_nonblocking(false)?;

        match outcome {
            Ok(0) => {
                self.mark_dead();
                Err(ClusterError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("{} closed the connection", self.endpoint),
                )))
            }
            Ok(n) => {
                self.input.append(&self.chunk[..n]);
                Ok(n)
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted) => {
                Ok(0)
            }
            Err(e) => {
                self.mark_dead();
                Err(ClusterError::Io(e))
            }
        }
    }

    /// Prepare a recycled socket for the next operation
    ///
    /// Leftover bytes mean a previous response was not fully consumed, which
    /// points at a protocol handling bug. They are discarded and logged.
    pub fn reset(&mut self) -> Result<()> {
        let buffered = self.input.clear();

        let mut residual = Vec::new();
        while self.try_receive()? > 0 {
            let n = self.input.available();
            let mut drained = vec![0u8; n];
            self.input.read(&mut drained);
            residual.extend_from_slice(&drained);
        }

        if buffered > 0 || !residual.is_empty() {
            tracing::warn!(
                "Socket {} to {} had {} unread bytes ({} still on the wire), this is probably a bug: {:?}",
                self.instance_id,
                self.endpoint,
                buffered + residual.len(),
                residual.len(),
                String::from_utf8_lossy(&residual)
            );
        }

        Ok(())
    }

    /// Close the connection
    pub fn destroy(mut self) {
        self.mark_dead();
        let _ = self.stream.shutdown(Shutdown::Both);
        tracing::debug!("Socket {} to {} destroyed", self.instance_id, self.endpoint);
    }
}

impl Read for PooledSocket {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.input.available() == 0 {
            self.receive().map_err(ClusterError::into_io)?;
        }
        Ok(self.input.read(buf))
    }
}

impl Write for PooledSocket {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let result = self.stream.write(buf);
        if result.is_err() {
            self.mark_dead();
        }
        result
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

impl std::fmt::Debug for PooledSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledSocket")
            .field("endpoint", &self.endpoint)
            .field("instance_id", &self.instance_id)
            .field("alive", &self.alive)
            .field("available", &self.input.available())
            .finish()
    }
}
