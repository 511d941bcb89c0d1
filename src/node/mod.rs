//! Node Module
//!
//! One memcached server: its address, its socket pool and its health.
//!
//! ## Responsibilities
//! - Check sockets out of the pool and run operations on them
//! - Count I/O failures through the configured failure policy and report the
//!   node as failed to whoever registered a `FailureListener`
//! - Bring a dead node back with `ping`, which swaps in a brand new pool
//!   rather than repairing the old one

mod auth;
mod failure;
mod pool;

pub use auth::{PlainTextAuthenticator, SaslAuthenticator};
pub use failure::{FailImmediately, FailurePolicy, ThrottlingFailurePolicy};
pub use pool::{PoolStats, PooledConnection};

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;

use crate::collections::AtomicArc;
use crate::config::SocketPoolConfig;
use crate::error::{ClusterError, Result};
use crate::network::PooledSocket;
use crate::protocol::{Operation, OperationResult, ResponseDecoder, ResponseStep, StreamingOperation};
use pool::{InternalPool, NodeShared};

/// Called with the node's endpoint when the node goes down
pub type FailureListener = Arc<dyn Fn(&SocketAddr) + Send + Sync>;

/// How `execute_async` finished its synchronous part
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsyncStatus {
    /// The response was already buffered; the continuation has run
    Completed,
    /// A reader thread owns the socket and will run the continuation
    Pending,
    /// The request could not be sent; the continuation has run with the failure
    Failed,
}

/// A memcached server and its socket pool
pub struct Node {
    shared: Arc<NodeShared>,
    pool: AtomicArc<InternalPool>,
    ping_lock: Mutex<()>,
    disposed: AtomicBool,
}

impl Node {
    pub fn new(endpoint: SocketAddr, config: SocketPoolConfig) -> Self {
        Self::with_authenticator(endpoint, config, None)
    }

    pub fn with_authenticator(
        endpoint: SocketAddr,
        config: SocketPoolConfig,
        authenticator: Option<Arc<dyn SaslAuthenticator>>,
    ) -> Self {
        let shared = Arc::new(NodeShared::new(endpoint, config, authenticator));
        let pool = AtomicArc::new(Arc::new(InternalPool::new(Arc::clone(&shared))));

        Self {
            shared,
            pool,
            ping_lock: Mutex::new(()),
            disposed: AtomicBool::new(false),
        }
    }

    /// Register the observer notified when this node goes down
    pub fn set_failure_listener(&self, listener: FailureListener) {
        self.shared.set_listener(Some(listener));
    }

    pub fn clear_failure_listener(&self) {
        self.shared.set_listener(None);
    }

    pub fn endpoint(&self) -> SocketAddr {
        self.shared.endpoint
    }

    pub fn config(&self) -> &SocketPoolConfig {
        &self.shared.config
    }

    pub fn is_alive(&self) -> bool {
        self.pool.load().is_alive()
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.load().stats()
    }

    /// Probe a dead node with a real connect
    ///
    /// On success the dead pool is replaced by a fresh one, so in-flight
    /// acquires on the old pool never race with a repair.
    pub fn ping(&self) -> bool {
        if self.is_alive() {
            return true;
        }

        let _guard = self.ping_lock.lock();
        if self.disposed.load(Ordering::Acquire) {
            return false;
        }

        match PooledSocket::connect(self.shared.endpoint, &self.shared.config) {
            Ok(probe) => probe.destroy(),
            Err(e) => {
                tracing::debug!("Ping of {} failed: {}", self.shared.endpoint, e);
                return false;
            }
        }

        // another ping may have won while we were connecting
        if self.is_alive() {
            return true;
        }

        let fresh = Arc::new(InternalPool::new(Arc::clone(&self.shared)));
        let old = self.pool.swap(fresh);
        old.dispose();

        tracing::info!("Node {} is back online", self.shared.endpoint);
        true
    }

    /// Check a socket out of the pool
    pub fn acquire(&self) -> Result<PooledConnection> {
        let pool = self.pool.load();
        pool.warm_up();
        pool.acquire()
    }

    /// Run an operation on one socket and return its outcome
    ///
    /// Transport and protocol failures mark the socket dead, which feeds the
    /// failure policy when the socket is released. Other errors leave the
    /// socket in the pool.
    pub fn execute(&self, operation: &mut dyn Operation) -> OperationResult {
        let mut connection = match self.acquire() {
            Ok(connection) => connection,
            Err(e) => {
                return OperationResult::fail(format!("Failed to obtain socket from pool: {}", e))
                    .with_inner(OperationResult::fail(e.to_string()))
            }
        };

        let request = operation.build_request();
        let outcome = connection
            .write_segments(&request)
            .and_then(|_| operation.read_response(&mut *connection));

        match outcome {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("Exception reading response from {}: {}", self.shared.endpoint, e);
                discard_if_broken(&mut connection, &e);
                OperationResult::fail(format!("Exception reading response: {}", e))
            }
        }
    }

    /// Run an operation without blocking on the response when possible
    ///
    /// Whatever is already buffered is decoded right away; if that is not
    /// enough, the socket moves to a reader thread that blocks (bounded by the
    /// receive timeout) and runs `next` when done. `next` runs exactly once,
    /// unless the reader thread cannot be spawned.
    pub fn execute_async<O, F>(&self, mut operation: O, next: F) -> AsyncStatus
    where
        O: Operation + 'static,
        F: FnOnce(O, OperationResult) + Send + 'static,
    {
        let mut connection = match self.acquire() {
            Ok(connection) => connection,
            Err(e) => {
                next(
                    operation,
                    OperationResult::fail(format!("Failed to obtain socket from pool: {}", e)),
                );
                return AsyncStatus::Failed;
            }
        };

        if let Err(e) = connection.write_segments(&operation.build_request()) {
            tracing::error!("Failed to send request to {}: {}", self.shared.endpoint, e);
            discard_if_broken(&mut connection, &e);
            drop(connection);
            next(operation, OperationResult::fail(format!("Failed to send request: {}", e)));
            return AsyncStatus::Failed;
        }

        let mut decoder = ResponseDecoder::new();

        if let Some(streaming) = operation.as_streaming() {
            let buffered = connection
                .try_receive()
                .and_then(|_| decode_buffered(&mut connection, &mut decoder, streaming));

            match buffered {
                Ok(Some(result)) => {
                    drop(connection);
                    next(operation, result);
                    return AsyncStatus::Completed;
                }
                Ok(None) => {}
                Err(e) => {
                    discard_if_broken(&mut connection, &e);
                    drop(connection);
                    next(operation, OperationResult::fail(format!("Exception reading response: {}", e)));
                    return AsyncStatus::Failed;
                }
            }
        }

        let endpoint = self.shared.endpoint;
        let spawned = thread::Builder::new()
            .name(format!("memcluster-read-{}", endpoint))
            .spawn(move || {
                let outcome = finish_blocking(&mut connection, &mut decoder, &mut operation);
                let result = match outcome {
                    Ok(result) => result,
                    Err(e) => {
                        tracing::debug!("Pending read on {} failed: {}", endpoint, e);
                        discard_if_broken(&mut connection, &e);
                        OperationResult::fail(format!("Exception reading response: {}", e))
                    }
                };
                drop(connection);
                next(operation, result);
            });

        match spawned {
            Ok(_) => AsyncStatus::Pending,
            Err(e) => {
                // the closure, and with it the continuation, is gone
                tracing::error!("Could not spawn reader thread for {}: {}", endpoint, e);
                AsyncStatus::Failed
            }
        }
    }

    /// Close every socket; the node cannot be used afterwards
    pub fn dispose(&self) {
        let _guard = self.ping_lock.lock();
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shared.set_listener(None);
        self.pool.load().dispose();
        tracing::debug!("Node {} disposed", self.shared.endpoint);
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("endpoint", &self.shared.endpoint)
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// Feed every complete buffered response to the operation
///
/// `Ok(None)` means the operation needs more bytes.
fn decode_buffered(
    socket: &mut PooledSocket,
    decoder: &mut ResponseDecoder,
    operation: &mut dyn StreamingOperation,
) -> Result<Option<OperationResult>> {
    while let Some(response) = decoder.poll(socket.input_mut())? {
        if let ResponseStep::Done(result) = operation.on_response(response) {
            return Ok(Some(result));
        }
    }
    Ok(None)
}

/// Mark the socket dead when `error` leaves its stream position unknown
fn discard_if_broken(socket: &mut PooledSocket, error: &ClusterError) {
    if error.is_fatal_to_connection() {
        socket.mark_dead();
    } else {
        tracing::debug!("Socket to {} kept after: {}", socket.endpoint(), error);
    }
}

/// Blocking completion on the reader thread
fn finish_blocking<O: Operation>(
    socket: &mut PooledSocket,
    decoder: &mut ResponseDecoder,
    operation: &mut O,
) -> Result<OperationResult> {
    loop {
        let streaming = match operation.as_streaming() {
            Some(streaming) => streaming,
            None => return operation.read_response(socket),
        };
        if let Some(result) = decode_buffered(socket, decoder, streaming)? {
            return Ok(result);
        }
        socket.receive()?;
    }
}
