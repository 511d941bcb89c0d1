//! Per-node socket pool
//!
//! ## Acquire
//! 1. Dead or disposed pool: fail at once, no waiting
//! 2. Take a semaphore permit, waiting up to the queue timeout
//! 3. Re-check liveness (the pool may have died while waiting)
//! 4. Pop an idle socket and reset it, or connect a new one
//!
//! ## Release
//! Every path that took a permit gives it back exactly once, whether the
//! socket is recycled or destroyed. A leaked permit would shrink the pool
//! for good.

use std::net::SocketAddr;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, Once, RwLock};

use super::auth::{authenticate_socket, SaslAuthenticator};
use super::failure::FailurePolicy;
use super::FailureListener;
use crate::collections::{InterlockedStack, Semaphore};
use crate::config::SocketPoolConfig;
use crate::error::{ClusterError, Result};
use crate::network::PooledSocket;

/// State that outlives pool rebuilds: identity, settings, failure tracking
pub(crate) struct NodeShared {
    pub(crate) endpoint: SocketAddr,
    pub(crate) config: SocketPoolConfig,
    failure_policy: Mutex<Box<dyn FailurePolicy>>,
    authenticator: Option<Arc<dyn SaslAuthenticator>>,
    listener: RwLock<Option<FailureListener>>,
}

impl NodeShared {
    pub(crate) fn new(
        endpoint: SocketAddr,
        config: SocketPoolConfig,
        authenticator: Option<Arc<dyn SaslAuthenticator>>,
    ) -> Self {
        let failure_policy = Mutex::new(config.failure_policy.create());
        Self {
            endpoint,
            config,
            failure_policy,
            authenticator,
            listener: RwLock::new(None),
        }
    }

    pub(crate) fn set_listener(&self, listener: Option<FailureListener>) {
        *self.listener.write() = listener;
    }

    /// Connect (and authenticate) a new socket
    pub(crate) fn create_socket(&self) -> Result<PooledSocket> {
        let mut socket = PooledSocket::connect(self.endpoint, &self.config)?;

        if let Some(authenticator) = &self.authenticator {
            if let Err(e) = authenticate_socket(&mut socket, authenticator.as_ref()) {
                tracing::error!("Authentication failed: {}", self.endpoint);
                socket.destroy();
                return Err(e);
            }
        }

        Ok(socket)
    }

    fn should_fail(&self) -> bool {
        self.failure_policy.lock().should_fail()
    }

    fn notify_failed(&self) {
        let listener = self.listener.read().clone();
        if let Some(listener) = listener {
            listener(&self.endpoint);
        }
    }
}

/// Snapshot of a pool's capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub max_size: usize,
    pub in_use: usize,
    pub alive: bool,
}

pub(crate) struct InternalPool {
    shared: Arc<NodeShared>,
    free: InterlockedStack<PooledSocket>,
    semaphore: Semaphore,
    alive: AtomicBool,
    disposed: AtomicBool,
    warm_up: Once,
}

impl InternalPool {
    pub(crate) fn new(shared: Arc<NodeShared>) -> Self {
        let max = shared.config.max_pool_size;
        Self {
            shared,
            free: InterlockedStack::new(),
            semaphore: Semaphore::new(max),
            alive: AtomicBool::new(true),
            disposed: AtomicBool::new(false),
            warm_up: Once::new(),
        }
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub(crate) fn stats(&self) -> PoolStats {
        PoolStats {
            max_size: self.semaphore.max(),
            in_use: self.semaphore.max() - self.semaphore.available(),
            alive: self.is_alive(),
        }
    }

    /// Pre-create `min_pool_size` sockets, once per pool
    pub(crate) fn warm_up(&self) {
        self.warm_up.call_once(|| self.init_pool());
    }

    fn init_pool(&self) {
        let min = self.shared.config.min_pool_size;

        for _ in 0..min {
            match self.shared.create_socket() {
                Ok(socket) => self.free.push(socket),
                Err(e) => {
                    tracing::error!("Could not init pool for {}: {}", self.shared.endpoint, e);
                    self.mark_as_dead();
                    break;
                }
            }
            if !self.is_alive() {
                break;
            }
        }

        tracing::debug!(
            "Pool has been initialized for {} with {} sockets",
            self.shared.endpoint,
            min
        );
    }

    pub(crate) fn acquire(self: &Arc<Self>) -> Result<PooledConnection> {
        let endpoint = self.shared.endpoint;
        tracing::trace!("Acquiring socket from pool {}", endpoint);

        if !self.is_alive() || self.disposed.load(Ordering::Acquire) {
            tracing::debug!("Pool is dead or disposed: {}", endpoint);
            return Err(ClusterError::PoolDead(endpoint.to_string()));
        }

        if !self.semaphore.acquire_timeout(self.shared.config.queue_timeout()) {
            tracing::debug!("Pool is full, timing out: {}", endpoint);
            return Err(ClusterError::PoolTimeout(endpoint.to_string()));
        }

        if !self.is_alive() {
            tracing::debug!("Pool died while waiting: {}", endpoint);
            self.semaphore.release();
            return Err(ClusterError::PoolDead(endpoint.to_string()));
        }

        if let Some(mut socket) = self.free.try_pop() {
            return match socket.reset() {
                Ok(()) => {
                    tracing::trace!("Socket {} was reset", socket.instance_id());
                    Ok(PooledConnection::new(Arc::clone(self), socket))
                }
                Err(e) => {
                    tracing::error!("Failed to reset an acquired socket to {}: {}", endpoint, e);
                    socket.destroy();
                    self.semaphore.release();
                    self.mark_as_dead();
                    Err(e)
                }
            };
        }

        tracing::trace!("No idle socket for {}, creating a new one", endpoint);

        match self.shared.create_socket() {
            Ok(socket) => Ok(PooledConnection::new(Arc::clone(self), socket)),
            Err(e) => {
                tracing::error!("Failed to create socket to {}: {}", endpoint, e);
                self.semaphore.release();
                self.mark_as_dead();
                Err(e)
            }
        }
    }

    /// Report a failure; the node goes down if the failure policy says so
    pub(crate) fn mark_as_dead(&self) {
        tracing::debug!("Mark as dead was requested for {}", self.shared.endpoint);

        let should_fail = self.shared.should_fail();
        tracing::debug!("Failure policy should_fail: {}", should_fail);

        if should_fail && self.alive.swap(false, Ordering::AcqRel) {
            tracing::warn!("Marking node {} as dead", self.shared.endpoint);
            self.shared.notify_failed();
        }
    }

    fn release(&self, socket: PooledSocket) {
        tracing::trace!(
            "Releasing socket {} (pool alive: {})",
            socket.instance_id(),
            self.is_alive()
        );

        if self.is_alive() && !self.disposed.load(Ordering::Acquire) {
            if socket.is_alive() {
                self.free.push(socket);
            } else {
                socket.destroy();
                self.mark_as_dead();
            }
        } else {
            socket.destroy();
        }

        self.semaphore.release();
    }

    fn destroy(&self, socket: PooledSocket) {
        socket.destroy();
        self.semaphore.release();
    }

    pub(crate) fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.alive.store(false, Ordering::Release);

        for socket in self.free.drain() {
            socket.destroy();
        }
    }
}

impl Drop for InternalPool {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// A socket checked out of a node's pool
///
/// Dropping the guard returns the socket to the pool, or destroys it if it
/// was marked dead.
pub struct PooledConnection {
    pool: Arc<InternalPool>,
    socket: Option<PooledSocket>,
}

impl PooledConnection {
    fn new(pool: Arc<InternalPool>, socket: PooledSocket) -> Self {
        Self {
            pool,
            socket: Some(socket),
        }
    }

    /// Close the socket instead of recycling it
    pub fn destroy(mut self) {
        if let Some(socket) = self.socket.take() {
            self.pool.destroy(socket);
        }
    }
}

impl Deref for PooledConnection {
    type Target = PooledSocket;

    fn deref(&self) -> &PooledSocket {
        // only `destroy` and `drop` take the socket, and both consume the guard
        self.socket.as_ref().expect("socket present until the guard is consumed")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut PooledSocket {
        self.socket.as_mut().expect("socket present until the guard is consumed")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(socket) = self.socket.take() {
            self.pool.release(socket);
        }
    }
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("socket", &self.socket)
            .finish()
    }
}
