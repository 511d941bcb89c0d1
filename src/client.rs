//! Client Module
//!
//! `ClusterClient` ties the server pool, the discovery node and the
//! configuration poller together and runs single-key and multi-key operations
//! against whichever node owns the key.
//!
//! ## Responsibilities
//! - Build the initial topology, either from auto discovery or from a static
//!   server list
//! - Validate keys before anything touches the network
//! - Turn "no node available" into a failed `OperationResult`, never a panic
//!   or an `Err`

use std::collections::HashMap;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;

use bytes::Bytes;
use crossbeam::channel;
use parking_lot::Mutex;

use crate::cluster::{
    ConfigurationPoller, DiscoveryNode, DnsResolver, EndpointResolver, NodeFailedListener, ServerPool,
};
use crate::config::ClientConfig;
use crate::error::{ClusterError, Result};
use crate::item::{CacheItem, ConcatMode, MutationMode, StoreMode};
use crate::node::{Node, PlainTextAuthenticator, SaslAuthenticator};
use crate::protocol::{
    ConcatOperation, DeleteOperation, FlushOperation, GetOperation, MultiGetOperation, MutatorOperation,
    OperationResult, StatsOperation, StoreOperation, ValueResult,
};

/// Longest key the binary protocol accepts
pub const MAX_KEY_LENGTH: usize = 250;

/// Memcached cluster client
pub struct ClusterClient {
    pool: ServerPool,

    /// Present when the client was built with auto discovery
    discovery: Option<Arc<DiscoveryNode>>,

    poller: Mutex<Option<ConfigurationPoller>>,
}

impl ClusterClient {
    /// Build a client from its configuration
    ///
    /// With auto discovery the configuration endpoint is resolved, the pool
    /// starts out with that single node, and the first poll runs before this
    /// returns. Without it, every static server is resolved up front.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::with_resolver(config, Arc::new(DnsResolver))
    }

    /// Like `new`, with a custom hostname resolver
    pub fn with_resolver(config: ClientConfig, resolver: Arc<dyn EndpointResolver>) -> Result<Self> {
        config.validate()?;

        let authenticator = config
            .authentication
            .as_ref()
            .map(|auth| Arc::new(PlainTextAuthenticator::from_config(auth)) as Arc<dyn SaslAuthenticator>);

        let pool = ServerPool::with_authenticator(&config, authenticator.clone())?;

        let Some(discovery_config) = config.discovery.clone() else {
            let endpoints = resolve_servers(&config.servers)?;
            tracing::debug!("Starting with {} static servers", endpoints.len());
            pool.start(&endpoints);
            return Ok(Self {
                pool,
                discovery: None,
                poller: Mutex::new(None),
            });
        };

        let interval = discovery_config.poll_interval();
        let discovery = Arc::new(DiscoveryNode::with_resolver(
            discovery_config,
            config.socket_pool.clone(),
            authenticator,
            resolver,
        )?);

        pool.update_locator(&[discovery.endpoint()]);
        let poller = ConfigurationPoller::start(Arc::clone(&discovery), pool.clone(), interval)?;

        Ok(Self {
            pool,
            discovery: Some(discovery),
            poller: Mutex::new(Some(poller)),
        })
    }

    pub fn server_pool(&self) -> &ServerPool {
        &self.pool
    }

    pub fn discovery(&self) -> Option<&Arc<DiscoveryNode>> {
        self.discovery.as_ref()
    }

    /// Register an observer for node failures
    pub fn on_node_failed(&self, listener: NodeFailedListener) {
        self.pool.subscribe(listener);
    }

    // =========================================================================
    // Single-key operations
    // =========================================================================

    pub fn get(&self, key: impl Into<Bytes>) -> Result<ValueResult<CacheItem>> {
        let key = checked_key(key.into())?;
        let Some(node) = self.pool.locate(&key) else {
            return Ok(ValueResult::failed(no_node()));
        };

        let mut operation = GetOperation::new(key);
        let result = node.execute(&mut operation);
        let item = operation.take_item();

        Ok(ValueResult::new(result, item))
    }

    pub fn store(&self, mode: StoreMode, key: impl Into<Bytes>, item: CacheItem, expires: u32) -> Result<OperationResult> {
        self.store_cas(mode, key, item, expires, 0)
    }

    /// Store only if the item still has `cas`; zero disables the check
    pub fn store_cas(
        &self,
        mode: StoreMode,
        key: impl Into<Bytes>,
        item: CacheItem,
        expires: u32,
        cas: u64,
    ) -> Result<OperationResult> {
        let key = checked_key(key.into())?;
        let Some(node) = self.pool.locate(&key) else {
            return Ok(no_node());
        };

        let mut operation = StoreOperation::new(mode, key, item, expires).with_cas(cas);
        Ok(node.execute(&mut operation))
    }

    pub fn delete(&self, key: impl Into<Bytes>) -> Result<OperationResult> {
        let key = checked_key(key.into())?;
        let Some(node) = self.pool.locate(&key) else {
            return Ok(no_node());
        };

        let mut operation = DeleteOperation::new(key);
        Ok(node.execute(&mut operation))
    }

    /// Increment or decrement a counter, creating it with `initial` if missing
    pub fn mutate(
        &self,
        mode: MutationMode,
        key: impl Into<Bytes>,
        initial: u64,
        delta: u64,
        expires: u32,
    ) -> Result<ValueResult<u64>> {
        let key = checked_key(key.into())?;
        let Some(node) = self.pool.locate(&key) else {
            return Ok(ValueResult::failed(no_node()));
        };

        let mut operation = MutatorOperation::new(mode, key, initial, delta, expires);
        let result = node.execute(&mut operation);
        let value = operation.value();

        Ok(ValueResult::new(result, value))
    }

    pub fn concat(&self, mode: ConcatMode, key: impl Into<Bytes>, data: impl Into<Bytes>) -> Result<OperationResult> {
        let key = checked_key(key.into())?;
        let Some(node) = self.pool.locate(&key) else {
            return Ok(no_node());
        };

        let mut operation = ConcatOperation::new(mode, key, data);
        Ok(node.execute(&mut operation))
    }

    // =========================================================================
    // Multi-node operations
    // =========================================================================

    /// Fetch many keys, one pipelined batch per owning node
    ///
    /// Batches run concurrently. Keys whose node is down, or missing on the
    /// server, are simply absent from the map; the result fails if any batch
    /// failed.
    pub fn multi_get<I, K>(&self, keys: I) -> Result<ValueResult<HashMap<Bytes, CacheItem>>>
    where
        I: IntoIterator<Item = K>,
        K: Into<Bytes>,
    {
        let mut batches: HashMap<SocketAddr, (Arc<Node>, Vec<Bytes>)> = HashMap::new();
        let mut unrouted = 0usize;

        for key in keys {
            let key = checked_key(key.into())?;
            match self.pool.locate(&key) {
                Some(node) => batches
                    .entry(node.endpoint())
                    .or_insert_with(|| (node, Vec::new()))
                    .1
                    .push(key),
                None => unrouted += 1,
            }
        }

        let mut result = OperationResult::pass();
        if unrouted > 0 {
            result = OperationResult::fail(format!("Failed to locate node for {} keys", unrouted));
        }

        let (sender, receiver) = channel::unbounded();
        let batch_count = batches.len();

        for (_, (node, keys)) in batches {
            let sender = sender.clone();
            node.execute_async(MultiGetOperation::new(keys), move |mut operation, outcome| {
                let _ = sender.send((operation.take_items(), outcome));
            });
        }
        drop(sender);

        let mut items = HashMap::new();
        for (batch, outcome) in receiver.iter().take(batch_count) {
            if !outcome.success && result.success {
                result = OperationResult::fail("Multi-get failed on at least one node").with_inner(outcome);
            }
            items.extend(batch);
        }

        Ok(ValueResult::new(result, Some(items)))
    }

    /// Statistics of every working node, keyed by endpoint
    pub fn stats(&self, group: Option<&str>) -> HashMap<SocketAddr, HashMap<String, String>> {
        let mut all = HashMap::new();

        for node in self.pool.working_nodes() {
            let mut operation = match group {
                Some(group) => StatsOperation::group(group),
                None => StatsOperation::new(),
            };
            let result = node.execute(&mut operation);
            if result.success {
                all.insert(node.endpoint(), operation.take_stats());
            } else {
                tracing::debug!("Stats on {} failed: {}", node.endpoint(), result);
            }
        }

        all
    }

    /// Invalidate every item on every working node after `delay` seconds
    pub fn flush(&self, delay: u32) -> OperationResult {
        let mut combined = OperationResult::pass();

        for node in self.pool.working_nodes() {
            let mut operation = FlushOperation::with_delay(delay);
            let result = node.execute(&mut operation);
            if !result.success {
                tracing::warn!("Flush on {} failed: {}", node.endpoint(), result);
                combined = OperationResult::fail("Flush failed on at least one node").with_inner(result);
            }
        }

        combined
    }

    /// Stop polling and close every connection
    pub fn dispose(&self) {
        if let Some(mut poller) = self.poller.lock().take() {
            poller.stop();
        }
        if let Some(discovery) = &self.discovery {
            discovery.dispose();
        }
        self.pool.dispose();
    }
}

impl Drop for ClusterClient {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Reject keys the protocol cannot carry
pub fn validate_key(key: &[u8]) -> Result<()> {
    if key.is_empty() {
        return Err(ClusterError::InvalidArgument("key must not be empty".to_string()));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(ClusterError::InvalidArgument(format!(
            "key is {} bytes, the maximum is {}",
            key.len(),
            MAX_KEY_LENGTH
        )));
    }
    Ok(())
}

fn checked_key(key: Bytes) -> Result<Bytes> {
    validate_key(&key)?;
    Ok(key)
}

fn no_node() -> OperationResult {
    OperationResult::fail("Failed to locate node")
}

fn resolve_servers(servers: &[String]) -> Result<Vec<SocketAddr>> {
    let mut endpoints = Vec::with_capacity(servers.len());

    for server in servers {
        let resolved = server
            .to_socket_addrs()
            .map_err(|e| ClusterError::Dns(format!("{}: {}", server, e)))?
            .next()
            .ok_or_else(|| ClusterError::Dns(format!("{}: no addresses returned", server)))?;
        if !endpoints.contains(&resolved) {
            endpoints.push(resolved);
        }
    }

    Ok(endpoints)
}
