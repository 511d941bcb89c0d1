//! Topology discovery
//!
//! Resolves the cluster's configuration endpoint and asks known nodes for
//! the current member list.

use std::fmt;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::{Mutex, RwLock};

use super::ClusterConfig;
use crate::config::{DiscoveryConfig, SocketPoolConfig};
use crate::error::{ClusterError, Result};
use crate::node::{Node, SaslAuthenticator};
use crate::protocol::{ConfigGetOperation, TextStatsOperation};

/// Marker in configuration endpoint hostnames that support auto discovery
const CONFIG_ENDPOINT_MARKER: &str = ".cfg";

/// Hostname lookup, replaceable in tests
pub trait EndpointResolver: Send + Sync {
    fn resolve(&self, hostname: &str, port: u16) -> io::Result<Vec<SocketAddr>>;
}

/// System resolver
#[derive(Debug, Default, Clone, Copy)]
pub struct DnsResolver;

impl EndpointResolver for DnsResolver {
    fn resolve(&self, hostname: &str, port: u16) -> io::Result<Vec<SocketAddr>> {
        Ok((hostname, port).to_socket_addrs()?.collect())
    }
}

/// `major.minor.patch` of a memcached server
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ServerVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ServerVersion {
    /// First version answering `config get cluster`
    pub const CONFIG_COMMAND: ServerVersion = ServerVersion::new(1, 4, 14);

    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl FromStr for ServerVersion {
    type Err = ClusterError;

    /// Accepts trailing build information such as "1.6.21-ubuntu"
    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.trim().split('.').map(|part| {
            let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse::<u32>().ok()
        });

        let major = parts
            .next()
            .flatten()
            .ok_or_else(|| ClusterError::Protocol(format!("invalid server version {:?}", s)))?;
        let minor = parts.next().flatten().unwrap_or(0);
        let patch = parts.next().flatten().unwrap_or(0);

        Ok(Self::new(major, minor, patch))
    }
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Source of cluster membership
pub struct DiscoveryNode {
    config: DiscoveryConfig,
    socket_pool: SocketPoolConfig,
    authenticator: Option<Arc<dyn SaslAuthenticator>>,
    resolver: Arc<dyn EndpointResolver>,

    /// Resolved configuration endpoint
    endpoint: RwLock<SocketAddr>,

    /// Nodes asked for the configuration: the bootstrap node at first, then
    /// the cluster members
    nodes: Mutex<Vec<Arc<Node>>>,

    node_version: Mutex<Option<ServerVersion>>,

    /// Highest configuration version seen
    cluster_version: AtomicU64,
}

impl DiscoveryNode {
    /// Resolve the configuration endpoint; failure is a construction error
    pub fn new(config: DiscoveryConfig, socket_pool: SocketPoolConfig) -> Result<Self> {
        Self::with_resolver(config, socket_pool, None, Arc::new(DnsResolver))
    }

    pub fn with_resolver(
        config: DiscoveryConfig,
        socket_pool: SocketPoolConfig,
        authenticator: Option<Arc<dyn SaslAuthenticator>>,
        resolver: Arc<dyn EndpointResolver>,
    ) -> Result<Self> {
        config.validate()?;

        if !config
            .hostname
            .to_ascii_lowercase()
            .contains(CONFIG_ENDPOINT_MARKER)
        {
            tracing::warn!(
                "Hostname {} does not look like a configuration endpoint, auto discovery may not work",
                config.hostname
            );
        }

        let endpoint = resolve_with_retries(&config, resolver.as_ref())?;
        let bootstrap = Arc::new(Node::with_authenticator(
            endpoint,
            socket_pool.clone(),
            authenticator.clone(),
        ));

        Ok(Self {
            config,
            socket_pool,
            authenticator,
            resolver,
            endpoint: RwLock::new(endpoint),
            nodes: Mutex::new(vec![bootstrap]),
            node_version: Mutex::new(None),
            cluster_version: AtomicU64::new(0),
        })
    }

    /// Resolved configuration endpoint
    pub fn endpoint(&self) -> SocketAddr {
        *self.endpoint.read()
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Highest configuration version seen so far
    pub fn cluster_version(&self) -> u64 {
        self.cluster_version.load(Ordering::Acquire)
    }

    /// Number of nodes currently asked for the configuration
    pub fn nodes_in_cluster(&self) -> usize {
        self.nodes.lock().len()
    }

    /// Resolve the hostname again and rebuild the bootstrap node
    pub fn resolve_endpoint(&self) -> Result<SocketAddr> {
        let endpoint = resolve_with_retries(&self.config, self.resolver.as_ref())?;
        *self.endpoint.write() = endpoint;

        let node = Arc::new(self.create_node(endpoint));
        let previous = std::mem::replace(&mut *self.nodes.lock(), vec![node]);
        for old in previous {
            old.dispose();
        }

        Ok(endpoint)
    }

    /// Version of the server behind the configuration endpoint, read once
    pub fn node_version(&self) -> Result<ServerVersion> {
        if let Some(version) = *self.node_version.lock() {
            return Ok(version);
        }

        let node = self
            .nodes
            .lock()
            .first()
            .cloned()
            .ok_or_else(|| ClusterError::DiscoveryTimeout("no configuration node".to_string()))?;

        let mut stats = TextStatsOperation::new();
        let result = node.execute(&mut stats);

        let Some(raw) = stats.version() else {
            tracing::error!("Could not call stats on node endpoint {}", node.endpoint());
            return Err(ClusterError::Protocol(format!(
                "the node does not have a version in stats ({})",
                result
            )));
        };

        let version: ServerVersion = raw.parse()?;
        *self.node_version.lock() = Some(version);
        Ok(version)
    }

    /// Fetch the configuration from any known node
    ///
    /// Every node is tried in turn, for up to `node_tries` passes with
    /// `node_delay` between passes. The tracked version only moves up.
    pub fn get_node_config(&self) -> Result<ClusterConfig> {
        let node_version = self.node_version()?;
        let legacy = node_version < ServerVersion::CONFIG_COMMAND;
        let tries = self.config.node_tries;
        let mut message = String::new();

        for attempt in 0..tries {
            let nodes = self.nodes.lock().clone();

            for node in nodes {
                let mut command = if legacy {
                    ConfigGetOperation::legacy()
                } else {
                    ConfigGetOperation::new()
                };

                let result = node.execute(&mut command);
                if !result.success {
                    message = result.message.unwrap_or_default();
                    continue;
                }

                let parsed = command
                    .config()
                    .ok_or_else(|| ClusterError::Protocol("empty configuration".to_string()))
                    .and_then(|payload| ClusterConfig::from_bytes(payload));

                match parsed {
                    Ok(config) => {
                        let previous = self
                            .cluster_version
                            .fetch_max(config.version, Ordering::AcqRel);
                        if config.version < previous {
                            tracing::debug!(
                                "Ignoring configuration version {} older than {}",
                                config.version,
                                previous
                            );
                        }
                        return Ok(config);
                    }
                    Err(e) => message = e.to_string(),
                }
            }

            if attempt + 1 < tries {
                thread::sleep(self.config.node_delay());
            }
        }

        Err(ClusterError::DiscoveryTimeout(format!(
            "could not get config of version {}. Tries: {} Delay: {}ms. {}",
            node_version, tries, self.config.node_delay_ms, message
        )))
    }

    /// Current member endpoints; also makes the members the new sources of
    /// configuration
    pub fn get_endpoint_list(&self) -> Result<Vec<SocketAddr>> {
        let config = self.get_node_config().map_err(|e| {
            tracing::debug!("Error getting endpoints list: {}", e);
            e
        })?;
        let endpoints = config.resolve(self.resolver.as_ref());

        let mut nodes = self.nodes.lock();
        nodes.retain(|node| {
            let keep = endpoints.contains(&node.endpoint());
            if !keep {
                node.dispose();
            }
            keep
        });
        for &endpoint in &endpoints {
            if !nodes.iter().any(|n| n.endpoint() == endpoint) {
                nodes.push(Arc::new(self.create_node(endpoint)));
            }
        }

        Ok(endpoints)
    }

    pub fn dispose(&self) {
        for node in self.nodes.lock().drain(..) {
            node.dispose();
        }
    }

    fn create_node(&self, endpoint: SocketAddr) -> Node {
        Node::with_authenticator(endpoint, self.socket_pool.clone(), self.authenticator.clone())
    }
}

impl fmt::Debug for DiscoveryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscoveryNode")
            .field("hostname", &self.config.hostname)
            .field("endpoint", &self.endpoint())
            .field("cluster_version", &self.cluster_version())
            .finish()
    }
}

fn resolve_with_retries(config: &DiscoveryConfig, resolver: &dyn EndpointResolver) -> Result<SocketAddr> {
    let mut message = String::new();

    for attempt in 0..config.node_tries {
        match resolver.resolve(&config.hostname, config.port) {
            Ok(addresses) => {
                if let Some(&address) = addresses.first() {
                    tracing::debug!(
                        "Resolved configuration endpoint {} to {}",
                        config.hostname,
                        address
                    );
                    return Ok(address);
                }
                message = "no addresses returned".to_string();
            }
            Err(e) => message = e.to_string(),
        }

        if attempt + 1 < config.node_tries {
            thread::sleep(config.node_delay());
        }
    }

    tracing::error!("Could not resolve hostname {} to an ip", config.hostname);
    Err(ClusterError::Dns(format!(
        "could not resolve {} after {} tries: {}",
        config.hostname, config.node_tries, message
    )))
}
