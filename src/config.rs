//! Configuration for memcluster
//!
//! Centralized configuration with sensible defaults. The library never reads
//! configuration files itself; a loader deserializes or builds a
//! [`ClientConfig`] and hands it to the client constructor.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{ClusterError, Result};
use crate::locator::KeyHasher;

/// Main configuration for a memcluster client
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    // -------------------------------------------------------------------------
    // Connection Pool Configuration
    // -------------------------------------------------------------------------
    /// Per-node socket pool settings
    pub socket_pool: SocketPoolConfig,

    // -------------------------------------------------------------------------
    // Topology Configuration
    // -------------------------------------------------------------------------
    /// Auto discovery settings. When absent, `servers` is used as a static list.
    pub discovery: Option<DiscoveryConfig>,

    /// Static server list ("host:port"), used without auto discovery
    pub servers: Vec<String>,

    /// How keys are mapped to nodes
    pub locator: LocatorKind,

    /// Hash used by the key locators
    pub key_hasher: KeyHasher,

    // -------------------------------------------------------------------------
    // Authentication Configuration
    // -------------------------------------------------------------------------
    /// SASL PLAIN credentials, applied to every new connection
    pub authentication: Option<AuthConfig>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            socket_pool: SocketPoolConfig::default(),
            discovery: None,
            servers: Vec::new(),
            locator: LocatorKind::Ring,
            key_hasher: KeyHasher::Fnv1a,
            authentication: None,
        }
    }
}

impl ClientConfig {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check the settings for values the pool cannot work with
    pub fn validate(&self) -> Result<()> {
        self.socket_pool.validate()?;
        if let Some(discovery) = &self.discovery {
            discovery.validate()?;
        }
        Ok(())
    }
}

/// Socket pool settings shared by every node of a client
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SocketPoolConfig {
    /// Sockets created when a pool is first used
    pub min_pool_size: usize,

    /// Upper bound of sockets per node, in use or idle
    pub max_pool_size: usize,

    /// TCP connect timeout (milliseconds)
    pub connection_timeout_ms: u64,

    /// Socket read/write timeout (milliseconds)
    pub receive_timeout_ms: u64,

    /// How long an acquire waits for a free slot (milliseconds)
    pub queue_timeout_ms: u64,

    /// Delay before dead nodes are probed again (milliseconds)
    pub dead_timeout_ms: u64,

    /// When I/O errors mark a node as dead
    pub failure_policy: FailurePolicyConfig,
}

impl Default for SocketPoolConfig {
    fn default() -> Self {
        Self {
            min_pool_size: 10,
            max_pool_size: 20,
            connection_timeout_ms: 10_000,
            receive_timeout_ms: 10_000,
            queue_timeout_ms: 100,
            dead_timeout_ms: 10_000,
            failure_policy: FailurePolicyConfig::Immediate,
        }
    }
}

impl SocketPoolConfig {
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    pub fn queue_timeout(&self) -> Duration {
        Duration::from_millis(self.queue_timeout_ms)
    }

    pub fn dead_timeout(&self) -> Duration {
        Duration::from_millis(self.dead_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_pool_size == 0 {
            return Err(ClusterError::Config(
                "max_pool_size must be > 0".to_string(),
            ));
        }
        if self.min_pool_size > self.max_pool_size {
            return Err(ClusterError::Config(format!(
                "min_pool_size ({}) must be <= max_pool_size ({})",
                self.min_pool_size, self.max_pool_size
            )));
        }
        if self.connection_timeout_ms == 0 {
            return Err(ClusterError::Config(
                "connection_timeout_ms must be > 0".to_string(),
            ));
        }
        self.failure_policy.validate()
    }
}

/// Failure policy selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailurePolicyConfig {
    /// Every failure fails the node
    Immediate,

    /// Fail after `failure_threshold` failures within `reset_after_ms` of each other
    Throttling {
        failure_threshold: u32,
        reset_after_ms: u64,
    },
}

impl FailurePolicyConfig {
    fn validate(&self) -> Result<()> {
        match *self {
            FailurePolicyConfig::Immediate => Ok(()),
            FailurePolicyConfig::Throttling {
                failure_threshold,
                reset_after_ms,
            } => {
                if failure_threshold < 1 {
                    return Err(ClusterError::Config(
                        "failure_threshold must be > 0".to_string(),
                    ));
                }
                if reset_after_ms == 0 {
                    return Err(ClusterError::Config(
                        "reset_after_ms must be > 0".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }
}

/// Locator selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocatorKind {
    /// Consistent hash ring with virtual points per node
    Ring,

    /// `hash(key) % node_count`
    Modulo,

    /// Everything goes to the first node
    SingleNode,
}

/// Auto discovery settings
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
    /// Configuration endpoint hostname of the cluster
    pub hostname: String,

    /// Configuration endpoint port
    #[serde(default = "DiscoveryConfig::default_port")]
    pub port: u16,

    /// Attempts for DNS resolution and config retrieval
    #[serde(default = "DiscoveryConfig::default_tries")]
    pub node_tries: u32,

    /// Delay between attempts (milliseconds)
    #[serde(default = "DiscoveryConfig::default_delay")]
    pub node_delay_ms: u64,

    /// Interval between topology polls (milliseconds)
    #[serde(default = "DiscoveryConfig::default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl DiscoveryConfig {
    pub const DEFAULT_PORT: u16 = 11211;
    pub const DEFAULT_TRY_COUNT: u32 = 5;
    pub const DEFAULT_TRY_DELAY_MS: u64 = 1000;
    pub const DEFAULT_POLL_INTERVAL_MS: u64 = 60_000;

    pub fn new(hostname: impl Into<String>, port: u16) -> Self {
        Self {
            hostname: hostname.into(),
            port,
            node_tries: Self::DEFAULT_TRY_COUNT,
            node_delay_ms: Self::DEFAULT_TRY_DELAY_MS,
            poll_interval_ms: Self::DEFAULT_POLL_INTERVAL_MS,
        }
    }

    fn default_port() -> u16 {
        Self::DEFAULT_PORT
    }

    fn default_tries() -> u32 {
        Self::DEFAULT_TRY_COUNT
    }

    fn default_delay() -> u64 {
        Self::DEFAULT_TRY_DELAY_MS
    }

    fn default_poll_interval() -> u64 {
        Self::DEFAULT_POLL_INTERVAL_MS
    }

    pub fn node_delay(&self) -> Duration {
        Duration::from_millis(self.node_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.hostname.is_empty() {
            return Err(ClusterError::Config("hostname must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(ClusterError::Config(
                "port range is 1 through 65535".to_string(),
            ));
        }
        if self.node_tries < 1 {
            return Err(ClusterError::Config("must try at least once".to_string()));
        }
        Ok(())
    }
}

/// SASL PLAIN credentials
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub zone: String,
    pub username: String,
    pub password: String,
}

/// Builder for ClientConfig
#[derive(Default)]
pub struct ConfigBuilder {
    config: ClientConfig,
}

impl ConfigBuilder {
    /// Use auto discovery through the given configuration endpoint
    pub fn discovery(mut self, hostname: impl Into<String>, port: u16) -> Self {
        self.config.discovery = Some(DiscoveryConfig::new(hostname, port));
        self
    }

    /// Set discovery retry behaviour (tries and delay in milliseconds)
    pub fn discovery_retries(mut self, tries: u32, delay_ms: u64) -> Self {
        if let Some(discovery) = self.config.discovery.as_mut() {
            discovery.node_tries = tries;
            discovery.node_delay_ms = delay_ms;
        }
        self
    }

    /// Set the topology poll interval (in milliseconds)
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        if let Some(discovery) = self.config.discovery.as_mut() {
            discovery.poll_interval_ms = ms;
        }
        self
    }

    /// Add a static server ("host:port")
    pub fn server(mut self, addr: impl Into<String>) -> Self {
        self.config.servers.push(addr.into());
        self
    }

    /// Set the min and max pool size per node
    pub fn pool_size(mut self, min: usize, max: usize) -> Self {
        self.config.socket_pool.min_pool_size = min;
        self.config.socket_pool.max_pool_size = max;
        self
    }

    /// Set the connect timeout (in milliseconds)
    pub fn connection_timeout_ms(mut self, ms: u64) -> Self {
        self.config.socket_pool.connection_timeout_ms = ms;
        self
    }

    /// Set the read/write timeout (in milliseconds)
    pub fn receive_timeout_ms(mut self, ms: u64) -> Self {
        self.config.socket_pool.receive_timeout_ms = ms;
        self
    }

    /// Set the queue timeout (in milliseconds)
    pub fn queue_timeout_ms(mut self, ms: u64) -> Self {
        self.config.socket_pool.queue_timeout_ms = ms;
        self
    }

    /// Set the dead timeout (in milliseconds)
    pub fn dead_timeout_ms(mut self, ms: u64) -> Self {
        self.config.socket_pool.dead_timeout_ms = ms;
        self
    }

    /// Set the failure policy
    pub fn failure_policy(mut self, policy: FailurePolicyConfig) -> Self {
        self.config.socket_pool.failure_policy = policy;
        self
    }

    /// Set the locator kind
    pub fn locator(mut self, kind: LocatorKind) -> Self {
        self.config.locator = kind;
        self
    }

    /// Set the key hasher
    pub fn key_hasher(mut self, hasher: KeyHasher) -> Self {
        self.config.key_hasher = hasher;
        self
    }

    /// Authenticate new connections with SASL PLAIN
    pub fn authentication(
        mut self,
        zone: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.config.authentication = Some(AuthConfig {
            zone: zone.into(),
            username: username.into(),
            password: password.into(),
        });
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}
