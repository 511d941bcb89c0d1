//! # memcluster
//!
//! A memcached cluster client with:
//! - Per-node socket pools with failure detection and background recovery
//! - Lock-free key routing that swaps atomically when the topology changes
//! - Automatic topology discovery through a cluster configuration endpoint
//! - The memcached binary protocol, including pipelined multi-get and SASL
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ClusterClient                           │
//! └──────────────┬──────────────────────────────┬───────────────┘
//!                │ locate(key)                  │ poll
//! ┌──────────────▼──────────────┐    ┌──────────▼───────────────┐
//! │         ServerPool          │◀───│   ConfigurationPoller    │
//! │  Topology { nodes, locator }│    │   └─ DiscoveryNode       │
//! └──────────────┬──────────────┘    └──────────────────────────┘
//!                │
//!       ┌────────┴────────┐
//!       ▼                 ▼
//!  ┌─────────┐       ┌─────────┐
//!  │  Node   │  ...  │  Node   │   socket pool + failure policy
//!  └────┬────┘       └────┬────┘
//!       ▼                 ▼
//!  PooledSocket ──▶ binary protocol frames
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod collections;
pub mod network;
pub mod protocol;
pub mod item;
pub mod node;
pub mod locator;
pub mod cluster;
pub mod client;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use client::ClusterClient;
pub use cluster::{ConfigurationPoller, DiscoveryNode, ServerPool};
pub use config::{ClientConfig, DiscoveryConfig, SocketPoolConfig};
pub use error::{ClusterError, Result};
pub use item::{CacheItem, ConcatMode, MutationMode, StoreMode};
pub use node::Node;
pub use protocol::{OperationResult, ValueResult};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of memcluster
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
