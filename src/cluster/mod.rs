//! Cluster Module
//!
//! Tracks which nodes make up the cluster and routes keys to them.
//!
//! ## Architecture
//! ```text
//! ConfigurationPoller ──▶ DiscoveryNode ──config get cluster──▶ any known node
//!         │
//!         └──update_locator──▶ ServerPool ──▶ Topology { nodes, locator }
//!                                   ▲
//!                  node failures ───┘ (rebuild locator, notify, arm recovery)
//! ```
//!
//! ## Responsibilities
//! - `ServerPool`: node set and locator swaps, failure handling, recovery
//! - `DiscoveryNode`: DNS resolution and configuration retrieval with retries
//! - `ConfigurationPoller`: periodic refresh that degrades instead of failing

mod config;
mod discovery;
mod poller;
mod recovery;
mod server_pool;

pub use config::{ClusterConfig, ClusterEndpoint};
pub use discovery::{DiscoveryNode, DnsResolver, EndpointResolver, ServerVersion};
pub use poller::{poll_once, ConfigurationPoller, PollOutcome};
pub use server_pool::{NodeFailedListener, ServerPool};
