//! Locator Module
//!
//! Maps keys to nodes. A locator is built once from a node snapshot and never
//! changes; topology changes build a new locator and swap it in.

mod hasher;
mod modulo;
mod ring;
mod single;

pub use hasher::KeyHasher;
pub use modulo::ModuloNodeLocator;
pub use ring::DefaultNodeLocator;
pub use single::SingleNodeLocator;

use std::sync::Arc;

use crate::config::LocatorKind;
use crate::node::Node;

/// Routing table from keys to nodes
pub trait NodeLocator: Send + Sync {
    /// Node responsible for `key`, or `None` when no node is alive
    fn locate(&self, key: &[u8]) -> Option<Arc<Node>>;

    /// Nodes of this locator that are currently alive
    fn working_nodes(&self) -> Vec<Arc<Node>>;
}

/// Build the locator selected in the configuration
pub fn create_locator(kind: LocatorKind, hasher: KeyHasher, nodes: &[Arc<Node>]) -> Arc<dyn NodeLocator> {
    match kind {
        LocatorKind::Ring => Arc::new(DefaultNodeLocator::new(nodes, hasher)),
        LocatorKind::Modulo => Arc::new(ModuloNodeLocator::new(nodes, hasher)),
        LocatorKind::SingleNode => Arc::new(SingleNodeLocator::new(nodes)),
    }
}
