//! Modulo locator

use std::sync::Arc;

use super::{KeyHasher, NodeLocator};
use crate::node::Node;

/// `hash(key) % node_count`, skipping ahead past dead nodes
pub struct ModuloNodeLocator {
    nodes: Vec<Arc<Node>>,
    hasher: KeyHasher,
}

impl ModuloNodeLocator {
    pub fn new(nodes: &[Arc<Node>], hasher: KeyHasher) -> Self {
        Self {
            nodes: nodes.to_vec(),
            hasher,
        }
    }
}

impl NodeLocator for ModuloNodeLocator {
    fn locate(&self, key: &[u8]) -> Option<Arc<Node>> {
        let len = self.nodes.len();
        if len == 0 {
            return None;
        }

        let start = self.hasher.hash(key) as usize % len;
        (0..len)
            .map(|offset| &self.nodes[(start + offset) % len])
            .find(|node| node.is_alive())
            .cloned()
    }

    fn working_nodes(&self) -> Vec<Arc<Node>> {
        self.nodes.iter().filter(|n| n.is_alive()).cloned().collect()
    }
}
