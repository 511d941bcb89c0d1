//! Consistent hash ring

use std::sync::Arc;

use super::{KeyHasher, NodeLocator};
use crate::node::Node;

/// Points placed on the ring per node
pub const POINTS_PER_NODE: usize = 100;

/// Consistent hashing over a ring of virtual points
///
/// Each node owns `POINTS_PER_NODE` points hashed from `"<endpoint>-<i>"`. A
/// key goes to the first point at or after its hash; if that node is down
/// the walk continues clockwise to the next live node.
pub struct DefaultNodeLocator {
    /// (point, index into `nodes`), sorted by point
    ring: Vec<(u32, usize)>,
    nodes: Vec<Arc<Node>>,
    hasher: KeyHasher,
}

impl DefaultNodeLocator {
    pub fn new(nodes: &[Arc<Node>], hasher: KeyHasher) -> Self {
        let nodes = nodes.to_vec();
        let mut ring = Vec::with_capacity(nodes.len() * POINTS_PER_NODE);

        for (index, node) in nodes.iter().enumerate() {
            let endpoint = node.endpoint().to_string();
            for i in 0..POINTS_PER_NODE {
                let point = hasher.hash(format!("{}-{}", endpoint, i).as_bytes());
                ring.push((point, index));
            }
        }
        ring.sort_unstable();

        Self { ring, nodes, hasher }
    }

    /// Ring position a key hashes to
    fn start_index(&self, key: &[u8]) -> usize {
        let hash = self.hasher.hash(key);
        let index = self.ring.partition_point(|&(point, _)| point < hash);
        if index == self.ring.len() {
            0
        } else {
            index
        }
    }
}

impl NodeLocator for DefaultNodeLocator {
    fn locate(&self, key: &[u8]) -> Option<Arc<Node>> {
        match self.nodes.len() {
            0 => return None,
            1 => {
                let node = &self.nodes[0];
                return node.is_alive().then(|| Arc::clone(node));
            }
            _ => {}
        }

        let start = self.start_index(key);
        let len = self.ring.len();

        (0..len)
            .map(|offset| &self.nodes[self.ring[(start + offset) % len].1])
            .find(|node| node.is_alive())
            .cloned()
    }

    fn working_nodes(&self) -> Vec<Arc<Node>> {
        self.nodes.iter().filter(|n| n.is_alive()).cloned().collect()
    }
}
