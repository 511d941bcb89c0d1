//! Single node locator

use std::sync::Arc;

use super::NodeLocator;
use crate::node::Node;

/// Routes every key to the first node
pub struct SingleNodeLocator {
    node: Option<Arc<Node>>,
}

impl SingleNodeLocator {
    pub fn new(nodes: &[Arc<Node>]) -> Self {
        if nodes.len() > 1 {
            tracing::warn!(
                "Single node locator was given {} nodes, only {} is used",
                nodes.len(),
                nodes[0].endpoint()
            );
        }
        Self {
            node: nodes.first().cloned(),
        }
    }
}

impl NodeLocator for SingleNodeLocator {
    fn locate(&self, _key: &[u8]) -> Option<Arc<Node>> {
        self.node.as_ref().filter(|n| n.is_alive()).cloned()
    }

    fn working_nodes(&self) -> Vec<Arc<Node>> {
        self.node.iter().filter(|n| n.is_alive()).cloned().collect()
    }
}
