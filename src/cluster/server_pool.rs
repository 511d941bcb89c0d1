//! Server pool
//!
//! Owns the node set and the locator built over it. Both live in one
//! immutable `Topology` behind an `AtomicArc`, so `locate` never locks and
//! never sees a node array from one generation with a locator from another.

use std::net::SocketAddr;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use super::recovery::RecoveryTimer;
use crate::collections::AtomicArc;
use crate::config::{ClientConfig, LocatorKind, SocketPoolConfig};
use crate::error::Result;
use crate::locator::{create_locator, KeyHasher, NodeLocator};
use crate::node::{Node, PlainTextAuthenticator, SaslAuthenticator};

/// Called after a node failure has been taken out of the routing
pub type NodeFailedListener = Arc<dyn Fn(&Arc<Node>) + Send + Sync>;

/// One generation of the node set and its routing
struct Topology {
    /// Every known node, dead ones included
    nodes: Vec<Arc<Node>>,
    /// Routing over the nodes that were alive when it was built
    locator: Arc<dyn NodeLocator>,
}

/// Guarded by `dead_sync`
#[derive(Default)]
struct DeadState {
    timer_active: bool,
    disposed: bool,
}

struct PoolInner {
    socket_pool: SocketPoolConfig,
    locator_kind: LocatorKind,
    key_hasher: KeyHasher,
    authenticator: Option<Arc<dyn SaslAuthenticator>>,

    topology: AtomicArc<Topology>,
    dead_sync: Mutex<DeadState>,
    timer: RecoveryTimer,
    subscribers: RwLock<Vec<NodeFailedListener>>,

    /// Handed to nodes so their failure reports find their way back
    this: Weak<PoolInner>,
}

/// Node set, routing and failure handling of a client
#[derive(Clone)]
pub struct ServerPool {
    inner: Arc<PoolInner>,
}

impl ServerPool {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let authenticator = config
            .authentication
            .as_ref()
            .map(|auth| Arc::new(PlainTextAuthenticator::from_config(auth)) as Arc<dyn SaslAuthenticator>);

        Self::with_authenticator(config, authenticator)
    }

    pub fn with_authenticator(
        config: &ClientConfig,
        authenticator: Option<Arc<dyn SaslAuthenticator>>,
    ) -> Result<Self> {
        let empty = Topology {
            nodes: Vec::new(),
            locator: create_locator(config.locator, config.key_hasher, &[]),
        };

        let inner = Arc::new_cyclic(|this: &Weak<PoolInner>| PoolInner {
            socket_pool: config.socket_pool.clone(),
            locator_kind: config.locator,
            key_hasher: config.key_hasher,
            authenticator,
            topology: AtomicArc::new(Arc::new(empty)),
            dead_sync: Mutex::new(DeadState::default()),
            timer: RecoveryTimer::new(),
            subscribers: RwLock::new(Vec::new()),
            this: this.clone(),
        });

        let weak = Arc::downgrade(&inner);
        inner.timer.spawn("memcluster-recovery", move || {
            if let Some(inner) = weak.upgrade() {
                inner.rezurrect();
            }
        })?;

        Ok(Self { inner })
    }

    /// Build the initial node set from a static endpoint list
    pub fn start(&self, endpoints: &[SocketAddr]) {
        self.inner.update_locator(endpoints);
    }

    /// Node responsible for `key`
    pub fn locate(&self, key: &[u8]) -> Option<Arc<Node>> {
        self.inner.topology.load().locator.locate(key)
    }

    /// Alive nodes of the current locator
    pub fn working_nodes(&self) -> Vec<Arc<Node>> {
        self.inner.topology.load().locator.working_nodes()
    }

    /// All known nodes, dead ones included
    pub fn nodes(&self) -> Vec<Arc<Node>> {
        self.inner.topology.load().nodes.clone()
    }

    pub fn locator(&self) -> Arc<dyn NodeLocator> {
        Arc::clone(&self.inner.topology.load().locator)
    }

    /// Register an observer for node failures
    pub fn subscribe(&self, listener: NodeFailedListener) {
        self.inner.subscribers.write().push(listener);
    }

    /// Replace the node set with `endpoints`
    ///
    /// Nodes already known and dead stay dead (the recovery timer brings them
    /// back). Known live nodes are reused with their warm sockets, unknown
    /// endpoints get fresh nodes, and nodes no longer listed are disposed.
    pub fn update_locator(&self, endpoints: &[SocketAddr]) {
        self.inner.update_locator(endpoints);
    }

    /// True while the recovery timer is armed
    pub fn is_recovery_pending(&self) -> bool {
        self.inner.dead_sync.lock().timer_active
    }

    pub fn dispose(&self) {
        self.inner.dispose();
    }
}

impl PoolInner {
    fn create_node(&self, endpoint: SocketAddr) -> Arc<Node> {
        let node = Arc::new(Node::with_authenticator(
            endpoint,
            self.socket_pool.clone(),
            self.authenticator.clone(),
        ));

        let pool = self.this.clone();
        node.set_failure_listener(Arc::new(move |endpoint: &SocketAddr| {
            if let Some(pool) = pool.upgrade() {
                pool.node_failed(endpoint);
            }
        }));

        node
    }

    fn build_locator(&self, nodes: &[Arc<Node>]) -> Arc<dyn NodeLocator> {
        let alive: Vec<Arc<Node>> = nodes.iter().filter(|n| n.is_alive()).cloned().collect();
        create_locator(self.locator_kind, self.key_hasher, &alive)
    }

    fn update_locator(&self, endpoints: &[SocketAddr]) {
        let mut dead = self.dead_sync.lock();
        if dead.disposed {
            return;
        }

        let current = self.topology.load();
        let mut nodes: Vec<Arc<Node>> = Vec::with_capacity(endpoints.len());
        let mut alive: Vec<Arc<Node>> = Vec::with_capacity(endpoints.len());
        let mut preserved_dead = 0;

        for &endpoint in endpoints {
            if nodes.iter().any(|n| n.endpoint() == endpoint) {
                continue;
            }

            match current.nodes.iter().find(|n| n.endpoint() == endpoint) {
                Some(node) if !node.is_alive() => {
                    preserved_dead += 1;
                    nodes.push(Arc::clone(node));
                }
                Some(node) => {
                    alive.push(Arc::clone(node));
                    nodes.push(Arc::clone(node));
                }
                None => {
                    let node = self.create_node(endpoint);
                    alive.push(Arc::clone(&node));
                    nodes.push(node);
                }
            }
        }

        tracing::debug!(
            "Updating locator: {} nodes ({} alive, {} dead)",
            nodes.len(),
            alive.len(),
            preserved_dead
        );

        let locator = create_locator(self.locator_kind, self.key_hasher, &alive);
        self.topology.store(Arc::new(Topology {
            nodes: nodes.clone(),
            locator,
        }));

        for node in current.nodes.iter() {
            if !nodes.iter().any(|n| n.endpoint() == node.endpoint()) {
                tracing::debug!("Removing node {}", node.endpoint());
                node.dispose();
            }
        }

        if preserved_dead > 0 && !dead.timer_active {
            self.arm_timer(&mut dead);
        }
    }

    fn node_failed(&self, endpoint: &SocketAddr) {
        let failed = {
            let dead = self.dead_sync.lock();
            if dead.disposed {
                tracing::warn!("Got a node failure for {} after the pool was disposed", endpoint);
                return;
            }

            let current = self.topology.load();
            let Some(node) = current.nodes.iter().find(|n| n.endpoint() == *endpoint).cloned() else {
                tracing::debug!("Failure of {} which is no longer in the pool", endpoint);
                return;
            };

            tracing::debug!("Node {} is dead, rebuilding the locator", endpoint);
            self.topology.store(Arc::new(Topology {
                nodes: current.nodes.clone(),
                locator: self.build_locator(&current.nodes),
            }));

            node
        };

        // routing is already updated when subscribers run
        let subscribers = self.subscribers.read().clone();
        for subscriber in subscribers {
            subscriber(&failed);
        }

        let mut dead = self.dead_sync.lock();
        if !dead.disposed && !dead.timer_active {
            self.arm_timer(&mut dead);
        }
    }

    fn arm_timer(&self, dead: &mut DeadState) {
        let delay = self.socket_pool.dead_timeout();
        tracing::debug!("Starting the recovery timer ({:?})", delay);
        self.timer.schedule(delay);
        dead.timer_active = true;
    }

    /// Timer callback: probe dead nodes, fold recovered ones back in
    fn rezurrect(&self) {
        let candidates: Vec<Arc<Node>> = {
            let dead = self.dead_sync.lock();
            if dead.disposed {
                return;
            }
            self.topology
                .load()
                .nodes
                .iter()
                .filter(|n| !n.is_alive())
                .cloned()
                .collect()
        };

        tracing::debug!("Checking {} dead nodes", candidates.len());

        let mut changed = false;
        for node in &candidates {
            if node.ping() {
                tracing::debug!("Node {} responded, it is alive again", node.endpoint());
                changed = true;
            } else {
                tracing::debug!("Node {} is still dead", node.endpoint());
            }
        }

        let mut dead = self.dead_sync.lock();
        if dead.disposed {
            return;
        }

        let current = self.topology.load();
        if changed {
            tracing::debug!("Reinitializing the locator");
            self.topology.store(Arc::new(Topology {
                nodes: current.nodes.clone(),
                locator: self.build_locator(&current.nodes),
            }));
        }

        let dead_count = current.nodes.iter().filter(|n| !n.is_alive()).count();
        if dead_count == 0 {
            tracing::debug!("Every node is alive, suspending the recovery timer");
            dead.timer_active = false;
        } else {
            tracing::debug!("{} nodes are still dead, rescheduling the recovery timer", dead_count);
            self.arm_timer(&mut dead);
        }
    }

    fn dispose(&self) {
        let mut dead = self.dead_sync.lock();
        if dead.disposed {
            return;
        }
        dead.disposed = true;
        dead.timer_active = false;
        self.timer.shutdown();

        for node in self.topology.load().nodes.iter() {
            node.dispose();
        }
    }
}

impl Drop for PoolInner {
    fn drop(&mut self) {
        self.dispose();
    }
}
