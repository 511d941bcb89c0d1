//! Locator Tests

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use memcluster::config::LocatorKind;
use memcluster::locator::{create_locator, KeyHasher};
use memcluster::Node;

use crate::common::{closed_endpoint, test_pool_config};

fn node(port: u16) -> Arc<Node> {
    let endpoint: SocketAddr = format!("10.1.0.1:{}", port).parse().unwrap();
    Arc::new(Node::new(endpoint, test_pool_config()))
}

fn keys() -> Vec<String> {
    (0..3000).map(|i| format!("key:{}", i)).collect()
}

// =============================================================================
// Hasher Tests
// =============================================================================

#[test]
fn test_fnv1a_known_values() {
    assert_eq!(KeyHasher::Fnv1a.hash(b""), 0x811c_9dc5);
    assert_eq!(KeyHasher::Fnv1a.hash(b"a"), 0xe40c_292c);
    assert_eq!(KeyHasher::Fnv1a.hash(b"foobar"), 0xbf9c_f968);
}

#[test]
fn test_crc32_known_value() {
    assert_eq!(KeyHasher::Crc32.hash(b"123456789"), 0xcbf4_3926);
}

#[test]
fn test_modified_fnv_differs_from_fnv1a() {
    assert_ne!(KeyHasher::ModifiedFnv.hash(b"key"), KeyHasher::Fnv1a.hash(b"key"));
}

// =============================================================================
// Ring Tests
// =============================================================================

#[test]
fn test_ring_is_deterministic() {
    let nodes = vec![node(1), node(2), node(3)];
    let first = create_locator(LocatorKind::Ring, KeyHasher::Fnv1a, &nodes);
    let second = create_locator(LocatorKind::Ring, KeyHasher::Fnv1a, &nodes);

    for key in keys() {
        let a = first.locate(key.as_bytes()).unwrap();
        let b = second.locate(key.as_bytes()).unwrap();
        assert_eq!(a.endpoint(), b.endpoint());
    }
}

#[test]
fn test_ring_spreads_keys() {
    let nodes = vec![node(1), node(2), node(3)];
    let locator = create_locator(LocatorKind::Ring, KeyHasher::Fnv1a, &nodes);

    let mut counts: HashMap<SocketAddr, usize> = HashMap::new();
    for key in keys() {
        *counts.entry(locator.locate(key.as_bytes()).unwrap().endpoint()).or_default() += 1;
    }

    assert_eq!(counts.len(), 3);
    for count in counts.values() {
        assert!(*count > 300, "uneven distribution: {:?}", counts);
    }
}

#[test]
fn test_ring_removal_only_moves_removed_keys() {
    let a = node(1);
    let b = node(2);
    let c = node(3);
    let full = create_locator(LocatorKind::Ring, KeyHasher::Fnv1a, &[a.clone(), b.clone(), c.clone()]);
    let reduced = create_locator(LocatorKind::Ring, KeyHasher::Fnv1a, &[a, b]);

    for key in keys() {
        let before = full.locate(key.as_bytes()).unwrap().endpoint();
        let after = reduced.locate(key.as_bytes()).unwrap().endpoint();
        if before != c.endpoint() {
            assert_eq!(before, after, "key {} moved", key);
        }
    }
}

#[test]
fn test_ring_skips_dead_nodes() {
    let dead = Arc::new(Node::new(closed_endpoint(), test_pool_config()));
    let _ = dead.acquire();
    assert!(!dead.is_alive());

    let alive = node(7);
    let locator = create_locator(LocatorKind::Ring, KeyHasher::Fnv1a, &[dead.clone(), alive.clone()]);

    for key in keys().iter().take(200) {
        assert_eq!(locator.locate(key.as_bytes()).unwrap().endpoint(), alive.endpoint());
    }
    assert_eq!(locator.working_nodes().len(), 1);
}

#[test]
fn test_empty_locators_return_none() {
    for kind in [LocatorKind::Ring, LocatorKind::Modulo, LocatorKind::SingleNode] {
        let locator = create_locator(kind, KeyHasher::Fnv1a, &[]);
        assert!(locator.locate(b"key").is_none());
        assert!(locator.working_nodes().is_empty());
    }
}

// =============================================================================
// Other Locator Tests
// =============================================================================

#[test]
fn test_modulo_uses_hash_remainder() {
    let nodes = vec![node(1), node(2), node(3)];
    let locator = create_locator(LocatorKind::Modulo, KeyHasher::Fnv1a, &nodes);

    for key in keys().iter().take(100) {
        let expected = &nodes[KeyHasher::Fnv1a.hash(key.as_bytes()) as usize % nodes.len()];
        assert_eq!(locator.locate(key.as_bytes()).unwrap().endpoint(), expected.endpoint());
    }
}

#[test]
fn test_single_node_locator_routes_everything_to_first() {
    let nodes = vec![node(1), node(2)];
    let locator = create_locator(LocatorKind::SingleNode, KeyHasher::Fnv1a, &nodes);

    for key in keys().iter().take(50) {
        assert_eq!(locator.locate(key.as_bytes()).unwrap().endpoint(), nodes[0].endpoint());
    }
}
