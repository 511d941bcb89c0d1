//! Operation Execution Tests

use std::io::Read;
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::time::Duration;

use bytes::Bytes;
use memcluster::network::PooledSocket;
use memcluster::node::AsyncStatus;
use memcluster::protocol::text::read_line;
use memcluster::protocol::{
    BinaryResponse, ConcatOperation, DeleteOperation, GetOperation, MultiGetOperation, MutatorOperation,
    NoOpOperation, Operation, OperationResult, StoreOperation, VersionOperation,
};
use memcluster::{CacheItem, ClusterError, ConcatMode, MutationMode, Node, SocketPoolConfig, StoreMode};

use crate::common::{test_pool_config, FakeServer};

// =============================================================================
// Blocking Path Tests
// =============================================================================

#[test]
fn test_store_then_get() {
    let server = FakeServer::start();
    let node = Node::new(server.addr(), test_pool_config());

    let mut store = StoreOperation::new(StoreMode::Set, "greeting", CacheItem::new(3, "hello"), 0);
    let stored = node.execute(&mut store);
    assert!(stored.success);
    assert!(stored.cas > 0);

    let mut get = GetOperation::new("greeting");
    let result = node.execute(&mut get);
    assert!(result.success);
    assert_eq!(get.cas(), stored.cas);
    let item = get.take_item().unwrap();
    assert_eq!(item.flags, 3);
    assert_eq!(&item.data[..], b"hello");
}

#[test]
fn test_cas_mismatch_is_a_failed_result() {
    let server = FakeServer::start();
    let node = Node::new(server.addr(), test_pool_config());

    let mut store = StoreOperation::new(StoreMode::Set, "k", CacheItem::new(0, "v1"), 0);
    let cas = node.execute(&mut store).cas;

    let mut stale = StoreOperation::new(StoreMode::Set, "k", CacheItem::new(0, "v2"), 0).with_cas(cas + 100);
    let result = node.execute(&mut stale);
    assert!(!result.success);
    assert_eq!(result.status_code, Some(0x0002));

    let mut fresh = StoreOperation::new(StoreMode::Set, "k", CacheItem::new(0, "v2"), 0).with_cas(cas);
    assert!(node.execute(&mut fresh).success);
}

#[test]
fn test_counter_and_concat() {
    let server = FakeServer::start();
    let node = Node::new(server.addr(), test_pool_config());

    let mut incr = MutatorOperation::new(MutationMode::Increment, "hits", 10, 5, 0);
    assert!(node.execute(&mut incr).success);
    assert_eq!(incr.value(), Some(10));

    let mut incr = MutatorOperation::new(MutationMode::Increment, "hits", 10, 5, 0);
    node.execute(&mut incr);
    assert_eq!(incr.value(), Some(15));

    let mut decr = MutatorOperation::new(MutationMode::Decrement, "hits", 0, 20, 0);
    node.execute(&mut decr);
    assert_eq!(decr.value(), Some(0));

    let mut store = StoreOperation::new(StoreMode::Set, "text", CacheItem::new(0, "middle"), 0);
    node.execute(&mut store);
    node.execute(&mut ConcatOperation::new(ConcatMode::Append, "text", "-end"));
    node.execute(&mut ConcatOperation::new(ConcatMode::Prepend, "text", "start-"));

    let mut get = GetOperation::new("text");
    node.execute(&mut get);
    assert_eq!(&get.item().unwrap().data[..], b"start-middle-end");
}

#[test]
fn test_delete_missing_key() {
    let server = FakeServer::start();
    let node = Node::new(server.addr(), test_pool_config());

    let result = node.execute(&mut DeleteOperation::new("nothing"));
    assert!(!result.success);
    assert_eq!(result.status_code, Some(0x0001));
    assert!(node.is_alive());
}

#[test]
fn test_version() {
    let server = FakeServer::start();
    server.set_version("1.6.9");
    let node = Node::new(server.addr(), test_pool_config());

    let mut version = VersionOperation::new();
    assert!(node.execute(&mut version).success);
    assert_eq!(version.version(), Some("1.6.9"));
}

#[test]
fn test_execute_on_dead_node_fails_without_error() {
    let mut server = FakeServer::start();
    let node = Node::new(server.addr(), test_pool_config());
    server.stop();

    let result = node.execute(&mut GetOperation::new("k"));
    assert!(!result.success);
    assert!(result.message.unwrap().contains("Failed to obtain socket"));
}

/// Reads a complete response, then reports a caller-side error
struct RejectingOperation(NoOpOperation);

impl Operation for RejectingOperation {
    fn build_request(&mut self) -> Vec<Bytes> {
        self.0.build_request()
    }

    fn read_response(&mut self, reader: &mut dyn Read) -> memcluster::Result<OperationResult> {
        self.0.read_response(reader)?;
        Err(ClusterError::InvalidArgument("rejected after reading".to_string()))
    }
}

#[test]
fn test_error_that_keeps_stream_position_keeps_socket() {
    let server = FakeServer::start();
    let node = Node::new(server.addr(), test_pool_config());

    let result = node.execute(&mut RejectingOperation(NoOpOperation::new()));
    assert!(!result.success);
    assert!(node.is_alive());

    assert!(node.execute(&mut VersionOperation::new()).success);
    assert_eq!(server.state().accepted.load(Ordering::SeqCst), 1);
}

#[test]
fn test_blocking_read_timeout_keeps_its_type() {
    let server = FakeServer::start();
    let config = SocketPoolConfig {
        receive_timeout_ms: 200,
        ..test_pool_config()
    };

    // nothing was sent, so nothing ever arrives
    let mut socket = PooledSocket::connect(server.addr(), &config).unwrap();
    let err = BinaryResponse::read(&mut socket).unwrap_err();
    assert!(matches!(err, ClusterError::ReceiveTimeout(_)), "{}", err);
    assert!(!socket.is_alive());

    let mut socket = PooledSocket::connect(server.addr(), &config).unwrap();
    let err = read_line(&mut socket).unwrap_err();
    assert!(matches!(err, ClusterError::ReceiveTimeout(_)), "{}", err);
}

#[test]
fn test_blocking_execute_timeout_fails_node() {
    let server = FakeServer::start();
    server.set_response_delay(Duration::from_millis(800));
    let config = SocketPoolConfig {
        receive_timeout_ms: 200,
        ..test_pool_config()
    };
    let node = Node::new(server.addr(), config);

    let result = node.execute(&mut GetOperation::new("slow"));
    assert!(!result.success);
    assert!(result.message.unwrap().contains("Receive timed out"));
    assert!(!node.is_alive());
}

// =============================================================================
// Async Path Tests
// =============================================================================

#[test]
fn test_execute_async_pending_then_completes() {
    let server = FakeServer::start();
    let node = Node::new(server.addr(), test_pool_config());
    node.execute(&mut StoreOperation::new(StoreMode::Set, "a", CacheItem::new(0, "1"), 0));
    node.execute(&mut StoreOperation::new(StoreMode::Set, "c", CacheItem::new(0, "3"), 0));

    server.set_response_delay(Duration::from_millis(100));

    let (sender, receiver) = mpsc::channel();
    let status = node.execute_async(MultiGetOperation::new(["a", "b", "c"]), move |mut operation, result| {
        sender.send((result, operation.take_items())).unwrap();
    });
    assert_eq!(status, AsyncStatus::Pending);

    let (result, items) = receiver.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(result.success);
    assert_eq!(items.len(), 2);
    assert_eq!(node.pool_stats().in_use, 0);
}

#[test]
fn test_execute_async_failure_runs_continuation() {
    let mut server = FakeServer::start();
    let node = Node::new(server.addr(), test_pool_config());
    server.stop();

    let (sender, receiver) = mpsc::channel();
    let status = node.execute_async(GetOperation::new("k"), move |_operation, result| {
        sender.send(result).unwrap();
    });

    assert_eq!(status, AsyncStatus::Failed);
    assert!(!receiver.recv_timeout(Duration::from_secs(1)).unwrap().success);
}

#[test]
fn test_execute_async_read_timeout_kills_connection() {
    let server = FakeServer::start();
    server.set_response_delay(Duration::from_millis(800));
    let config = SocketPoolConfig {
        receive_timeout_ms: 200,
        ..test_pool_config()
    };
    let node = Node::new(server.addr(), config);

    let (sender, receiver) = mpsc::channel();
    let status = node.execute_async(GetOperation::new("slow"), move |_operation, result| {
        sender.send(result).unwrap();
    });
    assert_eq!(status, AsyncStatus::Pending);

    let result = receiver.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(!result.success);
    assert!(result.message.unwrap().contains("Receive timed out"));
    assert_eq!(node.pool_stats().in_use, 0);
    assert!(!node.is_alive());
}
