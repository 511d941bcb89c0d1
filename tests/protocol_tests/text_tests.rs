//! Text Protocol Tests

use std::io::Cursor;

use memcluster::cluster::ClusterConfig;
use memcluster::protocol::text::{read_line, TextReply, MAX_DATA_BLOCK_LENGTH, MAX_LINE_LENGTH};
use memcluster::ClusterError;
use memcluster::protocol::{ConfigGetOperation, Operation, TextStatsOperation};

// =============================================================================
// Line Handling Tests
// =============================================================================

#[test]
fn test_error_classification() {
    assert_eq!(TextReply::classify("ERROR".to_string()), TextReply::Error);
    assert_eq!(
        TextReply::classify("CLIENT_ERROR bad data chunk".to_string()),
        TextReply::ClientError("bad data chunk".to_string())
    );
    assert_eq!(
        TextReply::classify("SERVER_ERROR out of memory".to_string()),
        TextReply::ServerError("out of memory".to_string())
    );
    assert_eq!(TextReply::classify("END".to_string()), TextReply::Line("END".to_string()));

    let failure = TextReply::ServerError("busy".to_string()).into_line().unwrap_err();
    assert!(!failure.success);
    assert!(failure.message.unwrap().contains("busy"));
}

#[test]
fn test_read_line_strips_crlf() {
    let mut input = Cursor::new(b"first\r\nsec\rond\r\n".to_vec());
    assert_eq!(read_line(&mut input).unwrap(), "first");
    assert_eq!(read_line(&mut input).unwrap(), "sec\rond");
}

#[test]
fn test_read_line_rejects_unterminated_flood() {
    let mut input = Cursor::new(vec![b'x'; MAX_LINE_LENGTH * 2]);
    let err = read_line(&mut input).unwrap_err();
    assert!(matches!(err, ClusterError::Protocol(_)), "{}", err);
}

// =============================================================================
// Command Tests
// =============================================================================

#[test]
fn test_text_stats_reads_version() {
    let mut operation = TextStatsOperation::new();
    assert_eq!(&operation.build_request()[0][..], b"stats\r\n");

    let reply = b"STAT pid 1\r\nSTAT version 1.4.5\r\nEND\r\n".to_vec();
    let result = operation.read_response(&mut Cursor::new(reply)).unwrap();

    assert!(result.success);
    assert_eq!(operation.version(), Some("1.4.5"));
}

#[test]
fn test_config_get_reads_payload() {
    let payload = "12\nmyCluster.cfg.local|10.0.0.1|11211 other.local||11212\n";
    let reply = format!("CONFIG cluster 0 {}\r\n{}\r\nEND\r\n", payload.len(), payload);

    let mut operation = ConfigGetOperation::new();
    assert_eq!(&operation.build_request()[0][..], b"config get cluster\r\n");
    let result = operation.read_response(&mut Cursor::new(reply.into_bytes())).unwrap();

    assert!(result.success);
    let config = ClusterConfig::from_bytes(operation.config().unwrap()).unwrap();
    assert_eq!(config.version, 12);
    assert_eq!(config.endpoints.len(), 2);
    assert_eq!(config.endpoints[0].ip, Some("10.0.0.1".parse().unwrap()));
    assert_eq!(config.endpoints[1].ip, None);
    assert_eq!(config.endpoints[1].port, 11212);
}

#[test]
fn test_legacy_config_get_uses_value_line() {
    let payload = "3\nnode|127.0.0.1|11211\n";
    let reply = format!("VALUE AmazonElastiCache:cluster 0 {}\r\n{}\r\nEND\r\n", payload.len(), payload);

    let mut operation = ConfigGetOperation::legacy();
    assert_eq!(&operation.build_request()[0][..], b"get AmazonElastiCache:cluster\r\n");
    let result = operation.read_response(&mut Cursor::new(reply.into_bytes())).unwrap();

    assert!(result.success);
    assert_eq!(&operation.config().unwrap()[..], payload.as_bytes());
}

#[test]
fn test_config_get_error_is_a_failed_result() {
    let mut operation = ConfigGetOperation::new();
    let result = operation.read_response(&mut Cursor::new(b"ERROR\r\n".to_vec())).unwrap();
    assert!(!result.success);
    assert!(operation.config().is_none());

    let result = operation.read_response(&mut Cursor::new(b"END\r\n".to_vec())).unwrap();
    assert!(!result.success);
}

#[test]
fn test_empty_reply_is_a_protocol_error() {
    let mut operation = TextStatsOperation::new();
    assert!(operation.read_response(&mut Cursor::new(b"\r\n".to_vec())).is_err());
}

// =============================================================================
// Configuration Payload Tests
// =============================================================================

#[test]
fn test_config_payload_rejects_bad_version() {
    assert!(ClusterConfig::parse("abc\nnode|1.2.3.4|11211\n").is_err());
    assert!(ClusterConfig::parse("").is_err());
}

#[test]
fn test_config_payload_rejects_bad_entry() {
    assert!(ClusterConfig::parse("1\nnode|1.2.3.4\n").is_err());
    assert!(ClusterConfig::parse("1\nnode|not-an-ip|11211\n").is_err());
}

#[test]
fn test_config_payload_without_members() {
    let config = ClusterConfig::parse("4\n").unwrap();
    assert_eq!(config.version, 4);
    assert!(config.endpoints.is_empty());
}

#[test]
fn test_config_get_rejects_absurd_block_length() {
    let reply = b"CONFIG cluster 0 18446744073709551615\r\nxx\r\nEND\r\n".to_vec();
    let mut operation = ConfigGetOperation::new();

    let err = operation.read_response(&mut Cursor::new(reply)).unwrap_err();
    assert!(matches!(err, ClusterError::Protocol(_)), "{}", err);
    assert!(operation.config().is_none());
}

#[test]
fn test_config_get_rejects_block_over_limit() {
    let reply = format!("CONFIG cluster 0 {}\r\n", MAX_DATA_BLOCK_LENGTH + 1);
    let mut operation = ConfigGetOperation::new();

    let err = operation.read_response(&mut Cursor::new(reply.into_bytes())).unwrap_err();
    assert!(matches!(err, ClusterError::Protocol(_)), "{}", err);
}
