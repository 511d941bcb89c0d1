//! Request Framing Tests

use memcluster::protocol::{BinaryRequest, OpCode, Operation, StoreOperation, HEADER_LENGTH, REQUEST_MAGIC};
use memcluster::{CacheItem, StoreMode};

// =============================================================================
// Header Layout Tests
// =============================================================================

#[test]
fn test_header_layout() {
    let request = BinaryRequest::new(OpCode::Set)
        .with_key("key")
        .with_extras(vec![0u8; 8])
        .with_value("value")
        .with_cas(0x0102_0304_0506_0708);

    let header = request.encode_header();

    assert_eq!(header.len(), HEADER_LENGTH);
    assert_eq!(header[0], REQUEST_MAGIC);
    assert_eq!(header[1], 0x01);
    assert_eq!(u16::from_be_bytes([header[2], header[3]]), 3);
    assert_eq!(header[4], 8);
    assert_eq!(header[5], 0);
    assert_eq!(u16::from_be_bytes([header[6], header[7]]), 0);
    assert_eq!(u32::from_be_bytes([header[8], header[9], header[10], header[11]]), 8 + 3 + 5);
    assert_eq!(
        u32::from_be_bytes([header[12], header[13], header[14], header[15]]),
        request.correlation_id
    );
    assert_eq!(&header[16..24], &[1, 2, 3, 4, 5, 6, 7, 8]);
}

#[test]
fn test_segments_skip_empty_parts() {
    let request = BinaryRequest::new(OpCode::NoOp);
    assert_eq!(request.to_segments().len(), 1);

    let request = BinaryRequest::new(OpCode::Get).with_key("k");
    let segments = request.to_segments();
    assert_eq!(segments.len(), 2);
    assert_eq!(&segments[1][..], b"k");
}

#[test]
fn test_correlation_ids_are_unique() {
    let a = BinaryRequest::new(OpCode::Get);
    let b = BinaryRequest::new(OpCode::Get);
    assert_ne!(a.correlation_id, b.correlation_id);
}

// =============================================================================
// Operation Request Tests
// =============================================================================

#[test]
fn test_store_request_carries_flags_and_expiration() {
    let mut operation = StoreOperation::new(StoreMode::Add, "user:1", CacheItem::new(0xDEAD_BEEF, "payload"), 300);
    let segments = operation.build_request();

    let header = &segments[0];
    assert_eq!(header[1], 0x02);
    assert_eq!(header[4], 8);

    let extras = &segments[1];
    assert_eq!(&extras[..4], &0xDEAD_BEEFu32.to_be_bytes());
    assert_eq!(&extras[4..8], &300u32.to_be_bytes());
    assert_eq!(&segments[2][..], b"user:1");
    assert_eq!(&segments[3][..], b"payload");
}

#[test]
fn test_opcode_round_trips_through_u8() {
    for code in [0x00u8, 0x01, 0x09, 0x0A, 0x10, 0x21] {
        let opcode = OpCode::from_u8(code).unwrap();
        assert_eq!(u8::from(opcode), code);
    }
    assert!(OpCode::from_u8(0x7F).is_none());
    assert!(OpCode::GetQ.is_quiet());
    assert!(!OpCode::Get.is_quiet());
}
