//! Response Parsing Tests

use std::io::Cursor;

use memcluster::network::SlidingBuffer;
use memcluster::protocol::{
    BinaryResponse, DecoderState, GetOperation, MutatorOperation, Operation, ResponseDecoder, ResponseHeader,
    ResponseStatus, StatsOperation, MAX_BODY_LENGTH,
};
use memcluster::MutationMode;

use crate::{request_ids, response_frame};

// =============================================================================
// Blocking Parser Tests
// =============================================================================

#[test]
fn test_response_splits_extras_key_value() {
    let frame = response_frame(0x0C, 0, 7, 99, &[0, 0, 0, 5], b"key", b"value");
    let response = BinaryResponse::read(&mut Cursor::new(frame)).unwrap();

    assert_eq!(&response.extras[..], &[0, 0, 0, 5]);
    assert_eq!(&response.key[..], b"key");
    assert_eq!(&response.value[..], b"value");
    assert_eq!(response.flags(), 5);
    assert_eq!(response.cas(), 99);
    assert_eq!(response.correlation_id(), 7);
    assert!(response.is_success());
}

#[test]
fn test_bad_magic_is_rejected() {
    let mut frame = response_frame(0x00, 0, 1, 0, &[], &[], b"x");
    frame[0] = 0x80;

    let err = ResponseHeader::parse(&frame[..24]).unwrap_err();
    assert!(err.to_string().contains("Protocol"), "{}", err);
}

#[test]
fn test_inconsistent_lengths_are_rejected() {
    let mut frame = response_frame(0x00, 0, 1, 0, &[0, 0, 0, 0], b"key", &[]);
    // body length smaller than extras + key
    frame[11] = 2;

    assert!(ResponseHeader::parse(&frame[..24]).is_err());
}

#[test]
fn test_oversized_body_length_is_rejected() {
    let mut frame = response_frame(0x00, 0, 1, 0, &[], &[], &[]);
    frame[8..12].copy_from_slice(&(MAX_BODY_LENGTH + 1).to_be_bytes());

    let err = BinaryResponse::read(&mut Cursor::new(frame.clone())).unwrap_err();
    assert!(err.to_string().contains("exceeds"), "{}", err);

    let mut buffer = SlidingBuffer::new();
    buffer.append(&frame);
    let mut decoder = ResponseDecoder::new();
    assert!(decoder.poll(&mut buffer).is_err());
    assert_eq!(decoder.state(), DecoderState::Failed);
}

#[test]
fn test_truncated_body_is_an_error() {
    let mut frame = response_frame(0x00, 0, 1, 0, &[], &[], b"value");
    frame.truncate(26);

    assert!(BinaryResponse::read(&mut Cursor::new(frame)).is_err());
}

// =============================================================================
// Operation Response Tests
// =============================================================================

#[test]
fn test_get_hit_and_miss() {
    let mut hit = GetOperation::new("a");
    let ids = request_ids(&hit.build_request());
    let frame = response_frame(0x00, 0, ids[0], 42, &7u32.to_be_bytes(), &[], b"data");

    let result = hit.read_response(&mut Cursor::new(frame)).unwrap();
    assert!(result.success);
    assert_eq!(result.cas, 42);
    let item = hit.item().unwrap();
    assert_eq!(item.flags, 7);
    assert_eq!(&item.data[..], b"data");

    let mut miss = GetOperation::new("b");
    let ids = request_ids(&miss.build_request());
    let frame = response_frame(0x00, 0x0001, ids[0], 0, &[], &[], b"Not found");

    let result = miss.read_response(&mut Cursor::new(frame)).unwrap();
    assert!(!result.success);
    assert_eq!(result.status(), Some(ResponseStatus::KeyNotFound));
    assert_eq!(result.message.as_deref(), Some("Not found"));
    assert!(miss.item().is_none());
}

#[test]
fn test_mutator_requires_eight_bytes() {
    let mut operation = MutatorOperation::new(MutationMode::Increment, "counter", 0, 1, 0);
    let ids = request_ids(&operation.build_request());

    let frame = response_frame(0x05, 0, ids[0], 1, &[], &[], &[0, 0, 0, 3]);
    let result = operation.read_response(&mut Cursor::new(frame)).unwrap();
    assert!(!result.success);
    assert!(operation.value().is_none());

    let frame = response_frame(0x05, 0, ids[0], 1, &[], &[], &11u64.to_be_bytes());
    let result = operation.read_response(&mut Cursor::new(frame)).unwrap();
    assert!(result.success);
    assert_eq!(operation.value(), Some(11));
}

#[test]
fn test_stats_reads_until_empty_key() {
    let mut operation = StatsOperation::new();
    let ids = request_ids(&operation.build_request());

    let mut stream = Vec::new();
    stream.extend(response_frame(0x10, 0, ids[0], 0, &[], b"pid", b"12"));
    stream.extend(response_frame(0x10, 0, ids[0], 0, &[], b"version", b"1.6.21"));
    stream.extend(response_frame(0x10, 0, ids[0], 0, &[], &[], &[]));

    let result = operation.read_response(&mut Cursor::new(stream)).unwrap();
    assert!(result.success);
    assert_eq!(operation.stats().get("version").map(String::as_str), Some("1.6.21"));
    assert_eq!(operation.stats().len(), 2);
}

// =============================================================================
// Decoder Tests
// =============================================================================

#[test]
fn test_decoder_waits_for_complete_frames() {
    let frame = response_frame(0x00, 0, 5, 0, &[], b"k", b"value");
    let mut buffer = SlidingBuffer::new();
    let mut decoder = ResponseDecoder::new();

    buffer.append(&frame[..10]);
    assert!(decoder.poll(&mut buffer).unwrap().is_none());
    assert_eq!(decoder.state(), DecoderState::AwaitHeader);

    buffer.append(&frame[10..27]);
    assert!(decoder.poll(&mut buffer).unwrap().is_none());
    assert!(matches!(decoder.state(), DecoderState::AwaitBody(_)));

    buffer.append(&frame[27..]);
    let response = decoder.poll(&mut buffer).unwrap().unwrap();
    assert_eq!(&response.key[..], b"k");
    assert_eq!(&response.value[..], b"value");
    assert_eq!(decoder.state(), DecoderState::Complete);
}

#[test]
fn test_decoder_walks_pipelined_frames() {
    let mut buffer = SlidingBuffer::new();
    buffer.append(&response_frame(0x09, 0, 1, 0, &[], &[], b"one"));
    buffer.append(&response_frame(0x0A, 0, 2, 0, &[], &[], &[]));

    let mut decoder = ResponseDecoder::new();
    let first = decoder.poll(&mut buffer).unwrap().unwrap();
    let second = decoder.poll(&mut buffer).unwrap().unwrap();

    assert_eq!(first.correlation_id(), 1);
    assert_eq!(second.correlation_id(), 2);
    assert!(decoder.poll(&mut buffer).unwrap().is_none());
}

#[test]
fn test_decoder_fails_on_bad_magic() {
    let mut frame = response_frame(0x00, 0, 1, 0, &[], &[], &[]);
    frame[0] = 0x42;

    let mut buffer = SlidingBuffer::new();
    buffer.append(&frame);
    let mut decoder = ResponseDecoder::new();

    assert!(decoder.poll(&mut buffer).is_err());
    assert_eq!(decoder.state(), DecoderState::Failed);
    assert!(decoder.poll(&mut buffer).is_err());
}
