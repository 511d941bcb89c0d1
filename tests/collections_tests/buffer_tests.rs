//! Sliding Buffer Tests

use bytes::Bytes;
use memcluster::network::SlidingBuffer;

#[test]
fn test_buffer_reads_across_chunks() {
    let mut buffer = SlidingBuffer::new();
    buffer.append(b"hello ");
    buffer.append(b"wor");
    buffer.append(b"ld");
    assert_eq!(buffer.available(), 11);

    let mut out = [0u8; 11];
    assert_eq!(buffer.read(&mut out), 11);
    assert_eq!(&out, b"hello world");
    assert_eq!(buffer.available(), 0);
}

#[test]
fn test_buffer_take_requires_enough_bytes() {
    let mut buffer = SlidingBuffer::new();
    buffer.append(b"abc");

    assert!(buffer.take(4).is_none());
    assert_eq!(buffer.available(), 3);

    buffer.append(b"def");
    assert_eq!(buffer.take(4).unwrap(), Bytes::from_static(b"abcd"));
    assert_eq!(buffer.take(2).unwrap(), Bytes::from_static(b"ef"));
}

#[test]
fn test_buffer_partial_reads() {
    let mut buffer = SlidingBuffer::new();
    buffer.append_bytes(Bytes::from_static(b"0123456789"));

    let mut out = [0u8; 4];
    assert_eq!(buffer.read(&mut out), 4);
    assert_eq!(&out, b"0123");
    assert_eq!(buffer.available(), 6);

    let mut rest = [0u8; 16];
    assert_eq!(buffer.read(&mut rest), 6);
    assert_eq!(&rest[..6], b"456789");
}

#[test]
fn test_buffer_clear_reports_discarded() {
    let mut buffer = SlidingBuffer::new();
    buffer.append(b"leftover");
    let _ = buffer.take(2);

    assert_eq!(buffer.clear(), 6);
    assert_eq!(buffer.available(), 0);
    assert_eq!(buffer.clear(), 0);
}
