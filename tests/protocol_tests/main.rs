//! Protocol Tests
//!
//! Binary request framing, response parsing on both read paths, pipelined
//! multi-get, and the text commands used by discovery.

mod request_tests;
mod response_tests;
mod text_tests;

use bytes::{BufMut, BytesMut};

/// Encode a binary response frame
pub fn response_frame(opcode: u8, status: u16, opaque: u32, cas: u64, extras: &[u8], key: &[u8], value: &[u8]) -> Vec<u8> {
    let mut frame = BytesMut::new();
    frame.put_u8(0x81);
    frame.put_u8(opcode);
    frame.put_u16(key.len() as u16);
    frame.put_u8(extras.len() as u8);
    frame.put_u8(0);
    frame.put_u16(status);
    frame.put_u32((extras.len() + key.len() + value.len()) as u32);
    frame.put_u32(opaque);
    frame.put_u64(cas);
    frame.put_slice(extras);
    frame.put_slice(key);
    frame.put_slice(value);
    frame.to_vec()
}

/// Correlation ids of every request header in a segment list
pub fn request_ids(segments: &[bytes::Bytes]) -> Vec<u32> {
    segments
        .iter()
        .filter(|s| s.len() == 24 && s[0] == 0x80)
        .map(|s| u32::from_be_bytes([s[12], s[13], s[14], s[15]]))
        .collect()
}
