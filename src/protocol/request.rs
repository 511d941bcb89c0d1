//! Binary request framing

use std::sync::atomic::{AtomicU32, Ordering};

use bytes::{BufMut, Bytes, BytesMut};

use super::OpCode;

/// Request magic byte
pub const REQUEST_MAGIC: u8 = 0x80;

/// Fixed header size shared by requests and responses
pub const HEADER_LENGTH: usize = 24;

static NEXT_CORRELATION_ID: AtomicU32 = AtomicU32::new(1);

/// Allocate a process-wide correlation id (wraps on overflow)
pub fn next_correlation_id() -> u32 {
    NEXT_CORRELATION_ID.fetch_add(1, Ordering::Relaxed)
}

/// One binary protocol request
///
/// Serialized as separate segments (header, extras, key, value) so the
/// payload is never copied into a contiguous frame before the write.
#[derive(Debug, Clone)]
pub struct BinaryRequest {
    pub opcode: OpCode,
    pub key: Bytes,
    pub extras: Bytes,
    pub value: Bytes,
    pub cas: u64,
    pub vbucket: u16,
    pub correlation_id: u32,
}

impl BinaryRequest {
    /// Create a request with a fresh correlation id
    pub fn new(opcode: OpCode) -> Self {
        Self {
            opcode,
            key: Bytes::new(),
            extras: Bytes::new(),
            value: Bytes::new(),
            cas: 0,
            vbucket: 0,
            correlation_id: next_correlation_id(),
        }
    }

    pub fn with_key(mut self, key: impl Into<Bytes>) -> Self {
        self.key = key.into();
        self
    }

    pub fn with_extras(mut self, extras: impl Into<Bytes>) -> Self {
        self.extras = extras.into();
        self
    }

    pub fn with_value(mut self, value: impl Into<Bytes>) -> Self {
        self.value = value.into();
        self
    }

    pub fn with_cas(mut self, cas: u64) -> Self {
        self.cas = cas;
        self
    }

    /// Encode the 24 byte header
    ///
    /// ```text
    /// 0      1       2        4        5         6        8          12       16
    /// ┌──────┬───────┬────────┬────────┬─────────┬────────┬──────────┬────────┬─────────┐
    /// │magic │opcode │key len │extras  │data type│vbucket │total body│opaque  │cas (8)  │
    /// └──────┴───────┴────────┴────────┴─────────┴────────┴──────────┴────────┴─────────┘
    /// ```
    pub fn encode_header(&self) -> Bytes {
        debug_assert!(self.key.len() <= u16::MAX as usize);
        debug_assert!(self.extras.len() <= u8::MAX as usize);

        let body_length = self.extras.len() + self.key.len() + self.value.len();

        let mut header = BytesMut::with_capacity(HEADER_LENGTH);
        header.put_u8(REQUEST_MAGIC);
        header.put_u8(self.opcode.into());
        header.put_u16(self.key.len() as u16);
        header.put_u8(self.extras.len() as u8);
        header.put_u8(0); // data type: raw bytes
        header.put_u16(self.vbucket);
        header.put_u32(body_length as u32);
        header.put_u32(self.correlation_id);
        header.put_u64(self.cas);

        header.freeze()
    }

    /// Append this request's segments to `buffers`
    pub fn write_segments(&self, buffers: &mut Vec<Bytes>) {
        buffers.push(self.encode_header());
        for segment in [&self.extras, &self.key, &self.value] {
            if !segment.is_empty() {
                buffers.push(segment.clone());
            }
        }
    }

    /// Segments of this request alone
    pub fn to_segments(&self) -> Vec<Bytes> {
        let mut buffers = Vec::with_capacity(4);
        self.write_segments(&mut buffers);
        buffers
    }
}
