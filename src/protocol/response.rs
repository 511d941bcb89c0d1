//! Binary response framing

use std::io::Read;

use bytes::{Buf, Bytes, BytesMut};

use super::request::HEADER_LENGTH;
use super::ResponseStatus;
use crate::error::{ClusterError, Result};

/// Response magic byte
pub const RESPONSE_MAGIC: u8 = 0x81;

/// Largest response body accepted; above any item size a server can be
/// configured for
pub const MAX_BODY_LENGTH: u32 = 128 * 1024 * 1024;

/// Decoded fixed-size part of a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    pub opcode: u8,
    pub key_length: u16,
    pub extras_length: u8,
    pub data_type: u8,
    pub status: u16,
    pub body_length: u32,
    pub correlation_id: u32,
    pub cas: u64,
}

impl ResponseHeader {
    /// Decode a 24 byte header
    ///
    /// A wrong magic byte means the stream position is lost, so it is a
    /// protocol error rather than a failed operation.
    pub fn parse(header: &[u8]) -> Result<Self> {
        if header.len() < HEADER_LENGTH {
            return Err(ClusterError::Protocol(format!(
                "response header is {} bytes, expected {}",
                header.len(),
                HEADER_LENGTH
            )));
        }

        let mut buf = &header[..HEADER_LENGTH];
        let magic = buf.get_u8();
        if magic != RESPONSE_MAGIC {
            return Err(ClusterError::Protocol(format!(
                "invalid response magic 0x{:02x}",
                magic
            )));
        }

        let parsed = Self {
            opcode: buf.get_u8(),
            key_length: buf.get_u16(),
            extras_length: buf.get_u8(),
            data_type: buf.get_u8(),
            status: buf.get_u16(),
            body_length: buf.get_u32(),
            correlation_id: buf.get_u32(),
            cas: buf.get_u64(),
        };

        if parsed.body_length > MAX_BODY_LENGTH {
            return Err(ClusterError::Protocol(format!(
                "body length {} exceeds the limit of {}",
                parsed.body_length, MAX_BODY_LENGTH
            )));
        }

        if (parsed.extras_length as u32 + parsed.key_length as u32) > parsed.body_length {
            return Err(ClusterError::Protocol(format!(
                "body length {} is shorter than extras ({}) plus key ({})",
                parsed.body_length, parsed.extras_length, parsed.key_length
            )));
        }

        Ok(parsed)
    }
}

/// A complete response: header plus the body split into its parts
#[derive(Debug, Clone)]
pub struct BinaryResponse {
    pub header: ResponseHeader,
    pub extras: Bytes,
    pub key: Bytes,
    pub value: Bytes,
}

impl BinaryResponse {
    /// Split `body` according to the lengths in `header`
    pub fn from_parts(header: ResponseHeader, mut body: Bytes) -> Result<Self> {
        if body.len() != header.body_length as usize {
            return Err(ClusterError::Protocol(format!(
                "expected {} body bytes, got {}",
                header.body_length,
                body.len()
            )));
        }

        let extras = body.split_to(header.extras_length as usize);
        let key = body.split_to(header.key_length as usize);

        Ok(Self {
            header,
            extras,
            key,
            value: body,
        })
    }

    /// Blocking read of one response: the header, then the body in one go
    pub fn read(reader: &mut dyn Read) -> Result<Self> {
        let mut header = [0u8; HEADER_LENGTH];
        reader.read_exact(&mut header)?;
        let header = ResponseHeader::parse(&header)?;

        let body = if header.body_length > 0 {
            let mut body = BytesMut::zeroed(header.body_length as usize);
            reader.read_exact(&mut body)?;
            body.freeze()
        } else {
            Bytes::new()
        };

        Self::from_parts(header, body)
    }

    pub fn status(&self) -> u16 {
        self.header.status
    }

    pub fn is_success(&self) -> bool {
        self.header.status == ResponseStatus::NoError as u16
    }

    pub fn correlation_id(&self) -> u32 {
        self.header.correlation_id
    }

    pub fn cas(&self) -> u64 {
        self.header.cas
    }

    /// Flags stored with an item (first four bytes of the extras)
    pub fn flags(&self) -> u32 {
        if self.extras.len() >= 4 {
            (&self.extras[..4]).get_u32()
        } else {
            0
        }
    }

    /// Error text sent along with a failed status
    pub fn status_message(&self) -> String {
        String::from_utf8_lossy(&self.value).into_owned()
    }
}
