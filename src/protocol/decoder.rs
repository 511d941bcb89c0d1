//! Non-blocking response decoder
//!
//! A sans-I/O state machine over a socket's [`SlidingBuffer`]. The caller
//! receives bytes however it likes and polls the decoder after each receive.
//!
//! ```text
//! AwaitHeader ──24 bytes──▶ AwaitBody ──body bytes──▶ Complete
//!      │                                                  │
//!      └──────────── bad header ──▶ Failed ◀──────────────┘ (split error)
//! ```

use super::request::HEADER_LENGTH;
use super::{BinaryResponse, ResponseHeader};
use crate::error::{ClusterError, Result};
use crate::network::SlidingBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    AwaitHeader,
    AwaitBody(ResponseHeader),
    Complete,
    Failed,
}

#[derive(Debug)]
pub struct ResponseDecoder {
    state: DecoderState,
}

impl ResponseDecoder {
    pub fn new() -> Self {
        Self {
            state: DecoderState::AwaitHeader,
        }
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// Advance with whatever is buffered
    ///
    /// Returns `Ok(None)` when more bytes are needed. After a response is
    /// returned the decoder starts over with the next header, so one decoder
    /// can walk a stream of pipelined responses.
    pub fn poll(&mut self, input: &mut SlidingBuffer) -> Result<Option<BinaryResponse>> {
        loop {
            match self.state {
                DecoderState::Complete => {
                    self.state = DecoderState::AwaitHeader;
                }
                DecoderState::Failed => {
                    return Err(ClusterError::Protocol(
                        "decoder is in a failed state".to_string(),
                    ));
                }
                DecoderState::AwaitHeader => {
                    let Some(raw) = input.take(HEADER_LENGTH) else {
                        return Ok(None);
                    };
                    let header = match ResponseHeader::parse(&raw) {
                        Ok(header) => header,
                        Err(e) => {
                            self.state = DecoderState::Failed;
                            return Err(e);
                        }
                    };
                    self.state = DecoderState::AwaitBody(header);
                }
                DecoderState::AwaitBody(header) => {
                    let Some(body) = input.take(header.body_length as usize) else {
                        return Ok(None);
                    };
                    return match BinaryResponse::from_parts(header, body) {
                        Ok(response) => {
                            self.state = DecoderState::Complete;
                            Ok(Some(response))
                        }
                        Err(e) => {
                            self.state = DecoderState::Failed;
                            Err(e)
                        }
                    };
                }
            }
        }
    }
}

impl Default for ResponseDecoder {
    fn default() -> Self {
        Self::new()
    }
}
