//! Operation abstraction
//!
//! An operation is a request builder plus a response parser, executed once
//! on one checked-out socket.

use std::io::Read;

use bytes::Bytes;

use super::{BinaryResponse, OperationResult};
use crate::error::Result;

/// Something that can be sent to a node and read back
///
/// `read_response` returns `Err` only when the connection can no longer be
/// trusted (I/O failure, protocol violation). A command rejected by the
/// server is an `Ok` holding a failed [`OperationResult`].
pub trait Operation: Send {
    /// Request segments, written with a single vectored write
    fn build_request(&mut self) -> Vec<Bytes>;

    /// Blocking read of the complete response
    fn read_response(&mut self, reader: &mut dyn Read) -> Result<OperationResult>;

    /// Binary operations expose their response handler so the non-blocking
    /// path can feed decoded responses to the same code
    fn as_streaming(&mut self) -> Option<&mut dyn StreamingOperation> {
        None
    }
}

/// What a response handler wants next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseStep {
    /// More responses belong to this operation
    Continue,
    /// The operation is finished
    Done(OperationResult),
}

/// Response handling of a binary operation, one decoded response at a time
pub trait StreamingOperation: Send {
    fn on_response(&mut self, response: BinaryResponse) -> ResponseStep;
}

/// Blocking driver: read responses until the handler is done
pub fn read_binary_responses(
    operation: &mut dyn StreamingOperation,
    reader: &mut dyn Read,
) -> Result<OperationResult> {
    loop {
        let response = BinaryResponse::read(reader)?;
        if let ResponseStep::Done(result) = operation.on_response(response) {
            return Ok(result);
        }
    }
}

/// Implements `Operation` for a type that already implements
/// `StreamingOperation` and has a `build()` returning its request segments
macro_rules! binary_operation {
    ($ty:ty) => {
        impl $crate::protocol::Operation for $ty {
            fn build_request(&mut self) -> Vec<bytes::Bytes> {
                self.build()
            }

            fn read_response(
                &mut self,
                reader: &mut dyn std::io::Read,
            ) -> $crate::error::Result<$crate::protocol::OperationResult> {
                $crate::protocol::read_binary_responses(self, reader)
            }

            fn as_streaming(&mut self) -> Option<&mut dyn $crate::protocol::StreamingOperation> {
                Some(self)
            }
        }
    };
}

pub(crate) use binary_operation;
