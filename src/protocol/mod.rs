//! Protocol Module
//!
//! Request framing and response parsing for the memcached binary protocol,
//! plus the small text protocol subset used by topology discovery.
//!
//! ## Binary Frame Format
//!
//! ```text
//! ┌───────────────────────────┬──────────┬───────┬─────────┐
//! │        Header (24)        │  Extras  │  Key  │  Value  │
//! └───────────────────────────┴──────────┴───────┴─────────┘
//! ```
//!
//! Requests start with magic 0x80, responses with 0x81. The opaque field
//! carries a correlation id that the server echoes back, which is how
//! pipelined multi-get responses are matched to their keys.
//!
//! ## Responsibilities
//! - `BinaryRequest` builds frames as segments for one vectored write
//! - `BinaryResponse::read` is the blocking parser, `ResponseDecoder` the
//!   non-blocking one; both produce the same `BinaryResponse`
//! - Operations implement `Operation` (request + response); binary ones also
//!   implement `StreamingOperation` so a single response handler serves both
//!   read paths

mod binary;
mod decoder;
mod opcode;
pub(crate) mod operation;
mod request;
mod response;
mod result;
pub mod text;

pub use binary::{
    ConcatOperation, DeleteOperation, FlushOperation, GetOperation, MultiGetOperation,
    MutatorOperation, NoOpOperation, SaslListOperation, SaslStartOperation, SaslStepOperation,
    StatsOperation, StoreOperation, VersionOperation,
};
pub use decoder::{DecoderState, ResponseDecoder};
pub use opcode::OpCode;
pub use operation::{read_binary_responses, Operation, ResponseStep, StreamingOperation};
pub use request::{next_correlation_id, BinaryRequest, HEADER_LENGTH, REQUEST_MAGIC};
pub use response::{BinaryResponse, ResponseHeader, MAX_BODY_LENGTH, RESPONSE_MAGIC};
pub use result::{OperationResult, ResponseStatus, ValueResult};
pub use text::{ConfigGetOperation, TextStatsOperation};
