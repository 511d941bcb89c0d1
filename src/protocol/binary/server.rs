//! Server level operations: stats, flush, noop, version

use std::collections::HashMap;

use bytes::{BufMut, Bytes, BytesMut};

use crate::protocol::operation::binary_operation;
use crate::protocol::{BinaryRequest, BinaryResponse, OpCode, OperationResult, ResponseStep, StreamingOperation};

use super::result_from_response;

// =============================================================================
// Stats
// =============================================================================

/// STAT request; the server streams one key/value response per statistic and
/// terminates the stream with an empty key
#[derive(Debug, Default)]
pub struct StatsOperation {
    group: Option<String>,
    stats: HashMap<String, String>,
    received: bool,
}

impl StatsOperation {
    /// General statistics
    pub fn new() -> Self {
        Self::default()
    }

    /// A statistics group such as "items" or "slabs"
    pub fn group(group: impl Into<String>) -> Self {
        Self {
            group: Some(group.into()),
            ..Self::default()
        }
    }

    pub fn stats(&self) -> &HashMap<String, String> {
        &self.stats
    }

    pub fn take_stats(&mut self) -> HashMap<String, String> {
        std::mem::take(&mut self.stats)
    }

    fn build(&mut self) -> Vec<Bytes> {
        self.stats.clear();
        self.received = false;

        let mut request = BinaryRequest::new(OpCode::Stat);
        if let Some(group) = self.group.as_ref().filter(|g| !g.is_empty()) {
            request = request.with_key(Bytes::copy_from_slice(group.as_bytes()));
        }
        request.to_segments()
    }
}

impl StreamingOperation for StatsOperation {
    fn on_response(&mut self, response: BinaryResponse) -> ResponseStep {
        if !response.is_success() {
            return ResponseStep::Done(result_from_response(&response));
        }

        if response.key.is_empty() {
            let mut result = if self.received {
                OperationResult::pass()
            } else {
                OperationResult::fail("Failed to read response")
            };
            result.status_code = Some(response.status());
            return ResponseStep::Done(result);
        }

        self.received = true;
        self.stats.insert(
            String::from_utf8_lossy(&response.key).into_owned(),
            String::from_utf8_lossy(&response.value).into_owned(),
        );
        ResponseStep::Continue
    }
}

binary_operation!(StatsOperation);

// =============================================================================
// Flush
// =============================================================================

/// Invalidate every item, optionally after a delay in seconds
#[derive(Debug, Default)]
pub struct FlushOperation {
    delay: u32,
}

impl FlushOperation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: u32) -> Self {
        Self { delay }
    }

    fn build(&mut self) -> Vec<Bytes> {
        let mut request = BinaryRequest::new(OpCode::Flush);
        if self.delay > 0 {
            let mut extras = BytesMut::with_capacity(4);
            extras.put_u32(self.delay);
            request = request.with_extras(extras.freeze());
        }
        request.to_segments()
    }
}

impl StreamingOperation for FlushOperation {
    fn on_response(&mut self, response: BinaryResponse) -> ResponseStep {
        ResponseStep::Done(result_from_response(&response))
    }
}

binary_operation!(FlushOperation);

// =============================================================================
// NoOp
// =============================================================================

#[derive(Debug, Default)]
pub struct NoOpOperation;

impl NoOpOperation {
    pub fn new() -> Self {
        Self
    }

    fn build(&mut self) -> Vec<Bytes> {
        BinaryRequest::new(OpCode::NoOp).to_segments()
    }
}

impl StreamingOperation for NoOpOperation {
    fn on_response(&mut self, response: BinaryResponse) -> ResponseStep {
        ResponseStep::Done(result_from_response(&response))
    }
}

binary_operation!(NoOpOperation);

// =============================================================================
// Version
// =============================================================================

#[derive(Debug, Default)]
pub struct VersionOperation {
    version: Option<String>,
}

impl VersionOperation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    fn build(&mut self) -> Vec<Bytes> {
        BinaryRequest::new(OpCode::Version).to_segments()
    }
}

impl StreamingOperation for VersionOperation {
    fn on_response(&mut self, response: BinaryResponse) -> ResponseStep {
        if response.is_success() {
            self.version = Some(String::from_utf8_lossy(&response.value).into_owned());
        }
        ResponseStep::Done(result_from_response(&response))
    }
}

binary_operation!(VersionOperation);
