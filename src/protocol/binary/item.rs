//! Single key operations

use bytes::{BufMut, Bytes, BytesMut};

use crate::item::{CacheItem, ConcatMode, MutationMode, StoreMode};
use crate::protocol::operation::binary_operation;
use crate::protocol::{BinaryRequest, BinaryResponse, OpCode, OperationResult, ResponseStep, StreamingOperation};

use super::result_from_response;

// =============================================================================
// Get
// =============================================================================

/// Fetch one item
#[derive(Debug)]
pub struct GetOperation {
    key: Bytes,
    opcode: OpCode,
    item: Option<CacheItem>,
    cas: u64,
}

impl GetOperation {
    pub fn new(key: impl Into<Bytes>) -> Self {
        Self {
            key: key.into(),
            opcode: OpCode::Get,
            item: None,
            cas: 0,
        }
    }

    /// Ask the server to echo the key in the response (GETK)
    pub fn with_key_echo(mut self) -> Self {
        self.opcode = OpCode::GetK;
        self
    }

    pub fn item(&self) -> Option<&CacheItem> {
        self.item.as_ref()
    }

    pub fn take_item(&mut self) -> Option<CacheItem> {
        self.item.take()
    }

    pub fn cas(&self) -> u64 {
        self.cas
    }

    fn build(&mut self) -> Vec<Bytes> {
        BinaryRequest::new(self.opcode)
            .with_key(self.key.clone())
            .to_segments()
    }
}

impl StreamingOperation for GetOperation {
    fn on_response(&mut self, response: BinaryResponse) -> ResponseStep {
        let result = result_from_response(&response);

        if response.is_success() {
            self.cas = response.cas();
            self.item = Some(CacheItem::new(response.flags(), response.value));
            tracing::trace!("Get succeeded for key {:?}", String::from_utf8_lossy(&self.key));
        } else {
            self.cas = 0;
            tracing::trace!(
                "Get failed for key {:?}: {}",
                String::from_utf8_lossy(&self.key),
                result
            );
        }

        ResponseStep::Done(result)
    }
}

binary_operation!(GetOperation);

// =============================================================================
// Store
// =============================================================================

/// Set, add or replace an item, optionally guarded by a CAS value
#[derive(Debug)]
pub struct StoreOperation {
    mode: StoreMode,
    key: Bytes,
    item: CacheItem,
    expires: u32,
    cas: u64,
}

impl StoreOperation {
    pub fn new(mode: StoreMode, key: impl Into<Bytes>, item: CacheItem, expires: u32) -> Self {
        Self {
            mode,
            key: key.into(),
            item,
            expires,
            cas: 0,
        }
    }

    /// Only store if the item still has this CAS value
    pub fn with_cas(mut self, cas: u64) -> Self {
        self.cas = cas;
        self
    }

    pub fn mode(&self) -> StoreMode {
        self.mode
    }

    fn build(&mut self) -> Vec<Bytes> {
        let opcode = match self.mode {
            StoreMode::Set => OpCode::Set,
            StoreMode::Add => OpCode::Add,
            StoreMode::Replace => OpCode::Replace,
        };

        let mut extras = BytesMut::with_capacity(8);
        extras.put_u32(self.item.flags);
        extras.put_u32(self.expires);

        BinaryRequest::new(opcode)
            .with_key(self.key.clone())
            .with_extras(extras.freeze())
            .with_value(self.item.data.clone())
            .with_cas(self.cas)
            .to_segments()
    }
}

impl StreamingOperation for StoreOperation {
    fn on_response(&mut self, response: BinaryResponse) -> ResponseStep {
        let result = result_from_response(&response);
        if !result.success {
            tracing::debug!(
                "Store failed for key {:?}: {}",
                String::from_utf8_lossy(&self.key),
                result
            );
        }
        ResponseStep::Done(result)
    }
}

binary_operation!(StoreOperation);

// =============================================================================
// Delete
// =============================================================================

#[derive(Debug)]
pub struct DeleteOperation {
    key: Bytes,
    cas: u64,
}

impl DeleteOperation {
    pub fn new(key: impl Into<Bytes>) -> Self {
        Self {
            key: key.into(),
            cas: 0,
        }
    }

    pub fn with_cas(mut self, cas: u64) -> Self {
        self.cas = cas;
        self
    }

    fn build(&mut self) -> Vec<Bytes> {
        BinaryRequest::new(OpCode::Delete)
            .with_key(self.key.clone())
            .with_cas(self.cas)
            .to_segments()
    }
}

impl StreamingOperation for DeleteOperation {
    fn on_response(&mut self, response: BinaryResponse) -> ResponseStep {
        ResponseStep::Done(result_from_response(&response))
    }
}

binary_operation!(DeleteOperation);

// =============================================================================
// Increment / Decrement
// =============================================================================

/// Increment or decrement a counter, creating it with `initial` if missing
#[derive(Debug)]
pub struct MutatorOperation {
    mode: MutationMode,
    key: Bytes,
    delta: u64,
    initial: u64,
    expires: u32,
    cas: u64,
    value: Option<u64>,
}

impl MutatorOperation {
    pub fn new(mode: MutationMode, key: impl Into<Bytes>, initial: u64, delta: u64, expires: u32) -> Self {
        Self {
            mode,
            key: key.into(),
            delta,
            initial,
            expires,
            cas: 0,
            value: None,
        }
    }

    pub fn with_cas(mut self, cas: u64) -> Self {
        self.cas = cas;
        self
    }

    /// Counter value after the mutation
    pub fn value(&self) -> Option<u64> {
        self.value
    }

    fn build(&mut self) -> Vec<Bytes> {
        let opcode = match self.mode {
            MutationMode::Increment => OpCode::Increment,
            MutationMode::Decrement => OpCode::Decrement,
        };

        let mut extras = BytesMut::with_capacity(20);
        extras.put_u64(self.delta);
        extras.put_u64(self.initial);
        extras.put_u32(self.expires);

        BinaryRequest::new(opcode)
            .with_key(self.key.clone())
            .with_extras(extras.freeze())
            .with_cas(self.cas)
            .to_segments()
    }
}

impl StreamingOperation for MutatorOperation {
    fn on_response(&mut self, response: BinaryResponse) -> ResponseStep {
        if !response.is_success() {
            return ResponseStep::Done(result_from_response(&response));
        }

        let data = &response.value;
        if data.len() != 8 {
            let mut result = OperationResult::fail(format!(
                "Result must be 8 bytes long, received: {}",
                data.len()
            ));
            result.status_code = Some(response.status());
            return ResponseStep::Done(result);
        }

        let mut raw = [0u8; 8];
        raw.copy_from_slice(data);
        self.value = Some(u64::from_be_bytes(raw));

        ResponseStep::Done(result_from_response(&response))
    }
}

binary_operation!(MutatorOperation);

// =============================================================================
// Append / Prepend
// =============================================================================

#[derive(Debug)]
pub struct ConcatOperation {
    mode: ConcatMode,
    key: Bytes,
    data: Bytes,
    cas: u64,
}

impl ConcatOperation {
    pub fn new(mode: ConcatMode, key: impl Into<Bytes>, data: impl Into<Bytes>) -> Self {
        Self {
            mode,
            key: key.into(),
            data: data.into(),
            cas: 0,
        }
    }

    pub fn with_cas(mut self, cas: u64) -> Self {
        self.cas = cas;
        self
    }

    fn build(&mut self) -> Vec<Bytes> {
        let opcode = match self.mode {
            ConcatMode::Append => OpCode::Append,
            ConcatMode::Prepend => OpCode::Prepend,
        };

        BinaryRequest::new(opcode)
            .with_key(self.key.clone())
            .with_value(self.data.clone())
            .with_cas(self.cas)
            .to_segments()
    }
}

impl StreamingOperation for ConcatOperation {
    fn on_response(&mut self, response: BinaryResponse) -> ResponseStep {
        ResponseStep::Done(result_from_response(&response))
    }
}

binary_operation!(ConcatOperation);
