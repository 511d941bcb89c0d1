//! Pipelined multi-get
//!
//! One quiet GETQ per key followed by a NOOP. The server answers hits only,
//! then the NOOP, so the NOOP's correlation id marks the end of the batch.

use std::collections::HashMap;

use bytes::Bytes;

use crate::item::CacheItem;
use crate::protocol::operation::binary_operation;
use crate::protocol::{BinaryRequest, BinaryResponse, OpCode, OperationResult, ResponseStep, StreamingOperation};

#[derive(Debug)]
pub struct MultiGetOperation {
    keys: Vec<Bytes>,

    /// Correlation id of each GETQ to its key
    id_to_key: HashMap<u32, Bytes>,

    /// Correlation id of the trailing NOOP
    noop_id: Option<u32>,

    items: HashMap<Bytes, CacheItem>,
    cas: HashMap<Bytes, u64>,
}

impl MultiGetOperation {
    pub fn new<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Bytes>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            id_to_key: HashMap::new(),
            noop_id: None,
            items: HashMap::new(),
            cas: HashMap::new(),
        }
    }

    pub fn keys(&self) -> &[Bytes] {
        &self.keys
    }

    /// Items returned by the server, keyed by cache key
    pub fn items(&self) -> &HashMap<Bytes, CacheItem> {
        &self.items
    }

    pub fn take_items(&mut self) -> HashMap<Bytes, CacheItem> {
        std::mem::take(&mut self.items)
    }

    pub fn cas_values(&self) -> &HashMap<Bytes, u64> {
        &self.cas
    }

    fn build(&mut self) -> Vec<Bytes> {
        self.id_to_key.clear();
        self.items.clear();
        self.cas.clear();

        if self.keys.is_empty() {
            tracing::warn!("Empty multi-get");
            self.noop_id = None;
            return Vec::new();
        }

        tracing::debug!("Building multi-get for {} keys", self.keys.len());

        let mut buffers = Vec::with_capacity(self.keys.len() * 2 + 1);
        for key in &self.keys {
            let request = BinaryRequest::new(OpCode::GetQ).with_key(key.clone());
            request.write_segments(&mut buffers);
            self.id_to_key.insert(request.correlation_id, key.clone());
        }

        let noop = BinaryRequest::new(OpCode::NoOp);
        self.noop_id = Some(noop.correlation_id);
        noop.write_segments(&mut buffers);

        buffers
    }
}

impl StreamingOperation for MultiGetOperation {
    fn on_response(&mut self, response: BinaryResponse) -> ResponseStep {
        let id = response.correlation_id();

        if Some(id) == self.noop_id {
            return ResponseStep::Done(OperationResult::pass());
        }

        let Some(key) = self.id_to_key.get(&id) else {
            tracing::warn!(
                "Found response with correlation id {}, but no key is matching it",
                id
            );
            return ResponseStep::Continue;
        };

        if response.is_success() {
            tracing::trace!("Reading item {:?}", String::from_utf8_lossy(key));
            self.cas.insert(key.clone(), response.cas());
            self.items
                .insert(key.clone(), CacheItem::new(response.flags(), response.value.clone()));
        } else {
            // quiet gets only answer misses on servers that ignore the quiet flag
            tracing::trace!(
                "Multi-get miss for {:?} (status 0x{:04x})",
                String::from_utf8_lossy(key),
                response.status()
            );
        }

        ResponseStep::Continue
    }
}

binary_operation!(MultiGetOperation);
