//! Cache items and operation modes
//!
//! The core never looks inside values: a transcoder outside the crate turns
//! typed values into a [`CacheItem`] and back.

use bytes::Bytes;

/// Serialized value plus the flags stored next to it on the server
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CacheItem {
    pub flags: u32,
    pub data: Bytes,
}

impl CacheItem {
    pub fn new(flags: u32, data: impl Into<Bytes>) -> Self {
        Self {
            flags,
            data: data.into(),
        }
    }
}

/// How a store request treats an existing key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    /// Store unconditionally
    Set,
    /// Store only if the key does not exist
    Add,
    /// Store only if the key exists
    Replace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationMode {
    Increment,
    Decrement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcatMode {
    Append,
    Prepend,
}
