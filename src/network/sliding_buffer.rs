//! Sliding Buffer
//!
//! Input buffer of a socket: received chunks are appended at the tail and
//! consumed from the head without copying the remaining data around.

use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::{Bytes, BytesMut};

use crate::collections::InterlockedQueue;

/// Chunked FIFO byte buffer
///
/// Appends go through a lock-free queue and may come from any thread. Reads
/// take `&mut self`, so there is exactly one consumer.
pub struct SlidingBuffer {
    /// Received chunks not yet touched by the reader
    chunks: InterlockedQueue<Bytes>,

    /// Chunk currently being consumed
    front: Option<Bytes>,

    /// Bytes buffered across `front` and `chunks`
    available: AtomicUsize,
}

impl SlidingBuffer {
    pub fn new() -> Self {
        Self {
            chunks: InterlockedQueue::new(),
            front: None,
            available: AtomicUsize::new(0),
        }
    }

    /// Bytes ready to be read
    pub fn available(&self) -> usize {
        self.available.load(Ordering::Acquire)
    }

    /// Copy `data` into the buffer
    pub fn append(&self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        self.append_bytes(Bytes::copy_from_slice(data));
    }

    /// Queue an already owned chunk
    pub fn append_bytes(&self, chunk: Bytes) {
        if chunk.is_empty() {
            return;
        }
        let len = chunk.len();
        self.chunks.enqueue(chunk);
        // publish the length only after the chunk is reachable
        self.available.fetch_add(len, Ordering::Release);
    }

    /// Copy up to `buf.len()` bytes out, returning how many were copied
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        let mut read = 0;

        while read < buf.len() {
            let Some(front) = self.current_chunk() else {
                break;
            };

            let count = front.len().min(buf.len() - read);
            buf[read..read + count].copy_from_slice(&front[..count]);
            let _ = front.split_to(count);
            read += count;
        }

        self.available.fetch_sub(read, Ordering::AcqRel);
        read
    }

    /// Remove exactly `count` bytes, or nothing if fewer are buffered
    pub fn take(&mut self, count: usize) -> Option<Bytes> {
        if self.available() < count {
            return None;
        }
        if count == 0 {
            return Some(Bytes::new());
        }

        // fast path: the whole range sits in one chunk
        if let Some(front) = self.current_chunk() {
            if front.len() >= count {
                let data = front.split_to(count);
                self.available.fetch_sub(count, Ordering::AcqRel);
                return Some(data);
            }
        }

        let mut data = BytesMut::zeroed(count);
        let read = self.read(&mut data);
        debug_assert_eq!(read, count);
        Some(data.freeze())
    }

    /// Drop everything buffered, returning how many bytes were discarded
    pub fn clear(&mut self) -> usize {
        let discarded = self.available();
        self.front = None;
        self.chunks.clear();
        self.available.fetch_sub(discarded, Ordering::AcqRel);
        discarded
    }

    fn current_chunk(&mut self) -> Option<&mut Bytes> {
        loop {
            match self.front {
                Some(ref chunk) if !chunk.is_empty() => break,
                _ => {
                    self.front = Some(self.chunks.dequeue()?);
                }
            }
        }
        self.front.as_mut()
    }
}

impl Default for SlidingBuffer {
    fn default() -> Self {
        Self::new()
    }
}
