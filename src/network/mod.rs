//! Network Module
//!
//! TCP transport used by the node connection pools.
//!
//! ## Architecture
//! - One `PooledSocket` per TCP connection, checked out to one operation at a time
//! - Received bytes land in a `SlidingBuffer`, shared by the blocking reads and
//!   the non-blocking response decoder
//! - Any I/O error flips the socket's alive flag; a dead socket is never
//!   returned to a free list

mod socket;
mod sliding_buffer;

pub use socket::PooledSocket;
pub use sliding_buffer::SlidingBuffer;
