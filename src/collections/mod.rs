//! Collections Module
//!
//! Concurrency primitives shared by the connection pools, the server pool and
//! the streaming input buffer.
//!
//! ## Responsibilities
//! - Lock-free free list of idle sockets (CAS-loop stack)
//! - Lock-free FIFO of received chunks
//! - Atomically swappable shared references (locator, node array, node pool)
//! - Counting semaphore bounding the sockets of a pool
//!
//! ## Memory Reclamation
//! Nodes unlinked by a CAS loop are retired through `crossbeam::epoch`, so a
//! concurrent reader never dereferences freed memory.

mod stack;
mod queue;
mod atomic_arc;
mod semaphore;

pub use stack::InterlockedStack;
pub use queue::InterlockedQueue;
pub use atomic_arc::AtomicArc;
pub use semaphore::Semaphore;
