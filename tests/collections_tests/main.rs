//! Collections Tests
//!
//! Lock-free free list, atomic reference swaps, the counting semaphore and
//! the socket input buffer.

mod buffer_tests;
mod semaphore_tests;
mod stack_tests;
