//! Node Tests
//!
//! Socket pool lifecycle, failure policies, SASL and operation execution
//! against an in-process fake server.

#[path = "../common/mod.rs"]
mod common;

mod execute_tests;
mod failure_tests;
