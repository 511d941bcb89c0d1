//! Client Tests
//!
//! End-to-end operations through `ClusterClient` against fake servers, and
//! configuration loading.

#[path = "../common/mod.rs"]
mod common;
