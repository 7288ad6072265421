//! Storage layer for relkv
//!
//! This crate implements the in-process backing store:
//! - MemoryStore: hashes and lists behind a `parking_lot::RwLock`
//! - All-or-nothing batches applied through a staged overlay
//! - StoreStats: round trip counters used to verify batching bounds
//! - Failure injection and simulated latency for tests
//!
//! Networked stores implement the same `relkv_core::Storage` trait.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod memory;
pub mod stats;

pub use memory::{Entry, MemoryStore};
pub use stats::StoreStats;
