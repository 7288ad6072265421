//! Relational engine for relkv
//!
//! This crate composes the lower layers into the caller-facing store:
//! - RelationalStore: facade over a `Storage` adapter and a `LockManager`
//! - Resolver: batched, level-by-level foreign-key hydration
//! - Collection operations: add, get, update, remove, counters
//! - Index maintenance: secondary index pointers kept in step with records
//! - Queue operations: FIFO lists of canonical JSON entries
//! - StoreConfig: TOML configuration and validation
//!
//! The engine is the only component that knows about:
//! - Lock scopes (collection-level for adds, item-level for updates)
//! - Mapping adapter errors into the caller taxonomy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod collection;
mod index;
pub mod queue;
mod resolver;
pub mod store;
pub mod typed;

pub use collection::{AddOptions, AddOutcome, RemoveOutcome};
pub use store::{RelationalStore, RelationalStoreBuilder, StoreConfig, CONFIG_FILE_NAME};
pub use typed::{TypedAdd, TypedCollection};
