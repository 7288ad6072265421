//! Core types and traits for relkv
//!
//! This crate defines the foundational types used throughout the system:
//! - Error: caller-facing taxonomy and adapter-level `StoreError`
//! - Keyspace: naming of collection, index and queue keys and lock names
//! - RecordMetadata: the stored envelope (value, id, foreign keys, index pointers)
//! - ForeignKey: one-to-one / one-to-many relation declarations
//! - ResolvedRecord: a record with its foreign records attached
//! - Codec: metadata JSON and canonical JSON for queue items
//! - Traits: the async `Storage` adapter, its command/reply model and `Batch`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod error;
pub mod record;
pub mod resolved;
pub mod traits;
pub mod types;

pub use error::{Error, Result, StoreError, StoreResult};
pub use record::{
    id_set, index_text, ForeignKey, ForeignKeys, IndexedIn, Item, RecordMetadata, ID_FIELD,
};
pub use resolved::ResolvedRecord;
pub use traits::{Batch, BatchReplies, Command, Reply, Slot, Storage, StorageExt};
pub use types::{
    Keyspace, COLLECTION_LOCK_SUFFIX, DEFAULT_COUNTER_FIELD, DEFAULT_QUEUE_PREFIX, INDEX_SEPARATOR,
};
