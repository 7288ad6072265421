//! relkv - relational collections over a hash store
//!
//! relkv treats a key-value store that exposes hashes, lists and atomic
//! batches as typed collections of records with identity, secondary indexes,
//! one-to-one / one-to-many foreign keys, queues and per-resource locking.
//!
//! # Quick Start
//!
//! ```ignore
//! use relkv::{AddOptions, ForeignKey, RelationalStore};
//! use serde_json::json;
//!
//! let store = RelationalStore::ephemeral();
//!
//! store.add_item_to_collection(
//!     "guests",
//!     json!({"name": "Travolta"}),
//!     AddOptions::new().id("g5"),
//! ).await?;
//! store.add_item_to_collection(
//!     "peers",
//!     json!({"user": {"g5": null}}),
//!     AddOptions::new().id("p3").foreign_key("user", ForeignKey::one_to_many("guests")),
//! ).await?;
//!
//! // {"id": "p3", "user": {"g5": {"id": "g5", "name": "Travolta"}}}
//! let peer = store.get_item_in_collection("peers", "p3").await?;
//! ```
//!
//! # Architecture
//!
//! [`RelationalStore`] talks to the backing store only through the
//! [`Storage`] trait and to the lock service only through [`LockManager`].
//! [`MemoryStore`] and [`NamedLocks`] are the in-process implementations.

pub use relkv_concurrency::{LockGuard, LockManager, NamedLocks};
pub use relkv_core::*;
pub use relkv_engine::*;
pub use relkv_storage::{MemoryStore, StoreStats};
