//! RelationalStore: the caller-facing facade
//!
//! ## Design
//!
//! `RelationalStore` holds no record state. It keeps an `Arc` to the backing
//! store adapter, an `Arc` to the lock adapter, the key naming derived from
//! its config and the `tracing` dispatcher its operations log through.
//! Cloning a store is cheap and every clone shares the same adapters.
//!
//! ## Operation surface
//!
//! - Collections (`collection.rs`): add, get, get-many, get-by-index, get-all,
//!   exists, update, remove, remove-by-index, remove-collection, counters
//! - Queues (`queue.rs`): enqueue, dequeue, remove, size
//! - `flush` wipes the whole backing store
//!
//! Every operation returns `relkv_core::Result`; no adapter error crosses
//! the facade unmapped.
//!
//! ## Logging
//!
//! Operations run with the store's own dispatcher installed as the default
//! for their duration, so a store built with `.quiet()` is silent even when
//! the process has a global subscriber.

mod builder;
mod config;

pub use builder::RelationalStoreBuilder;
pub use config::{StoreConfig, CONFIG_FILE_NAME};

use std::future::Future;
use std::sync::Arc;

use tracing::instrument::WithSubscriber;
use tracing::{info, Dispatch};

use relkv_concurrency::{LockManager, NamedLocks};
use relkv_core::{Error, Keyspace, Result, Storage};
use relkv_storage::MemoryStore;

/// Relational layer over a hash store
pub struct RelationalStore<S: Storage + ?Sized = MemoryStore, L: LockManager + ?Sized = NamedLocks>
{
    pub(crate) storage: Arc<S>,
    pub(crate) locks: Arc<L>,
    pub(crate) keys: Keyspace,
    pub(crate) dispatch: Dispatch,
}

impl<S: Storage + ?Sized, L: LockManager + ?Sized> Clone for RelationalStore<S, L> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            locks: Arc::clone(&self.locks),
            keys: self.keys.clone(),
            dispatch: self.dispatch.clone(),
        }
    }
}

impl RelationalStore<MemoryStore, NamedLocks> {
    /// Builder starting from an in-process store and in-process locks
    pub fn builder() -> RelationalStoreBuilder<MemoryStore, NamedLocks> {
        RelationalStoreBuilder::new()
    }

    /// In-process store with default config, logging to the current default dispatcher
    pub fn ephemeral() -> Self {
        Self::from_parts(
            Arc::new(MemoryStore::new()),
            Arc::new(NamedLocks::new()),
            Keyspace::default(),
            tracing::dispatcher::get_default(Dispatch::clone),
        )
    }
}

impl<S: Storage + ?Sized, L: LockManager + ?Sized> RelationalStore<S, L> {
    pub(crate) fn from_parts(
        storage: Arc<S>,
        locks: Arc<L>,
        keys: Keyspace,
        dispatch: Dispatch,
    ) -> Self {
        Self {
            storage,
            locks,
            keys,
            dispatch,
        }
    }

    /// Backing store adapter
    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    /// Lock adapter
    pub fn locks(&self) -> &Arc<L> {
        &self.locks
    }

    /// Key naming in use
    pub fn keyspace(&self) -> &Keyspace {
        &self.keys
    }

    /// Run an operation with this store's dispatcher as the default
    pub(crate) fn scoped<'a, T>(
        &'a self,
        operation: impl Future<Output = T> + Send + 'a,
    ) -> impl Future<Output = T> + Send + 'a {
        operation.with_subscriber(self.dispatch.clone())
    }

    /// Wipe every key in the backing store
    ///
    /// Intended for tests and operational resets only.
    pub async fn flush(&self) -> Result<()> {
        self.scoped(async move {
            self.storage.flush_all().await.map_err(Error::from)?;
            info!(namespace = %self.keys, "flushed backing store");
            Ok(())
        })
        .await
    }
}
