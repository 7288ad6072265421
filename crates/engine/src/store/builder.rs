//! Builder for RelationalStore
//!
//! ```ignore
//! use relkv_engine::RelationalStore;
//!
//! // In-process adapters, default config
//! let store = RelationalStore::builder().build()?;
//!
//! // Custom adapters, namespaced keys, silent logging
//! let store = RelationalStore::builder()
//!     .storage(Arc::new(my_store))
//!     .locks(Arc::new(my_locks))
//!     .namespace("app")
//!     .quiet()
//!     .build()?;
//! ```

use std::sync::Arc;

use tracing::Dispatch;

use relkv_concurrency::{LockManager, NamedLocks};
use relkv_core::{Result, Storage};
use relkv_storage::MemoryStore;

use super::{RelationalStore, StoreConfig};

/// Builder for [`RelationalStore`]
pub struct RelationalStoreBuilder<S: Storage + ?Sized = MemoryStore, L: LockManager + ?Sized = NamedLocks>
{
    storage: Arc<S>,
    locks: Arc<L>,
    config: StoreConfig,
    dispatch: Option<Dispatch>,
}

impl RelationalStoreBuilder<MemoryStore, NamedLocks> {
    /// Builder with in-process adapters and default config
    pub fn new() -> Self {
        Self {
            storage: Arc::new(MemoryStore::new()),
            locks: Arc::new(NamedLocks::new()),
            config: StoreConfig::default(),
            dispatch: None,
        }
    }
}

impl Default for RelationalStoreBuilder<MemoryStore, NamedLocks> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Storage + ?Sized, L: LockManager + ?Sized> RelationalStoreBuilder<S, L> {
    /// Use a different backing store adapter
    pub fn storage<S2: Storage + ?Sized>(self, storage: Arc<S2>) -> RelationalStoreBuilder<S2, L> {
        RelationalStoreBuilder {
            storage,
            locks: self.locks,
            config: self.config,
            dispatch: self.dispatch,
        }
    }

    /// Use a different lock adapter
    pub fn locks<L2: LockManager + ?Sized>(self, locks: Arc<L2>) -> RelationalStoreBuilder<S, L2> {
        RelationalStoreBuilder {
            storage: self.storage,
            locks,
            config: self.config,
            dispatch: self.dispatch,
        }
    }

    /// Replace the whole config
    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the key and lock namespace
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.config.namespace = Some(namespace.into());
        self
    }

    /// Log through this dispatcher
    pub fn dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    /// Discard all log output
    pub fn quiet(self) -> Self {
        self.dispatch(Dispatch::none())
    }

    /// Validate the config and build the store
    ///
    /// Without an explicit dispatcher the store logs to the default
    /// dispatcher current at build time.
    pub fn build(self) -> Result<RelationalStore<S, L>> {
        self.config.validate()?;
        let dispatch = match self.dispatch {
            Some(dispatch) => dispatch,
            None => tracing::dispatcher::get_default(Dispatch::clone),
        };
        Ok(RelationalStore::from_parts(
            self.storage,
            self.locks,
            self.config.keyspace(),
            dispatch,
        ))
    }
}
