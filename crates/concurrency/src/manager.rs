//! In-process named lock manager
//!
//! Each resource name maps to a `tokio::sync::Mutex<()>` stored in a
//! `DashMap`. Tokio's mutex queues waiters in FIFO order, so concurrent
//! acquirers of one name are served strictly in acquisition order.
//!
//! Entries are pruned on release once no other task holds or waits on them.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::trace;

use relkv_core::StoreResult;

use crate::{LockGuard, LockManager};

type LockTable = DashMap<String, Arc<Mutex<()>>>;

/// FIFO named locks for a single process
#[derive(Debug, Default, Clone)]
pub struct NamedLocks {
    locks: Arc<LockTable>,
}

impl NamedLocks {
    /// Create an empty lock table
    pub fn new() -> Self {
        Self::default()
    }

    /// True if `resource` is currently held
    pub fn is_held(&self, resource: &str) -> bool {
        self.locks
            .get(resource)
            .map_or(false, |mutex| mutex.try_lock().is_err())
    }

    /// Number of names with a holder or waiter
    pub fn active(&self) -> usize {
        self.locks.len()
    }

    fn mutex_for(&self, resource: &str) -> Arc<Mutex<()>> {
        // Clone under the shard lock so pruning cannot race with a new waiter
        self.locks
            .entry(resource.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[async_trait]
impl LockManager for NamedLocks {
    async fn acquire(&self, resource: &str) -> StoreResult<LockGuard> {
        let guard = self.mutex_for(resource).lock_owned().await;
        trace!(resource, "lock acquired");

        let table = Arc::clone(&self.locks);
        let name = resource.to_string();
        Ok(LockGuard::new(resource, move || {
            drop(guard);
            table.remove_if(&name, |_, mutex| Arc::strong_count(mutex) == 1);
            trace!(resource = %name, "lock released");
        }))
    }
}
