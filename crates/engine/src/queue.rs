//! Queue operations
//!
//! A queue is a list at `queue:<name>` holding canonical JSON entries,
//! pushed at the tail and popped at the head. Canonical encoding sorts object
//! keys at every level, so removal by value matches regardless of the field
//! order the caller used.

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use relkv_concurrency::LockManager;
use relkv_core::codec::{canonical_json, parse_json};
use relkv_core::{Error, Result, Storage, StorageExt, StoreError};

use crate::store::RelationalStore;

fn encode<T: Serialize + ?Sized>(item: &T) -> Result<String> {
    let value = serde_json::to_value(item).map_err(StoreError::from)?;
    Ok(canonical_json(&value))
}

impl<S: Storage + ?Sized, L: LockManager + ?Sized> RelationalStore<S, L> {
    /// Append to a queue, returning its new size
    pub async fn enqueue<T: Serialize + Sync + ?Sized>(&self, queue: &str, item: &T) -> Result<u64> {
        self.scoped(async move {
            let entry = encode(item)?;
            let size = self.storage.rpush(&self.keys.queue_key(queue), entry).await?;
            debug!(target: "relkv::queue", queue, size, "enqueued");
            Ok(u64::try_from(size).unwrap_or(0))
        })
        .await
    }

    /// Pop the oldest entry, `None` when the queue is empty
    ///
    /// Entries come back as JSON; converting to a caller type happens after
    /// the pop, so a type mismatch can never cost the entry.
    pub async fn dequeue(&self, queue: &str) -> Result<Option<Value>> {
        self.scoped(async move {
            let Some(raw) = self.storage.lpop(&self.keys.queue_key(queue)).await? else {
                return Ok(None);
            };
            Ok(Some(parse_json(&raw)?))
        })
        .await
    }

    /// Remove one entry equal to `item`
    ///
    /// Fails with `QueueItemNotFound` when nothing matches.
    pub async fn remove_from_queue<T: Serialize + Sync + ?Sized>(
        &self,
        queue: &str,
        item: &T,
    ) -> Result<()> {
        if self.remove_from_queue_if_exists(queue, item).await? {
            Ok(())
        } else {
            Err(Error::QueueItemNotFound {
                queue: queue.to_string(),
            })
        }
    }

    /// Remove one entry equal to `item`, reporting whether one was removed
    pub async fn remove_from_queue_if_exists<T: Serialize + Sync + ?Sized>(
        &self,
        queue: &str,
        item: &T,
    ) -> Result<bool> {
        self.scoped(async move {
            let entry = encode(item)?;
            let removed = self
                .storage
                .lrem(&self.keys.queue_key(queue), 1, entry)
                .await?;
            Ok(removed > 0)
        })
        .await
    }

    /// Number of queued entries
    pub async fn get_queue_size(&self, queue: &str) -> Result<u64> {
        self.scoped(async move {
            let size = self.storage.llen(&self.keys.queue_key(queue)).await?;
            Ok(u64::try_from(size).unwrap_or(0))
        })
        .await
    }
}
