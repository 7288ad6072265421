//! Concurrency layer for relkv
//!
//! Serialized mutation is enforced with named locks, never with in-process
//! shared state: the engine acquires a lock named after the resource it
//! mutates (a whole collection for additions, `collection:id` for updates
//! and removals) and releases it when the operation finishes.
//!
//! - [`LockManager`]: the lock adapter contract (blocking acquire by name)
//! - [`LockGuard`]: release handle; releases on `release()` or on drop, so
//!   every exit path of an operation gives the resource back
//! - [`NamedLocks`]: in-process FIFO implementation

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod manager;

use async_trait::async_trait;
use relkv_core::StoreResult;
use std::fmt;

pub use manager::NamedLocks;

/// Named mutual-exclusion adapter
///
/// `acquire` suspends the caller until the named resource is free.
/// Distinct names must never block one another.
#[async_trait]
pub trait LockManager: Send + Sync {
    /// Acquire the lock named `resource`
    async fn acquire(&self, resource: &str) -> StoreResult<LockGuard>;
}

/// Release handle of an acquired lock
///
/// Dropping the guard releases the lock.
pub struct LockGuard {
    resource: String,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl LockGuard {
    /// Wrap a release callback for `resource`
    pub fn new(resource: impl Into<String>, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            resource: resource.into(),
            release: Some(Box::new(release)),
        }
    }

    /// Name of the locked resource
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Release the lock now
    pub fn release(mut self) {
        self.run_release();
    }

    fn run_release(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.run_release();
    }
}

impl fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuard")
            .field("resource", &self.resource)
            .field("held", &self.release.is_some())
            .finish()
    }
}
