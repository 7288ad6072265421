//! MemoryStore: in-process backing store
//!
//! Implements the `Storage` adapter with:
//! - `FxHashMap<String, Entry>` keyspace holding hashes and lists
//! - `parking_lot::RwLock` for thread-safe access
//! - Staged batch application: commands run against a copy-on-write overlay
//!   and are committed only if every command succeeds
//! - Round-trip statistics and failure injection for tests
//!
//! # Design Notes
//!
//! - **One lock per round trip**: a batch holds the write lock for its whole
//!   application, so no other round trip can observe a partially applied batch.
//! - **Empty containers vanish**: a hash or list whose last element is removed
//!   is deleted, matching the usual networked hash-store semantics.
//! - **No await under lock**: the optional simulated latency is awaited before
//!   the lock is taken.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use relkv_core::{Command, Reply, Storage, StoreError, StoreResult};

use crate::stats::{StoreStats, StoreStatsCounters};

/// A stored value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    /// Field -> value map
    Hash(BTreeMap<String, String>),
    /// Ordered list
    List(VecDeque<String>),
}

impl Entry {
    fn is_empty(&self) -> bool {
        match self {
            Entry::Hash(fields) => fields.is_empty(),
            Entry::List(items) => items.is_empty(),
        }
    }
}

/// Copy-on-write view over the keyspace used while applying a batch
struct Overlay<'a> {
    base: &'a FxHashMap<String, Entry>,
    staged: FxHashMap<String, Option<Entry>>,
}

impl<'a> Overlay<'a> {
    fn new(base: &'a FxHashMap<String, Entry>) -> Self {
        Self {
            base,
            staged: FxHashMap::default(),
        }
    }

    fn get(&self, key: &str) -> Option<&Entry> {
        match self.staged.get(key) {
            Some(staged) => staged.as_ref(),
            None => self.base.get(key),
        }
    }

    fn slot(&mut self, key: &str) -> &mut Option<Entry> {
        let base = self.base;
        self.staged
            .entry(key.to_string())
            .or_insert_with(|| base.get(key).cloned())
    }

    fn hash(&self, key: &str) -> StoreResult<Option<&BTreeMap<String, String>>> {
        match self.get(key) {
            None => Ok(None),
            Some(Entry::Hash(fields)) => Ok(Some(fields)),
            Some(Entry::List(_)) => Err(wrong_type(key, "hash")),
        }
    }

    fn hash_mut(&mut self, key: &str) -> StoreResult<&mut BTreeMap<String, String>> {
        let slot = self.slot(key);
        let entry = slot.get_or_insert_with(|| Entry::Hash(BTreeMap::new()));
        match entry {
            Entry::Hash(fields) => Ok(fields),
            Entry::List(_) => Err(wrong_type(key, "hash")),
        }
    }

    fn list(&self, key: &str) -> StoreResult<Option<&VecDeque<String>>> {
        match self.get(key) {
            None => Ok(None),
            Some(Entry::List(items)) => Ok(Some(items)),
            Some(Entry::Hash(_)) => Err(wrong_type(key, "list")),
        }
    }

    fn list_mut(&mut self, key: &str) -> StoreResult<&mut VecDeque<String>> {
        let slot = self.slot(key);
        let entry = slot.get_or_insert_with(|| Entry::List(VecDeque::new()));
        match entry {
            Entry::List(items) => Ok(items),
            Entry::Hash(_) => Err(wrong_type(key, "list")),
        }
    }

    fn apply(&mut self, command: Command) -> StoreResult<Reply> {
        match command {
            Command::HGet { key, field } => Ok(self
                .hash(&key)?
                .and_then(|fields| fields.get(&field).cloned())
                .map_or(Reply::Nil, Reply::Str)),
            Command::HMGet { key, fields } => {
                let hash = self.hash(&key)?;
                Ok(Reply::Array(
                    fields
                        .iter()
                        .map(|field| {
                            hash.and_then(|h| h.get(field).cloned())
                                .map_or(Reply::Nil, Reply::Str)
                        })
                        .collect(),
                ))
            }
            Command::HGetAll { key } => Ok(Reply::Pairs(
                self.hash(&key)?
                    .map(|fields| {
                        fields
                            .iter()
                            .map(|(f, v)| (f.clone(), v.clone()))
                            .collect()
                    })
                    .unwrap_or_default(),
            )),
            Command::HSet { key, field, value } => {
                let created = self.hash_mut(&key)?.insert(field, value).is_none();
                Ok(Reply::Int(i64::from(created)))
            }
            Command::HDel { key, field } => {
                if self.hash(&key)?.is_none() {
                    return Ok(Reply::Int(0));
                }
                let removed = self.hash_mut(&key)?.remove(&field).is_some();
                Ok(Reply::Int(i64::from(removed)))
            }
            Command::HIncrBy { key, field, delta } => {
                let fields = self.hash_mut(&key)?;
                let current = match fields.get(&field) {
                    Some(raw) => raw.parse::<i64>().map_err(|_| {
                        StoreError::BatchAborted(format!(
                            "field '{}' of '{}' is not an integer",
                            field, key
                        ))
                    })?,
                    None => 0,
                };
                let next = current.checked_add(delta).ok_or_else(|| {
                    StoreError::BatchAborted(format!("increment of '{}' overflows", field))
                })?;
                fields.insert(field, next.to_string());
                Ok(Reply::Int(next))
            }
            Command::HLen { key } => Ok(Reply::Int(
                self.hash(&key)?.map_or(0, |fields| fields.len() as i64),
            )),
            Command::Del { key } => {
                let existed = self.get(&key).is_some();
                *self.slot(&key) = None;
                Ok(Reply::Int(i64::from(existed)))
            }
            Command::RPush { key, value } => {
                let items = self.list_mut(&key)?;
                items.push_back(value);
                Ok(Reply::Int(items.len() as i64))
            }
            Command::LPop { key } => {
                if self.list(&key)?.is_none() {
                    return Ok(Reply::Nil);
                }
                Ok(self
                    .list_mut(&key)?
                    .pop_front()
                    .map_or(Reply::Nil, Reply::Str))
            }
            Command::LRem { key, count, value } => {
                if self.list(&key)?.is_none() {
                    return Ok(Reply::Int(0));
                }
                let items = self.list_mut(&key)?;
                let limit = if count == 0 { usize::MAX } else { count };
                let mut removed = 0usize;
                items.retain(|item| {
                    if removed < limit && *item == value {
                        removed += 1;
                        false
                    } else {
                        true
                    }
                });
                Ok(Reply::Int(removed as i64))
            }
            Command::LLen { key } => Ok(Reply::Int(
                self.list(&key)?.map_or(0, |items| items.len() as i64),
            )),
        }
    }

    fn into_staged(self) -> FxHashMap<String, Option<Entry>> {
        self.staged
    }
}

fn wrong_type(key: &str, expected: &'static str) -> StoreError {
    StoreError::WrongType {
        key: key.to_string(),
        expected,
    }
}

/// In-process backing store
///
/// Thread-safe through `parking_lot::RwLock`; share it behind an `Arc`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Keyspace
    data: RwLock<FxHashMap<String, Entry>>,
    /// Round trip and command counters
    counters: StoreStatsCounters,
    /// Number of upcoming round trips that fail before touching data
    pending_failures: AtomicU64,
    /// Round trips that still succeed before the pending failures start
    failure_delay: AtomicU64,
    /// Simulated network latency per round trip
    latency: Option<Duration>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store that waits `latency` before every round trip
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    /// Round trip and command counters since creation or last reset
    pub fn stats(&self) -> StoreStats {
        self.counters.snapshot()
    }

    /// Reset the round trip and command counters
    pub fn reset_stats(&self) {
        self.counters.reset();
    }

    /// Make the next `n` round trips fail wholly
    pub fn fail_next_round_trips(&self, n: u64) {
        self.fail_round_trips_after(0, n);
    }

    /// Let `skip` round trips through, then fail the following `n`
    pub fn fail_round_trips_after(&self, skip: u64, n: u64) {
        self.failure_delay.store(skip, Ordering::SeqCst);
        self.pending_failures.store(n, Ordering::SeqCst);
    }

    /// Number of keys currently stored
    pub fn key_count(&self) -> usize {
        self.data.read().len()
    }

    /// Copy of the entry under a key, bypassing the statistics
    pub fn entry(&self, key: &str) -> Option<Entry> {
        self.data.read().get(key).cloned()
    }

    fn take_injected_failure(&self) -> bool {
        if self.pending_failures.load(Ordering::SeqCst) == 0 {
            return false;
        }
        if self
            .failure_delay
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return false;
        }
        self.pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn apply_batch(&self, commands: Vec<Command>) -> StoreResult<Vec<Reply>> {
        let mut data = self.data.write();
        let (replies, staged) = {
            let mut overlay = Overlay::new(&data);
            let mut replies = Vec::with_capacity(commands.len());
            for command in commands {
                replies.push(overlay.apply(command)?);
            }
            (replies, overlay.into_staged())
        };

        for (key, entry) in staged {
            match entry {
                Some(entry) if !entry.is_empty() => {
                    data.insert(key, entry);
                }
                _ => {
                    data.remove(&key);
                }
            }
        }
        Ok(replies)
    }
}

#[async_trait]
impl Storage for MemoryStore {
    async fn execute(&self, command: Command) -> StoreResult<Reply> {
        let mut replies = self.execute_batch(vec![command]).await?;
        replies
            .pop()
            .ok_or_else(|| StoreError::BatchAborted("empty reply".to_string()))
    }

    async fn execute_batch(&self, commands: Vec<Command>) -> StoreResult<Vec<Reply>> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.counters.record(commands.len());
        if self.take_injected_failure() {
            return Err(StoreError::Connection("injected failure".to_string()));
        }
        self.apply_batch(commands)
    }

    async fn flush_all(&self) -> StoreResult<()> {
        self.counters.record(0);
        if self.take_injected_failure() {
            return Err(StoreError::Connection("injected failure".to_string()));
        }
        self.data.write().clear();
        Ok(())
    }
}
