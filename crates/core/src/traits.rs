//! Backing store abstraction
//!
//! The engine never talks to a concrete store. It issues [`Command`]s through
//! the [`Storage`] trait, either one at a time or as an atomic batch, and reads
//! back [`Reply`] values. This keeps the relational layer independent of the
//! store (an in-process [`MemoryStore`], a networked hash store, ...).
//!
//! ## Batch semantics
//!
//! `execute_batch` must behave like a store "multi": every queued command
//! executes as one indivisible unit and yields one reply per command, or the
//! whole batch fails and nothing is applied. One batch is one round trip.
//!
//! [`MemoryStore`]: ../../relkv_storage/struct.MemoryStore.html

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};

/// A single backing store command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Read one hash field
    HGet { key: String, field: String },
    /// Read several hash fields, one reply slot per field
    HMGet { key: String, fields: Vec<String> },
    /// Read every field of a hash
    HGetAll { key: String },
    /// Write one hash field
    HSet { key: String, field: String, value: String },
    /// Delete one hash field
    HDel { key: String, field: String },
    /// Increment an integer hash field, creating it at zero
    HIncrBy { key: String, field: String, delta: i64 },
    /// Number of fields in a hash
    HLen { key: String },
    /// Delete a whole key
    Del { key: String },
    /// Append to the tail of a list
    RPush { key: String, value: String },
    /// Pop from the head of a list
    LPop { key: String },
    /// Remove up to `count` entries equal to `value` (0 removes all)
    LRem { key: String, count: usize, value: String },
    /// Length of a list
    LLen { key: String },
}

impl Command {
    /// Key this command targets
    pub fn key(&self) -> &str {
        match self {
            Command::HGet { key, .. }
            | Command::HMGet { key, .. }
            | Command::HGetAll { key }
            | Command::HSet { key, .. }
            | Command::HDel { key, .. }
            | Command::HIncrBy { key, .. }
            | Command::HLen { key }
            | Command::Del { key }
            | Command::RPush { key, .. }
            | Command::LPop { key }
            | Command::LRem { key, .. }
            | Command::LLen { key } => key,
        }
    }

    /// True if the command only reads
    pub fn is_read_only(&self) -> bool {
        matches!(
            self,
            Command::HGet { .. }
                | Command::HMGet { .. }
                | Command::HGetAll { .. }
                | Command::HLen { .. }
                | Command::LLen { .. }
        )
    }
}

/// Reply to a single command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Absent value
    Nil,
    /// Integer result (counts, lengths, increments)
    Int(i64),
    /// String value
    Str(String),
    /// Positional multi-value result
    Array(Vec<Reply>),
    /// Field/value pairs, in store order
    Pairs(Vec<(String, String)>),
    /// Acknowledgement with no payload
    Ok,
}

impl Reply {
    /// Name of this reply shape, for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Reply::Nil => "nil",
            Reply::Int(_) => "int",
            Reply::Str(_) => "string",
            Reply::Array(_) => "array",
            Reply::Pairs(_) => "pairs",
            Reply::Ok => "ok",
        }
    }

    fn mismatch(&self, expected: &'static str) -> StoreError {
        StoreError::InvalidReply {
            expected,
            actual: self.kind().to_string(),
        }
    }

    /// Nil or string
    pub fn into_opt_string(self) -> StoreResult<Option<String>> {
        match self {
            Reply::Nil => Ok(None),
            Reply::Str(s) => Ok(Some(s)),
            other => Err(other.mismatch("string or nil")),
        }
    }

    /// Integer
    pub fn into_int(self) -> StoreResult<i64> {
        match self {
            Reply::Int(n) => Ok(n),
            other => Err(other.mismatch("int")),
        }
    }

    /// Positional array
    pub fn into_array(self) -> StoreResult<Vec<Reply>> {
        match self {
            Reply::Array(items) => Ok(items),
            other => Err(other.mismatch("array")),
        }
    }

    /// Field/value pairs
    pub fn into_pairs(self) -> StoreResult<Vec<(String, String)>> {
        match self {
            Reply::Pairs(pairs) => Ok(pairs),
            other => Err(other.mismatch("pairs")),
        }
    }
}

/// Backing store adapter
///
/// Thread safety: implementations are shared across tasks and must be
/// `Send + Sync`.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Execute one command as its own round trip
    async fn execute(&self, command: Command) -> StoreResult<Reply>;

    /// Execute a batch atomically as one round trip
    ///
    /// Returns one reply per command, in order, or fails wholly.
    async fn execute_batch(&self, commands: Vec<Command>) -> StoreResult<Vec<Reply>>;

    /// Remove every key in the store
    async fn flush_all(&self) -> StoreResult<()>;
}

/// Typed helpers over [`Storage`]
///
/// Implemented for every `Storage`; each helper is one round trip.
#[async_trait]
pub trait StorageExt: Storage {
    /// Read one hash field
    async fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        self.execute(Command::HGet {
            key: key.to_string(),
            field: field.to_string(),
        })
        .await?
        .into_opt_string()
    }

    /// Read several hash fields
    async fn hmget(&self, key: &str, fields: Vec<String>) -> StoreResult<Vec<Option<String>>> {
        self.execute(Command::HMGet {
            key: key.to_string(),
            fields,
        })
        .await?
        .into_array()?
        .into_iter()
        .map(Reply::into_opt_string)
        .collect()
    }

    /// Read a whole hash
    async fn hgetall(&self, key: &str) -> StoreResult<Vec<(String, String)>> {
        self.execute(Command::HGetAll {
            key: key.to_string(),
        })
        .await?
        .into_pairs()
    }

    /// Write one hash field
    async fn hset(&self, key: &str, field: &str, value: String) -> StoreResult<()> {
        self.execute(Command::HSet {
            key: key.to_string(),
            field: field.to_string(),
            value,
        })
        .await
        .map(|_| ())
    }

    /// Delete one hash field, returning how many fields were removed
    async fn hdel(&self, key: &str, field: &str) -> StoreResult<i64> {
        self.execute(Command::HDel {
            key: key.to_string(),
            field: field.to_string(),
        })
        .await?
        .into_int()
    }

    /// Increment an integer hash field, returning its new value
    async fn hincrby(&self, key: &str, field: &str, delta: i64) -> StoreResult<i64> {
        self.execute(Command::HIncrBy {
            key: key.to_string(),
            field: field.to_string(),
            delta,
        })
        .await?
        .into_int()
    }

    /// Number of fields in a hash
    async fn hlen(&self, key: &str) -> StoreResult<i64> {
        self.execute(Command::HLen {
            key: key.to_string(),
        })
        .await?
        .into_int()
    }

    /// Delete a key, returning how many keys were removed
    async fn del(&self, key: &str) -> StoreResult<i64> {
        self.execute(Command::Del {
            key: key.to_string(),
        })
        .await?
        .into_int()
    }

    /// Append to a list, returning its new length
    async fn rpush(&self, key: &str, value: String) -> StoreResult<i64> {
        self.execute(Command::RPush {
            key: key.to_string(),
            value,
        })
        .await?
        .into_int()
    }

    /// Pop the head of a list
    async fn lpop(&self, key: &str) -> StoreResult<Option<String>> {
        self.execute(Command::LPop {
            key: key.to_string(),
        })
        .await?
        .into_opt_string()
    }

    /// Remove matching list entries, returning how many were removed
    async fn lrem(&self, key: &str, count: usize, value: String) -> StoreResult<i64> {
        self.execute(Command::LRem {
            key: key.to_string(),
            count,
            value,
        })
        .await?
        .into_int()
    }

    /// Length of a list
    async fn llen(&self, key: &str) -> StoreResult<i64> {
        self.execute(Command::LLen {
            key: key.to_string(),
        })
        .await?
        .into_int()
    }
}

impl<S: Storage + ?Sized> StorageExt for S {}

/// Handle to a queued command's reply inside a [`Batch`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot(usize);

/// Builder for an atomic batch
///
/// Each queued command returns a [`Slot`] used to pick its reply out of the
/// executed batch.
///
/// ```rust,ignore
/// let mut batch = Batch::new();
/// let len = batch.hlen("guests");
/// batch.hset("guests", "guests:g1", payload);
/// let mut replies = batch.execute(&storage).await?;
/// let size = replies.take(len)?.into_int()?;
/// ```
#[derive(Debug, Default, Clone)]
pub struct Batch {
    commands: Vec<Command>,
}

impl Batch {
    /// Create an empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an arbitrary command
    pub fn push(&mut self, command: Command) -> Slot {
        self.commands.push(command);
        Slot(self.commands.len() - 1)
    }

    /// Queue a single-field read
    pub fn hget(&mut self, key: &str, field: &str) -> Slot {
        self.push(Command::HGet {
            key: key.to_string(),
            field: field.to_string(),
        })
    }

    /// Queue a multi-field read
    pub fn hmget(&mut self, key: &str, fields: Vec<String>) -> Slot {
        self.push(Command::HMGet {
            key: key.to_string(),
            fields,
        })
    }

    /// Queue a field write
    pub fn hset(&mut self, key: &str, field: &str, value: String) -> Slot {
        self.push(Command::HSet {
            key: key.to_string(),
            field: field.to_string(),
            value,
        })
    }

    /// Queue a field delete
    pub fn hdel(&mut self, key: &str, field: &str) -> Slot {
        self.push(Command::HDel {
            key: key.to_string(),
            field: field.to_string(),
        })
    }

    /// Queue a field increment
    pub fn hincrby(&mut self, key: &str, field: &str, delta: i64) -> Slot {
        self.push(Command::HIncrBy {
            key: key.to_string(),
            field: field.to_string(),
            delta,
        })
    }

    /// Queue a hash length read
    pub fn hlen(&mut self, key: &str) -> Slot {
        self.push(Command::HLen {
            key: key.to_string(),
        })
    }

    /// Queue a key delete
    pub fn del(&mut self, key: &str) -> Slot {
        self.push(Command::Del {
            key: key.to_string(),
        })
    }

    /// Number of queued commands
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// True if nothing is queued
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Execute every queued command as one atomic round trip
    pub async fn execute<S: Storage + ?Sized>(self, storage: &S) -> StoreResult<BatchReplies> {
        let expected = self.commands.len();
        let replies = storage.execute_batch(self.commands).await?;
        if replies.len() != expected {
            return Err(StoreError::BatchAborted(format!(
                "expected {} replies, got {}",
                expected,
                replies.len()
            )));
        }
        Ok(BatchReplies {
            replies: replies.into_iter().map(Some).collect(),
        })
    }
}

/// Replies of an executed [`Batch`]
#[derive(Debug)]
pub struct BatchReplies {
    replies: Vec<Option<Reply>>,
}

impl BatchReplies {
    /// Take the reply for a slot; each slot can be taken once
    pub fn take(&mut self, slot: Slot) -> StoreResult<Reply> {
        self.replies
            .get_mut(slot.0)
            .and_then(Option::take)
            .ok_or(StoreError::InvalidReply {
                expected: "unconsumed batch slot",
                actual: format!("slot {}", slot.0),
            })
    }
}
