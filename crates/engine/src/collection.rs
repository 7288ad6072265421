//! Collection operations
//!
//! A collection `c` is one hash:
//!
//! | Field | Value |
//! |-------|-------|
//! | `c:<id>` | JSON [`RecordMetadata`] |
//! | `_index` | decimal id counter |
//!
//! Writes are serialized through the lock adapter: adds and collection
//! removal hold the collection lock, updates and removals hold the item lock
//! `c:<id>`. Guards release on drop, so every exit path frees the resource.
//!
//! Reads take no lock. They fetch shallow metadata in one round trip and hand
//! it to the [`Resolver`], which hydrates foreign keys one batch per depth.

use std::collections::BTreeSet;
use std::convert::Infallible;
use std::fmt::Display;
use std::future::{ready, Future};

use serde_json::Value;
use tracing::{info, warn};

use relkv_concurrency::LockManager;
use relkv_core::codec::{decode_counter, decode_metadata, encode_metadata};
use relkv_core::{
    index_text, Batch, Error, ForeignKey, ForeignKeys, Item, RecordMetadata, Result, Storage,
    StorageExt, ID_FIELD,
};

use crate::index;
use crate::resolver::Resolver;
use crate::store::RelationalStore;

/// Options for [`RelationalStore::add_item_to_collection`]
#[derive(Debug, Clone, Default)]
pub struct AddOptions {
    id: Option<String>,
    index_by: Vec<String>,
    foreign_keys: ForeignKeys,
}

impl AddOptions {
    /// No explicit id, no indexes, no foreign keys
    pub fn new() -> Self {
        Self::default()
    }

    /// Store under this id instead of an assigned one
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Maintain a secondary index on `field`
    pub fn index_by(mut self, field: impl Into<String>) -> Self {
        self.index_by.push(field.into());
        self
    }

    /// Declare `field` as a foreign key
    pub fn foreign_key(mut self, field: impl Into<String>, relation: ForeignKey) -> Self {
        self.foreign_keys.insert(field.into(), relation);
        self
    }

    /// Replace every foreign-key declaration
    pub fn foreign_keys(mut self, foreign_keys: ForeignKeys) -> Self {
        self.foreign_keys = foreign_keys;
        self
    }
}

/// Result of an add
#[derive(Debug, Clone, PartialEq)]
pub struct AddOutcome {
    /// The stored record, hydrated
    pub item: Item,
    /// Counter value after the add
    pub index: u64,
    /// Number of records in the collection after the add
    pub length: u64,
}

/// Result of a removal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoveOutcome {
    /// Counter value at removal time
    pub index: u64,
    /// Number of records left in the collection
    pub length: u64,
}

impl<S: Storage + ?Sized, L: LockManager + ?Sized> RelationalStore<S, L> {
    /// Add (or replace) a record
    ///
    /// The id is, in order of precedence: `options.id`, an `id` field in
    /// `value`, or the collection counter plus one. The counter is always
    /// incremented. The `id` field itself is never stored in the value.
    ///
    /// Holds the collection lock, then the item lock of the resolved id.
    ///
    /// # Errors
    ///
    /// - `CollectionAdditionFailure` when `value` is not an object or the
    ///   write batch fails; nothing is applied in that case.
    /// - `CollectionFieldInexistent` when a declared foreign id is missing.
    ///   The record is stored before hydration reports the gap.
    /// - `GenericRedisFailure` for any other adapter failure.
    pub async fn add_item_to_collection(
        &self,
        collection: &str,
        value: Value,
        options: AddOptions,
    ) -> Result<AddOutcome> {
        self.scoped(async move {
            let Value::Object(mut value) = value else {
                return Err(addition_failure(collection, "value must be a JSON object"));
            };
            let embedded_id = value.remove(ID_FIELD);

            let _guard = self
                .locks
                .acquire(&self.keys.collection_lock(collection))
                .await?;

            let id = match options.id.or_else(|| embedded_id.as_ref().and_then(id_text)) {
                Some(id) => id,
                None => (self.read_counter(collection).await? + 1).to_string(),
            };
            // a re-add replaces the record, so it must not interleave with updates
            let _item_guard = self
                .locks
                .acquire(&self.keys.item_lock(collection, &id))
                .await?;
            let previous = self.read_metadata(collection, &id).await?;

            let indexed_in =
                index::indexed_in_for(&self.keys, collection, &value, &options.index_by);
            let meta = RecordMetadata {
                value,
                id: id.clone(),
                foreign_keys: options.foreign_keys,
                indexed_in,
            };
            let stale = match &previous {
                Some(prev) => {
                    let candidates = index::stale_pointers(&prev.indexed_in, &meta.indexed_in);
                    index::owned_by(self.storage.as_ref(), &self.keys, candidates, &id).await?
                }
                None => Vec::new(),
            };

            let key = self.keys.collection_key(collection);
            let field = self.keys.item_field(collection, &id);
            let mut batch = Batch::new();
            batch.hset(&key, &field, encode_metadata(&meta)?);
            let counter = batch.hincrby(&key, self.keys.counter_field(), 1);
            let size = batch.hlen(&key);
            let written = batch.hget(&key, &field);
            index::stage_set(&mut batch, &self.keys, None, &meta.indexed_in, &id);
            index::stage_delete(&mut batch, &self.keys, &stale);

            let mut replies = batch
                .execute(self.storage.as_ref())
                .await
                .map_err(|e| addition_failure(collection, e))?;
            let index = non_negative(replies.take(counter)?.into_int()?);
            let length = non_negative(replies.take(size)?.into_int()? - 1);
            if replies.take(written)?.into_opt_string()?.is_none() {
                return Err(Error::field_inexistent(collection, id));
            }

            let item = self.get_one(collection, &id).await?;
            info!(
                target: "relkv::collection",
                collection,
                id = %id,
                length,
                replaced = previous.is_some(),
                "added item"
            );
            Ok(AddOutcome {
                item,
                index,
                length,
            })
        })
        .await
    }

    /// Fetch one hydrated record
    pub async fn get_item_in_collection(&self, collection: &str, id: &str) -> Result<Item> {
        self.scoped(self.get_one(collection, id)).await
    }

    /// Fetch several hydrated records, all or nothing
    ///
    /// Results follow the order of `ids`.
    pub async fn get_items_in_collection<I, T>(&self, collection: &str, ids: I) -> Result<Vec<Item>>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let ids: Vec<String> = ids.into_iter().map(Into::into).collect();
        self.scoped(async move {
            let roots = self.fetch_shallow(collection, ids).await?;
            self.hydrate(collection, roots).await
        })
        .await
    }

    /// Fetch the record whose indexed `field` equals `value`
    pub async fn get_item_in_collection_by(
        &self,
        collection: &str,
        field: &str,
        value: impl Into<Value>,
    ) -> Result<Item> {
        let value = value.into();
        self.scoped(async move {
            let id = self.lookup_index(collection, field, &value).await?;
            self.get_one(collection, &id).await
        })
        .await
    }

    /// Fetch every record of a collection, in store order
    ///
    /// All records are resolved together, so shared foreign records are
    /// fetched once.
    pub async fn get_all_items_in_collection(&self, collection: &str) -> Result<Vec<Item>> {
        self.scoped(async move {
            let fields = self
                .storage
                .hgetall(&self.keys.collection_key(collection))
                .await?;
            let roots = fields
                .into_iter()
                .filter(|(field, _)| self.keys.id_from_field(collection, field).is_some())
                .map(|(_, raw)| decode_metadata(&raw).map_err(Error::from))
                .collect::<Result<Vec<_>>>()?;
            self.hydrate(collection, roots).await
        })
        .await
    }

    /// True if the record exists and fully resolves
    pub async fn is_item_in_collection(&self, collection: &str, id: &str) -> bool {
        self.get_item_in_collection(collection, id).await.is_ok()
    }

    /// True if the index lookup succeeds and the record fully resolves
    pub async fn is_item_in_collection_by(
        &self,
        collection: &str,
        field: &str,
        value: impl Into<Value>,
    ) -> bool {
        self.get_item_in_collection_by(collection, field, value)
            .await
            .is_ok()
    }

    /// Shallow-merge `patch` into a record
    ///
    /// `foreign_keys` must equal the stored declaration.
    pub async fn update_item_in_collection(
        &self,
        collection: &str,
        id: &str,
        patch: Value,
        foreign_keys: &ForeignKeys,
    ) -> Result<Item> {
        self.update_item_in_collection_with(collection, id, foreign_keys, move |_| {
            ready(Ok::<_, Infallible>(patch))
        })
        .await
    }

    /// Merge the output of `transform` into a record
    ///
    /// `transform` receives the stored value without its foreign-key fields
    /// and runs while the item lock is held. An error from it aborts the
    /// update with `CollectionUpdateFailure`.
    pub async fn update_item_in_collection_with<F, Fut, E>(
        &self,
        collection: &str,
        id: &str,
        foreign_keys: &ForeignKeys,
        transform: F,
    ) -> Result<Item>
    where
        F: FnOnce(Item) -> Fut + Send,
        Fut: Future<Output = std::result::Result<Value, E>> + Send,
        E: Display,
    {
        self.scoped(async move {
            let _guard = self
                .locks
                .acquire(&self.keys.item_lock(collection, id))
                .await?;

            let meta = self
                .read_metadata(collection, id)
                .await?
                .ok_or_else(|| Error::field_inexistent(collection, id))?;
            if &meta.foreign_keys != foreign_keys {
                warn!(target: "relkv::collection", collection, id, "foreign keys mismatch");
                return Err(Error::MismatchingForeignKeys {
                    collection: collection.to_string(),
                    id: id.to_string(),
                });
            }

            let patch = transform(meta.value_without_foreign_fields())
                .await
                .map_err(|e| update_failure(collection, id, e))?;
            let Value::Object(mut patch) = patch else {
                return Err(update_failure(collection, id, "patch must be a JSON object"));
            };
            patch.remove(ID_FIELD);

            let mut next = meta.clone();
            next.value.extend(patch);
            next.indexed_in =
                index::refreshed(&self.keys, collection, &meta.indexed_in, &next.value);
            let candidates = index::stale_pointers(&meta.indexed_in, &next.indexed_in);
            let stale = index::owned_by(self.storage.as_ref(), &self.keys, candidates, id).await?;

            let mut batch = Batch::new();
            batch.hset(
                &self.keys.collection_key(collection),
                &self.keys.item_field(collection, id),
                encode_metadata(&next)?,
            );
            index::stage_set(
                &mut batch,
                &self.keys,
                Some(&meta.indexed_in),
                &next.indexed_in,
                id,
            );
            index::stage_delete(&mut batch, &self.keys, &stale);
            batch
                .execute(self.storage.as_ref())
                .await
                .map_err(|e| update_failure(collection, id, e))?;

            info!(
                target: "relkv::collection",
                collection,
                id,
                reindexed = stale.len(),
                "updated item"
            );
            self.get_one(collection, id).await
        })
        .await
    }

    /// Delete a record and its index pointers
    pub async fn remove_item_in_collection(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<RemoveOutcome> {
        self.scoped(async move {
            let _guard = self
                .locks
                .acquire(&self.keys.item_lock(collection, id))
                .await?;

            let meta = self
                .read_metadata(collection, id)
                .await?
                .ok_or_else(|| Error::field_inexistent(collection, id))?;

            let key = self.keys.collection_key(collection);
            let mut batch = Batch::new();
            batch.hdel(&key, &self.keys.item_field(collection, id));
            let counter = batch.hget(&key, self.keys.counter_field());
            let size = batch.hlen(&key);
            let mut replies = batch
                .execute(self.storage.as_ref())
                .await
                .map_err(|e| deletion_failure(collection, e))?;
            let counter = replies.take(counter)?.into_opt_string()?;
            let size = replies.take(size)?.into_int()?;
            let length = record_count(size, counter.is_some());
            let index = self.parse_counter(collection, counter)?;

            if let Err(e) = self.drop_pointers(&meta).await {
                warn!(
                    target: "relkv::collection",
                    collection,
                    id,
                    error = %e,
                    "index cleanup failed after removal"
                );
                return Err(deletion_failure(collection, e));
            }

            info!(target: "relkv::collection", collection, id, length, "removed item");
            Ok(RemoveOutcome { index, length })
        })
        .await
    }

    /// Delete the record whose indexed `field` equals `value`
    ///
    /// Every failure is reported as `CollectionFieldInexistent`.
    pub async fn remove_item_in_collection_by(
        &self,
        collection: &str,
        field: &str,
        value: impl Into<Value>,
    ) -> Result<RemoveOutcome> {
        let value = value.into();
        self.scoped(async move {
            let missing = || {
                Error::field_inexistent(collection, index_text(&value).unwrap_or_default())
            };
            let id = self
                .lookup_index(collection, field, &value)
                .await
                .map_err(|_| missing())?;
            self.remove_item_in_collection(collection, &id)
                .await
                .map_err(|_| missing())
        })
        .await
    }

    /// Delete a collection and every index hash its records point into
    pub async fn remove_collection(&self, collection: &str) -> Result<()> {
        self.scoped(async move {
            let _guard = self
                .locks
                .acquire(&self.keys.collection_lock(collection))
                .await?;

            let key = self.keys.collection_key(collection);
            let fields = self
                .storage
                .hgetall(&key)
                .await
                .map_err(|e| deletion_failure(collection, e))?;

            let mut index_keys = BTreeSet::new();
            for (field, raw) in fields {
                if self.keys.id_from_field(collection, &field).is_none() {
                    continue;
                }
                match decode_metadata(&raw) {
                    Ok(meta) => {
                        index_keys.extend(meta.indexed_in.keys().map(|n| self.keys.index_key(n)))
                    }
                    Err(e) => warn!(
                        target: "relkv::collection",
                        collection,
                        field = %field,
                        error = %e,
                        "skipping undecodable record"
                    ),
                }
            }

            let mut batch = Batch::new();
            batch.del(&key);
            for index_key in &index_keys {
                batch.del(index_key);
            }
            batch
                .execute(self.storage.as_ref())
                .await
                .map_err(|e| deletion_failure(collection, e))?;

            info!(
                target: "relkv::collection",
                collection,
                indexes = index_keys.len(),
                "removed collection"
            );
            Ok(())
        })
        .await
    }

    /// Current id counter; 0 for a collection never added to
    pub async fn get_collection_index(&self, collection: &str) -> Result<u64> {
        self.scoped(self.read_counter(collection)).await
    }

    /// Number of records, not counting the reserved counter field
    pub async fn get_collection_length(&self, collection: &str) -> Result<u64> {
        self.scoped(async move {
            let key = self.keys.collection_key(collection);
            let mut batch = Batch::new();
            let size = batch.hlen(&key);
            let counter = batch.hget(&key, self.keys.counter_field());
            let mut replies = batch.execute(self.storage.as_ref()).await?;
            let size = replies.take(size)?.into_int()?;
            let has_counter = replies.take(counter)?.into_opt_string()?.is_some();
            Ok(record_count(size, has_counter))
        })
        .await
    }

    pub(crate) async fn get_one(&self, collection: &str, id: &str) -> Result<Item> {
        let roots = self.fetch_shallow(collection, vec![id.to_string()]).await?;
        self.hydrate(collection, roots)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::field_inexistent(collection, id))
    }

    /// One HMGET; any absent id fails the whole read
    async fn fetch_shallow(&self, collection: &str, ids: Vec<String>) -> Result<Vec<RecordMetadata>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let fields = ids
            .iter()
            .map(|id| self.keys.item_field(collection, id))
            .collect();
        let values = self
            .storage
            .hmget(&self.keys.collection_key(collection), fields)
            .await?;

        ids.into_iter()
            .zip(values)
            .map(|(id, raw)| {
                let raw = raw.ok_or_else(|| Error::field_inexistent(collection, id))?;
                Ok(decode_metadata(&raw)?)
            })
            .collect()
    }

    async fn hydrate(&self, collection: &str, roots: Vec<RecordMetadata>) -> Result<Vec<Item>> {
        let resolved = Resolver::new(self.storage.as_ref(), &self.keys)
            .resolve(collection, roots)
            .await?;
        Ok(resolved.into_iter().map(|r| r.into_item()).collect())
    }

    async fn read_metadata(&self, collection: &str, id: &str) -> Result<Option<RecordMetadata>> {
        let raw = self
            .storage
            .hget(
                &self.keys.collection_key(collection),
                &self.keys.item_field(collection, id),
            )
            .await?;
        match raw {
            Some(raw) => Ok(Some(decode_metadata(&raw)?)),
            None => Ok(None),
        }
    }

    async fn read_counter(&self, collection: &str) -> Result<u64> {
        let raw = self
            .storage
            .hget(
                &self.keys.collection_key(collection),
                self.keys.counter_field(),
            )
            .await?;
        self.parse_counter(collection, raw)
    }

    fn parse_counter(&self, collection: &str, raw: Option<String>) -> Result<u64> {
        match raw {
            None => Ok(0),
            Some(raw) => decode_counter(&raw).map_err(|_| Error::CollectionOrFieldInexistent {
                collection: collection.to_string(),
                field: self.keys.counter_field().to_string(),
            }),
        }
    }

    async fn lookup_index(&self, collection: &str, field: &str, value: &Value) -> Result<String> {
        let text = index_text(value).ok_or_else(|| Error::field_inexistent(collection, "null"))?;
        let index_key = self
            .keys
            .index_key(&self.keys.index_name(collection, field));
        self.storage
            .hget(&index_key, &text)
            .await?
            .ok_or_else(|| Error::field_inexistent(collection, text))
    }

    /// Delete the index pointers a removed record still owns
    async fn drop_pointers(&self, meta: &RecordMetadata) -> Result<()> {
        let pointers = index::owned_by(
            self.storage.as_ref(),
            &self.keys,
            index::all_pointers(meta),
            &meta.id,
        )
        .await?;
        if pointers.is_empty() {
            return Ok(());
        }
        let mut batch = Batch::new();
        index::stage_delete(&mut batch, &self.keys, &pointers);
        batch.execute(self.storage.as_ref()).await?;
        Ok(())
    }
}

/// Id carried inside a value: strings as-is, numbers as decimal text
fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn record_count(size: i64, has_counter: bool) -> u64 {
    non_negative(size - i64::from(has_counter))
}

fn non_negative(n: i64) -> u64 {
    u64::try_from(n).unwrap_or(0)
}

fn addition_failure(collection: &str, reason: impl Display) -> Error {
    Error::CollectionAdditionFailure {
        collection: collection.to_string(),
        reason: reason.to_string(),
    }
}

fn update_failure(collection: &str, id: &str, reason: impl Display) -> Error {
    Error::CollectionUpdateFailure {
        collection: collection.to_string(),
        id: id.to_string(),
        reason: reason.to_string(),
    }
}

fn deletion_failure(collection: &str, reason: impl Display) -> Error {
    Error::CollectionDeletionFailure {
        collection: collection.to_string(),
        reason: reason.to_string(),
    }
}
