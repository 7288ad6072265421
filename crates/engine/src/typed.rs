//! Typed view over a collection
//!
//! ```ignore
//! #[derive(Serialize, Deserialize)]
//! struct Guest { id: Option<String>, name: String }
//!
//! let guests = store.collection::<Guest>("guests");
//! let added = guests.add(&Guest { id: None, name: "Gigi".into() }, AddOptions::new()).await?;
//! let gigi: Guest = guests.get(&added.id).await?;
//! ```
//!
//! Values cross the boundary as JSON objects. A type that wants to see its
//! id declares an `id` field; hydrated foreign-key fields arrive as nested
//! objects, so the type must model them that way to read them back.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use relkv_concurrency::LockManager;
use relkv_core::{Error, ForeignKeys, Item, Result, Storage, StoreError};
use relkv_concurrency::NamedLocks;
use relkv_storage::MemoryStore;

use crate::collection::{AddOptions, RemoveOutcome};
use crate::store::RelationalStore;

/// Result of a typed add
#[derive(Debug, Clone, PartialEq)]
pub struct TypedAdd<T> {
    /// Assigned id
    pub id: String,
    /// The stored record, hydrated
    pub item: T,
    /// Counter value after the add
    pub index: u64,
    /// Number of records after the add
    pub length: u64,
}

/// Collection handle that (de)serializes `T`
pub struct TypedCollection<'a, T, S: Storage + ?Sized = MemoryStore, L: LockManager + ?Sized = NamedLocks>
{
    store: &'a RelationalStore<S, L>,
    name: String,
    _marker: PhantomData<fn() -> T>,
}

impl<S: Storage + ?Sized, L: LockManager + ?Sized> RelationalStore<S, L> {
    /// Typed handle on `name`
    pub fn collection<T>(&self, name: impl Into<String>) -> TypedCollection<'_, T, S, L>
    where
        T: Serialize + DeserializeOwned,
    {
        TypedCollection {
            store: self,
            name: name.into(),
            _marker: PhantomData,
        }
    }
}

impl<'a, T, S, L> TypedCollection<'a, T, S, L>
where
    T: Serialize + DeserializeOwned + Sync,
    S: Storage + ?Sized,
    L: LockManager + ?Sized,
{
    /// Collection name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a record
    pub async fn add(&self, item: &T, options: AddOptions) -> Result<TypedAdd<T>> {
        let value = to_value(item)?;
        let out = self
            .store
            .add_item_to_collection(&self.name, value, options)
            .await?;
        let id = out
            .item
            .get(relkv_core::ID_FIELD)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Ok(TypedAdd {
            id,
            item: from_item(out.item)?,
            index: out.index,
            length: out.length,
        })
    }

    /// Fetch one record
    pub async fn get(&self, id: &str) -> Result<T> {
        from_item(self.store.get_item_in_collection(&self.name, id).await?)
    }

    /// Fetch several records, all or nothing
    pub async fn get_many<I, K>(&self, ids: I) -> Result<Vec<T>>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.store
            .get_items_in_collection(&self.name, ids)
            .await?
            .into_iter()
            .map(from_item)
            .collect()
    }

    /// Fetch by secondary index
    pub async fn get_by(&self, field: &str, value: impl Into<Value>) -> Result<T> {
        from_item(
            self.store
                .get_item_in_collection_by(&self.name, field, value)
                .await?,
        )
    }

    /// Fetch every record
    pub async fn all(&self) -> Result<Vec<T>> {
        self.store
            .get_all_items_in_collection(&self.name)
            .await?
            .into_iter()
            .map(from_item)
            .collect()
    }

    /// True if the record exists and resolves
    pub async fn contains(&self, id: &str) -> bool {
        self.store.is_item_in_collection(&self.name, id).await
    }

    /// Shallow-merge a serializable patch
    pub async fn update<P>(&self, id: &str, patch: &P, foreign_keys: &ForeignKeys) -> Result<T>
    where
        P: Serialize + ?Sized,
    {
        let patch = to_value(patch)?;
        from_item(
            self.store
                .update_item_in_collection(&self.name, id, patch, foreign_keys)
                .await?,
        )
    }

    /// Remove a record
    pub async fn remove(&self, id: &str) -> Result<RemoveOutcome> {
        self.store.remove_item_in_collection(&self.name, id).await
    }
}

fn to_value<T: Serialize + ?Sized>(item: &T) -> Result<Value> {
    serde_json::to_value(item).map_err(|e| Error::from(StoreError::from(e)))
}

fn from_item<T: DeserializeOwned>(item: Item) -> Result<T> {
    serde_json::from_value(Value::Object(item)).map_err(|e| Error::from(StoreError::from(e)))
}
