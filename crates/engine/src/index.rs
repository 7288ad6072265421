//! Secondary index maintenance
//!
//! An index on `<collection>.<field>` is a hash named `<collection>:by:<field>`
//! mapping the field's index text to a record id. Each record remembers the
//! values it indexed under `indexedIn`, which is what lets updates and removals
//! find the pointers they own.
//!
//! Pointers are only deleted while they still point at the record being
//! changed. Another record that took over the same value keeps its entry.

use relkv_core::{
    index_text, Batch, IndexedIn, Item, Keyspace, RecordMetadata, Result, Storage,
};
use serde_json::Value;

/// Index pointer: (index name, index text)
pub(crate) type Pointer = (String, String);

/// `indexedIn` for a new record indexed by `fields`
pub(crate) fn indexed_in_for(
    keys: &Keyspace,
    collection: &str,
    value: &Item,
    fields: &[String],
) -> IndexedIn {
    fields
        .iter()
        .map(|field| {
            (
                keys.index_name(collection, field),
                value.get(field).cloned().unwrap_or(Value::Null),
            )
        })
        .collect()
}

/// Recompute every existing `indexedIn` entry from a new value
pub(crate) fn refreshed(
    keys: &Keyspace,
    collection: &str,
    indexed_in: &IndexedIn,
    value: &Item,
) -> IndexedIn {
    indexed_in
        .keys()
        .map(|name| {
            let current = keys
                .indexed_field(collection, name)
                .and_then(|field| value.get(field))
                .cloned()
                .unwrap_or(Value::Null);
            (name.clone(), current)
        })
        .collect()
}

/// Pointers of `before` whose index text no longer matches `after`
pub(crate) fn stale_pointers(before: &IndexedIn, after: &IndexedIn) -> Vec<Pointer> {
    before
        .iter()
        .filter_map(|(name, old)| {
            let old_text = index_text(old)?;
            let new_text = after.get(name).and_then(index_text);
            (new_text.as_deref() != Some(old_text.as_str())).then(|| (name.clone(), old_text))
        })
        .collect()
}

/// Every pointer a record owns
pub(crate) fn all_pointers(meta: &RecordMetadata) -> Vec<Pointer> {
    meta.indexed_in
        .iter()
        .filter_map(|(name, value)| Some((name.clone(), index_text(value)?)))
        .collect()
}

/// Keep only the pointers that still resolve to `id`
///
/// One round trip when `candidates` is non-empty, none otherwise.
pub(crate) async fn owned_by<S: Storage + ?Sized>(
    storage: &S,
    keys: &Keyspace,
    candidates: Vec<Pointer>,
    id: &str,
) -> Result<Vec<Pointer>> {
    if candidates.is_empty() {
        return Ok(candidates);
    }
    let mut batch = Batch::new();
    let slots: Vec<_> = candidates
        .iter()
        .map(|(name, text)| batch.hget(&keys.index_key(name), text))
        .collect();
    let mut replies = batch.execute(storage).await?;

    let mut owned = Vec::with_capacity(candidates.len());
    for (pointer, slot) in candidates.into_iter().zip(slots) {
        if replies.take(slot)?.into_opt_string()?.as_deref() == Some(id) {
            owned.push(pointer);
        }
    }
    Ok(owned)
}

/// Queue pointer writes for every entry whose text changed from `before`
pub(crate) fn stage_set(
    batch: &mut Batch,
    keys: &Keyspace,
    before: Option<&IndexedIn>,
    after: &IndexedIn,
    id: &str,
) {
    for (name, value) in after {
        let Some(text) = index_text(value) else {
            continue;
        };
        let unchanged = before
            .and_then(|prev| prev.get(name))
            .and_then(index_text)
            .is_some_and(|old| old == text);
        if !unchanged {
            batch.hset(&keys.index_key(name), &text, id.to_string());
        }
    }
}

/// Queue pointer deletes
pub(crate) fn stage_delete(batch: &mut Batch, keys: &Keyspace, pointers: &[Pointer]) {
    for (name, text) in pointers {
        batch.hdel(&keys.index_key(name), text);
    }
}
