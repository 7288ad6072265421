//! Resolved records: metadata with its foreign records attached
//!
//! A [`ResolvedRecord`] is never persisted. It is built bottom-up by the
//! resolution engine and flattened into a caller [`Item`] where every
//! foreign-key field holds full nested records instead of raw ids.

use serde_json::Value;
use std::collections::BTreeMap;

use crate::record::{ForeignKey, Item, RecordMetadata, ID_FIELD};

/// Record metadata plus its resolved foreign records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRecord {
    /// Collection the record belongs to
    pub collection: String,
    /// Stored metadata of the record itself
    pub metadata: RecordMetadata,
    /// Resolved one-to-one fields
    pub one_to_one: BTreeMap<String, ResolvedRecord>,
    /// Resolved one-to-many fields, keyed by foreign id
    pub one_to_many: BTreeMap<String, BTreeMap<String, ResolvedRecord>>,
}

impl ResolvedRecord {
    /// Record with no foreign records attached
    pub fn shallow(collection: impl Into<String>, metadata: RecordMetadata) -> Self {
        Self {
            collection: collection.into(),
            metadata,
            one_to_one: BTreeMap::new(),
            one_to_many: BTreeMap::new(),
        }
    }

    /// Record id
    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    /// Attach a resolved target under a foreign-key field
    pub fn attach(&mut self, field: &str, kind: &ForeignKey, target: ResolvedRecord) {
        match kind {
            ForeignKey::OneToOne { .. } => {
                self.one_to_one.insert(field.to_string(), target);
            }
            ForeignKey::OneToMany { .. } => {
                self.one_to_many
                    .entry(field.to_string())
                    .or_default()
                    .insert(target.id().to_string(), target);
            }
        }
    }

    /// Flatten into the caller shape
    ///
    /// Every resolved field replaces its raw id (or id set) with the nested
    /// item, recursively; `id` is added back into the object.
    pub fn into_item(self) -> Item {
        let ResolvedRecord {
            metadata,
            one_to_one,
            one_to_many,
            ..
        } = self;
        let mut item = metadata.value;

        for (field, target) in one_to_one {
            item.insert(field, Value::Object(target.into_item()));
        }
        for (field, targets) in one_to_many {
            let nested = targets
                .into_iter()
                .map(|(id, target)| (id, Value::Object(target.into_item())))
                .collect();
            item.insert(field, Value::Object(nested));
        }
        item.insert(ID_FIELD.to_string(), Value::String(metadata.id));
        item
    }
}
