//! Record metadata: the stored unit of a collection
//!
//! Every record is persisted as a JSON envelope:
//!
//! ```json
//! {
//!   "value": { "user": { "g5": null }, "name": "peer" },
//!   "id": "p3",
//!   "foreignKeys": { "user": { "relationKind": "oneToMany", "targetCollection": "guests" } },
//!   "indexedIn": { "peers:by:name": "peer" }
//! }
//! ```
//!
//! `foreignKeys` and `indexedIn` are omitted when empty.
//!
//! Foreign-key fields inside `value` hold either a single foreign id
//! (one-to-one) or an object whose keys are foreign ids and whose values are
//! `null` placeholders (one-to-many).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Caller-visible record shape: a JSON object
pub type Item = Map<String, Value>;

/// Foreign-key declarations of a record, by value field
pub type ForeignKeys = BTreeMap<String, ForeignKey>;

/// Index pointers of a record: index identifier -> indexed value
pub type IndexedIn = BTreeMap<String, Value>;

/// Field name reserved for a record's identity in caller-visible items
pub const ID_FIELD: &str = "id";

/// Relation declared by a foreign-key field
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "relationKind", rename_all = "camelCase")]
pub enum ForeignKey {
    /// The field holds a single foreign id
    #[serde(rename_all = "camelCase")]
    OneToOne {
        /// Collection the id points into
        target_collection: String,
    },
    /// The field holds an `{id: null}` set of foreign ids
    #[serde(rename_all = "camelCase")]
    OneToMany {
        /// Collection the ids point into
        target_collection: String,
    },
}

impl ForeignKey {
    /// One-to-one relation into `collection`
    pub fn one_to_one(collection: impl Into<String>) -> Self {
        ForeignKey::OneToOne {
            target_collection: collection.into(),
        }
    }

    /// One-to-many relation into `collection`
    pub fn one_to_many(collection: impl Into<String>) -> Self {
        ForeignKey::OneToMany {
            target_collection: collection.into(),
        }
    }

    /// Target collection name
    pub fn target(&self) -> &str {
        match self {
            ForeignKey::OneToOne { target_collection }
            | ForeignKey::OneToMany { target_collection } => target_collection,
        }
    }

    /// Foreign ids a field value references under this relation
    ///
    /// Absent, `null` or wrongly shaped values reference nothing.
    pub fn referenced_ids(&self, field_value: Option<&Value>) -> Vec<String> {
        match (self, field_value) {
            (ForeignKey::OneToOne { .. }, Some(Value::String(id))) => vec![id.clone()],
            (ForeignKey::OneToOne { .. }, Some(Value::Number(n))) => vec![n.to_string()],
            (ForeignKey::OneToMany { .. }, Some(Value::Object(ids))) => ids.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }
}

/// Build a one-to-many field value from a set of ids
///
/// ```rust,ignore
/// let user = id_set(["g5", "g6"]); // {"g5": null, "g6": null}
/// ```
pub fn id_set<I, S>(ids: I) -> Value
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Value::Object(ids.into_iter().map(|id| (id.into(), Value::Null)).collect())
}

/// Raw index text for a field value
///
/// Strings index by their contents, other scalars by their JSON text.
/// `null` owns no index entry.
pub fn index_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Persisted envelope around a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMetadata {
    /// Caller payload without its id
    pub value: Item,
    /// Identity, unique within the collection
    pub id: String,
    /// Foreign-key declarations, immutable after creation
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub foreign_keys: ForeignKeys,
    /// Current index pointers
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub indexed_in: IndexedIn,
}

impl RecordMetadata {
    /// Envelope with no foreign keys and no index pointers
    pub fn new(id: impl Into<String>, value: Item) -> Self {
        Self {
            value,
            id: id.into(),
            foreign_keys: ForeignKeys::new(),
            indexed_in: IndexedIn::new(),
        }
    }

    /// True if any foreign key is declared
    pub fn has_foreign_keys(&self) -> bool {
        !self.foreign_keys.is_empty()
    }

    /// Foreign ids referenced by one declared field
    pub fn foreign_ids(&self, field: &str) -> Vec<String> {
        self.foreign_keys
            .get(field)
            .map(|fk| fk.referenced_ids(self.value.get(field)))
            .unwrap_or_default()
    }

    /// Value with every foreign-key field removed
    pub fn value_without_foreign_fields(&self) -> Item {
        self.value
            .iter()
            .filter(|(field, _)| !self.foreign_keys.contains_key(*field))
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect()
    }
}
