//! Key naming for collections, indexes, queues and locks
//!
//! Persisted layout:
//!
//! ```text
//! <ns>:<collection>                  hash   "<collection>:<id>" -> record metadata JSON
//!                                           "_index"            -> id counter
//! <ns>:<collection>:by:<field>       hash   raw field value     -> record id
//! <ns>:queue:<name>                  list   canonical JSON items
//! ```
//!
//! The namespace prefix is optional. Field names inside a collection hash and
//! the index identifiers recorded in `indexedIn` are never prefixed, so stored
//! records stay valid when a collection is moved between namespaces.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default reserved counter field inside every collection hash
pub const DEFAULT_COUNTER_FIELD: &str = "_index";

/// Default prefix for queue keys
pub const DEFAULT_QUEUE_PREFIX: &str = "queue";

/// Separator between an index's collection and field name
pub const INDEX_SEPARATOR: &str = ":by:";

/// Suffix marking a collection-level lock name
pub const COLLECTION_LOCK_SUFFIX: &str = "#collection";

/// Builds every store key and lock name used by the engine
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Keyspace {
    namespace: Option<String>,
    counter_field: String,
    queue_prefix: String,
}

impl Default for Keyspace {
    fn default() -> Self {
        Self {
            namespace: None,
            counter_field: DEFAULT_COUNTER_FIELD.to_string(),
            queue_prefix: DEFAULT_QUEUE_PREFIX.to_string(),
        }
    }
}

impl Keyspace {
    /// Create a keyspace with explicit settings
    pub fn new(
        namespace: Option<String>,
        counter_field: impl Into<String>,
        queue_prefix: impl Into<String>,
    ) -> Self {
        Self {
            namespace,
            counter_field: counter_field.into(),
            queue_prefix: queue_prefix.into(),
        }
    }

    /// Keyspace with the default settings under a namespace
    pub fn namespaced(namespace: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            ..Self::default()
        }
    }

    /// Namespace prefix, if any
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Reserved counter field name
    pub fn counter_field(&self) -> &str {
        &self.counter_field
    }

    fn prefixed(&self, name: &str) -> String {
        match &self.namespace {
            Some(ns) => format!("{}:{}", ns, name),
            None => name.to_string(),
        }
    }

    /// Store key of a collection hash
    pub fn collection_key(&self, collection: &str) -> String {
        self.prefixed(collection)
    }

    /// Field holding a record inside its collection hash
    pub fn item_field(&self, collection: &str, id: &str) -> String {
        format!("{}:{}", collection, id)
    }

    /// Recover a record id from its collection hash field
    pub fn id_from_field<'a>(&self, collection: &str, field: &'a str) -> Option<&'a str> {
        field
            .strip_prefix(collection)
            .and_then(|rest| rest.strip_prefix(':'))
    }

    /// Index identifier as recorded in `indexedIn`
    pub fn index_name(&self, collection: &str, field: &str) -> String {
        format!("{}{}{}", collection, INDEX_SEPARATOR, field)
    }

    /// Field name an index identifier of `collection` covers
    pub fn indexed_field<'a>(&self, collection: &str, index_name: &'a str) -> Option<&'a str> {
        index_name
            .strip_prefix(collection)
            .and_then(|rest| rest.strip_prefix(INDEX_SEPARATOR))
    }

    /// Store key of an index hash, from its identifier
    pub fn index_key(&self, index_name: &str) -> String {
        self.prefixed(index_name)
    }

    /// Store key of a queue list
    pub fn queue_key(&self, queue: &str) -> String {
        self.prefixed(&format!("{}:{}", self.queue_prefix, queue))
    }

    /// Lock serializing additions to a collection
    ///
    /// Suffixed so a collection named `docs:d1` never shares a lock with
    /// item `d1` of `docs`.
    pub fn collection_lock(&self, collection: &str) -> String {
        self.prefixed(&format!("{}{}", collection, COLLECTION_LOCK_SUFFIX))
    }

    /// Lock serializing read-modify-write of a single record
    pub fn item_lock(&self, collection: &str, id: &str) -> String {
        self.prefixed(&self.item_field(collection, id))
    }
}

impl fmt::Display for Keyspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}", ns),
            None => write!(f, "<root>"),
        }
    }
}
