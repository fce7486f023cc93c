//! Backend capability contracts
//!
//! `KvBackend` and `DocBackend` are the seams between the engine layer and
//! whatever storage actually holds the data. Both are object-safe so engines
//! can hold `Arc<dyn ...>` and tests can substitute failure-injecting fakes.

use brickstore_core::{DocId, Document, FieldPath, Result, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One pending write against a [`KvBackend`], applied as part of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    /// Write `value` at `key`, creating or overwriting.
    Set {
        /// Key bytes
        key: Vec<u8>,
        /// Value bytes
        value: Vec<u8>,
    },
    /// Remove `key` if present.
    Delete {
        /// Key bytes
        key: Vec<u8>,
    },
}

/// Ordered key-value backend contract.
///
/// `apply_batch` is all-or-nothing: either every op in the slice takes
/// effect or none do.
pub trait KvBackend: Send + Sync {
    /// Write `value` at `key`.
    fn set(&self, key: &[u8], value: &[u8]) -> Result<()>;
    /// Read the value at `key`, or `None` if absent.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;
    /// Remove `key`. Removing an absent key succeeds.
    fn delete(&self, key: &[u8]) -> Result<()>;
    /// Apply every op atomically.
    fn apply_batch(&self, ops: &[BatchOp]) -> Result<()>;
}

/// Lock discipline for a single document read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Wait-free read; may race with a concurrent writer to the same document.
    NoLock,
    /// Serialize against writer locks on the document's partition.
    MustLock,
}

/// One predicate clause of a document query.
///
/// Clauses in a list combine with AND semantics. The serialized shape is the
/// backend wire form: `{"in": path, "eq": v}`, `{"in": path, "int from": lo,
/// "int to": hi}`, `{"in": path, "re": pattern}`, `{"has": path}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Clause {
    /// Value at `path` equals `value` exactly (no cross-type coercion).
    Equals {
        /// Target field path
        #[serde(rename = "in")]
        path: FieldPath,
        /// Value to match
        #[serde(rename = "eq")]
        value: Value,
    },
    /// Integer at `path` lies in `[low, high]` inclusive.
    Between {
        /// Target field path
        #[serde(rename = "in")]
        path: FieldPath,
        /// Inclusive lower bound
        #[serde(rename = "int from")]
        low: i64,
        /// Inclusive upper bound
        #[serde(rename = "int to")]
        high: i64,
    },
    /// String at `path` matches the regular expression `pattern`.
    Regexp {
        /// Target field path
        #[serde(rename = "in")]
        path: FieldPath,
        /// Regular expression source
        #[serde(rename = "re")]
        pattern: String,
    },
    /// A value of any type exists at `path`.
    Has {
        /// Target field path
        #[serde(rename = "has")]
        path: FieldPath,
    },
}

/// Document backend contract: named partitioned collections of field-maps
/// with secondary indices and predicate evaluation.
pub trait DocBackend: Send + Sync {
    /// Create an empty collection. Creating an existing collection is an error.
    fn create_collection(&self, name: &str, partitions: usize) -> Result<()>;
    /// Drop a collection and everything in it.
    fn drop_collection(&self, name: &str) -> Result<()>;
    /// True if the named collection exists.
    fn has_collection(&self, name: &str) -> bool;
    /// Create a secondary index on `path`, backfilling existing documents.
    /// Creating an index that already exists on the same path is a no-op.
    fn create_index(&self, collection: &str, path: &FieldPath) -> Result<()>;
    /// Number of secondary indices on the collection.
    fn index_count(&self, collection: &str) -> Result<usize>;
    /// Insert a document, returning its newly assigned id. Ids are never
    /// reused within a collection's lifetime.
    fn insert(&self, collection: &str, doc: Document) -> Result<DocId>;
    /// Replace the document at `id` wholesale (no partial merge).
    fn update(&self, collection: &str, id: DocId, doc: Document) -> Result<()>;
    /// Remove the document at `id`. Removing an absent id is a no-op.
    fn delete_doc(&self, collection: &str, id: DocId) -> Result<()>;
    /// Read the document at `id` under the chosen lock discipline.
    fn read_doc(&self, collection: &str, id: DocId, mode: LockMode) -> Result<Document>;
    /// Evaluate the clause list with AND semantics, returning matching ids.
    /// An empty clause list matches every document in the collection.
    fn evaluate(&self, collection: &str, clauses: &[Clause]) -> Result<HashSet<DocId>>;
}
