//! Brickstore - persistence layer over ordered key-value and document backends
//!
//! Brickstore sits between application logic and two kinds of storage:
//! an ordered key-value backend (batched asynchronous writes plus atomic
//! named counters) and a document backend (partitioned collections,
//! secondary indices, predicate queries).
//!
//! # Quick start
//!
//! ```
//! use std::sync::Arc;
//! use brickstore::{
//!     CollectionSpec, DocEngine, DropPolicy, KvEngine, LockMode, MemoryDocStore, MemoryKv,
//!     Value,
//! };
//!
//! # fn main() -> brickstore::Result<()> {
//! // Key-value side: sync ops, batched writes, counters
//! let kv = KvEngine::new(Arc::new(MemoryKv::new()));
//! kv.set(b"greeting", b"hello")?;
//! kv.increment("visits");
//!
//! // Document side: declared collections, chainable queries
//! let docs = DocEngine::open(
//!     Arc::new(MemoryDocStore::new()),
//!     &[CollectionSpec::new("people", 4).with_index(["Name"])],
//!     DropPolicy::KeepIfExist,
//! )?;
//! let doc = [("Name".to_string(), Value::from("Bob"))].into_iter().collect();
//! docs.insert("people", doc)?;
//! let hits = docs
//!     .query("people")
//!     .equals(["Name"], "Bob")
//!     .read_lock(LockMode::NoLock)
//!     .all()?;
//! assert_eq!(hits.len(), 1);
//! # Ok(())
//! # }
//! ```

pub use brickstore_backend::{
    BatchOp, Clause, DocBackend, KvBackend, LockMode, MemoryDocStore, MemoryKv,
};
pub use brickstore_core::{DocId, Document, Error, FieldPath, Result, Value, INDEX_PATH_SEP};
pub use brickstore_engine::{
    BatchConfig, BatchWriter, CollectionSpec, DocEngine, DropPolicy, KvEngine, Query, ResultSet,
};
