//! Engines layered over the storage backends
//!
//! Two independent engines, one per backend capability:
//! - `KvEngine`: synchronous key-value access, a batched asynchronous write
//!   coordinator, and mutex-serialized atomic counters over a `KvBackend`
//! - `DocEngine`: collection lifecycle management and a predicate query
//!   builder/evaluator over a `DocBackend`
//!
//! The two share no state; callers pick the engine matching their data shape.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod batch;
pub mod counter;
pub mod doc;
pub mod kv;
pub mod lifecycle;
pub mod query;

pub use batch::{BatchConfig, BatchWriter};
pub use doc::DocEngine;
pub use kv::KvEngine;
pub use lifecycle::{CollectionSpec, DropPolicy};
pub use query::{Query, ResultSet};
