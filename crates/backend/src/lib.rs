//! Storage backend capabilities for brickstore
//!
//! This crate defines the two backend contracts the engine layer is built
//! over, plus in-memory reference implementations of both:
//! - `KvBackend` / `MemoryKv`: ordered key-value store with atomic batch apply
//! - `DocBackend` / `MemoryDocStore`: partitioned document collections with
//!   secondary indices and predicate evaluation
//!
//! The two contracts are deliberately separate traits. They cover different
//! data shapes and offer different guarantees; callers pick the one that fits
//! rather than programming against a lowest-common-denominator union.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod memory_doc;
pub mod memory_kv;
pub mod traits;

pub use memory_doc::MemoryDocStore;
pub use memory_kv::MemoryKv;
pub use traits::{BatchOp, Clause, DocBackend, KvBackend, LockMode};
