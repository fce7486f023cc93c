//! Collection lifecycle management
//!
//! Declared collections (name, partition count, index paths) are reconciled
//! against the backend when a `DocEngine` opens. Any failure here is fatal
//! for the engine instance: `ensure_collections` returns an error and no
//! partially-initialized engine escapes to the caller.

use brickstore_backend::DocBackend;
use brickstore_core::{Error, FieldPath, Result};
use tracing::{debug, info};

/// What to do with a declared collection that already exists at open time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropPolicy {
    /// Drop and recreate it empty.
    DropIfExist,
    /// Leave it, and its contents, untouched.
    KeepIfExist,
}

/// Declaration of one collection the engine requires.
#[derive(Debug, Clone)]
pub struct CollectionSpec {
    /// Collection name.
    pub name: String,
    /// Partition count; values below 1 are treated as 1.
    pub partitions: usize,
    /// Secondary index paths to ensure after the collection exists.
    pub indices: Vec<FieldPath>,
}

impl CollectionSpec {
    /// Declare a collection with no indices.
    pub fn new(name: impl Into<String>, partitions: usize) -> Self {
        Self {
            name: name.into(),
            partitions: partitions.max(1),
            indices: Vec::new(),
        }
    }

    /// Add a declared index path (builder-style).
    pub fn with_index(mut self, path: impl Into<FieldPath>) -> Self {
        self.indices.push(path.into());
        self
    }
}

/// Reconcile every declared collection and index against the backend.
///
/// Idempotent: an existing collection is dropped and recreated only under
/// `DropIfExist`; index creation is a no-op when the index already exists.
pub fn ensure_collections(
    backend: &dyn DocBackend,
    specs: &[CollectionSpec],
    policy: DropPolicy,
) -> Result<()> {
    for spec in specs {
        if backend.has_collection(&spec.name) {
            match policy {
                DropPolicy::DropIfExist => {
                    info!(collection = %spec.name, "dropping existing collection");
                    backend
                        .drop_collection(&spec.name)
                        .map_err(|e| construction(&spec.name, "drop", e))?;
                    backend
                        .create_collection(&spec.name, spec.partitions)
                        .map_err(|e| construction(&spec.name, "recreate", e))?;
                }
                DropPolicy::KeepIfExist => {
                    debug!(collection = %spec.name, "keeping existing collection");
                }
            }
        } else {
            debug!(collection = %spec.name, "creating collection");
            backend
                .create_collection(&spec.name, spec.partitions)
                .map_err(|e| construction(&spec.name, "create", e))?;
        }
    }

    // Indices go in only after every collection exists
    for spec in specs {
        for path in &spec.indices {
            backend
                .create_index(&spec.name, path)
                .map_err(|e| construction(&spec.name, "index", e))?;
        }
    }
    Ok(())
}

fn construction(collection: &str, step: &str, cause: Error) -> Error {
    Error::Construction(format!("{step} of collection {collection:?} failed: {cause}"))
}
