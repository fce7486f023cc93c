//! Document engine facade
//!
//! Owns a `DocBackend`, runs the collection lifecycle sweep at open time,
//! and hands out queries. Construction fails (rather than aborting the
//! process) when the declared collections or indices cannot be ensured;
//! the caller decides whether that is fatal.

use crate::lifecycle::{ensure_collections, CollectionSpec, DropPolicy};
use crate::query::Query;
use brickstore_backend::{DocBackend, LockMode};
use brickstore_core::{DocId, Document, FieldPath, Result};
use std::sync::Arc;

/// Engine over a document backend.
pub struct DocEngine {
    backend: Arc<dyn DocBackend>,
}

impl DocEngine {
    /// Open the engine: reconcile every declared collection and index
    /// against the backend under the given drop policy.
    pub fn open(
        backend: Arc<dyn DocBackend>,
        collections: &[CollectionSpec],
        policy: DropPolicy,
    ) -> Result<Self> {
        ensure_collections(&*backend, collections, policy)?;
        Ok(Self { backend })
    }

    /// Shared handle to the underlying backend.
    pub fn backend(&self) -> &Arc<dyn DocBackend> {
        &self.backend
    }

    /// Start a query against one collection.
    pub fn query(&self, collection: &str) -> Query<'_> {
        Query::new(&*self.backend, collection)
    }

    /// Insert a document, returning its backend-assigned id.
    pub fn insert(&self, collection: &str, doc: Document) -> Result<DocId> {
        self.backend.insert(collection, doc)
    }

    /// Replace the document at `id` wholesale.
    pub fn update(&self, collection: &str, id: DocId, doc: Document) -> Result<()> {
        self.backend.update(collection, id, doc)
    }

    /// Remove the document at `id`.
    pub fn delete_doc(&self, collection: &str, id: DocId) -> Result<()> {
        self.backend.delete_doc(collection, id)
    }

    /// Read one document under the chosen lock discipline.
    pub fn read(&self, collection: &str, id: DocId, mode: LockMode) -> Result<Document> {
        self.backend.read_doc(collection, id, mode)
    }

    /// Ensure an index exists on `path` (idempotent), after open.
    pub fn add_index(&self, collection: &str, path: impl Into<FieldPath>) -> Result<()> {
        self.backend.create_index(collection, &path.into())
    }
}
