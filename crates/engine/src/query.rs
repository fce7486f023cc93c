//! Query builder and evaluator
//!
//! A `Query` accumulates predicate clauses, combined with AND semantics,
//! and delegates evaluation to the document backend. Before evaluation the
//! clause list is canonicalized by a structural round-trip through JSON so
//! the backend always sees values in their canonical representation.
//!
//! Hydrating reads (`all`, `one`, `one_into`) require an explicit lock-mode
//! choice via `read_lock`; without one they fail with `ReadPreferenceUnset`
//! rather than silently defaulting.

use brickstore_backend::{Clause, DocBackend, LockMode};
use brickstore_core::{DocId, Document, Error, FieldPath, Result, Value};
use serde::de::DeserializeOwned;
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace};

/// Matched document ids with their hydrated field-maps.
pub type ResultSet = HashMap<DocId, Document>;

/// A chainable predicate query over one collection.
pub struct Query<'a> {
    backend: &'a dyn DocBackend,
    collection: String,
    clauses: Vec<Clause>,
    read_lock: Option<LockMode>,
}

impl<'a> Query<'a> {
    pub(crate) fn new(backend: &'a dyn DocBackend, collection: &str) -> Self {
        Self {
            backend,
            collection: collection.to_string(),
            clauses: Vec::new(),
            read_lock: None,
        }
    }

    /// Require the value at `path` to equal `value` exactly.
    pub fn equals(mut self, path: impl Into<FieldPath>, value: impl Into<Value>) -> Self {
        let (path, value) = (path.into(), value.into());
        trace!(path = %path, "query clause: equals");
        self.clauses.push(Clause::Equals { path, value });
        self
    }

    /// Require the integer at `path` to lie in `[low, high]` inclusive.
    pub fn between(mut self, path: impl Into<FieldPath>, low: i64, high: i64) -> Self {
        let path = path.into();
        trace!(path = %path, low, high, "query clause: between");
        self.clauses.push(Clause::Between { path, low, high });
        self
    }

    /// Require the string at `path` to match the regular expression.
    pub fn regexp(mut self, path: impl Into<FieldPath>, pattern: impl Into<String>) -> Self {
        let (path, pattern) = (path.into(), pattern.into());
        trace!(path = %path, pattern = %pattern, "query clause: regexp");
        self.clauses.push(Clause::Regexp { path, pattern });
        self
    }

    /// Require any value to exist at `path`.
    pub fn has(mut self, path: impl Into<FieldPath>) -> Self {
        let path = path.into();
        trace!(path = %path, "query clause: has");
        self.clauses.push(Clause::Has { path });
        self
    }

    /// Choose the lock discipline for hydrating reads.
    pub fn read_lock(mut self, mode: LockMode) -> Self {
        self.read_lock = Some(mode);
        self
    }

    /// JSON rendering of the clause list, for logs and diagnostics.
    pub fn describe(&self) -> String {
        serde_json::to_string(&self.clauses).unwrap_or_else(|_| "<unserializable>".to_string())
    }

    /// Canonicalize the clause list: round-trip it through its structural
    /// JSON form so values reach the backend in canonical shape.
    ///
    /// Non-finite floats have no JSON form; the round-trip would turn them
    /// into nulls, so they are rejected up front.
    fn canonicalize(&self) -> Result<Vec<Clause>> {
        for clause in &self.clauses {
            if let Clause::Equals { value, .. } = clause {
                ensure_finite(value)?;
            }
        }
        let raw = serde_json::to_value(&self.clauses)?;
        Ok(serde_json::from_value(raw)?)
    }

    /// Evaluate the query, returning matched ids without hydration.
    pub fn evaluate(&self) -> Result<HashSet<DocId>> {
        let clauses = self.canonicalize()?;
        self.backend.evaluate(&self.collection, &clauses)
    }

    fn lock_mode(&self) -> Result<LockMode> {
        self.read_lock.ok_or(Error::ReadPreferenceUnset)
    }

    /// Evaluate and hydrate every matched document.
    ///
    /// Ids deleted between evaluation and hydration are skipped rather than
    /// failing the whole result set.
    pub fn all(&self) -> Result<ResultSet> {
        let mode = self.lock_mode()?;
        let ids = self.evaluate()?;
        let mut results = ResultSet::with_capacity(ids.len());
        for id in ids {
            match self.backend.read_doc(&self.collection, id, mode) {
                Ok(doc) => {
                    results.insert(id, doc);
                }
                Err(Error::NotFound) => trace!(id, "matched id vanished before hydration"),
                Err(e) => return Err(e),
            }
        }
        Ok(results)
    }

    /// Return the first matched document. Iteration order over the matched
    /// set is unspecified; callers must not rely on which one they get.
    pub fn one(&self) -> Result<(DocId, Document)> {
        let mode = self.lock_mode()?;
        let ids = self.evaluate()?;
        for id in ids {
            match self.backend.read_doc(&self.collection, id, mode) {
                Ok(doc) => return Ok((id, doc)),
                Err(Error::NotFound) => continue,
                Err(e) => return Err(e),
            }
        }
        debug!(query = %self.describe(), "nothing found");
        Err(Error::NotFound)
    }

    /// Like [`Query::one`], deserializing the document into `T`.
    pub fn one_into<T: DeserializeOwned>(&self) -> Result<(DocId, T)> {
        let (id, doc) = self.one()?;
        let typed = serde_json::from_value(serde_json::to_value(&doc)?)?;
        Ok((id, typed))
    }

    /// Evaluate the query and delete every matched document, returning the
    /// number removed. Evaluation failure is an error, distinct from a
    /// successful delete of zero matches.
    pub fn delete(&self) -> Result<usize> {
        let ids = self.evaluate()?;
        for &id in &ids {
            self.backend.delete_doc(&self.collection, id)?;
        }
        debug!(count = ids.len(), query = %self.describe(), "deleted by query");
        Ok(ids.len())
    }
}

fn ensure_finite(value: &Value) -> Result<()> {
    match value {
        Value::Float(f) if !f.is_finite() => Err(Error::Serialization(
            "non-finite float in query clause".to_string(),
        )),
        Value::Array(items) => items.iter().try_for_each(ensure_finite),
        Value::Object(fields) => fields.values().try_for_each(ensure_finite),
        _ => Ok(()),
    }
}
