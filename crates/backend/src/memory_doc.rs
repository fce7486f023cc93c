//! In-memory document backend
//!
//! Collections hold their documents in a `DashMap` so `NoLock` reads never
//! wait. Writes, and `MustLock` reads, serialize on a per-partition mutex
//! chosen by `id % partitions`. Secondary indices map a canonical JSON
//! encoding of the value at the indexed path to the set of document ids
//! holding that value; `evaluate` seeds its candidate set from an index when
//! the clause list leads with an indexable equality.

use crate::traits::{Clause, DocBackend, LockMode};
use brickstore_core::{DocId, Document, Error, FieldPath, Result, Value};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Canonical index key for a value: the JSON encoding of its normalized
/// form. Two values share a bucket exactly when the evaluator's equality
/// holds for them.
fn canonical_key(value: &Value) -> Result<String> {
    serde_json::to_string(&index_normal(value)).map_err(Error::from)
}

/// `-0.0 == 0.0` under `Value` equality but their JSON encodings differ;
/// fold the sign out, recursively, so both land in the same bucket.
fn index_normal(value: &Value) -> Value {
    match value {
        Value::Float(f) if *f == 0.0 => Value::Float(0.0),
        Value::Array(items) => Value::Array(items.iter().map(index_normal).collect()),
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), index_normal(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// One secondary index: canonical value → ids holding it.
struct SecondaryIndex {
    path: FieldPath,
    entries: HashMap<String, HashSet<DocId>>,
}

impl SecondaryIndex {
    fn new(path: FieldPath) -> Self {
        Self {
            path,
            entries: HashMap::new(),
        }
    }

    fn add(&mut self, id: DocId, doc: &Document) -> Result<()> {
        if let Some(value) = self.path.lookup(doc) {
            self.entries
                .entry(canonical_key(value)?)
                .or_default()
                .insert(id);
        }
        Ok(())
    }

    fn remove(&mut self, id: DocId, doc: &Document) -> Result<()> {
        if let Some(value) = self.path.lookup(doc) {
            let key = canonical_key(value)?;
            if let Some(ids) = self.entries.get_mut(&key) {
                ids.remove(&id);
                if ids.is_empty() {
                    self.entries.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn lookup(&self, key: &str) -> Option<&HashSet<DocId>> {
        self.entries.get(key)
    }
}

struct Collection {
    partitions: usize,
    docs: DashMap<DocId, Document>,
    next_id: AtomicU64,
    partition_locks: Vec<Mutex<()>>,
    indices: RwLock<HashMap<String, SecondaryIndex>>,
}

impl Collection {
    fn new(partitions: usize) -> Self {
        let partitions = partitions.max(1);
        Self {
            partitions,
            docs: DashMap::new(),
            // 0 is reserved so an id of 0 can never be handed out
            next_id: AtomicU64::new(1),
            partition_locks: (0..partitions).map(|_| Mutex::new(())).collect(),
            indices: RwLock::new(HashMap::new()),
        }
    }

    fn partition_lock(&self, id: DocId) -> &Mutex<()> {
        &self.partition_locks[(id as usize) % self.partitions]
    }
}

/// In-memory partitioned document store with secondary indices.
#[derive(Default)]
pub struct MemoryDocStore {
    collections: RwLock<HashMap<String, Arc<Collection>>>,
}

impl MemoryDocStore {
    /// Create an empty store with no collections.
    pub fn new() -> Self {
        Self::default()
    }

    fn collection(&self, name: &str) -> Result<Arc<Collection>> {
        self.collections
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::CollectionMissing(name.to_string()))
    }
}

/// A clause with its regular expression compiled up front, so evaluation
/// fails fast on a bad pattern instead of mid-scan.
enum CompiledClause<'a> {
    Equals(&'a FieldPath, &'a Value),
    Between(&'a FieldPath, i64, i64),
    Regexp(&'a FieldPath, Regex),
    Has(&'a FieldPath),
}

impl<'a> CompiledClause<'a> {
    fn compile(clause: &'a Clause) -> Result<Self> {
        Ok(match clause {
            Clause::Equals { path, value } => CompiledClause::Equals(path, value),
            Clause::Between { path, low, high } => CompiledClause::Between(path, *low, *high),
            Clause::Regexp { path, pattern } => {
                let re = Regex::new(pattern)
                    .map_err(|e| Error::Backend(format!("invalid regexp {pattern:?}: {e}")))?;
                CompiledClause::Regexp(path, re)
            }
            Clause::Has { path } => CompiledClause::Has(path),
        })
    }

    fn matches(&self, doc: &Document) -> bool {
        match self {
            CompiledClause::Equals(path, value) => path.lookup(doc) == Some(*value),
            CompiledClause::Between(path, low, high) => path
                .lookup(doc)
                .and_then(Value::as_int)
                .map(|n| n >= *low && n <= *high)
                .unwrap_or(false),
            CompiledClause::Regexp(path, re) => path
                .lookup(doc)
                .and_then(Value::as_str)
                .map(|s| re.is_match(s))
                .unwrap_or(false),
            CompiledClause::Has(path) => path.lookup(doc).is_some(),
        }
    }
}

impl DocBackend for MemoryDocStore {
    fn create_collection(&self, name: &str, partitions: usize) -> Result<()> {
        let mut collections = self.collections.write();
        if collections.contains_key(name) {
            return Err(Error::Backend(format!(
                "collection {name:?} already exists"
            )));
        }
        debug!(collection = name, partitions, "creating collection");
        collections.insert(name.to_string(), Arc::new(Collection::new(partitions)));
        Ok(())
    }

    fn drop_collection(&self, name: &str) -> Result<()> {
        debug!(collection = name, "dropping collection");
        match self.collections.write().remove(name) {
            Some(_) => Ok(()),
            None => Err(Error::CollectionMissing(name.to_string())),
        }
    }

    fn has_collection(&self, name: &str) -> bool {
        self.collections.read().contains_key(name)
    }

    fn create_index(&self, collection: &str, path: &FieldPath) -> Result<()> {
        let col = self.collection(collection)?;
        let mut indices = col.indices.write();
        let joined = path.joined();
        if indices.contains_key(&joined) {
            debug!(collection, path = %path, "index already exists");
            return Ok(());
        }
        debug!(collection, path = %path, "adding index");
        let mut index = SecondaryIndex::new(path.clone());
        for entry in col.docs.iter() {
            index.add(*entry.key(), entry.value())?;
        }
        indices.insert(joined, index);
        Ok(())
    }

    fn index_count(&self, collection: &str) -> Result<usize> {
        Ok(self.collection(collection)?.indices.read().len())
    }

    fn insert(&self, collection: &str, doc: Document) -> Result<DocId> {
        let col = self.collection(collection)?;
        let id = col.next_id.fetch_add(1, Ordering::SeqCst);
        let _guard = col.partition_lock(id).lock();
        // The doc map mutates under the indices lock: a concurrent index
        // backfill sees either the pre-write state or the fully indexed one.
        let mut indices = col.indices.write();
        for index in indices.values_mut() {
            index.add(id, &doc)?;
        }
        col.docs.insert(id, doc);
        Ok(id)
    }

    fn update(&self, collection: &str, id: DocId, doc: Document) -> Result<()> {
        let col = self.collection(collection)?;
        let _guard = col.partition_lock(id).lock();
        let old = match col.docs.get(&id) {
            Some(entry) => entry.value().clone(),
            None => return Err(Error::NotFound),
        };
        let mut indices = col.indices.write();
        for index in indices.values_mut() {
            index.remove(id, &old)?;
            index.add(id, &doc)?;
        }
        col.docs.insert(id, doc);
        Ok(())
    }

    fn delete_doc(&self, collection: &str, id: DocId) -> Result<()> {
        let col = self.collection(collection)?;
        let _guard = col.partition_lock(id).lock();
        let mut indices = col.indices.write();
        if let Some((_, old)) = col.docs.remove(&id) {
            for index in indices.values_mut() {
                index.remove(id, &old)?;
            }
        }
        Ok(())
    }

    fn read_doc(&self, collection: &str, id: DocId, mode: LockMode) -> Result<Document> {
        let col = self.collection(collection)?;
        let read = |col: &Collection| {
            col.docs
                .get(&id)
                .map(|entry| entry.value().clone())
                .ok_or(Error::NotFound)
        };
        match mode {
            LockMode::NoLock => read(&col),
            LockMode::MustLock => {
                let _guard = col.partition_lock(id).lock();
                read(&col)
            }
        }
    }

    fn evaluate(&self, collection: &str, clauses: &[Clause]) -> Result<HashSet<DocId>> {
        let col = self.collection(collection)?;
        let compiled = clauses
            .iter()
            .map(CompiledClause::compile)
            .collect::<Result<Vec<_>>>()?;

        // Seed candidates from an index when the clause list contains an
        // equality over an indexed path; otherwise scan the collection.
        let candidates: Vec<DocId> = {
            let indices = col.indices.read();
            let seeded = compiled.iter().find_map(|clause| match clause {
                CompiledClause::Equals(path, value) => {
                    let index = indices.get(&path.joined())?;
                    let key = canonical_key(value).ok()?;
                    Some(
                        index
                            .lookup(&key)
                            .map(|ids| ids.iter().copied().collect())
                            .unwrap_or_default(),
                    )
                }
                _ => None,
            });
            match seeded {
                Some(ids) => ids,
                None => col.docs.iter().map(|entry| *entry.key()).collect(),
            }
        };

        let mut matched = HashSet::new();
        for id in candidates {
            if let Some(entry) = col.docs.get(&id) {
                if compiled.iter().all(|clause| clause.matches(entry.value())) {
                    matched.insert(id);
                }
            }
        }
        Ok(matched)
    }
}
