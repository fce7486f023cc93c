//! Key-value engine facade
//!
//! Thin stateful facade over a `KvBackend`: synchronous operations hit the
//! backend directly, enqueue operations go through the batched write
//! coordinator, and named counters are serialized by an engine-wide mutex.
//!
//! The counter protocol is read-modify-write over a non-atomic backend;
//! correctness comes entirely from the critical section. The single mutex
//! serializes increments across unrelated counter names, which is a known
//! contention point accepted for simplicity.

use crate::batch::{BatchConfig, BatchWriter};
use crate::counter::{counter_key, decode_varint, encode_varint};
use brickstore_backend::KvBackend;
use brickstore_core::Result;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{error, trace};

/// Engine over an ordered key-value backend.
pub struct KvEngine {
    backend: Arc<dyn KvBackend>,
    writer: BatchWriter,
    counter_lock: Mutex<()>,
}

impl KvEngine {
    /// Build an engine with default batching.
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self::with_batch_config(backend, BatchConfig::default())
    }

    /// Build an engine with explicit batch tuning.
    pub fn with_batch_config(backend: Arc<dyn KvBackend>, config: BatchConfig) -> Self {
        let writer = BatchWriter::with_config(backend.clone(), config);
        Self {
            backend,
            writer,
            counter_lock: Mutex::new(()),
        }
    }

    /// Shared handle to the underlying backend.
    pub fn backend(&self) -> &Arc<dyn KvBackend> {
        &self.backend
    }

    // ========== Synchronous operations (bypass the queue) ==========

    /// Write `value` at `key` immediately.
    pub fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.backend.set(key, value)
    }

    /// Read the value at `key`, or `None` if absent.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.backend.get(key)
    }

    /// Remove `key` immediately.
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        self.backend.delete(key)
    }

    // ========== Batched operations ==========

    /// Stage a set for the next batch flush. Blocks only on a full queue.
    pub fn enqueue_set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        trace!("enqueued set");
        self.writer.enqueue_set(key, value)
    }

    /// Stage a delete for the next batch flush. Blocks only on a full queue.
    pub fn enqueue_delete(&self, key: &[u8]) -> Result<()> {
        trace!("enqueued delete");
        self.writer.enqueue_delete(key)
    }

    /// Flush pending batched operations and stop the worker. Idempotent;
    /// also runs on drop.
    pub fn close(&mut self) {
        self.writer.close();
    }

    // ========== Counters ==========

    /// Current value of the named counter. Absent or malformed values read
    /// as 0; this never errors.
    pub fn counter(&self, name: &str) -> i64 {
        self.read_counter(&counter_key(name))
    }

    /// Add 1 to the named counter and return the new value.
    pub fn increment(&self, name: &str) -> i64 {
        self.atomic_add(name, 1)
    }

    /// Subtract 1 from the named counter and return the new value.
    pub fn decrement(&self, name: &str) -> i64 {
        self.atomic_add(name, -1)
    }

    fn read_counter(&self, key: &[u8]) -> i64 {
        match self.backend.get(key) {
            Ok(Some(bytes)) => decode_varint(&bytes).unwrap_or(0),
            Ok(None) => 0,
            Err(e) => {
                error!("failed to read counter: {e}");
                0
            }
        }
    }

    /// Serialized read-modify-write. Every visible counter value is the
    /// result of a full cycle under the lock; no two cycles observe the
    /// same prior value.
    fn atomic_add(&self, name: &str, delta: i64) -> i64 {
        let _guard = self.counter_lock.lock();
        let key = counter_key(name);
        let next = self.read_counter(&key).wrapping_add(delta);
        if let Err(e) = self.backend.set(&key, &encode_varint(next)) {
            // The returned value is ahead of storage until the next
            // successful write of this counter.
            error!(counter = name, "failed to persist counter: {e}");
        }
        next
    }
}
