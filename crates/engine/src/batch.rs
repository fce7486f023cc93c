//! Batched write coordinator
//!
//! A single worker thread drains a bounded queue of pending set/delete
//! operations and applies them to the key-value backend as atomic batches.
//! A batch flushes when it reaches `flush_threshold` operations, or when
//! `flush_interval` elapses with at least one operation pending.
//!
//! A failed apply leaves the batch untouched; the same operations are
//! retried at the next trigger. Accepted writes are never silently dropped
//! while the worker lives, and `close` flushes whatever is still pending
//! before the worker exits.

use brickstore_backend::{BatchOp, KvBackend};
use brickstore_core::{Error, Result};
use std::sync::mpsc::{sync_channel, Receiver, RecvTimeoutError, SyncSender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Tuning knobs for the write coordinator.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Bounded queue capacity; enqueue blocks when full (backpressure).
    pub queue_capacity: usize,
    /// Flush as soon as this many operations have accumulated.
    pub flush_threshold: usize,
    /// Flush this long after the first pending operation arrived.
    pub flush_interval: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            // 10 pending entries per operation kind
            queue_capacity: 20,
            flush_threshold: 10,
            flush_interval: Duration::from_secs(10),
        }
    }
}

/// Owns the pending-operation queue and the worker that drains it.
pub struct BatchWriter {
    sender: Option<SyncSender<BatchOp>>,
    worker: Option<JoinHandle<()>>,
}

impl BatchWriter {
    /// Spawn the worker with default tuning.
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self::with_config(backend, BatchConfig::default())
    }

    /// Spawn the worker with explicit tuning.
    pub fn with_config(backend: Arc<dyn KvBackend>, config: BatchConfig) -> Self {
        let (sender, receiver) = sync_channel(config.queue_capacity);
        let worker = std::thread::Builder::new()
            .name("brickstore-batch".to_string())
            .spawn(move || worker_loop(backend, receiver, config))
            .expect("failed to spawn batch writer thread");
        Self {
            sender: Some(sender),
            worker: Some(worker),
        }
    }

    /// Stage a set operation. Blocks only when the queue is full.
    pub fn enqueue_set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.enqueue(BatchOp::Set {
            key: key.to_vec(),
            value: value.to_vec(),
        })
    }

    /// Stage a delete operation. Blocks only when the queue is full.
    pub fn enqueue_delete(&self, key: &[u8]) -> Result<()> {
        self.enqueue(BatchOp::Delete { key: key.to_vec() })
    }

    fn enqueue(&self, op: BatchOp) -> Result<()> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| Error::Backend("write coordinator is closed".to_string()))?;
        sender
            .send(op)
            .map_err(|_| Error::Backend("write coordinator is closed".to_string()))
    }

    /// Stop accepting operations, flush everything pending, and join the
    /// worker. Idempotent.
    pub fn close(&mut self) {
        // Dropping the sender disconnects the channel; the worker flushes
        // its remaining batch and exits.
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("batch writer worker panicked");
            }
        }
    }
}

impl Drop for BatchWriter {
    fn drop(&mut self) {
        self.close();
    }
}

fn worker_loop(backend: Arc<dyn KvBackend>, receiver: Receiver<BatchOp>, config: BatchConfig) {
    let mut batch: Vec<BatchOp> = Vec::new();
    // Set when the batch becomes non-empty; cleared on successful flush.
    let mut deadline: Option<Instant> = None;

    loop {
        let event = match deadline {
            // Nothing pending: no timer to race, just wait for work.
            None => receiver.recv().map_err(|_| RecvTimeoutError::Disconnected),
            Some(at) => {
                let now = Instant::now();
                if now >= at {
                    Err(RecvTimeoutError::Timeout)
                } else {
                    receiver.recv_timeout(at - now)
                }
            }
        };

        match event {
            Ok(op) => {
                if deadline.is_none() {
                    deadline = Some(Instant::now() + config.flush_interval);
                }
                batch.push(op);
                if batch.len() >= config.flush_threshold {
                    flush(&*backend, &mut batch, &mut deadline, config.flush_interval);
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                debug!(ops = batch.len(), "flushing batch after timeout");
                flush(&*backend, &mut batch, &mut deadline, config.flush_interval);
            }
            Err(RecvTimeoutError::Disconnected) => {
                if !batch.is_empty() {
                    match backend.apply_batch(&batch) {
                        Ok(()) => debug!(ops = batch.len(), "flushed final batch on close"),
                        // The worker is exiting; nothing left to retry with.
                        Err(e) => error!(ops = batch.len(), "dropping final batch on close: {e}"),
                    }
                }
                return;
            }
        }
    }
}

/// Apply the accumulated batch. On failure the batch is kept as-is so the
/// same operations are retried at the next trigger; the deadline is pushed
/// out one interval so the timer keeps firing.
fn flush(
    backend: &dyn KvBackend,
    batch: &mut Vec<BatchOp>,
    deadline: &mut Option<Instant>,
    interval: Duration,
) {
    if batch.is_empty() {
        *deadline = None;
        return;
    }
    match backend.apply_batch(batch) {
        Ok(()) => {
            debug!(ops = batch.len(), "flushed batch");
            batch.clear();
            *deadline = None;
        }
        Err(e) => {
            warn!(ops = batch.len(), "failed to apply batch, will retry: {e}");
            *deadline = Some(Instant::now() + interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brickstore_backend::MemoryKv;
    use parking_lot::{Condvar, Mutex};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::thread;

    fn fast_config() -> BatchConfig {
        BatchConfig {
            queue_capacity: 20,
            flush_threshold: 10,
            flush_interval: Duration::from_millis(50),
        }
    }

    /// Backend wrapper that fails `apply_batch` while `fail` is set and
    /// records how many apply attempts were made.
    struct FlakyKv {
        inner: MemoryKv,
        fail: AtomicBool,
        attempts: AtomicUsize,
        applied: Mutex<Vec<usize>>,
    }

    impl FlakyKv {
        fn new() -> Self {
            Self {
                inner: MemoryKv::new(),
                fail: AtomicBool::new(false),
                attempts: AtomicUsize::new(0),
                applied: Mutex::new(Vec::new()),
            }
        }
    }

    impl KvBackend for FlakyKv {
        fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
            self.inner.set(key, value)
        }
        fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
            self.inner.get(key)
        }
        fn delete(&self, key: &[u8]) -> Result<()> {
            self.inner.delete(key)
        }
        fn apply_batch(&self, ops: &[BatchOp]) -> Result<()> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(Error::Backend("injected apply failure".to_string()));
            }
            self.applied.lock().push(ops.len());
            self.inner.apply_batch(ops)
        }
    }

    #[test]
    fn test_size_triggered_flush() {
        let backend = Arc::new(MemoryKv::new());
        let writer = BatchWriter::with_config(
            backend.clone(),
            BatchConfig {
                // Long interval: only the size trigger can explain the flush
                flush_interval: Duration::from_secs(60),
                ..BatchConfig::default()
            },
        );

        for i in 0..10u8 {
            writer.enqueue_set(&[i], b"v").unwrap();
        }

        // Give the worker a moment to hit the threshold and apply
        let deadline = Instant::now() + Duration::from_secs(2);
        while backend.len() < 10 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(backend.len(), 10);
        assert_eq!(backend.get(&[3]).unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn test_timer_triggered_flush() {
        let backend = Arc::new(MemoryKv::new());
        let writer = BatchWriter::with_config(backend.clone(), fast_config());

        writer.enqueue_set(b"k", b"v").unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while backend.get(b"k").unwrap().is_none() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(backend.get(b"k").unwrap(), Some(b"v".to_vec()));
        drop(writer);
    }

    #[test]
    fn test_delete_after_set_within_batch() {
        let backend = Arc::new(MemoryKv::new());
        let mut writer = BatchWriter::with_config(backend.clone(), fast_config());

        writer.enqueue_set(b"k", b"v").unwrap();
        writer.enqueue_delete(b"k").unwrap();
        writer.close();

        assert_eq!(backend.get(b"k").unwrap(), None);
    }

    #[test]
    fn test_close_flushes_pending() {
        let backend = Arc::new(MemoryKv::new());
        let mut writer = BatchWriter::with_config(
            backend.clone(),
            BatchConfig {
                flush_interval: Duration::from_secs(60),
                ..BatchConfig::default()
            },
        );

        // Below the size threshold and far from the timer
        writer.enqueue_set(b"a", b"1").unwrap();
        writer.enqueue_set(b"b", b"2").unwrap();
        writer.close();

        assert_eq!(backend.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(backend.get(b"b").unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    fn test_failed_apply_retries_same_ops() {
        let backend = Arc::new(FlakyKv::new());
        backend.fail.store(true, Ordering::SeqCst);

        let writer = BatchWriter::with_config(
            backend.clone(),
            BatchConfig {
                queue_capacity: 20,
                flush_threshold: 3,
                flush_interval: Duration::from_millis(30),
            },
        );

        writer.enqueue_set(b"a", b"1").unwrap();
        writer.enqueue_set(b"b", b"2").unwrap();
        writer.enqueue_set(b"c", b"3").unwrap();

        // Wait for at least one failed attempt
        let deadline = Instant::now() + Duration::from_secs(2);
        while backend.attempts.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(backend.attempts.load(Ordering::SeqCst) >= 1);
        assert_eq!(backend.inner.get(b"a").unwrap(), None);

        // Heal the backend; the timer retry must apply the original batch
        backend.fail.store(false, Ordering::SeqCst);
        let deadline = Instant::now() + Duration::from_secs(2);
        while backend.inner.get(b"a").unwrap().is_none() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }

        assert_eq!(backend.inner.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(backend.inner.get(b"b").unwrap(), Some(b"2".to_vec()));
        assert_eq!(backend.inner.get(b"c").unwrap(), Some(b"3".to_vec()));
        // All three ops arrived in one retried batch
        assert_eq!(backend.applied.lock().clone(), vec![3usize]);
    }

    #[test]
    fn test_enqueue_after_close_errors() {
        let backend = Arc::new(MemoryKv::new());
        let mut writer = BatchWriter::with_config(backend, fast_config());
        writer.close();
        assert!(writer.enqueue_set(b"k", b"v").is_err());
        assert!(writer.enqueue_delete(b"k").is_err());
    }

    #[test]
    fn test_close_is_idempotent() {
        let backend = Arc::new(MemoryKv::new());
        let mut writer = BatchWriter::with_config(backend, fast_config());
        writer.close();
        writer.close();
    }

    #[test]
    fn test_producer_order_preserved_within_batch() {
        // A set then delete then set of the same key must land in order:
        // the final state is the last write.
        let backend = Arc::new(MemoryKv::new());
        let mut writer = BatchWriter::with_config(backend.clone(), fast_config());

        writer.enqueue_set(b"k", b"first").unwrap();
        writer.enqueue_delete(b"k").unwrap();
        writer.enqueue_set(b"k", b"last").unwrap();
        writer.close();

        assert_eq!(backend.get(b"k").unwrap(), Some(b"last".to_vec()));
    }

    /// Backend whose `apply_batch` parks until `release` is called, and
    /// records when the worker has entered an apply.
    struct GatedKv {
        inner: MemoryKv,
        entered: AtomicUsize,
        open: Mutex<bool>,
        cv: Condvar,
    }

    impl GatedKv {
        fn new() -> Self {
            Self {
                inner: MemoryKv::new(),
                entered: AtomicUsize::new(0),
                open: Mutex::new(false),
                cv: Condvar::new(),
            }
        }

        fn release(&self) {
            *self.open.lock() = true;
            self.cv.notify_all();
        }
    }

    impl KvBackend for GatedKv {
        fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
            self.inner.set(key, value)
        }
        fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
            self.inner.get(key)
        }
        fn delete(&self, key: &[u8]) -> Result<()> {
            self.inner.delete(key)
        }
        fn apply_batch(&self, ops: &[BatchOp]) -> Result<()> {
            self.entered.fetch_add(1, Ordering::SeqCst);
            let mut open = self.open.lock();
            while !*open {
                self.cv.wait(&mut open);
            }
            drop(open);
            self.inner.apply_batch(ops)
        }
    }

    #[test]
    fn test_enqueue_blocks_on_full_queue() {
        let backend = Arc::new(GatedKv::new());
        let writer = Arc::new(BatchWriter::with_config(
            backend.clone(),
            BatchConfig {
                queue_capacity: 1,
                flush_threshold: 1,
                flush_interval: Duration::from_secs(60),
            },
        ));

        // First op: the worker picks it up and stalls inside apply_batch.
        writer.enqueue_set(b"a", b"1").unwrap();
        let deadline = Instant::now() + Duration::from_secs(2);
        while backend.entered.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(backend.entered.load(Ordering::SeqCst) >= 1);

        // Second op fills the single queue slot without blocking.
        writer.enqueue_set(b"b", b"2").unwrap();

        // Third op must block until the worker frees a slot.
        let done = Arc::new(AtomicBool::new(false));
        let producer = {
            let writer = Arc::clone(&writer);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                writer.enqueue_set(b"c", b"3").unwrap();
                done.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(150));
        assert!(
            !done.load(Ordering::SeqCst),
            "enqueue returned while the queue was full"
        );

        backend.release();
        producer.join().unwrap();
        assert!(done.load(Ordering::SeqCst));

        // Close and verify nothing was lost under backpressure.
        drop(writer);
        assert_eq!(backend.inner.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(backend.inner.get(b"b").unwrap(), Some(b"2".to_vec()));
        assert_eq!(backend.inner.get(b"c").unwrap(), Some(b"3".to_vec()));
    }
}
