use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{debug, error, warn};

use chunkvault_types::blob_key::BlobKey;
use chunkvault_types::error::{ChunkVaultError, Result};

use crate::dispatcher::TaskSink;
use crate::queue::Task;

/// What processing one Task produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskOutcome {
    /// Key of the uploaded blob, `None` when nothing was packed.
    pub blob_key: Option<BlobKey>,
    pub chunks_indexed: u64,
    pub chunks_skipped: u64,
    pub bytes_uploaded: u64,
}

/// Work run by each pool thread for one Task.
pub trait TaskProcessor: Send + Sync {
    fn process(&self, task: Task) -> Result<TaskOutcome>;
}

/// Counter snapshot for one pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub chunks_indexed: u64,
    pub chunks_skipped: u64,
    pub bytes_uploaded: u64,
}

#[derive(Default)]
struct StatCounters {
    tasks_completed: AtomicU64,
    tasks_failed: AtomicU64,
    chunks_indexed: AtomicU64,
    chunks_skipped: AtomicU64,
    bytes_uploaded: AtomicU64,
}

impl StatCounters {
    fn record(&self, outcome: &TaskOutcome) {
        self.tasks_completed.fetch_add(1, Ordering::Relaxed);
        self.chunks_indexed
            .fetch_add(outcome.chunks_indexed, Ordering::Relaxed);
        self.chunks_skipped
            .fetch_add(outcome.chunks_skipped, Ordering::Relaxed);
        self.bytes_uploaded
            .fetch_add(outcome.bytes_uploaded, Ordering::Relaxed);
    }

    fn snapshot(&self) -> PoolStats {
        PoolStats {
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
            chunks_indexed: self.chunks_indexed.load(Ordering::Relaxed),
            chunks_skipped: self.chunks_skipped.load(Ordering::Relaxed),
            bytes_uploaded: self.bytes_uploaded.load(Ordering::Relaxed),
        }
    }
}

// ---------------------------------------------------------------------------
// Outstanding: submitted but unfinished Tasks
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Outstanding {
    count: Mutex<usize>,
    idle: Condvar,
}

impl Outstanding {
    fn lock(&self) -> MutexGuard<'_, usize> {
        self.count.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn add(&self) {
        *self.lock() += 1;
    }

    fn done(&self) {
        let mut n = self.lock();
        *n = n.saturating_sub(1);
        if *n == 0 {
            self.idle.notify_all();
        }
    }

    fn wait_idle(&self) {
        let mut n = self.lock();
        while *n > 0 {
            n = self.idle.wait(n).unwrap_or_else(|e| e.into_inner());
        }
    }

    fn current(&self) -> usize {
        *self.lock()
    }
}

/// Marks one Task finished when dropped, so a worker that unwinds still
/// releases waiters.
struct CompletionGuard<'a>(&'a Outstanding);

impl Drop for CompletionGuard<'_> {
    fn drop(&mut self) {
        self.0.done();
    }
}

// ---------------------------------------------------------------------------
// WorkerPool
// ---------------------------------------------------------------------------

/// Fixed set of threads consuming Tasks from a bounded channel.
pub struct WorkerPool {
    sender: Mutex<Option<Sender<Task>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    outstanding: Arc<Outstanding>,
    stats: Arc<StatCounters>,
}

impl WorkerPool {
    /// Start `workers` threads behind a channel holding up to `capacity`
    /// waiting Tasks.
    pub fn new(
        workers: usize,
        capacity: usize,
        processor: Arc<dyn TaskProcessor>,
    ) -> Result<Self> {
        let (tx, rx) = bounded::<Task>(capacity.max(1));
        let outstanding = Arc::new(Outstanding::default());
        let stats = Arc::new(StatCounters::default());

        let mut handles = Vec::with_capacity(workers.max(1));
        for id in 0..workers.max(1) {
            let rx = rx.clone();
            let processor = Arc::clone(&processor);
            let outstanding = Arc::clone(&outstanding);
            let stats = Arc::clone(&stats);
            let handle = std::thread::Builder::new()
                .name(format!("chunkvault-worker-{id}"))
                .spawn(move || worker_loop(id, rx, processor, outstanding, stats))
                .map_err(|e| ChunkVaultError::Other(format!("failed to spawn worker: {e}")))?;
            handles.push(handle);
        }

        Ok(Self {
            sender: Mutex::new(Some(tx)),
            workers: Mutex::new(handles),
            outstanding,
            stats,
        })
    }

    /// Queue a Task, blocking while the channel is full.
    pub fn try_submit(&self, task: Task) -> Result<()> {
        // Clone the sender so a blocking send never holds the lock.
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or_else(|| ChunkVaultError::Other("worker pool is shut down".into()))?;

        self.outstanding.add();
        if sender.send(task).is_err() {
            self.outstanding.done();
            return Err(ChunkVaultError::Other("worker pool is shut down".into()));
        }
        Ok(())
    }

    /// Block until every Task submitted so far has finished.
    pub fn wait(&self) {
        self.outstanding.wait_idle();
    }

    /// Tasks submitted but not yet finished.
    pub fn outstanding(&self) -> usize {
        self.outstanding.current()
    }

    pub fn stats(&self) -> PoolStats {
        self.stats.snapshot()
    }

    /// Close the channel and join the workers. Tasks already queued are
    /// still processed. Calling this twice is harmless.
    pub fn shutdown(&self) {
        drop(self.sender.lock().unwrap_or_else(|e| e.into_inner()).take());
        let handles: Vec<_> = self
            .workers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        for handle in handles {
            if handle.join().is_err() {
                error!("worker thread panicked outside task processing");
            }
        }
    }
}

impl TaskSink for WorkerPool {
    fn submit(&self, task: Task) {
        let chunks = task.chunk_count();
        if let Err(e) = self.try_submit(task) {
            error!(chunks, error = %e, "task dropped");
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(
    id: usize,
    rx: Receiver<Task>,
    processor: Arc<dyn TaskProcessor>,
    outstanding: Arc<Outstanding>,
    stats: Arc<StatCounters>,
) {
    for task in rx.iter() {
        let _done = CompletionGuard(&outstanding);
        let chunks = task.chunk_count();
        match panic::catch_unwind(AssertUnwindSafe(|| processor.process(task))) {
            Ok(Ok(outcome)) => {
                debug!(
                    worker = id,
                    chunks,
                    blob_key = outcome.blob_key.as_ref().map(|k| k.as_str()),
                    indexed = outcome.chunks_indexed,
                    skipped = outcome.chunks_skipped,
                    "task complete"
                );
                stats.record(&outcome);
            }
            Ok(Err(e)) => {
                stats.tasks_failed.fetch_add(1, Ordering::Relaxed);
                error!(worker = id, chunks, error = %e, "task failed");
            }
            Err(_) => {
                stats.tasks_failed.fetch_add(1, Ordering::Relaxed);
                warn!(worker = id, chunks, "task processor panicked");
            }
        }
    }
    debug!(worker = id, "worker exiting");
}
