use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use tracing::{debug, info, warn};

use chunkvault_types::error::{ChunkVaultError, Result};

use crate::queue::{IngestQueue, Task};

/// Receives Tasks extracted by the dispatcher. `submit` may block.
pub trait TaskSink: Send + Sync {
    fn submit(&self, task: Task);
}

impl<T: TaskSink + ?Sized> TaskSink for Arc<T> {
    fn submit(&self, task: Task) {
        (**self).submit(task)
    }
}

/// When accumulated chunks become a Task.
#[derive(Debug, Clone, Copy)]
pub struct FlushPolicy {
    /// Chunks per Task and the size-flush trigger.
    pub flush_threshold: usize,
    pub poll_interval: Duration,
    /// Flush a partial Task once the queue has gone this long without a flush.
    pub idle_timeout: Duration,
}

impl Default for FlushPolicy {
    fn default() -> Self {
        Self {
            flush_threshold: 500,
            poll_interval: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(60),
        }
    }
}

/// Turns queued chunks into Tasks and hands them to a [`TaskSink`].
#[derive(Clone)]
pub struct Dispatcher {
    queue: Arc<IngestQueue>,
    sink: Arc<dyn TaskSink>,
    policy: FlushPolicy,
    /// Held from extraction through submit. Shared by all clones.
    dispatching: Arc<Mutex<()>>,
}

impl Dispatcher {
    pub fn new(queue: Arc<IngestQueue>, sink: Arc<dyn TaskSink>, policy: FlushPolicy) -> Self {
        Self {
            queue,
            sink,
            // A zero threshold would never drain the queue.
            policy: FlushPolicy {
                flush_threshold: policy.flush_threshold.max(1),
                ..policy
            },
            dispatching: Arc::new(Mutex::new(())),
        }
    }

    pub fn policy(&self) -> &FlushPolicy {
        &self.policy
    }

    pub fn queue(&self) -> &Arc<IngestQueue> {
        &self.queue
    }

    /// Run one poll tick at `now`. Returns the number of Tasks emitted.
    ///
    /// Full Tasks are cut while the queue holds at least a threshold's worth
    /// of chunks; then, if the queue has been idle longer than the timeout,
    /// whatever is left goes out as one short Task.
    pub fn tick(&self, now: Instant) -> usize {
        let _dispatching = self.dispatching.lock().unwrap_or_else(|e| e.into_inner());
        let threshold = self.policy.flush_threshold;
        let mut emitted = 0;

        loop {
            let queued = self.queue.total_chunks();
            let size_flush = queued >= threshold;
            let idle_flush = queued > 0 && self.queue.idle_for(now) > self.policy.idle_timeout;
            if !size_flush && !idle_flush {
                break;
            }

            let task = self.queue.extract(threshold, now);
            let chunks = task.chunk_count();
            if chunks == 0 {
                break;
            }
            debug!(
                chunks,
                batches = task.batches.len(),
                reason = if size_flush { "size" } else { "idle" },
                "dispatching task"
            );
            self.sink.submit(task);
            emitted += 1;
        }

        emitted
    }

    /// Flush everything still queued, cutting Tasks at the threshold.
    /// Returns the number of Tasks emitted.
    pub fn flush_all(&self) -> usize {
        let _dispatching = self.dispatching.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        let mut emitted = 0;
        while self.queue.total_chunks() > 0 {
            let task = self.queue.extract(self.policy.flush_threshold, now);
            if task.chunk_count() == 0 {
                break;
            }
            self.sink.submit(task);
            emitted += 1;
        }
        // Only empty batches can remain at this point.
        self.queue.drain();
        emitted
    }

    /// Run the poll loop on a background thread.
    pub fn spawn(self) -> Result<DispatcherHandle> {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let interval = self.policy.poll_interval;

        let thread = std::thread::Builder::new()
            .name("chunkvault-dispatcher".into())
            .spawn(move || {
                info!(
                    flush_threshold = self.policy.flush_threshold,
                    poll_interval = ?interval,
                    idle_timeout = ?self.policy.idle_timeout,
                    "dispatcher started"
                );
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            self.tick(Instant::now());
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                let flushed = self.flush_all();
                info!(final_tasks = flushed, "dispatcher stopped");
            })
            .map_err(|e| ChunkVaultError::Other(format!("failed to spawn dispatcher: {e}")))?;

        Ok(DispatcherHandle {
            stop: Some(stop_tx),
            thread: Some(thread),
        })
    }
}

/// Owns the dispatcher thread. Dropping it stops the loop as well.
pub struct DispatcherHandle {
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl DispatcherHandle {
    /// Stop polling, flush what is still queued and join the thread.
    pub fn shutdown(mut self) -> Result<()> {
        self.stop_and_join()
    }

    fn stop_and_join(&mut self) -> Result<()> {
        // Dropping the sender wakes the loop even if the signal is never read.
        if let Some(stop) = self.stop.take() {
            let _ = stop.try_send(());
        }
        if let Some(thread) = self.thread.take() {
            thread
                .join()
                .map_err(|_| ChunkVaultError::Other("dispatcher thread panicked".into()))?;
        }
        Ok(())
    }
}

impl Drop for DispatcherHandle {
    fn drop(&mut self) {
        if let Err(e) = self.stop_and_join() {
            warn!(error = %e, "dispatcher shutdown failed");
        }
    }
}
