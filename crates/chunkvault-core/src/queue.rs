use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::chunk::{Chunk, ChunkBatch};

/// A bounded unit of upload work: batches in queue order whose total chunk
/// count never exceeds the flush threshold it was extracted with.
#[derive(Debug, Default)]
pub struct Task {
    pub batches: Vec<ChunkBatch>,
}

impl Task {
    pub fn chunk_count(&self) -> usize {
        self.batches.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.iter().all(Vec::is_empty)
    }

    /// Flatten into packing order.
    pub fn into_chunks(self) -> impl Iterator<Item = Chunk> {
        self.batches.into_iter().flatten()
    }
}

struct QueueState {
    batches: VecDeque<ChunkBatch>,
    total_chunks: usize,
    last_flush: Instant,
}

impl QueueState {
    #[inline]
    fn check_invariant(&self) {
        debug_assert_eq!(
            self.total_chunks,
            self.batches.iter().map(Vec::len).sum::<usize>(),
            "queued chunk counter out of sync with queued batches"
        );
    }
}

/// Insertion-ordered queue of chunk batches shared by ingestion and the
/// dispatcher. Every operation holds one mutex for its whole duration and does
/// no I/O under it.
pub struct IngestQueue {
    state: Mutex<QueueState>,
}

impl Default for IngestQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl IngestQueue {
    pub fn new() -> Self {
        Self::with_last_flush(Instant::now())
    }

    /// Create a queue whose idle clock starts at `last_flush`.
    pub fn with_last_flush(last_flush: Instant) -> Self {
        Self {
            state: Mutex::new(QueueState {
                batches: VecDeque::new(),
                total_chunks: 0,
                last_flush,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        // Every mutation leaves the state consistent before it can panic.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn enqueue_back(&self, batch: ChunkBatch) {
        let mut st = self.lock();
        st.total_chunks += batch.len();
        st.batches.push_back(batch);
        st.check_invariant();
    }

    pub fn enqueue_front(&self, batch: ChunkBatch) {
        let mut st = self.lock();
        st.total_chunks += batch.len();
        st.batches.push_front(batch);
        st.check_invariant();
    }

    pub fn pop_front(&self) -> Option<ChunkBatch> {
        let mut st = self.lock();
        let batch = st.batches.pop_front()?;
        st.total_chunks -= batch.len();
        st.check_invariant();
        Some(batch)
    }

    pub fn pop_back(&self) -> Option<ChunkBatch> {
        let mut st = self.lock();
        let batch = st.batches.pop_back()?;
        st.total_chunks -= batch.len();
        st.check_invariant();
        Some(batch)
    }

    /// Remove every queued batch at once, oldest first.
    pub fn drain(&self) -> Vec<ChunkBatch> {
        let mut st = self.lock();
        st.total_chunks = 0;
        st.batches.drain(..).collect()
    }

    pub fn total_chunks(&self) -> usize {
        self.lock().total_chunks
    }

    /// Number of queued batches.
    pub fn len(&self) -> usize {
        self.lock().batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().batches.is_empty()
    }

    /// Time since the last extraction.
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.lock().last_flush)
    }

    /// Take up to `budget` chunks from the front as one [`Task`].
    ///
    /// Whole batches are taken while they fit; a batch straddling the budget
    /// is split and its tail goes back to the front, so chunk order is never
    /// changed. Always records `now` as the last flush, even when the queue
    /// was empty.
    pub fn extract(&self, budget: usize, now: Instant) -> Task {
        let mut st = self.lock();
        let mut remaining = budget;
        let mut task = Task::default();

        while remaining > 0 {
            let Some(mut batch) = st.batches.pop_front() else {
                break;
            };
            if batch.len() <= remaining {
                remaining -= batch.len();
                st.total_chunks -= batch.len();
                task.batches.push(batch);
            } else {
                let tail = batch.split_off(remaining);
                st.total_chunks -= batch.len();
                st.batches.push_front(tail);
                task.batches.push(batch);
                remaining = 0;
            }
        }

        st.last_flush = now;
        st.check_invariant();
        task
    }
}
