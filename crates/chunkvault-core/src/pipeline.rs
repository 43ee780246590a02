use std::sync::Arc;

use tracing::info;

use chunkvault_storage::Backends;
use chunkvault_types::error::Result;

use crate::assemble::BlobAssembler;
use crate::config::ChunkVaultConfig;
use crate::dispatcher::{Dispatcher, DispatcherHandle, FlushPolicy, TaskSink};
use crate::fetch::ConcurrentFetcher;
use crate::index::ChunkIndex;
use crate::ingest::{IngestSession, Ingestor};
use crate::pool::{PoolStats, WorkerPool};
use crate::queue::IngestQueue;
use crate::retrieve::Retriever;

/// A running store: ingest gate, queue, dispatcher thread, worker pool and
/// retriever wired to one pair of backends.
pub struct Pipeline {
    queue: Arc<IngestQueue>,
    pool: Arc<WorkerPool>,
    dispatcher: Dispatcher,
    handle: Option<DispatcherHandle>,
    ingestor: Ingestor,
    retriever: Retriever,
    index: ChunkIndex,
    session_flush_size: usize,
}

impl Pipeline {
    pub fn start(config: &ChunkVaultConfig, backends: Backends) -> Result<Self> {
        config.validate()?;
        let p = &config.pipeline;
        let policy = FlushPolicy {
            flush_threshold: p.flush_threshold,
            poll_interval: p.poll_interval()?,
            idle_timeout: p.idle_timeout()?,
        };

        let index = ChunkIndex::new(Arc::clone(&backends.metadata));
        let queue = Arc::new(IngestQueue::new());
        let assembler = Arc::new(BlobAssembler::new(
            Arc::clone(&backends.blobs),
            index.clone(),
        ));
        let pool = Arc::new(WorkerPool::new(
            p.workers,
            p.task_queue_capacity,
            assembler,
        )?);
        let sink: Arc<dyn TaskSink> = pool.clone();
        let dispatcher = Dispatcher::new(Arc::clone(&queue), sink, policy);
        let handle = dispatcher.clone().spawn()?;

        let ingestor = Ingestor::new(Arc::clone(&queue), index.clone());
        let fetcher = ConcurrentFetcher::new(backends.blobs, config.retrieval.fetch_threads);
        let retriever = Retriever::new(index.clone(), fetcher);

        info!(
            workers = p.workers,
            flush_threshold = p.flush_threshold,
            fetch_threads = config.retrieval.fetch_threads,
            "pipeline started"
        );

        Ok(Self {
            queue,
            pool,
            dispatcher,
            handle: Some(handle),
            ingestor,
            retriever,
            index,
            session_flush_size: p.session_flush_size,
        })
    }

    pub fn ingestor(&self) -> &Ingestor {
        &self.ingestor
    }

    /// New upload session using the configured buffer size.
    pub fn session(&self) -> IngestSession {
        self.ingestor.session(self.session_flush_size)
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn index(&self) -> &ChunkIndex {
        &self.index
    }

    pub fn queue(&self) -> &Arc<IngestQueue> {
        &self.queue
    }

    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Push everything queued to the workers now and wait for it to land.
    pub fn flush_and_wait(&self) {
        self.dispatcher.flush_all();
        self.pool.wait();
    }

    /// Stop the dispatcher (flushing what is queued), drain the pool and
    /// join all threads.
    pub fn shutdown(mut self) -> Result<PoolStats> {
        if let Some(handle) = self.handle.take() {
            handle.shutdown()?;
        }
        self.pool.wait();
        self.pool.shutdown();
        let stats = self.pool.stats();
        info!(
            tasks = stats.tasks_completed,
            failed = stats.tasks_failed,
            chunks = stats.chunks_indexed,
            bytes = stats.bytes_uploaded,
            "pipeline stopped"
        );
        Ok(stats)
    }
}
