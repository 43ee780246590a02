use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use chunkvault_types::content_hash::ContentHash;
use chunkvault_types::error::Result;

use crate::chunk::{Chunk, ChunkBatch, ChunkRecord, IngestMessage};
use crate::index::ChunkIndex;
use crate::queue::IngestQueue;

/// Counts for one batch passed through the dedup gate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub received: usize,
    /// Already indexed, or repeated within the batch.
    pub duplicates: usize,
    pub enqueued: usize,
}

impl IngestReport {
    fn merge(&mut self, other: IngestReport) {
        self.received += other.received;
        self.duplicates += other.duplicates;
        self.enqueued += other.enqueued;
    }
}

/// Dedup gate in front of the [`IngestQueue`].
#[derive(Clone)]
pub struct Ingestor {
    queue: Arc<IngestQueue>,
    index: ChunkIndex,
}

impl Ingestor {
    pub fn new(queue: Arc<IngestQueue>, index: ChunkIndex) -> Self {
        Self { queue, index }
    }

    /// Drop chunks whose hash is already indexed or already seen earlier in
    /// `batch`, then enqueue the rest as one batch.
    ///
    /// If the existence query fails every chunk is enqueued.
    pub fn ingest_batch(&self, batch: ChunkBatch) -> IngestReport {
        let received = batch.len();
        if batch.is_empty() {
            return IngestReport::default();
        }

        let hashes: Vec<ContentHash> = batch.iter().map(|c| c.hash.clone()).collect();
        let known = match self.index.existing(&hashes) {
            Ok(known) => known,
            Err(e) => {
                warn!(chunks = received, error = %e, "existence check failed; enqueuing without dedup");
                HashSet::new()
            }
        };

        let mut seen: HashSet<ContentHash> = HashSet::with_capacity(received);
        let fresh: ChunkBatch = batch
            .into_iter()
            .filter(|c| !known.contains(&c.hash) && seen.insert(c.hash.clone()))
            .collect();

        let report = IngestReport {
            received,
            duplicates: received - fresh.len(),
            enqueued: fresh.len(),
        };
        if !fresh.is_empty() {
            self.queue.enqueue_back(fresh);
        }
        debug!(
            received = report.received,
            duplicates = report.duplicates,
            enqueued = report.enqueued,
            "batch ingested"
        );
        report
    }

    /// Open a session that buffers `flush_size` chunks per gate pass.
    pub fn session(&self, flush_size: usize) -> IngestSession {
        IngestSession {
            ingestor: self.clone(),
            flush_size: flush_size.max(1),
            buffer: Vec::with_capacity(flush_size.max(1)),
            report: IngestReport::default(),
        }
    }
}

/// One client upload stream. Chunks are buffered and passed through the
/// gate in groups; [`finish`](Self::finish) flushes the remainder.
pub struct IngestSession {
    ingestor: Ingestor,
    flush_size: usize,
    buffer: ChunkBatch,
    report: IngestReport,
}

impl IngestSession {
    pub fn push(&mut self, chunk: Chunk) {
        self.buffer.push(chunk);
        if self.buffer.len() >= self.flush_size {
            self.flush();
        }
    }

    pub fn push_record(&mut self, record: ChunkRecord) -> Result<()> {
        self.push(record.into_chunk()?);
        Ok(())
    }

    /// Handle one text message. Returns `false` once the end marker arrives;
    /// the caller should then call [`finish`](Self::finish).
    pub fn handle_message(&mut self, text: &str) -> Result<bool> {
        match IngestMessage::parse(text)? {
            IngestMessage::Record(record) => {
                self.push_record(record)?;
                Ok(true)
            }
            IngestMessage::EndOfStream => Ok(false),
        }
    }

    /// Chunks buffered but not yet gated.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let batch = std::mem::replace(&mut self.buffer, Vec::with_capacity(self.flush_size));
        let report = self.ingestor.ingest_batch(batch);
        self.report.merge(report);
    }

    /// Flush what is buffered and return totals for the whole session.
    pub fn finish(mut self) -> IngestReport {
        self.flush();
        self.report
    }
}
