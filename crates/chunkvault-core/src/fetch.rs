use std::sync::Arc;

use crossbeam_channel::unbounded;
use tracing::{debug, warn};

use chunkvault_storage::BlobStore;
use chunkvault_types::error::{ChunkVaultError, Result};

use crate::coalesce::CoalescedRange;

/// Bytes read for one coalesced range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedRange {
    pub range: CoalescedRange,
    pub data: Vec<u8>,
}

/// A range whose read failed.
#[derive(Debug)]
pub struct FailedRange {
    pub range: CoalescedRange,
    pub error: ChunkVaultError,
}

/// Results of one fan-out.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    /// Successful reads sorted by first chunk number.
    pub fetched: Vec<FetchedRange>,
    pub failed: Vec<FailedRange>,
}

/// Reads coalesced ranges in parallel, one read per range.
#[derive(Clone)]
pub struct ConcurrentFetcher {
    blobs: Arc<dyn BlobStore>,
    threads: usize,
}

impl ConcurrentFetcher {
    pub fn new(blobs: Arc<dyn BlobStore>, threads: usize) -> Self {
        Self {
            blobs,
            threads: threads.max(1),
        }
    }

    /// Fetch every range. A failed read is logged and reported without
    /// cancelling the others; successes come back in file order.
    pub fn fetch_all(&self, ranges: Vec<CoalescedRange>) -> Result<FetchOutcome> {
        if ranges.is_empty() {
            return Ok(FetchOutcome::default());
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads.min(ranges.len()))
            .thread_name(|i| format!("chunkvault-fetch-{i}"))
            .build()
            .map_err(|e| ChunkVaultError::Other(format!("failed to build thread pool: {e}")))?;

        let (tx, rx) = unbounded::<std::result::Result<FetchedRange, FailedRange>>();
        let blobs = &self.blobs;

        pool.in_place_scope(|s| {
            for range in ranges {
                let tx = tx.clone();
                s.spawn(move |_| {
                    let result = read_range(blobs.as_ref(), &range);
                    let msg = match result {
                        Ok(data) => Ok(FetchedRange { range, data }),
                        Err(error) => {
                            warn!(
                                blob_key = %range.blob_key,
                                start = range.start,
                                end = range.end,
                                first_chunk_no = range.first_chunk_no,
                                error = %error,
                                "range fetch failed"
                            );
                            Err(FailedRange { range, error })
                        }
                    };
                    // The receiver outlives the scope.
                    let _ = tx.send(msg);
                });
            }
        });
        drop(tx);

        let mut outcome = FetchOutcome::default();
        for msg in rx {
            match msg {
                Ok(f) => outcome.fetched.push(f),
                Err(f) => outcome.failed.push(f),
            }
        }
        outcome.fetched.sort_by_key(|f| f.range.first_chunk_no);
        outcome.failed.sort_by_key(|f| f.range.first_chunk_no);

        debug!(
            fetched = outcome.fetched.len(),
            failed = outcome.failed.len(),
            "fan-out complete"
        );
        Ok(outcome)
    }
}

fn read_range(blobs: &dyn BlobStore, range: &CoalescedRange) -> Result<Vec<u8>> {
    let data = blobs.get_range(range.blob_key.as_str(), range.start, range.end)?;
    if data.len() as u64 != range.len() {
        return Err(ChunkVaultError::ShortRead {
            key: range.blob_key.to_string(),
            expected: range.len(),
            actual: data.len() as u64,
        });
    }
    Ok(data)
}
