use std::io::Write;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Serialize;
use tracing::{info, warn};

use chunkvault_types::content_hash::ContentHash;
use chunkvault_types::error::{ChunkVaultError, Result};

use crate::coalesce::{coalesce, ChunkRequest, CoalescePlan, CoalescedRange};
use crate::fetch::{ConcurrentFetcher, FetchOutcome};
use crate::index::ChunkIndex;

/// What a retrieval delivered and what it could not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetrievalReport {
    pub chunks_requested: usize,
    pub ranges_fetched: usize,
    pub ranges_failed: usize,
    pub bytes_delivered: u64,
    /// Requests with no index entry.
    pub missing: Vec<ChunkRequest>,
    /// Chunk numbers covered by ranges whose read failed.
    pub failed_chunks: Vec<u64>,
}

impl RetrievalReport {
    /// True when every requested chunk was delivered.
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty() && self.failed_chunks.is_empty()
    }
}

/// One range handed to a streaming consumer, tagged with its first chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamedRange {
    pub chunk_no: u64,
    pub data: Vec<u8>,
}

#[derive(Serialize)]
struct JsonFrame<'a> {
    chunk_no: u64,
    data: &'a str,
}

impl StreamedRange {
    /// `{"chunk_no": .., "data": "<base64>"}` for text transports.
    pub fn to_json_frame(&self) -> Result<String> {
        let data = BASE64.encode(&self.data);
        Ok(serde_json::to_string(&JsonFrame {
            chunk_no: self.chunk_no,
            data: &data,
        })?)
    }
}

/// Rebuilds files from chunk requests: index lookup, coalescing, parallel
/// fetch, then in-order delivery.
#[derive(Clone)]
pub struct Retriever {
    index: ChunkIndex,
    fetcher: ConcurrentFetcher,
}

impl Retriever {
    pub fn new(index: ChunkIndex, fetcher: ConcurrentFetcher) -> Self {
        Self { index, fetcher }
    }

    /// Resolve and coalesce without reading any blob data.
    pub fn plan(&self, requests: &[ChunkRequest]) -> Result<CoalescePlan> {
        let hashes: Vec<ContentHash> = requests.iter().map(|r| r.hash.clone()).collect();
        let locations = self.index.lookup(&hashes)?;
        let plan = coalesce(requests, &locations);
        for m in &plan.missing {
            warn!(chunk_no = m.chunk_no, hash = %m.hash, "chunk not in index");
        }
        Ok(plan)
    }

    /// Reconstruct into memory.
    pub fn retrieve(&self, requests: &[ChunkRequest]) -> Result<(Vec<u8>, RetrievalReport)> {
        let mut out = Vec::new();
        let report = self.retrieve_to(requests, &mut out)?;
        Ok((out, report))
    }

    /// Reconstruct into `writer`. A write error aborts delivery.
    pub fn retrieve_to<W: Write>(
        &self,
        requests: &[ChunkRequest],
        writer: &mut W,
    ) -> Result<RetrievalReport> {
        let report = self.stream(requests, |range| {
            writer.write_all(&range.data)?;
            Ok(())
        })?;
        writer.flush()?;
        Ok(report)
    }

    /// Deliver each fetched range in file order. An error from `deliver`
    /// stops delivery and is returned.
    ///
    /// Gaps are reported rather than treated as failures; the call only
    /// fails outright when a non-empty request yields nothing at all.
    pub fn stream<F>(&self, requests: &[ChunkRequest], mut deliver: F) -> Result<RetrievalReport>
    where
        F: FnMut(StreamedRange) -> Result<()>,
    {
        let mut report = RetrievalReport {
            chunks_requested: requests.len(),
            ..RetrievalReport::default()
        };
        if requests.is_empty() {
            return Ok(report);
        }

        let CoalescePlan { ranges, missing } = self.plan(requests)?;
        report.missing = missing;
        if ranges.is_empty() {
            return Err(ChunkVaultError::NothingRetrieved(format!(
                "none of {} requested chunks are indexed",
                requests.len()
            )));
        }

        let range_count = ranges.len();
        let FetchOutcome { fetched, failed } = self.fetcher.fetch_all(ranges)?;
        report.ranges_fetched = fetched.len();
        report.ranges_failed = failed.len();
        report.failed_chunks = failed
            .iter()
            .flat_map(|f| chunk_numbers(&f.range))
            .collect();
        if fetched.is_empty() {
            return Err(ChunkVaultError::NothingRetrieved(format!(
                "all {range_count} range reads failed"
            )));
        }

        for f in fetched {
            report.bytes_delivered += f.data.len() as u64;
            deliver(StreamedRange {
                chunk_no: f.range.first_chunk_no,
                data: f.data,
            })?;
        }

        info!(
            requested = report.chunks_requested,
            ranges = report.ranges_fetched,
            failed_ranges = report.ranges_failed,
            missing = report.missing.len(),
            bytes = report.bytes_delivered,
            "retrieval complete"
        );
        Ok(report)
    }
}

fn chunk_numbers(range: &CoalescedRange) -> impl Iterator<Item = u64> {
    range.first_chunk_no..=range.last_chunk_no
}
