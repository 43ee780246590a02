use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use chunkvault_types::blob_key::BlobKey;
use chunkvault_types::content_hash::ContentHash;
use chunkvault_types::location::ChunkLocation;

/// One chunk a client wants back, by position and content hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRequest {
    pub chunk_no: u64,
    #[serde(rename = "sha", alias = "hash")]
    pub hash: ContentHash,
}

/// A run of requested chunks that sit back to back in one blob and follow
/// each other in the file, read with a single range request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoalescedRange {
    pub blob_key: BlobKey,
    /// Inclusive byte range within the blob.
    pub start: u64,
    pub end: u64,
    pub first_chunk_no: u64,
    pub last_chunk_no: u64,
    pub chunk_count: usize,
}

impl CoalescedRange {
    fn open(chunk_no: u64, loc: &ChunkLocation) -> Self {
        Self {
            blob_key: loc.blob_key.clone(),
            start: loc.start,
            end: loc.end,
            first_chunk_no: chunk_no,
            last_chunk_no: chunk_no,
            chunk_count: 1,
        }
    }

    fn extends_with(&self, chunk_no: u64, loc: &ChunkLocation) -> bool {
        loc.blob_key == self.blob_key
            && self.end.checked_add(1) == Some(loc.start)
            && self.last_chunk_no.checked_add(1) == Some(chunk_no)
    }

    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Ranges to read, in file order, plus requests the index could not resolve.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoalescePlan {
    pub ranges: Vec<CoalescedRange>,
    pub missing: Vec<ChunkRequest>,
}

/// Merge requested chunks into the fewest contiguous range reads.
///
/// Requests are walked in `chunk_no` order. A chunk joins the open range only
/// when it is in the same blob, starts right after the range's last byte, and
/// has the next chunk number. A request with no location is reported missing
/// and ends the open range.
pub fn coalesce(
    requests: &[ChunkRequest],
    locations: &HashMap<ContentHash, ChunkLocation>,
) -> CoalescePlan {
    let mut ordered: Vec<&ChunkRequest> = requests.iter().collect();
    ordered.sort_by_key(|r| r.chunk_no);

    let mut plan = CoalescePlan::default();
    let mut current: Option<CoalescedRange> = None;

    for req in ordered {
        let Some(loc) = locations.get(&req.hash) else {
            plan.missing.push(req.clone());
            if let Some(done) = current.take() {
                plan.ranges.push(done);
            }
            continue;
        };

        match current.as_mut() {
            Some(range) if range.extends_with(req.chunk_no, loc) => {
                range.end = loc.end;
                range.last_chunk_no = req.chunk_no;
                range.chunk_count += 1;
            }
            Some(_) | None => {
                let next = CoalescedRange::open(req.chunk_no, loc);
                if let Some(done) = current.replace(next) {
                    plan.ranges.push(done);
                }
            }
        }
    }
    if let Some(done) = current {
        plan.ranges.push(done);
    }

    plan
}
