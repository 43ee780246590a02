use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, error, warn};

use chunkvault_storage::BlobStore;
use chunkvault_types::blob_key::BlobKey;
use chunkvault_types::content_hash::ContentHash;
use chunkvault_types::error::Result;
use chunkvault_types::location::ChunkLocation;

use crate::index::ChunkIndex;
use crate::pool::{TaskOutcome, TaskProcessor};
use crate::queue::Task;

/// A blob ready for upload: its key, bytes, and where each chunk landed.
pub struct SealedBlob {
    pub key: BlobKey,
    pub data: Vec<u8>,
    pub entries: Vec<(ContentHash, ChunkLocation)>,
}

/// Concatenates chunk payloads into one contiguous blob buffer.
pub struct BlobWriter {
    key: BlobKey,
    data: Vec<u8>,
    /// hash -> inclusive (start, end) within `data`.
    ranges: HashMap<ContentHash, (u64, u64)>,
    /// Hashes in packing order.
    order: Vec<ContentHash>,
}

impl Default for BlobWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl BlobWriter {
    /// Start a blob under a freshly generated key.
    pub fn new() -> Self {
        Self::with_key(BlobKey::generate())
    }

    fn with_key(key: BlobKey) -> Self {
        Self {
            key,
            data: Vec::new(),
            ranges: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn key(&self) -> &BlobKey {
        &self.key
    }

    /// Append `data` and return its inclusive range. A hash already in this
    /// blob is not appended again; its existing range is returned.
    ///
    /// `data` must be non-empty.
    pub fn add(&mut self, hash: ContentHash, data: &[u8]) -> (u64, u64) {
        debug_assert!(!data.is_empty(), "inclusive ranges cannot be empty");
        if let Some(&range) = self.ranges.get(&hash) {
            return range;
        }
        let start = self.data.len() as u64;
        self.data.extend_from_slice(data);
        let range = (start, self.data.len() as u64 - 1);
        self.ranges.insert(hash.clone(), range);
        self.order.push(hash);
        range
    }

    pub fn contains(&self, hash: &ContentHash) -> bool {
        self.ranges.contains_key(hash)
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn chunk_count(&self) -> usize {
        self.order.len()
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn seal(self) -> SealedBlob {
        let BlobWriter {
            key,
            data,
            ranges,
            order,
        } = self;
        let entries = order
            .into_iter()
            .map(|hash| {
                let (start, end) = ranges[&hash];
                let loc = ChunkLocation::new(key.clone(), start, end);
                (hash, loc)
            })
            .collect();
        SealedBlob { key, data, entries }
    }
}

/// Per-Task processing: pack decoded payloads into one blob, upload it, then
/// index every packed chunk.
pub struct BlobAssembler {
    blobs: Arc<dyn BlobStore>,
    index: ChunkIndex,
}

impl BlobAssembler {
    pub fn new(blobs: Arc<dyn BlobStore>, index: ChunkIndex) -> Self {
        Self { blobs, index }
    }

    /// Decode and pack a Task. Undecodable and empty payloads are skipped;
    /// the second return value counts them.
    pub fn pack(task: Task) -> (BlobWriter, u64) {
        let mut writer = BlobWriter::new();
        let mut skipped = 0u64;

        for chunk in task.into_chunks() {
            if writer.contains(&chunk.hash) {
                continue;
            }
            let data = match chunk.payload.decode() {
                Ok(data) => data,
                Err(e) => {
                    warn!(
                        chunk_no = chunk.chunk_no,
                        hash = %chunk.hash,
                        file_name = %chunk.file_name,
                        owner_id = %chunk.owner_id,
                        error = %e,
                        "skipping undecodable chunk"
                    );
                    skipped += 1;
                    continue;
                }
            };
            if data.is_empty() {
                warn!(
                    chunk_no = chunk.chunk_no,
                    hash = %chunk.hash,
                    file_name = %chunk.file_name,
                    "skipping empty chunk"
                );
                skipped += 1;
                continue;
            }
            writer.add(chunk.hash, &data);
        }

        (writer, skipped)
    }
}

impl TaskProcessor for BlobAssembler {
    fn process(&self, task: Task) -> Result<TaskOutcome> {
        let (writer, skipped) = Self::pack(task);
        if writer.is_empty() {
            debug!(skipped, "task produced no blob");
            return Ok(TaskOutcome {
                chunks_skipped: skipped,
                ..TaskOutcome::default()
            });
        }

        let SealedBlob { key, data, entries } = writer.seal();
        let bytes = data.len() as u64;

        if let Err(e) = self.blobs.put_owned(key.as_str(), data) {
            error!(
                blob_key = %key,
                hashes = ?entries.iter().map(|(h, _)| h.as_str()).collect::<Vec<_>>(),
                error = %e,
                "blob upload failed, task dropped"
            );
            return Err(e);
        }

        if let Err(e) = self.index.record(&entries) {
            error!(
                blob_key = %key,
                hashes = ?entries.iter().map(|(h, _)| h.as_str()).collect::<Vec<_>>(),
                error = %e,
                "index write failed after upload; blob is unreferenced"
            );
            return Err(e);
        }

        debug!(blob_key = %key, chunks = entries.len(), bytes, "blob stored");
        Ok(TaskOutcome {
            blob_key: Some(key),
            chunks_indexed: entries.len() as u64,
            chunks_skipped: skipped,
            bytes_uploaded: bytes,
        })
    }
}
