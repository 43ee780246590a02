use serde::{Deserialize, Serialize};

use crate::blob_key::BlobKey;
use crate::error::{ChunkVaultError, Result};

/// Where one chunk's bytes live: a blob and an inclusive byte range inside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkLocation {
    pub blob_key: BlobKey,
    /// First byte of the chunk within the blob.
    pub start: u64,
    /// Last byte of the chunk within the blob (inclusive).
    pub end: u64,
}

impl ChunkLocation {
    pub fn new(blob_key: BlobKey, start: u64, end: u64) -> Self {
        debug_assert!(start <= end, "inclusive range must be non-empty");
        Self {
            blob_key,
            start,
            end,
        }
    }

    /// Number of bytes covered by the range.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Ranges are inclusive on both ends, so they are never empty.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Serialize to the record stored as the metadata value.
    pub fn to_record(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse a metadata record, rejecting inverted ranges.
    pub fn from_record(data: &[u8]) -> Result<Self> {
        let loc: ChunkLocation = serde_json::from_slice(data)?;
        if loc.start > loc.end {
            return Err(ChunkVaultError::InvalidRange {
                key: loc.blob_key.to_string(),
                start: loc.start,
                end: loc.end,
            });
        }
        Ok(loc)
    }
}
