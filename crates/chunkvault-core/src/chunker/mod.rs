use fastcdc::v2020::FastCDC;

use chunkvault_types::content_hash::ContentHash;

use crate::chunk::{Chunk, ChunkBatch, Payload};
use crate::config::ChunkerConfig;

/// Chunk a byte slice using FastCDC content-defined chunking.
/// Returns a vector of `(offset, length)` pairs.
pub fn chunk_data(data: &[u8], config: &ChunkerConfig) -> Vec<(usize, usize)> {
    let chunker = FastCDC::new(data, config.min_size, config.avg_size, config.max_size);
    chunker.map(|chunk| (chunk.offset, chunk.length)).collect()
}

/// Split a whole file into numbered, hashed chunks ready for ingestion.
pub fn chunk_file(
    data: &[u8],
    config: &ChunkerConfig,
    owner_id: &str,
    file_name: &str,
) -> ChunkBatch {
    chunk_data(data, config)
        .into_iter()
        .enumerate()
        .map(|(no, (offset, length))| {
            let bytes = &data[offset..offset + length];
            Chunk {
                chunk_no: no as u64,
                hash: ContentHash::compute(bytes),
                owner_id: owner_id.to_string(),
                file_name: file_name.to_string(),
                payload: Payload::Raw(bytes.to_vec()),
            }
        })
        .collect()
}
