use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use chunkvault_types::content_hash::ContentHash;
use chunkvault_types::error::{ChunkVaultError, Result};

/// Literal end-of-stream marker sent by text transports.
pub const EOF_MARKER: &str = "__EOF__";

/// Chunk payload as received. Base64 text is decoded by the worker that packs
/// it, so a malformed payload only costs that one chunk.
#[derive(Clone, PartialEq, Eq)]
pub enum Payload {
    Raw(Vec<u8>),
    Base64(String),
}

impl Payload {
    pub fn decode(self) -> Result<Vec<u8>> {
        match self {
            Payload::Raw(bytes) => Ok(bytes),
            Payload::Base64(text) => BASE64
                .decode(text.trim())
                .map_err(|e| ChunkVaultError::Decode(format!("invalid base64 payload: {e}"))),
        }
    }
}

impl std::fmt::Debug for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Payload::Raw(b) => write!(f, "Raw({} bytes)", b.len()),
            Payload::Base64(s) => write!(f, "Base64({} chars)", s.len()),
        }
    }
}

/// One byte-range piece of a client file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Position of the chunk within its file.
    pub chunk_no: u64,
    pub hash: ContentHash,
    pub owner_id: String,
    pub file_name: String,
    pub payload: Payload,
}

/// Chunks submitted together by one client flush.
pub type ChunkBatch = Vec<Chunk>;

/// Wire form of a chunk on text transports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub chunk_no: u64,
    pub sha: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub filename: String,
    /// Base64-encoded payload.
    pub data: String,
}

impl ChunkRecord {
    /// Validate the hash and convert. The payload stays encoded.
    pub fn into_chunk(self) -> Result<Chunk> {
        Ok(Chunk {
            chunk_no: self.chunk_no,
            hash: ContentHash::parse(&self.sha)?,
            owner_id: self.user_id,
            file_name: self.filename,
            payload: Payload::Base64(self.data),
        })
    }
}

/// One message read from a text transport.
#[derive(Debug)]
pub enum IngestMessage {
    Record(ChunkRecord),
    EndOfStream,
}

impl IngestMessage {
    pub fn parse(text: &str) -> Result<Self> {
        if text.trim() == EOF_MARKER {
            return Ok(IngestMessage::EndOfStream);
        }
        let record: ChunkRecord = serde_json::from_str(text)?;
        Ok(IngestMessage::Record(record))
    }
}
