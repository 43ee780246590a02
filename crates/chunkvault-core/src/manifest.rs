use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chunkvault_types::error::{ChunkVaultError, Result};

use crate::chunk::Chunk;
use crate::coalesce::ChunkRequest;

/// Everything needed to fetch a stored file back: its ordered chunk list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileManifest {
    pub file_name: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
    pub chunks: Vec<ChunkRequest>,
}

impl FileManifest {
    pub fn from_chunks(file_name: impl Into<String>, size: u64, chunks: &[Chunk]) -> Self {
        Self {
            file_name: file_name.into(),
            size,
            created_at: Utc::now(),
            chunks: chunks
                .iter()
                .map(|c| ChunkRequest {
                    chunk_no: c.chunk_no,
                    hash: c.hash.clone(),
                })
                .collect(),
        }
    }

    /// `<file>.manifest.json` next to the source file.
    pub fn default_path(source: &Path) -> PathBuf {
        let mut name = source.as_os_str().to_owned();
        name.push(".manifest.json");
        PathBuf::from(name)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read(path).map_err(|e| {
            ChunkVaultError::Other(format!("cannot read manifest '{}': {e}", path.display()))
        })?;
        Ok(serde_json::from_slice(&data)?)
    }
}
