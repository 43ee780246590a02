pub mod local_blob;
pub mod local_metadata;
pub mod memory;
pub mod retry;

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use chunkvault_types::error::{ChunkVaultError, Result};

pub use local_blob::LocalBlobStore;
pub use local_metadata::LocalMetadataStore;
pub use memory::{MemoryBlobStore, MemoryMetadataStore};
pub use retry::{RetryingBlobStore, RetryingMetadataStore};

/// Object store holding assembled blobs.
///
/// Byte ranges are inclusive on both ends. Implementations must be safe to
/// call from many worker threads at once.
pub trait BlobStore: Send + Sync {
    /// Write `data` as one whole object under `key`, replacing any previous object.
    fn put(&self, key: &str, data: &[u8]) -> Result<()>;

    /// Read bytes `start..=end` of the object at `key`.
    ///
    /// A missing object is [`ChunkVaultError::NotFound`]; a range that runs
    /// past the end of the object is [`ChunkVaultError::ShortRead`].
    fn get_range(&self, key: &str, start: u64, end: u64) -> Result<Vec<u8>>;

    /// Write owned data. Backends that can avoid a copy override this.
    fn put_owned(&self, key: &str, data: Vec<u8>) -> Result<()> {
        self.put(key, &data)
    }
}

/// Key-value store holding the chunk index.
pub trait MetadataStore: Send + Sync {
    /// Fetch many keys at once. The result is positional: `out[i]` belongs to
    /// `keys[i]`, and absent keys map to `None` rather than an error.
    fn batch_get(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>>;

    /// Write many pairs at once. Not all-or-nothing: on error some pairs may
    /// already have been applied.
    fn batch_set(&self, pairs: Vec<(String, Vec<u8>)>) -> Result<()>;
}

impl<T: BlobStore + ?Sized> BlobStore for Arc<T> {
    fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        (**self).put(key, data)
    }
    fn get_range(&self, key: &str, start: u64, end: u64) -> Result<Vec<u8>> {
        (**self).get_range(key, start, end)
    }
    fn put_owned(&self, key: &str, data: Vec<u8>) -> Result<()> {
        (**self).put_owned(key, data)
    }
}

impl<T: MetadataStore + ?Sized> MetadataStore for Arc<T> {
    fn batch_get(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        (**self).batch_get(keys)
    }
    fn batch_set(&self, pairs: Vec<(String, Vec<u8>)>) -> Result<()> {
        (**self).batch_set(pairs)
    }
}

/// Retry policy for transient backend errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

fn default_max_retries() -> usize {
    3
}

fn default_retry_delay_ms() -> u64 {
    200
}

fn default_retry_max_delay_ms() -> u64 {
    10_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

/// Everything needed to construct the configured stores.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root directory for blobs. `None` selects the in-memory store.
    pub blob_dir: Option<PathBuf>,
    /// Root directory for index records. `None` selects the in-memory store.
    pub index_dir: Option<PathBuf>,
    pub retry: RetryConfig,
}

/// The pair of stores the pipeline runs against.
pub struct Backends {
    pub blobs: Arc<dyn BlobStore>,
    pub metadata: Arc<dyn MetadataStore>,
}

/// Build both stores from configuration, each wrapped in the retry adapter.
pub fn backend_from_config(cfg: &StorageConfig) -> Result<Backends> {
    let blobs: Arc<dyn BlobStore> = match &cfg.blob_dir {
        Some(dir) => Arc::new(RetryingBlobStore::new(
            LocalBlobStore::new(dir)?,
            cfg.retry.clone(),
        )),
        None => Arc::new(MemoryBlobStore::new()),
    };
    let metadata: Arc<dyn MetadataStore> = match &cfg.index_dir {
        Some(dir) => Arc::new(RetryingMetadataStore::new(
            LocalMetadataStore::new(dir)?,
            cfg.retry.clone(),
        )),
        None => Arc::new(MemoryMetadataStore::new()),
    };
    Ok(Backends { blobs, metadata })
}

/// Reject storage keys that could escape a filesystem root.
pub(crate) fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(ChunkVaultError::InvalidKey("empty".into()));
    }
    if key.starts_with('/') || key.starts_with('\\') {
        return Err(ChunkVaultError::InvalidKey(format!(
            "absolute path '{key}'"
        )));
    }
    if key.contains('\\') {
        return Err(ChunkVaultError::InvalidKey(format!(
            "contains backslash '{key}'"
        )));
    }
    if key.split('/').any(|c| c == ".." || c == ".") {
        return Err(ChunkVaultError::InvalidKey(format!(
            "relative component '{key}'"
        )));
    }
    Ok(())
}

/// Validate an inclusive range request against an object of `len` bytes.
pub(crate) fn check_range(key: &str, start: u64, end: u64, len: u64) -> Result<()> {
    if start > end {
        return Err(ChunkVaultError::InvalidRange {
            key: key.to_string(),
            start,
            end,
        });
    }
    if end >= len {
        return Err(ChunkVaultError::ShortRead {
            key: key.to_string(),
            expected: end - start + 1,
            actual: len.saturating_sub(start),
        });
    }
    Ok(())
}
