use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Storage key of one assembled blob: `blobs/<shard>/<uuid>`.
///
/// Keys are random rather than content-derived so that concurrent workers can
/// never collide, even when two of them pack identical chunks.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobKey(String);

impl BlobKey {
    /// Allocate a fresh, globally unique blob key.
    pub fn generate() -> Self {
        let id = Uuid::new_v4().simple().to_string();
        BlobKey(format!("blobs/{}/{}", &id[..2], id))
    }

    /// Wrap a key read back from the index.
    pub fn from_storage_key(key: impl Into<String>) -> Self {
        BlobKey(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BlobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlobKey({})", self.0)
    }
}

impl fmt::Display for BlobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
