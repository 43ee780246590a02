use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use chunkvault_types::error::{ChunkVaultError, Result};

use crate::{validate_key, MetadataStore};

/// Metadata store keeping one small file per key under a sharded directory
/// tree: `<root>/<first two chars>/<key>`.
pub struct LocalMetadataStore {
    root: PathBuf,
}

impl LocalMetadataStore {
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root)?;
        let root = fs::canonicalize(root)?;
        Ok(Self { root })
    }

    fn resolve(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        if key.contains('/') {
            return Err(ChunkVaultError::InvalidKey(format!(
                "metadata keys must be flat: '{key}'"
            )));
        }
        let shard: String = key.chars().take(2).collect();
        Ok(self.root.join(shard).join(key))
    }

    fn read_one(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.resolve(key)?;
        match fs::read(&path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_one(&self, key: &str, value: &[u8]) -> Result<()> {
        let path = self.resolve(key)?;
        let dir = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(value)?;
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl MetadataStore for LocalMetadataStore {
    fn batch_get(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        keys.iter().map(|k| self.read_one(k)).collect()
    }

    fn batch_set(&self, pairs: Vec<(String, Vec<u8>)>) -> Result<()> {
        let total = pairs.len();
        for (i, (key, value)) in pairs.into_iter().enumerate() {
            if let Err(e) = self.write_one(&key, &value) {
                debug!(applied = i, total, key = %key, "metadata batch write stopped early");
                return Err(e);
            }
        }
        Ok(())
    }
}
