use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chunkvault_types::error::{ChunkVaultError, Result};

use crate::{check_range, BlobStore, MetadataStore};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panicking writer cannot leave a HashMap half-updated, so the data is
    // still usable after poisoning.
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-memory blob store. Thread-safe via Mutex.
#[derive(Default)]
pub struct MemoryBlobStore {
    data: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        lock(&self.data).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.data).is_empty()
    }

    /// All stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = lock(&self.data).keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Full contents of one object.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        lock(&self.data).get(key).cloned()
    }
}

impl BlobStore for MemoryBlobStore {
    fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        lock(&self.data).insert(key.to_string(), data.to_vec());
        Ok(())
    }

    fn put_owned(&self, key: &str, data: Vec<u8>) -> Result<()> {
        lock(&self.data).insert(key.to_string(), data);
        Ok(())
    }

    fn get_range(&self, key: &str, start: u64, end: u64) -> Result<Vec<u8>> {
        let map = lock(&self.data);
        let data = map
            .get(key)
            .ok_or_else(|| ChunkVaultError::NotFound(key.to_string()))?;
        check_range(key, start, end, data.len() as u64)?;
        Ok(data[start as usize..=end as usize].to_vec())
    }
}

/// In-memory metadata store. Thread-safe via Mutex.
#[derive(Default)]
pub struct MemoryMetadataStore {
    data: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        lock(&self.data).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.data).is_empty()
    }
}

impl MetadataStore for MemoryMetadataStore {
    fn batch_get(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        let map = lock(&self.data);
        Ok(keys.iter().map(|k| map.get(k).cloned()).collect())
    }

    fn batch_set(&self, pairs: Vec<(String, Vec<u8>)>) -> Result<()> {
        let mut map = lock(&self.data);
        map.extend(pairs);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_range_reads_are_inclusive() {
        let store = MemoryBlobStore::new();
        store.put("k", b"0123456789").unwrap();
        assert_eq!(store.get_range("k", 0, 0).unwrap(), b"0");
        assert_eq!(store.get_range("k", 3, 6).unwrap(), b"3456");
        assert_eq!(store.get_range("k", 9, 9).unwrap(), b"9");
        assert!(store.get_range("k", 9, 10).is_err());
        assert!(matches!(
            store.get_range("missing", 0, 0),
            Err(ChunkVaultError::NotFound(_))
        ));
    }

    #[test]
    fn metadata_batch_get_positional() {
        let store = MemoryMetadataStore::new();
        store
            .batch_set(vec![("a".into(), b"1".to_vec()), ("c".into(), b"3".to_vec())])
            .unwrap();
        let got = store
            .batch_get(&["a".into(), "b".into(), "c".into()])
            .unwrap();
        assert_eq!(got, vec![Some(b"1".to_vec()), None, Some(b"3".to_vec())]);
        assert_eq!(store.len(), 2);
    }
}
