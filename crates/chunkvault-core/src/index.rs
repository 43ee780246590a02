use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::warn;

use chunkvault_storage::MetadataStore;
use chunkvault_types::content_hash::ContentHash;
use chunkvault_types::error::Result;
use chunkvault_types::location::ChunkLocation;

/// Content-hash index over a [`MetadataStore`]. Keys are hash strings and
/// values are JSON [`ChunkLocation`] records.
#[derive(Clone)]
pub struct ChunkIndex {
    store: Arc<dyn MetadataStore>,
}

impl ChunkIndex {
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self { store }
    }

    /// Which of `hashes` already have an index entry, in one batched query.
    pub fn existing(&self, hashes: &[ContentHash]) -> Result<HashSet<ContentHash>> {
        if hashes.is_empty() {
            return Ok(HashSet::new());
        }
        let keys = to_keys(hashes);
        let values = self.store.batch_get(&keys)?;
        Ok(hashes
            .iter()
            .zip(values)
            .filter(|(_, v)| v.is_some())
            .map(|(h, _)| h.clone())
            .collect())
    }

    /// Resolve locations in one batched query. Hashes without an entry are
    /// absent from the map; a malformed record is logged and treated as absent.
    pub fn lookup(&self, hashes: &[ContentHash]) -> Result<HashMap<ContentHash, ChunkLocation>> {
        let mut unique: Vec<ContentHash> = Vec::with_capacity(hashes.len());
        let mut seen = HashSet::with_capacity(hashes.len());
        for h in hashes {
            if seen.insert(h) {
                unique.push(h.clone());
            }
        }
        if unique.is_empty() {
            return Ok(HashMap::new());
        }

        let values = self.store.batch_get(&to_keys(&unique))?;
        let mut found = HashMap::with_capacity(unique.len());
        for (hash, value) in unique.into_iter().zip(values) {
            let Some(raw) = value else { continue };
            match ChunkLocation::from_record(&raw) {
                Ok(loc) => {
                    found.insert(hash, loc);
                }
                Err(e) => {
                    warn!(hash = %hash, error = %e, "ignoring malformed index record");
                }
            }
        }
        Ok(found)
    }

    /// Write all entries with one batched call.
    pub fn record(&self, entries: &[(ContentHash, ChunkLocation)]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let pairs = entries
            .iter()
            .map(|(hash, loc)| Ok((hash.as_str().to_string(), loc.to_record()?)))
            .collect::<Result<Vec<_>>>()?;
        self.store.batch_set(pairs)
    }
}

fn to_keys(hashes: &[ContentHash]) -> Vec<String> {
    hashes.iter().map(|h| h.as_str().to_string()).collect()
}
