use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chunkvault_storage::{BlobStore, MemoryBlobStore, MemoryMetadataStore, MetadataStore};
use chunkvault_types::content_hash::ContentHash;
use chunkvault_types::error::{ChunkVaultError, Result};

use crate::chunk::{Chunk, ChunkBatch, Payload};
use crate::dispatcher::TaskSink;
use crate::queue::Task;

/// A chunk whose payload is `data` and whose hash is computed from it.
pub fn chunk(chunk_no: u64, data: &[u8]) -> Chunk {
    Chunk {
        chunk_no,
        hash: ContentHash::compute(data),
        owner_id: "user-1".into(),
        file_name: "file.bin".into(),
        payload: Payload::Raw(data.to_vec()),
    }
}

/// `count` distinct chunks numbered from `first`.
pub fn batch(first: u64, count: usize) -> ChunkBatch {
    (first..first + count as u64)
        .map(|no| chunk(no, format!("chunk-{no}").as_bytes()))
        .collect()
}

pub fn chunk_numbers(task: &Task) -> Vec<u64> {
    task.batches
        .iter()
        .flat_map(|b| b.iter().map(|c| c.chunk_no))
        .collect()
}

/// Sink that keeps every submitted Task.
#[derive(Default)]
pub struct RecordingSink {
    pub tasks: Mutex<Vec<Task>>,
}

impl RecordingSink {
    pub fn take(&self) -> Vec<Task> {
        std::mem::take(&mut *self.tasks.lock().unwrap())
    }
}

impl TaskSink for RecordingSink {
    fn submit(&self, task: Task) {
        self.tasks.lock().unwrap().push(task);
    }
}

/// Blob store that fails `put` calls and range reads of selected keys.
pub struct FaultyBlobStore {
    pub inner: MemoryBlobStore,
    pub fail_puts: AtomicUsize,
    pub fail_reads: Mutex<HashSet<String>>,
}

impl FaultyBlobStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryBlobStore::new(),
            fail_puts: AtomicUsize::new(0),
            fail_reads: Mutex::new(HashSet::new()),
        }
    }

    pub fn fail_next_puts(&self, n: usize) {
        self.fail_puts.store(n, Ordering::SeqCst);
    }

    pub fn fail_reads_of(&self, key: &str) {
        self.fail_reads.lock().unwrap().insert(key.to_string());
    }
}

impl BlobStore for FaultyBlobStore {
    fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        let should_fail = self
            .fail_puts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(ChunkVaultError::Other(format!("injected put failure: {key}")));
        }
        self.inner.put(key, data)
    }

    fn get_range(&self, key: &str, start: u64, end: u64) -> Result<Vec<u8>> {
        if self.fail_reads.lock().unwrap().contains(key) {
            return Err(ChunkVaultError::Other(format!("injected read failure: {key}")));
        }
        self.inner.get_range(key, start, end)
    }
}

/// Metadata store whose reads and/or writes can be switched to fail.
pub struct FaultyMetadataStore {
    pub inner: MemoryMetadataStore,
    pub fail_gets: AtomicBool,
    pub fail_sets: AtomicBool,
}

impl FaultyMetadataStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryMetadataStore::new(),
            fail_gets: false.into(),
            fail_sets: false.into(),
        }
    }
}

impl MetadataStore for FaultyMetadataStore {
    fn batch_get(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(ChunkVaultError::Backend("injected batch_get failure".into()));
        }
        self.inner.batch_get(keys)
    }

    fn batch_set(&self, pairs: Vec<(String, Vec<u8>)>) -> Result<()> {
        if self.fail_sets.load(Ordering::SeqCst) {
            return Err(ChunkVaultError::Backend("injected batch_set failure".into()));
        }
        self.inner.batch_set(pairs)
    }
}

pub fn memory_stores() -> (Arc<MemoryBlobStore>, Arc<MemoryMetadataStore>) {
    (
        Arc::new(MemoryBlobStore::new()),
        Arc::new(MemoryMetadataStore::new()),
    )
}
