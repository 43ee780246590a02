use std::sync::atomic::Ordering;
use std::sync::Arc;

use chunkvault_storage::{BlobStore, MetadataStore};
use chunkvault_types::content_hash::ContentHash;

use crate::assemble::BlobAssembler;
use crate::index::ChunkIndex;
use crate::pool::{TaskProcessor, WorkerPool};
use crate::queue::Task;
use crate::testutil::{batch, FaultyBlobStore, FaultyMetadataStore};

struct Fixture {
    blobs: Arc<FaultyBlobStore>,
    meta: Arc<FaultyMetadataStore>,
    index: ChunkIndex,
    assembler: BlobAssembler,
}

fn fixture() -> Fixture {
    let blobs = Arc::new(FaultyBlobStore::new());
    let meta = Arc::new(FaultyMetadataStore::new());
    let index = ChunkIndex::new(Arc::clone(&meta) as Arc<dyn MetadataStore>);
    let assembler = BlobAssembler::new(
        Arc::clone(&blobs) as Arc<dyn BlobStore>,
        ChunkIndex::new(Arc::clone(&meta) as Arc<dyn MetadataStore>),
    );
    Fixture {
        blobs,
        meta,
        index,
        assembler,
    }
}

fn task_with_hashes(first: u64, count: usize) -> (Task, Vec<ContentHash>) {
    let chunks = batch(first, count);
    let hashes = chunks.iter().map(|c| c.hash.clone()).collect();
    (
        Task {
            batches: vec![chunks],
        },
        hashes,
    )
}

#[test]
fn upload_failure_leaves_no_blob_and_no_index_entries() {
    let f = fixture();
    f.blobs.fail_next_puts(1);
    let (task, hashes) = task_with_hashes(0, 3);

    assert!(f.assembler.process(task).is_err());
    assert_eq!(f.blobs.inner.len(), 0);
    assert_eq!(f.meta.inner.len(), 0);
    assert!(f.index.lookup(&hashes).unwrap().is_empty());
}

#[test]
fn index_failure_after_upload_leaves_unreferenced_blob() {
    let f = fixture();
    f.meta.fail_sets.store(true, Ordering::SeqCst);
    let (task, hashes) = task_with_hashes(0, 3);

    assert!(f.assembler.process(task).is_err());
    assert_eq!(f.blobs.inner.len(), 1);
    assert_eq!(f.meta.inner.len(), 0);
    assert!(f.index.lookup(&hashes).unwrap().is_empty());
}

#[test]
fn successful_task_indexes_every_chunk() {
    let f = fixture();
    let (task, hashes) = task_with_hashes(0, 3);

    let outcome = f.assembler.process(task).unwrap();
    assert_eq!(outcome.chunks_indexed, 3);
    assert_eq!(outcome.chunks_skipped, 0);
    let key = outcome.blob_key.unwrap();
    assert!(f.blobs.inner.get(key.as_str()).is_some());

    let found = f.index.lookup(&hashes).unwrap();
    assert_eq!(found.len(), 3);
    assert!(found.values().all(|loc| loc.blob_key == key));
}

#[test]
fn pool_counts_failed_uploads_and_keeps_going() {
    let f = fixture();
    f.blobs.fail_next_puts(1);
    let pool = WorkerPool::new(1, 1, Arc::new(f.assembler)).unwrap();

    let (failing, failed_hashes) = task_with_hashes(0, 2);
    let (passing, stored_hashes) = task_with_hashes(10, 2);
    pool.try_submit(failing).unwrap();
    pool.try_submit(passing).unwrap();
    pool.wait();

    let stats = pool.stats();
    assert_eq!(stats.tasks_failed, 1);
    assert_eq!(stats.tasks_completed, 1);
    assert_eq!(stats.chunks_indexed, 2);
    assert!(f.index.lookup(&failed_hashes).unwrap().is_empty());
    assert_eq!(f.index.lookup(&stored_hashes).unwrap().len(), 2);
    assert_eq!(f.blobs.inner.len(), 1);
    pool.shutdown();
}
