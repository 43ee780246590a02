use std::sync::atomic::Ordering;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use chunkvault_storage::{BlobStore, MemoryMetadataStore, MetadataStore};
use chunkvault_types::blob_key::BlobKey;
use chunkvault_types::content_hash::ContentHash;
use chunkvault_types::location::ChunkLocation;

use crate::assemble::BlobAssembler;
use crate::index::ChunkIndex;
use crate::ingest::{IngestReport, Ingestor};
use crate::pool::TaskProcessor;
use crate::queue::{IngestQueue, Task};
use crate::testutil::{batch, chunk, memory_stores, FaultyMetadataStore};

fn ingestor_with(store: Arc<dyn MetadataStore>) -> (Arc<IngestQueue>, Ingestor) {
    let queue = Arc::new(IngestQueue::new());
    let ingestor = Ingestor::new(Arc::clone(&queue), ChunkIndex::new(store));
    (queue, ingestor)
}

#[test]
fn indexed_hashes_are_filtered() {
    let store = Arc::new(MemoryMetadataStore::new());
    let index = ChunkIndex::new(store.clone());
    let known = chunk(1, b"already stored");
    index
        .record(&[(
            known.hash.clone(),
            ChunkLocation::new(BlobKey::generate(), 0, 13),
        )])
        .unwrap();

    let (queue, ingestor) = ingestor_with(store);
    let report = ingestor.ingest_batch(vec![chunk(0, b"new"), known, chunk(2, b"also new")]);
    assert_eq!(
        report,
        IngestReport {
            received: 3,
            duplicates: 1,
            enqueued: 2
        }
    );
    let queued = queue.pop_front().unwrap();
    assert_eq!(
        queued.iter().map(|c| c.chunk_no).collect::<Vec<_>>(),
        vec![0, 2]
    );
}

#[test]
fn repeats_within_a_batch_collapse_to_first() {
    let (queue, ingestor) = ingestor_with(Arc::new(MemoryMetadataStore::new()));
    let report = ingestor.ingest_batch(vec![
        chunk(0, b"same"),
        chunk(1, b"other"),
        chunk(2, b"same"),
    ]);
    assert_eq!(report.duplicates, 1);
    assert_eq!(report.enqueued, 2);
    assert_eq!(queue.total_chunks(), 2);
}

#[test]
fn fully_duplicate_batch_enqueues_nothing() {
    let (queue, ingestor) = ingestor_with(Arc::new(MemoryMetadataStore::new()));
    ingestor.ingest_batch(vec![chunk(0, b"a"), chunk(1, b"a")]);
    assert_eq!(queue.len(), 1);
    assert_eq!(ingestor.ingest_batch(Vec::new()), IngestReport::default());
    assert_eq!(queue.len(), 1);
}

#[test]
fn failed_existence_check_fails_open() {
    let store = Arc::new(FaultyMetadataStore::new());
    store.fail_gets.store(true, Ordering::SeqCst);
    let (queue, ingestor) = ingestor_with(store);

    let report = ingestor.ingest_batch(batch(0, 5));
    assert_eq!(report.enqueued, 5);
    assert_eq!(queue.total_chunks(), 5);
}

#[test]
fn session_flushes_in_groups_and_on_finish() {
    let (queue, ingestor) = ingestor_with(Arc::new(MemoryMetadataStore::new()));
    let mut session = ingestor.session(4);
    for c in batch(0, 10) {
        session.push(c);
    }
    assert_eq!(queue.len(), 2);
    assert_eq!(session.pending(), 2);

    let report = session.finish();
    assert_eq!(report.received, 10);
    assert_eq!(report.enqueued, 10);
    assert_eq!(queue.len(), 3);
    assert_eq!(queue.total_chunks(), 10);
}

#[test]
fn session_reads_json_records_until_end_marker() {
    let (queue, ingestor) = ingestor_with(Arc::new(MemoryMetadataStore::new()));
    let mut session = ingestor.session(64);

    let data = b"payload";
    let msg = format!(
        r#"{{"chunk_no":0,"sha":"{}","user_id":"u","filename":"f","data":"{}"}}"#,
        ContentHash::compute(data),
        BASE64.encode(data)
    );
    assert!(session.handle_message(&msg).unwrap());
    assert!(session.handle_message("{ broken").is_err());
    assert!(!session.handle_message("__EOF__").unwrap());
    assert_eq!(session.finish().enqueued, 1);

    let queued = queue.pop_front().unwrap();
    assert_eq!(queued[0].payload.clone().decode().unwrap(), data);
}

#[test]
fn concurrent_ingest_of_same_hash_leaves_one_index_entry() {
    let (blobs, metadata) = memory_stores();
    let index = ChunkIndex::new(metadata.clone());
    let assembler = BlobAssembler::new(blobs.clone(), index.clone());

    // Both clients pass the gate before either upload lands.
    let shared = chunk(0, b"shared payload");
    let q1 = Arc::new(IngestQueue::new());
    let q2 = Arc::new(IngestQueue::new());
    Ingestor::new(q1.clone(), index.clone()).ingest_batch(vec![shared.clone()]);
    Ingestor::new(q2.clone(), index.clone()).ingest_batch(vec![shared.clone()]);

    std::thread::scope(|s| {
        for q in [&q1, &q2] {
            let assembler = &assembler;
            s.spawn(move || {
                let task: Task = q.extract(10, std::time::Instant::now());
                assembler.process(task).unwrap();
            });
        }
    });

    assert_eq!(blobs.len(), 2);
    assert_eq!(metadata.len(), 1);
    let found = index.lookup(&[shared.hash.clone()]).unwrap();
    let loc = &found[&shared.hash];
    let bytes = blobs
        .get_range(loc.blob_key.as_str(), loc.start, loc.end)
        .unwrap();
    assert_eq!(bytes, b"shared payload");

    // A later upload of the same content is filtered at the gate.
    let ingestor = Ingestor::new(Arc::clone(&q1), index);
    assert_eq!(ingestor.ingest_batch(vec![shared]).duplicates, 1);
    assert!(q1.is_empty());
}
