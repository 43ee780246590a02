use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Duration;

use chunkvault_types::error::{ChunkVaultError, Result};

use crate::pool::{TaskOutcome, TaskProcessor, WorkerPool};
use crate::queue::Task;
use crate::testutil::batch;

struct Counting {
    processed: AtomicUsize,
    delay: Duration,
}

impl TaskProcessor for Counting {
    fn process(&self, task: Task) -> Result<TaskOutcome> {
        std::thread::sleep(self.delay);
        let n = task.chunk_count();
        self.processed.fetch_add(n, Ordering::SeqCst);
        Ok(TaskOutcome {
            chunks_indexed: n as u64,
            ..TaskOutcome::default()
        })
    }
}

fn task(first: u64, count: usize) -> Task {
    Task {
        batches: vec![batch(first, count)],
    }
}

#[test]
fn wait_blocks_until_all_tasks_finish() {
    let processor = Arc::new(Counting {
        processed: AtomicUsize::new(0),
        delay: Duration::from_millis(5),
    });
    let pool = WorkerPool::new(3, 2, processor.clone()).unwrap();
    for i in 0..10 {
        pool.try_submit(task(i * 10, 10)).unwrap();
    }
    pool.wait();
    assert_eq!(pool.outstanding(), 0);
    assert_eq!(processor.processed.load(Ordering::SeqCst), 100);

    let stats = pool.stats();
    assert_eq!(stats.tasks_completed, 10);
    assert_eq!(stats.tasks_failed, 0);
    assert_eq!(stats.chunks_indexed, 100);
    pool.shutdown();
}

struct Flaky;

impl TaskProcessor for Flaky {
    fn process(&self, task: Task) -> Result<TaskOutcome> {
        match task.chunk_count() {
            1 => Err(ChunkVaultError::Other("boom".into())),
            2 => panic!("processor panic"),
            n => Ok(TaskOutcome {
                chunks_indexed: n as u64,
                ..TaskOutcome::default()
            }),
        }
    }
}

#[test]
fn failures_and_panics_are_counted_and_release_waiters() {
    let pool = WorkerPool::new(2, 4, Arc::new(Flaky)).unwrap();
    pool.try_submit(task(0, 1)).unwrap();
    pool.try_submit(task(1, 2)).unwrap();
    pool.try_submit(task(3, 3)).unwrap();
    pool.wait();

    let stats = pool.stats();
    assert_eq!(stats.tasks_failed, 2);
    assert_eq!(stats.tasks_completed, 1);
    assert_eq!(stats.chunks_indexed, 3);

    // Workers survive a panicking task.
    pool.try_submit(task(10, 4)).unwrap();
    pool.wait();
    assert_eq!(pool.stats().chunks_indexed, 7);
}

struct Gate {
    barrier: Arc<Barrier>,
}

impl TaskProcessor for Gate {
    fn process(&self, _task: Task) -> Result<TaskOutcome> {
        self.barrier.wait();
        Ok(TaskOutcome::default())
    }
}

#[test]
fn workers_run_concurrently() {
    // Deadlocks unless all three tasks are in flight at once.
    let barrier = Arc::new(Barrier::new(3));
    let pool = WorkerPool::new(3, 3, Arc::new(Gate { barrier })).unwrap();
    for i in 0..3 {
        pool.try_submit(task(i, 1)).unwrap();
    }
    pool.wait();
    assert_eq!(pool.stats().tasks_completed, 3);
}

#[test]
fn submit_after_shutdown_is_rejected() {
    let pool = WorkerPool::new(1, 1, Arc::new(Flaky)).unwrap();
    pool.shutdown();
    assert!(pool.try_submit(task(0, 3)).is_err());
    assert_eq!(pool.outstanding(), 0);
    pool.wait();
}

#[test]
fn shutdown_drains_queued_tasks() {
    let processor = Arc::new(Counting {
        processed: AtomicUsize::new(0),
        delay: Duration::from_millis(2),
    });
    let pool = WorkerPool::new(1, 8, processor.clone()).unwrap();
    for i in 0..6 {
        pool.try_submit(task(i * 5, 5)).unwrap();
    }
    pool.shutdown();
    assert_eq!(processor.processed.load(Ordering::SeqCst), 30);
}

struct Held {
    started: crossbeam_channel::Sender<()>,
    release: crossbeam_channel::Receiver<()>,
}

impl TaskProcessor for Held {
    fn process(&self, _task: Task) -> Result<TaskOutcome> {
        let _ = self.started.send(());
        // Returns once the test drops the release sender.
        let _ = self.release.recv();
        Ok(TaskOutcome::default())
    }
}

#[test]
fn submit_blocks_while_channel_is_full() {
    use std::sync::atomic::AtomicBool;

    let (started_tx, started_rx) = crossbeam_channel::unbounded();
    let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);
    let processor = Held {
        started: started_tx,
        release: release_rx,
    };
    let pool = Arc::new(WorkerPool::new(1, 1, Arc::new(processor)).unwrap());

    // The only worker takes the first task and holds it.
    pool.try_submit(task(0, 1)).unwrap();
    started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    // The second task fills the one-slot channel.
    pool.try_submit(task(1, 1)).unwrap();

    let submitted = Arc::new(AtomicBool::new(false));
    let blocked = {
        let pool = Arc::clone(&pool);
        let submitted = Arc::clone(&submitted);
        std::thread::spawn(move || {
            pool.try_submit(task(2, 1)).unwrap();
            submitted.store(true, Ordering::SeqCst);
        })
    };

    std::thread::sleep(Duration::from_millis(100));
    assert!(!submitted.load(Ordering::SeqCst));
    assert_eq!(pool.outstanding(), 3);

    drop(release_tx);
    blocked.join().unwrap();
    assert!(submitted.load(Ordering::SeqCst));
    pool.wait();
    assert_eq!(pool.stats().tasks_completed, 3);
    pool.shutdown();
}
