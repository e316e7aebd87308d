//! Leader-follower worker pool
//!
//! A fixed set of long-lived workers competes for jobs from one FIFO queue
//! guarded by a single mutex and condition variable. The server submits
//! each accepted connection as one job, so a worker owns a session from
//! menu to close.
//!
//! Shutdown sets the stop flag, wakes every worker and joins them. Jobs
//! still queued at that point are abandoned; running jobs finish first.

use crate::error::{SchedulerError, SchedulerResult};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Statistics about pool activity
#[derive(Debug, Default)]
pub struct PoolStats {
    /// Jobs accepted by `submit`
    pub submitted: AtomicU64,

    /// Jobs picked up by a worker
    pub started: AtomicU64,

    /// Jobs that returned normally
    pub completed: AtomicU64,

    /// Jobs that panicked
    pub panicked: AtomicU64,

    /// Jobs dropped unclaimed at shutdown
    pub abandoned: AtomicU64,
}

impl PoolStats {
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn panicked(&self) -> u64 {
        self.panicked.load(Ordering::Relaxed)
    }

    pub fn abandoned(&self) -> u64 {
        self.abandoned.load(Ordering::Relaxed)
    }
}

#[derive(Default)]
struct QueueState {
    jobs: VecDeque<Job>,
    stopping: bool,
}

struct Shared {
    state: Mutex<QueueState>,
    available: Condvar,
    stats: PoolStats,
}

impl Shared {
    // Jobs run outside the lock, so a poisoned mutex still holds a
    // consistent queue.
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Fixed-size pool of interchangeable workers
pub struct WorkerPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `size` workers
    pub fn new(size: usize) -> SchedulerResult<Self> {
        if size == 0 {
            return Err(SchedulerError::InitFailed {
                name: "worker pool".into(),
                reason: "pool needs at least one worker".into(),
            });
        }

        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState::default()),
            available: Condvar::new(),
            stats: PoolStats::default(),
        });

        // Workers spawned before a failure are joined by Drop
        let mut pool = Self {
            shared,
            workers: Vec::with_capacity(size),
        };

        for id in 0..size {
            let shared = Arc::clone(&pool.shared);
            let name = format!("mst-worker-{}", id);
            let handle = thread::Builder::new()
                .name(name.clone())
                .spawn(move || worker_loop(id, shared))
                .map_err(|e| SchedulerError::InitFailed {
                    name,
                    reason: e.to_string(),
                })?;
            pool.workers.push(handle);
        }

        info!(workers = size, "Worker pool started");
        Ok(pool)
    }

    /// Queue a job and wake one idle worker
    pub fn submit<F>(&self, job: F) -> SchedulerResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut state = self.shared.lock();
            if state.stopping {
                return Err(SchedulerError::PoolClosed);
            }
            state.jobs.push_back(Box::new(job));
        }
        self.shared.stats.submitted.fetch_add(1, Ordering::Relaxed);
        self.shared.available.notify_one();
        Ok(())
    }

    /// Number of worker threads
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Jobs waiting for a worker
    pub fn pending(&self) -> usize {
        self.shared.lock().jobs.len()
    }

    /// Pool statistics
    pub fn stats(&self) -> &PoolStats {
        &self.shared.stats
    }

    /// Stop accepting work, abandon queued jobs and join every worker.
    ///
    /// Idempotent.
    pub fn shutdown(&mut self) -> SchedulerResult<()> {
        let abandoned = {
            let mut state = self.shared.lock();
            state.stopping = true;
            std::mem::take(&mut state.jobs)
        };
        if !abandoned.is_empty() {
            warn!(jobs = abandoned.len(), "Abandoning queued jobs at shutdown");
            self.shared
                .stats
                .abandoned
                .fetch_add(abandoned.len() as u64, Ordering::Relaxed);
        }
        drop(abandoned);

        self.shared.available.notify_all();

        let mut result = Ok(());
        for handle in self.workers.drain(..) {
            let name = handle.thread().name().unwrap_or("mst-worker").to_string();
            if handle.join().is_err() {
                result = Err(SchedulerError::Panicked { name });
            }
        }
        result
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!(error = %e, "Worker pool did not shut down cleanly");
        }
    }
}

fn worker_loop(id: usize, shared: Arc<Shared>) {
    debug!(worker = id, "Worker started");

    loop {
        let job = {
            let mut state = shared.lock();
            loop {
                if state.stopping {
                    debug!(worker = id, "Worker stopping");
                    return;
                }
                if let Some(job) = state.jobs.pop_front() {
                    break job;
                }
                state = shared
                    .available
                    .wait(state)
                    .unwrap_or_else(|e| e.into_inner());
            }
        };

        shared.stats.started.fetch_add(1, Ordering::Relaxed);
        match panic::catch_unwind(AssertUnwindSafe(job)) {
            Ok(()) => {
                shared.stats.completed.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                shared.stats.panicked.fetch_add(1, Ordering::Relaxed);
                error!(worker = id, "Job panicked; worker continues");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphStore, WeightedGraph};
    use crossbeam_channel::bounded;
    use std::time::Duration;

    #[test]
    fn test_zero_workers_rejected() {
        assert!(matches!(
            WorkerPool::new(0),
            Err(SchedulerError::InitFailed { .. })
        ));
    }

    #[test]
    fn test_jobs_run() {
        let pool = WorkerPool::new(3).unwrap();
        let (tx, rx) = bounded(100);
        for i in 0..100u64 {
            let tx = tx.clone();
            pool.submit(move || {
                tx.send(i).unwrap();
            })
            .unwrap();
        }
        let sum: u64 = (0..100).map(|_| rx.recv().unwrap()).sum();
        assert_eq!(sum, 4950);
    }

    #[test]
    fn test_submit_after_shutdown() {
        let mut pool = WorkerPool::new(2).unwrap();
        assert_eq!(pool.size(), 2);
        pool.shutdown().unwrap();
        assert_eq!(pool.size(), 0);
        assert_eq!(pool.submit(|| {}), Err(SchedulerError::PoolClosed));
        assert!(pool.shutdown().is_ok());
    }

    #[test]
    fn test_panicking_job_does_not_kill_worker() {
        let pool = WorkerPool::new(1).unwrap();
        pool.submit(|| panic!("boom")).unwrap();

        let (tx, rx) = bounded(1);
        pool.submit(move || tx.send(7).unwrap()).unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 7);
        assert_eq!(pool.stats().panicked(), 1);
    }

    #[test]
    fn test_pending_jobs_abandoned_at_shutdown() {
        let mut pool = WorkerPool::new(1).unwrap();
        let (started_tx, started_rx) = bounded(1);
        let (release_tx, release_rx) = bounded::<()>(1);

        pool.submit(move || {
            started_tx.send(()).unwrap();
            let _ = release_rx.recv();
        })
        .unwrap();
        started_rx.recv().unwrap();

        for _ in 0..3 {
            pool.submit(|| {}).unwrap();
        }
        assert_eq!(pool.pending(), 3);

        release_tx.send(()).unwrap();
        pool.shutdown().unwrap();
        assert_eq!(pool.stats().abandoned() + pool.stats().completed(), 4);
        assert_eq!(pool.stats().submitted(), 4);
    }

    #[test]
    fn test_concurrent_add_remove_loses_no_updates() {
        let n = 32;
        let store = Arc::new(GraphStore::with_graph(WeightedGraph::with_vertices(n)));
        let mut pool = WorkerPool::new(5).unwrap();

        // Each job adds a distinct edge, then a second job removes every
        // other one.
        let (tx, rx) = bounded(n * n);
        for u in 0..n as i64 {
            for v in (u + 1)..n as i64 {
                let store = Arc::clone(&store);
                let tx = tx.clone();
                pool.submit(move || {
                    store.add_edge(u, v, u + v + 1).unwrap();
                    if (u + v) % 2 == 0 {
                        store.remove_edge(u, v).unwrap();
                    }
                    tx.send(()).unwrap();
                })
                .unwrap();
            }
        }
        drop(tx);
        let finished = rx.iter().count();
        pool.shutdown().unwrap();

        let pairs = n * (n - 1) / 2;
        assert_eq!(finished, pairs);

        let snap = store.snapshot().unwrap();
        let mut expected = 0;
        for u in 0..n {
            for v in (u + 1)..n {
                let w = snap.graph.weight(u, v);
                if (u + v) % 2 == 0 {
                    assert_eq!(w, 0);
                } else {
                    assert_eq!(w, (u + v + 1) as u64);
                    expected += 1;
                }
            }
        }
        assert_eq!(snap.graph.edge_count(), expected);
        assert_eq!(store.stats().mutations(), (pairs + pairs - expected) as u64);
    }
}
