//! Single-threaded pipeline stage (active object)
//!
//! A stage owns one thread and one FIFO channel. [`Stage::post`] wraps a
//! closure into a task, queues it and returns a [`Completion`] the caller
//! can wait on. Tasks run strictly in posting order.
//!
//! Shutdown is itself a queued message, so every task posted before it
//! runs to completion before the thread exits.

use crate::error::{SchedulerError, SchedulerResult};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{error, trace, warn};

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Message types sent to a stage thread
enum StageMessage {
    /// Run a task
    Run(Task),

    /// Finish queued tasks, then exit
    Shutdown,
}

/// Statistics about stage activity
#[derive(Debug, Default)]
pub struct StageStats {
    /// Tasks posted
    pub posted: AtomicU64,

    /// Tasks that ran to completion
    pub completed: AtomicU64,

    /// Tasks that panicked
    pub panicked: AtomicU64,
}

impl StageStats {
    pub fn posted(&self) -> u64 {
        self.posted.load(Ordering::Relaxed)
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn panicked(&self) -> u64 {
        self.panicked.load(Ordering::Relaxed)
    }
}

/// One-shot handle for the result of a posted task
#[must_use = "a completion does nothing unless waited on"]
pub struct Completion<T> {
    receiver: Receiver<T>,
    stage: &'static str,
}

impl<T> Completion<T> {
    /// Block until the task has run and return its result
    pub fn wait(self) -> SchedulerResult<T> {
        self.receiver
            .recv()
            .map_err(|_| SchedulerError::TaskDropped { stage: self.stage })
    }
}

/// A dedicated worker thread with its own task queue
pub struct Stage {
    name: &'static str,
    sender: Sender<StageMessage>,
    handle: Option<JoinHandle<()>>,
    stats: Arc<StageStats>,
}

impl Stage {
    /// Spawn the stage thread.
    ///
    /// `name` identifies the stage in errors and logs; `thread_name` is the
    /// OS thread name.
    pub fn spawn(name: &'static str, thread_name: String) -> SchedulerResult<Self> {
        let (sender, receiver) = unbounded();
        let stats = Arc::new(StageStats::default());
        let stats_clone = Arc::clone(&stats);

        let handle = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || stage_loop(name, receiver, stats_clone))
            .map_err(|e| SchedulerError::InitFailed {
                name: thread_name,
                reason: e.to_string(),
            })?;

        Ok(Self {
            name,
            sender,
            handle: Some(handle),
            stats,
        })
    }

    /// Stage name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Stage statistics
    pub fn stats(&self) -> &StageStats {
        &self.stats
    }

    /// Queue `task` and return a handle to its result
    pub fn post<T, F>(&self, task: F) -> SchedulerResult<Completion<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (result_tx, result_rx) = bounded(1);
        let wrapped: Task = Box::new(move || {
            // The waiter may have given up; nothing to report then
            let _ = result_tx.send(task());
        });

        self.sender
            .send(StageMessage::Run(wrapped))
            .map_err(|_| SchedulerError::StageClosed { stage: self.name })?;
        self.stats.posted.fetch_add(1, Ordering::Relaxed);

        Ok(Completion {
            receiver: result_rx,
            stage: self.name,
        })
    }

    /// Let queued tasks finish, then join the thread. Idempotent.
    pub fn shutdown(&mut self) -> SchedulerResult<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        // A send error means the thread is already gone; join reports why
        let _ = self.sender.send(StageMessage::Shutdown);

        handle.join().map_err(|_| SchedulerError::Panicked {
            name: format!("stage '{}'", self.name),
        })
    }
}

impl Drop for Stage {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!(stage = self.name, error = %e, "Stage did not shut down cleanly");
        }
    }
}

fn stage_loop(name: &'static str, receiver: Receiver<StageMessage>, stats: Arc<StageStats>) {
    trace!(stage = name, "Stage started");

    for message in receiver {
        match message {
            StageMessage::Run(task) => match panic::catch_unwind(AssertUnwindSafe(task)) {
                Ok(()) => {
                    stats.completed.fetch_add(1, Ordering::Relaxed);
                }
                Err(_) => {
                    // The result sender was dropped with the task, so the
                    // waiter sees TaskDropped
                    stats.panicked.fetch_add(1, Ordering::Relaxed);
                    error!(stage = name, "Stage task panicked");
                }
            },
            StageMessage::Shutdown => break,
        }
    }

    trace!(stage = name, "Stage stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    #[test]
    fn test_post_and_wait() {
        let stage = Stage::spawn("test", "test-stage".into()).unwrap();
        let completion = stage.post(|| 6 * 7).unwrap();
        assert_eq!(completion.wait().unwrap(), 42);
        assert_eq!(stage.name(), "test");
    }

    #[test]
    fn test_tasks_run_in_order() {
        let stage = Stage::spawn("ordered", "ordered-stage".into()).unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));

        let completions: Vec<_> = (0..50)
            .map(|i| {
                let log = Arc::clone(&log);
                stage.post(move || log.lock().unwrap().push(i)).unwrap()
            })
            .collect();
        for c in completions {
            c.wait().unwrap();
        }

        assert_eq!(*log.lock().unwrap(), (0..50).collect::<Vec<_>>());
        assert_eq!(stage.stats().posted(), 50);
    }

    #[test]
    fn test_shutdown_drains_queue() {
        let mut stage = Stage::spawn("drain", "drain-stage".into()).unwrap();
        let counter = Arc::new(AtomicU64::new(0));

        let mut pending = Vec::new();
        for _ in 0..10 {
            let counter = Arc::clone(&counter);
            pending.push(
                stage
                    .post(move || {
                        thread::sleep(Duration::from_millis(2));
                        counter.fetch_add(1, Ordering::SeqCst);
                    })
                    .unwrap(),
            );
        }

        stage.shutdown().unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 10);
        for c in pending {
            assert!(c.wait().is_ok());
        }

        assert_eq!(
            stage.post(|| ()).err(),
            Some(SchedulerError::StageClosed { stage: "drain" })
        );
    }

    #[test]
    fn test_panicking_task_reports_dropped() {
        let stage = Stage::spawn("fragile", "fragile-stage".into()).unwrap();
        let bad = stage.post(|| -> u32 { panic!("boom") }).unwrap();
        assert_eq!(
            bad.wait().err(),
            Some(SchedulerError::TaskDropped { stage: "fragile" })
        );

        // The stage keeps serving after a panic
        assert_eq!(stage.post(|| 1).unwrap().wait().unwrap(), 1);
        assert_eq!(stage.stats().panicked(), 1);
    }
}
