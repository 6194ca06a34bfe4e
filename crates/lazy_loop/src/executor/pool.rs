//! src/executor/pool.rs
//!
//! Thread pool backend for pooled loops.
//!
//! Workers pull type-erased jobs from one shared bounded channel. Each job
//! runs a task under `catch_unwind` and delivers the outcome through its own
//! one-shot channel, which backs the [`Pending`] handle returned to the
//! submitter. Handles can therefore be resolved in any order, independent
//! of the order in which workers finish.
//!
//! # Shutdown
//! Dropping the pool sets the shutdown flag and closes the job channel.
//! Workers finish the job they are running, skip whatever is still queued
//! and exit; the pool then joins them. Handles of skipped jobs resolve to
//! [`TaskError::Disconnected`](super::TaskError::Disconnected).

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, warn};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use super::thread::set_worker_id;
use super::{panic_message, Executor, Pending, Task};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed-size pool of named worker threads.
pub struct ThreadPool {
    workers: Vec<thread::JoinHandle<()>>,
    job_tx: Option<Sender<Job>>,
    shutdown: Arc<AtomicBool>,
}

impl ThreadPool {
    /// Spawns `num_workers` threads sharing a job queue of `buffer_size`
    /// slots. Submitting blocks while the queue is full.
    pub fn new(num_workers: usize, buffer_size: usize) -> Result<Self> {
        if num_workers == 0 {
            return Err(anyhow!(
                "Cannot create ThreadPool with 0 workers. \
                Either set max_workers > 0 or use the immediate backend."
            ));
        }

        if buffer_size == 0 {
            return Err(anyhow!(
                "Cannot create ThreadPool with buffer_size 0. \
                Buffer size must be > 0 to prevent deadlocks."
            ));
        }

        let (job_tx, job_rx) = bounded::<Job>(buffer_size);
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut workers = Vec::with_capacity(num_workers);

        for worker_id in 0..num_workers {
            let job_rx = job_rx.clone();
            let shutdown = shutdown.clone();

            let handle = thread::Builder::new()
                .name(format!("loop-worker-{}", worker_id))
                .spawn(move || {
                    set_worker_id(worker_id);
                    worker_loop(job_rx, shutdown);
                })
                .with_context(|| format!("Failed to spawn worker thread {}", worker_id))?;

            workers.push(handle);
        }

        debug!(
            "started thread pool with {} workers (queue capacity {})",
            num_workers, buffer_size
        );

        Ok(Self {
            workers,
            job_tx: Some(job_tx),
            shutdown,
        })
    }

    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }
}

fn worker_loop(job_rx: Receiver<Job>, shutdown: Arc<AtomicBool>) {
    // recv() fails once the pool drops its sender and the queue is empty.
    while let Ok(job) = job_rx.recv() {
        if shutdown.load(Ordering::Relaxed) {
            // Dropping the job drops its result sender, which disconnects
            // the matching handle.
            continue;
        }
        job();
    }
}

impl<R: Send + 'static> Executor<R> for ThreadPool {
    fn submit(&self, task: Task<R>) -> Result<Pending<R>> {
        let job_tx = self
            .job_tx
            .as_ref()
            .ok_or_else(|| anyhow!("ThreadPool is shut down"))?;

        let (result_tx, result_rx) = bounded(1);
        let job: Job = Box::new(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(task));
            if let Err(payload) = &outcome {
                warn!(
                    "task panicked on worker {:?}: {}",
                    thread::current().name(),
                    panic_message(payload.as_ref())
                );
            }
            // The handle may already be gone; nobody wants the result then.
            let _ = result_tx.send(outcome);
        });

        job_tx
            .send(job)
            .map_err(|_| anyhow!("ThreadPool job queue is closed"))?;
        Ok(Pending::remote(result_rx))
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        // Signal shutdown to all workers
        self.shutdown.store(true, Ordering::Relaxed);

        // Close the job channel so idle workers wake up and exit
        self.job_tx.take();

        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        debug!("thread pool shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::thread::current_worker;
    use crate::executor::TaskError;
    use std::time::Duration;

    #[test]
    fn test_zero_workers_rejected() {
        let err = ThreadPool::new(0, 4).err().unwrap();
        assert!(err.to_string().contains("0 workers"));
        assert!(ThreadPool::new(2, 0).is_err());
    }

    #[test]
    fn test_results_resolve_in_submission_order() -> Result<()> {
        let pool = ThreadPool::new(4, 8)?;
        let handles = (0..8u64)
            .map(|i| {
                Executor::<u64>::submit(&pool, Box::new(move || {
                    // Later tasks finish first.
                    thread::sleep(Duration::from_millis(8 - i));
                    i * i
                }))
            })
            .collect::<Result<Vec<_>>>()?;

        let results: Vec<u64> = handles
            .into_iter()
            .map(|pending| pending.into_inner().unwrap())
            .collect();
        assert_eq!(results, vec![0, 1, 4, 9, 16, 25, 36, 49]);
        Ok(())
    }

    #[test]
    fn test_tasks_run_on_named_workers() -> Result<()> {
        let pool = ThreadPool::new(2, 2)?;
        assert_eq!(pool.num_workers(), 2);

        let pending: Pending<(Option<usize>, Option<String>)> = pool.submit(Box::new(|| {
            (
                current_worker(),
                thread::current().name().map(str::to_string),
            )
        }))?;
        let (worker, name) = pending.into_inner().unwrap();

        let worker = worker.unwrap();
        assert!(worker < 2);
        assert_eq!(name, Some(format!("loop-worker-{}", worker)));
        Ok(())
    }

    #[test]
    fn test_panic_is_captured_and_pool_survives() -> Result<()> {
        let pool = ThreadPool::new(1, 2)?;

        let failed: Pending<i32> = pool.submit(Box::new(|| -> i32 { panic!("worker boom") }))?;
        assert_eq!(
            failed.into_inner(),
            Err(TaskError::Panicked("worker boom".to_string()))
        );

        let ok: Pending<i32> = pool.submit(Box::new(|| 7))?;
        assert_eq!(ok.into_inner(), Ok(7));
        Ok(())
    }
}
