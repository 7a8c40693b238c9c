//! Fixed-size pool of named OS threads fed by a channel.
//!
//! Used by the client to send chunk requests and by the server for its two
//! synthesis tiers. A panicking job is logged and the worker keeps going.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Sender, unbounded};
use thiserror::Error;

/// The pool has shut down and accepts no more jobs.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("worker pool '{0}' is closed")]
pub struct PoolClosed(pub String);

/// A fixed number of threads running one handler over submitted jobs.
///
/// Dropping the pool closes the queue and waits for queued jobs to drain,
/// unless [`discard_queued`](Self::discard_queued) was called first.
pub struct WorkerPool<J: Send + 'static> {
    name: String,
    sender: Option<Sender<J>>,
    discarding: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

impl<J: Send + 'static> WorkerPool<J> {
    /// Start `size` workers (at least one) named `{name}-{index}`.
    pub fn spawn<F>(name: &str, size: usize, handler: F) -> std::io::Result<Self>
    where
        F: Fn(J) + Send + Sync + 'static,
    {
        let (sender, receiver) = unbounded::<J>();
        let handler = Arc::new(handler);
        let discarding = Arc::new(AtomicBool::new(false));
        let mut workers = Vec::with_capacity(size.max(1));

        for index in 0..size.max(1) {
            let receiver = receiver.clone();
            let handler = Arc::clone(&handler);
            let discarding = Arc::clone(&discarding);
            let pool = name.to_string();
            let handle = thread::Builder::new()
                .name(format!("{name}-{index}"))
                .spawn(move || {
                    for job in &receiver {
                        if discarding.load(Ordering::SeqCst) {
                            tracing::trace!(pool = %pool, worker = index, "Discarding queued job");
                            continue;
                        }
                        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| handler(job))) {
                            tracing::error!(
                                pool = %pool,
                                worker = index,
                                message = %panic_message(panic.as_ref()),
                                "Worker job panicked"
                            );
                        }
                    }
                    tracing::trace!(pool = %pool, worker = index, "Worker exiting");
                })?;
            workers.push(handle);
        }

        tracing::debug!(pool = name, workers = workers.len(), "Worker pool started");

        Ok(Self {
            name: name.to_string(),
            sender: Some(sender),
            discarding,
            workers,
        })
    }

    /// Queue a job for the next free worker.
    pub fn submit(&self, job: J) -> Result<(), PoolClosed> {
        self.sender
            .as_ref()
            .and_then(|s| s.send(job).ok())
            .ok_or_else(|| PoolClosed(self.name.clone()))
    }

    /// Drop every job that has not started yet, now and from here on.
    /// Jobs already running finish normally.
    pub fn discard_queued(&self) {
        if !self.discarding.swap(true, Ordering::SeqCst) {
            tracing::debug!(pool = %self.name, queued = self.queued(), "Discarding queued jobs");
        }
    }

    /// Jobs waiting for a worker.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.sender.as_ref().map_or(0, Sender::len)
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<J: Send + 'static> Drop for WorkerPool<J> {
    fn drop(&mut self) {
        self.sender.take();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                tracing::warn!(pool = %self.name, "Worker thread panicked during shutdown");
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn runs_every_submitted_job() {
        let done = Arc::new(AtomicUsize::new(0));
        {
            let done = Arc::clone(&done);
            let pool = WorkerPool::spawn("test", 3, move |n: usize| {
                done.fetch_add(n, Ordering::SeqCst);
            })
            .unwrap();
            for n in 1..=10 {
                pool.submit(n).unwrap();
            }
        }
        assert_eq!(done.load(Ordering::SeqCst), 55);
    }

    #[test]
    fn survives_a_panicking_job() {
        let done = Arc::new(AtomicUsize::new(0));
        {
            let done = Arc::clone(&done);
            let pool = WorkerPool::spawn("panicky", 1, move |n: usize| {
                assert!(n != 1, "boom");
                done.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
            pool.submit(1).unwrap();
            pool.submit(2).unwrap();
        }
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn discard_queued_skips_jobs_not_yet_started() {
        let done = Arc::new(AtomicUsize::new(0));
        let started = std::time::Instant::now();
        {
            let done = Arc::clone(&done);
            let pool = WorkerPool::spawn("slow", 1, move |_: ()| {
                thread::sleep(std::time::Duration::from_millis(200));
                done.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
            for _ in 0..10 {
                pool.submit(()).unwrap();
            }
            thread::sleep(std::time::Duration::from_millis(50));
            pool.discard_queued();
        }
        assert_eq!(done.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < std::time::Duration::from_secs(1));
    }

    #[test]
    fn zero_size_still_gets_one_worker() {
        let pool = WorkerPool::spawn("tiny", 0, |_: ()| {}).unwrap();
        assert_eq!(pool.size(), 1);
        assert_eq!(pool.name(), "tiny");
    }
}
