use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded, unbounded};

use crate::RenderError;

/// Fixed set of long-lived threads pulling jobs from one unbounded queue.
///
/// Dropping the pool (or calling `shutdown`) closes the queue; workers finish
/// whatever is still queued and are then joined.
pub struct WorkerPool<J: Send + 'static> {
    name: &'static str,
    job_tx: Option<Sender<J>>,
    workers: Vec<JoinHandle<()>>,
    queued: Arc<AtomicUsize>,
    inflight: Arc<AtomicUsize>,
    completed: Arc<AtomicUsize>,
    shutdown: Arc<AtomicBool>,
}

impl<J: Send + 'static> WorkerPool<J> {
    /// Spawns `workers` threads (at least one) named `voxscan-{name}-{i}`.
    pub fn spawn<F>(name: &'static str, workers: usize, handler: F) -> Result<Self, RenderError>
    where
        F: Fn(J) + Send + Sync + 'static,
    {
        let workers = workers.max(1);
        let (job_tx, job_rx) = unbounded::<J>();
        let handler = Arc::new(handler);
        let queued = Arc::new(AtomicUsize::new(0));
        let inflight = Arc::new(AtomicUsize::new(0));
        let completed = Arc::new(AtomicUsize::new(0));
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut handles = Vec::with_capacity(workers);
        for i in 0..workers {
            let rx: Receiver<J> = job_rx.clone();
            let handler = handler.clone();
            let q = queued.clone();
            let inflight = inflight.clone();
            let done = completed.clone();
            let handle = thread::Builder::new()
                .name(format!("voxscan-{name}-{i}"))
                .spawn(move || {
                    while let Ok(job) = rx.recv() {
                        q.fetch_sub(1, Ordering::Relaxed);
                        inflight.fetch_add(1, Ordering::Relaxed);
                        if let Err(p) = panic::catch_unwind(AssertUnwindSafe(|| handler(job))) {
                            log::warn!(
                                target: "job",
                                "{name} worker survived panic: {}",
                                panic_message(&*p)
                            );
                        }
                        inflight.fetch_sub(1, Ordering::Relaxed);
                        done.fetch_add(1, Ordering::Relaxed);
                    }
                })
                .map_err(|e| RenderError::worker(name, format!("failed to spawn worker: {e}")))?;
            handles.push(handle);
        }
        log::debug!(target: "job", "{name} pool started with {workers} workers");

        Ok(Self {
            name,
            job_tx: Some(job_tx),
            workers: handles,
            queued,
            inflight,
            completed,
            shutdown,
        })
    }

    /// Queues a job. Fails once the pool is shutting down.
    pub fn submit(&self, job: J) -> Result<(), RenderError> {
        let closed = || RenderError::worker(self.name, "pool is shut down");
        if self.shutdown.load(Ordering::Acquire) {
            return Err(closed());
        }
        let tx = self.job_tx.as_ref().ok_or_else(closed)?;
        self.queued.fetch_add(1, Ordering::Relaxed);
        if tx.send(job).is_err() {
            self.queued.fetch_sub(1, Ordering::Relaxed);
            return Err(closed());
        }
        Ok(())
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// `(queued, in flight, completed)` job counts.
    pub fn counts(&self) -> (usize, usize, usize) {
        (
            self.queued.load(Ordering::Relaxed),
            self.inflight.load(Ordering::Relaxed),
            self.completed.load(Ordering::Relaxed),
        )
    }

    /// Closes the queue and joins every worker after it drains.
    pub fn shutdown(&mut self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        self.job_tx.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::warn!(target: "job", "{} worker exited by panic", self.name);
            }
        }
        log::debug!(target: "job", "{} pool joined", self.name);
    }
}

impl<J: Send + 'static> Drop for WorkerPool<J> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Handle to one submitted job's result.
#[derive(Debug)]
pub struct Pending<T> {
    label: String,
    rx: Receiver<Result<T, RenderError>>,
}

impl<T> Pending<T> {
    /// Handle plus the sender a worker answers on.
    pub(crate) fn channel(label: String) -> (Self, Sender<Result<T, RenderError>>) {
        let (tx, rx) = bounded(1);
        (Self { label, rx }, tx)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Non-blocking check; `None` while the job is still queued or running.
    pub fn try_wait(&mut self) -> Option<Result<T, RenderError>> {
        match self.rx.try_recv() {
            Ok(res) => Some(res),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(self.dropped())),
        }
    }

    /// Blocks until the job finishes.
    pub fn wait(self) -> Result<T, RenderError> {
        match self.rx.recv() {
            Ok(res) => res,
            Err(_) => Err(self.dropped()),
        }
    }

    fn dropped(&self) -> RenderError {
        RenderError::worker(self.label.clone(), "job dropped without a result")
    }
}

pub(crate) fn panic_message(p: &(dyn Any + Send)) -> String {
    if let Some(s) = p.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = p.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}
