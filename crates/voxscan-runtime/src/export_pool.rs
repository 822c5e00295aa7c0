use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Sender;
use voxscan_image::{ExportTask, Image};

use crate::RenderError;
use crate::budget::{MemoryBudget, Reservation};
use crate::worker::{Pending, WorkerPool, panic_message};

pub type PendingExport = Pending<Image>;

struct ExportJob {
    task: ExportTask,
    reservation: Reservation,
    reply: Sender<Result<Image, RenderError>>,
}

fn process_export_job(job: ExportJob) {
    let ExportJob {
        task,
        reservation,
        reply,
    } = job;
    let name = format!("export '{}'", task.label);
    let res = match panic::catch_unwind(AssertUnwindSafe(|| task.run())) {
        Ok(Ok(img)) => Ok(img),
        Ok(Err(e)) => Err(RenderError::worker(name, e.to_string())),
        Err(p) => Err(RenderError::worker(
            name,
            format!("panicked: {}", panic_message(&*p)),
        )),
    };
    // Give the bytes back before answering so a caller that saw the result
    // also sees the freed budget.
    drop(task);
    drop(reservation);
    match &res {
        Ok(img) => log::trace!(
            target: "export",
            "exported '{}' {}x{}",
            img.label,
            img.width,
            img.height
        ),
        Err(e) => log::warn!(target: "export", "{e}"),
    }
    let _ = reply.send(res);
}

/// Converts raw buffers to images on worker threads, admitting tasks only while
/// their estimated cost fits the memory budget.
pub struct ImageExportPool {
    pool: WorkerPool<ExportJob>,
    budget: Arc<MemoryBudget>,
    admission_timeout: Option<Duration>,
}

impl ImageExportPool {
    pub fn new(
        workers: usize,
        memory_ceiling: u64,
        admission_timeout: Option<Duration>,
    ) -> Result<Self, RenderError> {
        Ok(Self {
            pool: WorkerPool::spawn("export", workers, process_export_job)?,
            budget: MemoryBudget::new(memory_ceiling),
            admission_timeout,
        })
    }

    /// Queues `task` once its cost fits the budget, blocking the caller until then.
    pub fn submit(&self, task: ExportTask) -> Result<PendingExport, RenderError> {
        let reservation = self
            .budget
            .reserve(task.estimated_cost, self.admission_timeout)?;
        let (pending, reply) = Pending::channel(task.label.clone());
        self.pool.submit(ExportJob {
            task,
            reservation,
            reply,
        })?;
        Ok(pending)
    }

    pub fn budget(&self) -> &Arc<MemoryBudget> {
        &self.budget
    }

    pub fn worker_count(&self) -> usize {
        self.pool.worker_count()
    }

    /// `(queued, in flight, completed)` task counts.
    pub fn counts(&self) -> (usize, usize, usize) {
        self.pool.counts()
    }

    pub fn shutdown(&mut self) {
        self.pool.shutdown();
    }
}
