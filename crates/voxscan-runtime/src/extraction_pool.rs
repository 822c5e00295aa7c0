use std::panic::{self, AssertUnwindSafe};

use crossbeam_channel::Sender;
use voxscan_mesh_cpu::{Chunk, ChunkResult, ExtractError, ExtractionTask};

use crate::RenderError;
use crate::worker::{Pending, WorkerPool, panic_message};

pub type PendingExtraction = Pending<ChunkResult>;

type ExtractFn = Box<dyn FnOnce() -> Result<ChunkResult, ExtractError> + Send>;

struct ExtractJob {
    chunk: Chunk,
    work: ExtractFn,
    reply: Sender<Result<ChunkResult, RenderError>>,
}

fn process_extract_job(job: ExtractJob) {
    let ExtractJob { chunk, work, reply } = job;
    let task = format!("chunk {}", chunk.id);
    let res = match panic::catch_unwind(AssertUnwindSafe(work)) {
        Ok(Ok(out)) => {
            log::trace!(
                target: "extract",
                "chunk {} done: {} cubes, {} vertices, {} ms",
                chunk.id,
                out.surface_cubes,
                out.vertex_count(),
                out.t_ms
            );
            Ok(out)
        }
        Ok(Err(e)) => Err(RenderError::worker(task, e.to_string())),
        Err(p) => Err(RenderError::worker(
            task,
            format!("panicked: {}", panic_message(&*p)),
        )),
    };
    if let Err(e) = &res {
        log::warn!(target: "extract", "{e}");
    }
    // The orchestrator may have stopped listening; the result is then discarded.
    let _ = reply.send(res);
}

/// Runs marching-cubes tasks on a fixed set of worker threads.
pub struct SurfaceExtractionPool {
    pool: WorkerPool<ExtractJob>,
}

impl SurfaceExtractionPool {
    pub fn new(workers: usize) -> Result<Self, RenderError> {
        Ok(Self {
            pool: WorkerPool::spawn("extract", workers, process_extract_job)?,
        })
    }

    /// Queues one chunk; the returned handle yields its result.
    pub fn submit(&self, task: ExtractionTask) -> Result<PendingExtraction, RenderError> {
        let chunk = task.chunk;
        self.submit_with(chunk, move || task.run())
    }

    /// Queues arbitrary extraction work reported under `chunk`.
    pub fn submit_with<F>(&self, chunk: Chunk, work: F) -> Result<PendingExtraction, RenderError>
    where
        F: FnOnce() -> Result<ChunkResult, ExtractError> + Send + 'static,
    {
        let (pending, reply) = Pending::channel(format!("chunk {}", chunk.id));
        self.pool.submit(ExtractJob {
            chunk,
            work: Box::new(work),
            reply,
        })?;
        Ok(pending)
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
