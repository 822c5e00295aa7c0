use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use voxscan_grid::{ScanRegion, VoxelGrid};
use voxscan_image::{ExportTask, Image, ProjectionSampler, RawBuffer};
use voxscan_mesh_cpu::{
    AggregatedMeshSet, ChunkPartitioner, ChunkResult, ExtractionTask, MeshAggregator,
};
use voxscan_raster::{RasterStats, Shape, rasterize};

use crate::config::PipelineConfig;
use crate::export_pool::ImageExportPool;
use crate::extraction_pool::SurfaceExtractionPool;
use crate::worker::Pending;
use crate::{ErrorKind, RenderError};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum JobState {
    #[default]
    Idle,
    Requested,
    InProgress,
    Done,
    Error,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Idle => "idle",
            JobState::Requested => "requested",
            JobState::InProgress => "in_progress",
            JobState::Done => "done",
            JobState::Error => "error",
        }
    }
}

impl core::fmt::Display for JobState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where and how finely to scan.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MicroscopeParams {
    pub region: ScanRegion,
    /// Voxel edge length in world units.
    pub resolution: f32,
}

#[derive(Clone, Debug)]
pub struct RenderRequest {
    pub microscope: MicroscopeParams,
    pub shapes: Arc<[Shape]>,
    /// Projections sampled from the finished grid and exported as images.
    pub projections: Vec<ProjectionSampler>,
    /// Externally sampled buffers exported alongside the projections.
    pub raw_buffers: Vec<(String, RawBuffer)>,
}

impl RenderRequest {
    pub fn new(region: ScanRegion, resolution: f32, shapes: impl Into<Arc<[Shape]>>) -> Self {
        Self {
            microscope: MicroscopeParams { region, resolution },
            shapes: shapes.into(),
            projections: Vec::new(),
            raw_buffers: Vec::new(),
        }
    }

    pub fn with_projection(mut self, sampler: ProjectionSampler) -> Self {
        self.projections.push(sampler);
        self
    }

    pub fn with_raw_buffer(mut self, label: impl Into<String>, buffer: RawBuffer) -> Self {
        self.raw_buffers.push((label.into(), buffer));
        self
    }
}

#[derive(Clone, Debug, Default)]
pub struct JobStats {
    pub job_id: u64,
    pub grid_dims: (usize, usize, usize),
    pub grid_bytes: u64,
    pub occupied_voxels: usize,
    pub raster: RasterStats,
    pub chunks: usize,
    pub surface_cubes: u64,
    pub entities: usize,
    pub vertices: usize,
    pub triangles: usize,
    pub images: usize,
    pub t_alloc_ms: u32,
    pub t_raster_ms: u32,
    pub t_extract_ms: u32,
    pub t_merge_ms: u32,
    pub t_export_ms: u32,
    pub t_total_ms: u32,
}

/// Everything a finished job produced.
#[derive(Debug)]
pub struct RenderOutput {
    pub grid: Arc<VoxelGrid>,
    pub meshes: AggregatedMeshSet,
    pub images: Vec<Image>,
    pub stats: JobStats,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct JobProgress {
    pub state: JobState,
    pub chunks_done: usize,
    pub chunks_total: usize,
    pub images_done: usize,
    pub images_total: usize,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestError {
    #[error("a job is already {0}")]
    Busy(JobState),
}

/// Outstanding handles of one pool stage plus what has come back so far.
struct Stage<T> {
    pending: Vec<Option<Pending<T>>>,
    done: Vec<(usize, T)>,
    completed: usize,
    first_error: Option<RenderError>,
}

impl<T> Stage<T> {
    fn new() -> Self {
        Self {
            pending: Vec::new(),
            done: Vec::new(),
            completed: 0,
            first_error: None,
        }
    }

    fn push(&mut self, p: Pending<T>) {
        self.pending.push(Some(p));
    }

    fn record_error(&mut self, e: RenderError) {
        if self.first_error.is_none() {
            self.first_error = Some(e);
        }
    }

    fn total(&self) -> usize {
        self.pending.len()
    }

    fn is_complete(&self) -> bool {
        self.completed == self.pending.len()
    }

    /// Collects finished handles; with `block`, waits for every outstanding one.
    fn collect(&mut self, block: bool) {
        let Self {
            pending,
            done,
            completed,
            first_error,
        } = self;
        for (i, slot) in pending.iter_mut().enumerate() {
            let res = if block {
                match slot.take() {
                    Some(p) => p.wait(),
                    None => continue,
                }
            } else {
                match slot.as_mut().and_then(Pending::try_wait) {
                    Some(r) => {
                        *slot = None;
                        r
                    }
                    None => continue,
                }
            };
            *completed += 1;
            match res {
                Ok(v) => done.push((i, v)),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
    }

    /// Results in submission order, or the first error observed.
    fn finish(self) -> Result<Vec<T>, RenderError> {
        if let Some(e) = self.first_error {
            return Err(e);
        }
        let mut done = self.done;
        done.sort_by_key(|(i, _)| *i);
        Ok(done.into_iter().map(|(_, v)| v).collect())
    }
}

enum Phase {
    Extracting(Stage<ChunkResult>),
    Exporting {
        meshes: AggregatedMeshSet,
        stage: Stage<Image>,
    },
}

struct InFlight {
    job_id: u64,
    grid: Arc<VoxelGrid>,
    phase: Phase,
    projections: Vec<ProjectionSampler>,
    raw_buffers: Vec<(String, RawBuffer)>,
    stats: JobStats,
    t_start: Instant,
    t_stage: Instant,
}

fn ms_since(t: Instant) -> u32 {
    t.elapsed().as_millis().min(u128::from(u32::MAX)) as u32
}

/// Drives one render job at a time through
/// `Idle -> Requested -> InProgress -> Done | Error`.
///
/// State only changes inside `request_render` and `poll`. The pools outlive
/// individual jobs and are joined when the orchestrator is dropped.
pub struct RenderJobOrchestrator {
    config: PipelineConfig,
    extraction: SurfaceExtractionPool,
    export: ImageExportPool,
    state: JobState,
    request: Option<RenderRequest>,
    inflight: Option<InFlight>,
    output: Option<RenderOutput>,
    last_error: Option<RenderError>,
    next_job_id: u64,
    current_job_id: u64,
}

impl RenderJobOrchestrator {
    pub fn new(config: PipelineConfig) -> Result<Self, RenderError> {
        config.validate()?;
        let extraction = SurfaceExtractionPool::new(config.resolved_extraction_workers())?;
        let export = ImageExportPool::new(
            config.export.workers,
            config.export.memory_ceiling_bytes,
            config.export.admission_timeout(),
        )?;
        log::info!(
            target: "job",
            "orchestrator ready: {} extraction workers, {} export workers, export budget {} bytes",
            extraction.worker_count(),
            export.worker_count(),
            config.export.memory_ceiling_bytes
        );
        Ok(Self {
            config,
            extraction,
            export,
            state: JobState::Idle,
            request: None,
            inflight: None,
            output: None,
            last_error: None,
            next_job_id: 1,
            current_job_id: 0,
        })
    }

    #[inline]
    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn extraction_pool(&self) -> &SurfaceExtractionPool {
        &self.extraction
    }

    pub fn export_pool(&self) -> &ImageExportPool {
        &self.export
    }

    /// Accepts a new job unless one is pending or running. Results and errors
    /// of a previous job are cleared. Returns the new job's id.
    pub fn request_render(&mut self, request: RenderRequest) -> Result<u64, RequestError> {
        if matches!(self.state, JobState::Requested | JobState::InProgress) {
            return Err(RequestError::Busy(self.state));
        }
        let job_id = self.next_job_id;
        self.next_job_id += 1;
        self.current_job_id = job_id;
        self.output = None;
        self.last_error = None;
        log::info!(
            target: "job",
            "job {job_id} requested: {} shapes at resolution {}",
            request.shapes.len(),
            request.microscope.resolution
        );
        self.request = Some(request);
        self.set_state(JobState::Requested);
        Ok(job_id)
    }

    /// Advances the job as far as it can without waiting on workers.
    ///
    /// Entering the export stage queues every image through the memory budget,
    /// so this call can block on export admission until workers free budget.
    pub fn poll(&mut self) -> JobState {
        self.step(false)
    }

    /// Polls until the job reaches a terminal state (or returns at once when idle).
    pub fn run_to_completion(&mut self) -> JobState {
        loop {
            match self.step(true) {
                JobState::Requested | JobState::InProgress => continue,
                s => return s,
            }
        }
    }

    pub fn progress(&self) -> JobProgress {
        let mut p = JobProgress {
            state: self.state,
            ..JobProgress::default()
        };
        if let Some(job) = &self.inflight {
            p.chunks_total = job.stats.chunks;
            match &job.phase {
                Phase::Extracting(stage) => {
                    p.chunks_done = stage.completed;
                }
                Phase::Exporting { stage, .. } => {
                    p.chunks_done = job.stats.chunks;
                    p.images_done = stage.completed;
                    p.images_total = stage.total();
                }
            }
        } else if let Some(out) = &self.output {
            p.chunks_done = out.stats.chunks;
            p.chunks_total = out.stats.chunks;
            p.images_done = out.stats.images;
            p.images_total = out.stats.images;
        }
        p
    }

    pub fn output(&self) -> Option<&RenderOutput> {
        self.output.as_ref()
    }

    /// Moves the finished job's output out, leaving the state `Done`.
    pub fn take_output(&mut self) -> Option<RenderOutput> {
        self.output.take()
    }

    pub fn last_error(&self) -> Option<&RenderError> {
        self.last_error.as_ref()
    }

    pub fn last_error_kind(&self) -> Option<ErrorKind> {
        self.last_error.as_ref().map(RenderError::kind)
    }

    fn set_state(&mut self, next: JobState) {
        if self.state != next {
            log::info!(target: "job", "job {}: {} -> {}", self.current_job_id, self.state, next);
            self.state = next;
        }
    }

    fn step(&mut self, block: bool) -> JobState {
        match self.state {
            JobState::Idle | JobState::Done | JobState::Error => {}
            JobState::Requested => {
                let Some(request) = self.request.take() else {
                    self.set_state(JobState::Idle);
                    return self.state;
                };
                match self.start(request) {
                    Ok(job) => {
                        self.inflight = Some(job);
                        self.set_state(JobState::InProgress);
                    }
                    Err(e) => self.fail(e),
                }
            }
            JobState::InProgress => {
                if let Some(job) = self.inflight.take() {
                    match self.advance(job, block) {
                        Ok(Some(job)) => self.inflight = Some(job),
                        Ok(None) => {}
                        Err(e) => self.fail(e),
                    }
                } else {
                    self.fail(RenderError::worker("job", "in progress without running work"));
                }
            }
        }
        self.state
    }

    fn fail(&mut self, e: RenderError) {
        log::info!(
            target: "job",
            "job {} failed ({}): {e}",
            self.current_job_id,
            e.kind().as_str()
        );
        self.inflight = None;
        self.output = None;
        self.last_error = Some(e);
        self.set_state(JobState::Error);
    }

    /// Validates, allocates, rasterizes, partitions and submits extraction.
    fn start(&mut self, request: RenderRequest) -> Result<InFlight, RenderError> {
        let t_start = Instant::now();
        let job_id = self.current_job_id;
        let MicroscopeParams { region, resolution } = request.microscope;

        let t0 = Instant::now();
        let mut grid =
            VoxelGrid::for_region(&region, resolution, self.config.grid.memory_ceiling_bytes)?;
        let t_alloc_ms = ms_since(t0);

        let t0 = Instant::now();
        let raster = rasterize(&mut grid, &request.shapes)?;
        let t_raster_ms = ms_since(t0);

        let grid = Arc::new(grid);
        let chunks = ChunkPartitioner::new(self.config.extraction.chunk_edge)
            .partition(grid.sx, grid.sy, grid.sz);
        let mut stats = JobStats {
            job_id,
            grid_dims: grid.dims(),
            grid_bytes: grid.memory_bytes(),
            occupied_voxels: grid.occupied_count(),
            raster,
            chunks: chunks.len(),
            t_alloc_ms,
            t_raster_ms,
            ..JobStats::default()
        };
        stats.images = request.projections.len() + request.raw_buffers.len();

        let t_stage = Instant::now();
        let mut stage = Stage::new();
        for chunk in chunks {
            let task = ExtractionTask {
                chunk,
                grid: Arc::clone(&grid),
                isolevel: self.config.extraction.isolevel,
            };
            stage.push(self.extraction.submit(task)?);
        }
        log::debug!(
            target: "job",
            "job {job_id}: grid {:?} ({} bytes, {} occupied) alloc_ms={} raster_ms={}, {} chunks submitted",
            stats.grid_dims,
            stats.grid_bytes,
            stats.occupied_voxels,
            t_alloc_ms,
            t_raster_ms,
            stats.chunks
        );

        Ok(InFlight {
            job_id,
            grid,
            phase: Phase::Extracting(stage),
            projections: request.projections,
            raw_buffers: request.raw_buffers,
            stats,
            t_start,
            t_stage,
        })
    }

    /// Collects finished work and moves through the barrier, merge and export.
    /// Returns the job while it still has outstanding work.
    fn advance(&mut self, mut job: InFlight, block: bool) -> Result<Option<InFlight>, RenderError> {
        loop {
            let complete = match &mut job.phase {
                Phase::Extracting(stage) => {
                    stage.collect(block);
                    stage.is_complete()
                }
                Phase::Exporting { stage, .. } => {
                    stage.collect(block);
                    stage.is_complete()
                }
            };
            if !complete {
                return Ok(Some(job));
            }
            let InFlight {
                job_id,
                grid,
                phase,
                projections,
                raw_buffers,
                mut stats,
                t_start,
                t_stage,
            } = job;
            match phase {
                Phase::Extracting(stage) => {
                    // Barrier: every chunk has answered.
                    let results = stage.finish()?;
                    stats.t_extract_ms = ms_since(t_stage);

                    let t0 = Instant::now();
                    stats.surface_cubes = results.iter().map(|r| r.surface_cubes).sum();
                    let mut agg = MeshAggregator::with_capacity(results.len());
                    for r in results {
                        agg.push(r);
                    }
                    let meshes = agg.finish();
                    stats.t_merge_ms = ms_since(t0);
                    stats.entities = meshes.len();
                    stats.vertices = meshes.total_vertices();
                    stats.triangles = meshes.total_triangles();
                    log::debug!(
                        target: "job",
                        "job {job_id}: extracted {} entities ({} vertices, {} triangles) extract_ms={} merge_ms={}",
                        stats.entities,
                        stats.vertices,
                        stats.triangles,
                        stats.t_extract_ms,
                        stats.t_merge_ms
                    );

                    let t_stage = Instant::now();
                    let stage = self.submit_exports(&grid, &projections, raw_buffers);
                    job = InFlight {
                        job_id,
                        grid,
                        phase: Phase::Exporting { meshes, stage },
                        projections,
                        raw_buffers: Vec::new(),
                        stats,
                        t_start,
                        t_stage,
                    };
                }
                Phase::Exporting { meshes, stage } => {
                    let images = stage.finish()?;
                    stats.t_export_ms = ms_since(t_stage);
                    stats.images = images.len();
                    stats.t_total_ms = ms_since(t_start);
                    log::info!(
                        target: "job",
                        "job {job_id} done: {} meshes, {} images in {} ms",
                        meshes.len(),
                        images.len(),
                        stats.t_total_ms
                    );
                    self.output = Some(RenderOutput {
                        grid,
                        meshes,
                        images,
                        stats,
                    });
                    self.set_state(JobState::Done);
                    return Ok(None);
                }
            }
        }
    }

    /// Samples projections and queues every export, blocking on budget admission.
    /// Stops queueing at the first failure; already queued tasks still finish.
    fn submit_exports(
        &self,
        grid: &VoxelGrid,
        projections: &[ProjectionSampler],
        raw_buffers: Vec<(String, RawBuffer)>,
    ) -> Stage<Image> {
        let mut stage = Stage::new();
        let sampled = projections.iter().enumerate().map(|(i, sampler)| {
            let label = format!("mip-{}-{i}", sampler.axis.name());
            sampler
                .sample(grid)
                .map(|buf| ExportTask::new(label.clone(), buf))
                .map_err(|e| RenderError::worker(format!("projection '{label}'"), e.to_string()))
        });
        let external = raw_buffers
            .into_iter()
            .map(|(label, buf)| Ok(ExportTask::new(label, buf)));
        for task in sampled.chain(external) {
            let queued = task.and_then(|task| self.export.submit(task));
            match queued {
                Ok(pending) => stage.push(pending),
                Err(e) => {
                    stage.record_error(e);
                    break;
                }
            }
        }
        let budget = self.export.budget();
        log::debug!(
            target: "export",
            "{} exports queued, budget {} of {} bytes in use (peak {})",
            stage.total(),
            budget.consumed(),
            budget.ceiling(),
            budget.peak()
        );
        stage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use voxscan_grid::GridRange;
    use voxscan_mesh_cpu::{Chunk, EntityMeshes, ExtractError};

    fn chunk(id: usize) -> Chunk {
        Chunk {
            id,
            range: GridRange::new(id, id + 1, 0, 1, 0, 1),
        }
    }

    fn ok_result(id: usize) -> Result<ChunkResult, ExtractError> {
        Ok(ChunkResult {
            chunk: chunk(id),
            meshes: EntityMeshes::new(),
            surface_cubes: id as u64,
            t_ms: 0,
        })
    }

    /// Chunks 1 and 3 fail with isolevels 2.0 and 3.0.
    fn mixed_stage(pool: &SurfaceExtractionPool) -> Stage<ChunkResult> {
        let mut stage = Stage::new();
        for id in 0..4 {
            let p = if id % 2 == 0 {
                pool.submit_with(chunk(id), move || ok_result(id))
            } else {
                pool.submit_with(chunk(id), move || {
                    Err(ExtractError::InvalidIsolevel(id as f32 + 1.0))
                })
            };
            stage.push(p.unwrap());
        }
        stage
    }

    #[test]
    fn blocking_barrier_reports_first_failed_chunk() {
        let pool = SurfaceExtractionPool::new(2).unwrap();
        let mut stage = mixed_stage(&pool);
        stage.collect(true);
        assert!(stage.is_complete());
        assert_eq!(stage.completed, stage.total());
        assert_eq!(stage.done.len(), 2);
        match stage.finish() {
            Err(RenderError::Worker { task, reason }) => {
                assert_eq!(task, "chunk 1");
                assert!(reason.contains('2'), "{reason}");
            }
            other => panic!("expected worker error, got {:?}", other.map(|v| v.len())),
        }
    }

    #[test]
    fn polling_barrier_waits_for_every_chunk_before_failing() {
        let pool = SurfaceExtractionPool::new(2).unwrap();
        let mut stage = mixed_stage(&pool);
        let start = std::time::Instant::now();
        while !stage.is_complete() {
            assert!(start.elapsed() < Duration::from_secs(10));
            stage.collect(false);
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(stage.completed, 4);
        assert_eq!(stage.done.len(), 2);
        let err = stage.finish().map(|v| v.len()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Worker);
        assert!(matches!(
            &err,
            RenderError::Worker { task, .. } if task == "chunk 1" || task == "chunk 3"
        ));
    }

    #[test]
    fn successful_stage_keeps_submission_order() {
        let pool = SurfaceExtractionPool::new(3).unwrap();
        let mut stage = Stage::new();
        for id in 0..6 {
            stage.push(pool.submit_with(chunk(id), move || ok_result(id)).unwrap());
        }
        stage.collect(true);
        let ids: Vec<usize> = stage.finish().unwrap().iter().map(|r| r.chunk.id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4, 5]);
    }
}
