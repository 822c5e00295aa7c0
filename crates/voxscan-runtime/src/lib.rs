//! Render job runtime: worker pools, export memory budget, pipeline config and
//! the job orchestrator.
#![forbid(unsafe_code)]

mod budget;
mod config;
mod error;
mod export_pool;
mod extraction_pool;
mod orchestrator;
mod worker;

pub use budget::{MemoryBudget, Reservation};
pub use config::{ExportConfig, ExtractionConfig, GridConfig, PipelineConfig};
pub use error::{ErrorKind, RenderError};
pub use export_pool::{ImageExportPool, PendingExport};
pub use extraction_pool::{PendingExtraction, SurfaceExtractionPool};
pub use orchestrator::{
    JobProgress, JobState, JobStats, MicroscopeParams, RenderJobOrchestrator, RenderOutput,
    RenderRequest, RequestError,
};
pub use worker::{Pending, WorkerPool};
