//! CPU surface extraction: chunk partitioning, marching cubes and per-entity merge.
#![forbid(unsafe_code)]

mod aggregate;
mod chunk;
mod extract;
mod mesh_build;
pub mod tables;

pub use aggregate::{AggregatedMeshSet, MeshAggregator, combine, combine_into};
pub use chunk::{Chunk, ChunkPartitioner, DEFAULT_CHUNK_EDGE};
pub use extract::{
    ChunkResult, EntityMeshes, ExtractError, ExtractionTask, extract_chunk, extract_grid,
};
pub use mesh_build::{Mesh, PartialMesh};

/// Default surface threshold between the empty (0) and occupied (1) field values.
pub const DEFAULT_ISOLEVEL: f32 = 0.5;
