//! Shape rasterization into a voxel grid.
#![forbid(unsafe_code)]

mod shape;

pub use shape::{Shape, ShapeError, ShapeKind};

use std::time::Instant;

use rayon::prelude::*;
use voxscan_grid::{GridRange, VoxelGrid};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RasterStats {
    pub shapes: usize,
    /// Shapes whose bounds miss the grid entirely.
    pub shapes_culled: usize,
    pub voxels_tested: u64,
    pub voxels_written: u64,
    /// Writes that took a voxel away from a different nonzero entity.
    pub overwrites: u64,
    pub t_cull_ms: u32,
    pub t_fill_ms: u32,
}

/// Validates every shape and computes its clipped index range.
///
/// Runs in parallel since it only reads the grid's geometry. The first invalid
/// shape in input order is reported.
pub fn prepare_shapes(
    grid: &VoxelGrid,
    shapes: &[Shape],
) -> Result<Vec<(Shape, GridRange)>, ShapeError> {
    let prepared: Vec<Result<(Shape, GridRange), ShapeError>> = shapes
        .par_iter()
        .enumerate()
        .map(|(index, shape)| {
            let shape = shape.validated(index)?;
            let range = grid.range_for_aabb(&shape.bounds());
            Ok((shape, range))
        })
        .collect();
    prepared.into_iter().collect()
}

/// Fills `grid` with the shapes' entity ids.
///
/// Nothing is written unless every shape validates. Voxels are claimed when their
/// center passes the shape's exact membership test; where shapes overlap, the
/// shape later in `shapes` owns the voxel.
pub fn rasterize(grid: &mut VoxelGrid, shapes: &[Shape]) -> Result<RasterStats, ShapeError> {
    let t0 = Instant::now();
    let prepared = prepare_shapes(grid, shapes)?;
    let t_cull_ms = t0.elapsed().as_millis().min(u128::from(u32::MAX)) as u32;

    let mut stats = RasterStats {
        shapes: shapes.len(),
        t_cull_ms,
        ..RasterStats::default()
    };

    let t0 = Instant::now();
    for (shape, range) in &prepared {
        if range.is_empty() {
            stats.shapes_culled += 1;
            log::trace!(target: "raster", "{} {} outside grid", shape.kind_name(), shape.entity);
            continue;
        }
        for i in range.iter() {
            stats.voxels_tested += 1;
            if !shape.contains(grid.voxel_center(i)) {
                continue;
            }
            if let Some(prev) = grid.set_entity(i, shape.entity) {
                stats.voxels_written += 1;
                if !prev.is_empty() && prev != shape.entity {
                    stats.overwrites += 1;
                }
            }
        }
    }
    stats.t_fill_ms = t0.elapsed().as_millis().min(u128::from(u32::MAX)) as u32;

    log::debug!(
        target: "raster",
        "rasterized {} shapes ({} culled): tested={} written={} overwrites={} cull_ms={} fill_ms={}",
        stats.shapes,
        stats.shapes_culled,
        stats.voxels_tested,
        stats.voxels_written,
        stats.overwrites,
        stats.t_cull_ms,
        stats.t_fill_ms
    );
    Ok(stats)
}
