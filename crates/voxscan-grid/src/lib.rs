//! Dense voxel grid and scan-region helpers.
#![forbid(unsafe_code)]

mod region;
mod types;

pub use region::ScanRegion;
pub use types::{EntityId, GridIndex, GridRange, Voxel};

use thiserror::Error;
use voxscan_geom::{Aabb, Vec3};

/// Default memory ceiling for a single grid allocation (512 MiB).
pub const DEFAULT_MEMORY_CEILING: u64 = 512 * 1024 * 1024;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GridError {
    #[error("invalid grid dimensions {sx}x{sy}x{sz}: every axis must be > 0")]
    InvalidDimensions { sx: usize, sy: usize, sz: usize },

    #[error("invalid voxel resolution {0}: must be finite and > 0")]
    InvalidResolution(f32),

    #[error("invalid scan region {point1:?}..{point2:?}: corners must be finite and ordered")]
    InvalidRegion { point1: Vec3, point2: Vec3 },

    #[error("grid needs {requested} bytes, ceiling is {ceiling} bytes")]
    TooLarge { requested: u64, ceiling: u64 },
}

/// Bytes needed to store an `sx × sy × sz` grid, `None` on overflow.
pub fn grid_bytes(sx: usize, sy: usize, sz: usize) -> Option<u64> {
    let cells = (sx as u64)
        .checked_mul(sy as u64)?
        .checked_mul(sz as u64)?;
    cells.checked_mul(size_of::<Voxel>() as u64)
}

/// The discretized world for one render job.
///
/// Cells are stored in one contiguous buffer, x fastest, then z, then y.
/// Every accessor is bounds-checked; writes outside the grid are dropped.
#[derive(Clone, Debug)]
pub struct VoxelGrid {
    pub sx: usize,
    pub sy: usize,
    pub sz: usize,
    pub voxel_scale: f32,
    pub origin: Vec3,
    cells: Vec<Voxel>,
}

impl VoxelGrid {
    /// Allocates an empty grid after checking its footprint against `memory_ceiling`.
    pub fn create(
        sx: usize,
        sy: usize,
        sz: usize,
        voxel_scale: f32,
        origin: Vec3,
        memory_ceiling: u64,
    ) -> Result<Self, GridError> {
        if sx == 0 || sy == 0 || sz == 0 {
            return Err(GridError::InvalidDimensions { sx, sy, sz });
        }
        if !voxel_scale.is_finite() || voxel_scale <= 0.0 {
            return Err(GridError::InvalidResolution(voxel_scale));
        }
        if !origin.is_finite() {
            return Err(GridError::InvalidRegion {
                point1: origin,
                point2: origin,
            });
        }
        let requested = grid_bytes(sx, sy, sz).unwrap_or(u64::MAX);
        if requested > memory_ceiling {
            return Err(GridError::TooLarge {
                requested,
                ceiling: memory_ceiling,
            });
        }
        let n = sx * sy * sz;
        let mut cells = Vec::new();
        cells
            .try_reserve_exact(n)
            .map_err(|_| GridError::TooLarge {
                requested,
                ceiling: memory_ceiling,
            })?;
        cells.resize(n, Voxel::EMPTY);
        log::debug!(
            target: "grid",
            "allocated {}x{}x{} grid scale={} ({} bytes)",
            sx,
            sy,
            sz,
            voxel_scale,
            requested
        );
        Ok(Self {
            sx,
            sy,
            sz,
            voxel_scale,
            origin,
            cells,
        })
    }

    /// Grid covering `region` at `resolution`, with its origin at `region.point1`.
    pub fn for_region(
        region: &ScanRegion,
        resolution: f32,
        memory_ceiling: u64,
    ) -> Result<Self, GridError> {
        let (sx, sy, sz) = region.voxel_counts(resolution)?;
        Self::create(sx, sy, sz, resolution, region.point1, memory_ceiling)
    }

    #[inline]
    pub fn dims(&self) -> (usize, usize, usize) {
        (self.sx, self.sy, self.sz)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    #[inline]
    pub fn full_range(&self) -> GridRange {
        GridRange::full(self.sx, self.sy, self.sz)
    }

    #[inline]
    pub fn memory_bytes(&self) -> u64 {
        (self.cells.len() * size_of::<Voxel>()) as u64
    }

    #[inline]
    pub fn in_bounds(&self, i: GridIndex) -> bool {
        i.x < self.sx && i.y < self.sy && i.z < self.sz
    }

    /// Linear offset of `i`; `None` when out of range.
    #[inline]
    pub fn linear(&self, i: GridIndex) -> Option<usize> {
        if !self.in_bounds(i) {
            return None;
        }
        Some((i.y * self.sz + i.z) * self.sx + i.x)
    }

    /// Cell containing `pos`, `floor((pos - origin) / scale)` per axis.
    pub fn index_of(&self, pos: Vec3) -> Option<GridIndex> {
        let rel = (pos - self.origin) / self.voxel_scale;
        let axis = |v: f32, count: usize| -> Option<usize> {
            let f = v.floor();
            if !f.is_finite() || f < 0.0 || f >= count as f32 {
                return None;
            }
            let i = f as usize;
            (i < count).then_some(i)
        };
        Some(GridIndex::new(
            axis(rel.x, self.sx)?,
            axis(rel.y, self.sy)?,
            axis(rel.z, self.sz)?,
        ))
    }

    /// World position of the center of cell `i` (not bounds-checked).
    #[inline]
    pub fn voxel_center(&self, i: GridIndex) -> Vec3 {
        self.sample_position(i.x as f32, i.y as f32, i.z as f32)
    }

    /// World position of a sample at fractional cell coordinates (cell centers at integers).
    #[inline]
    pub fn sample_position(&self, fx: f32, fy: f32, fz: f32) -> Vec3 {
        self.origin + Vec3::new(fx + 0.5, fy + 0.5, fz + 0.5) * self.voxel_scale
    }

    #[inline]
    pub fn get_entity(&self, i: GridIndex) -> Option<EntityId> {
        self.linear(i).map(|l| self.cells[l].entity)
    }

    /// Writes `id` at `i`; out-of-range writes are ignored. Returns the previous owner
    /// when the write landed.
    #[inline]
    pub fn set_entity(&mut self, i: GridIndex, id: EntityId) -> Option<EntityId> {
        let l = self.linear(i)?;
        let prev = self.cells[l].entity;
        self.cells[l].entity = id;
        Some(prev)
    }

    /// Owner at signed cell coordinates; anything outside the grid reads as empty.
    #[inline]
    pub fn sample(&self, x: i64, y: i64, z: i64) -> EntityId {
        if x < 0 || y < 0 || z < 0 {
            return EntityId::EMPTY;
        }
        self.get_entity(GridIndex::new(x as usize, y as usize, z as usize))
            .unwrap_or(EntityId::EMPTY)
    }

    /// Cells whose centers may fall inside `aabb`, clipped to the grid.
    pub fn range_for_aabb(&self, aabb: &Aabb) -> GridRange {
        let lo = (aabb.min - self.origin) / self.voxel_scale;
        let hi = (aabb.max - self.origin) / self.voxel_scale;
        let clamp_lo = |v: f32, count: usize| -> usize {
            if v.is_nan() {
                return count;
            }
            v.floor().clamp(0.0, count as f32) as usize
        };
        let clamp_hi = |v: f32, count: usize| -> usize {
            if v.is_nan() {
                return 0;
            }
            (v.floor() + 1.0).clamp(0.0, count as f32) as usize
        };
        GridRange::new(
            clamp_lo(lo.x, self.sx),
            clamp_hi(hi.x, self.sx),
            clamp_lo(lo.y, self.sy),
            clamp_hi(hi.y, self.sy),
            clamp_lo(lo.z, self.sz),
            clamp_hi(hi.z, self.sz),
        )
    }

    /// World-space box spanned by the grid.
    pub fn world_bounds(&self) -> Aabb {
        let extent = Vec3::new(self.sx as f32, self.sy as f32, self.sz as f32) * self.voxel_scale;
        Aabb::new(self.origin, self.origin + extent)
    }

    #[inline]
    pub fn voxels(&self) -> &[Voxel] {
        &self.cells
    }

    #[inline]
    pub fn has_entities(&self) -> bool {
        self.cells.iter().any(|v| !v.is_empty())
    }

    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|v| !v.is_empty()).count()
    }

    pub fn count_entity(&self, id: EntityId) -> usize {
        self.cells.iter().filter(|v| v.entity == id).count()
    }

    /// Per-entity voxel counts sorted by entity id, empty cells excluded.
    pub fn entity_counts(&self) -> Vec<(EntityId, usize)> {
        let mut counts: std::collections::BTreeMap<EntityId, usize> = Default::default();
        for v in self.cells.iter().filter(|v| !v.is_empty()) {
            *counts.entry(v.entity).or_default() += 1;
        }
        counts.into_iter().collect()
    }
}
