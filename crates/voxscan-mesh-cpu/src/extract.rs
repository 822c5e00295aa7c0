use std::sync::Arc;
use std::time::Instant;

use hashbrown::HashMap;
use thiserror::Error;
use voxscan_geom::Vec3;
use voxscan_grid::{EntityId, VoxelGrid};

use crate::chunk::Chunk;
use crate::mesh_build::PartialMesh;
use crate::tables::{self, CORNER_OFFSETS, EDGE_CORNERS};

/// Per-entity meshes emitted by one chunk.
pub type EntityMeshes = HashMap<EntityId, PartialMesh>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractError {
    #[error("isolevel {0} must lie strictly between 0 and 1")]
    InvalidIsolevel(f32),

    #[error("chunk {chunk} range {range:?} exceeds grid {dims:?}")]
    ChunkOutOfBounds {
        chunk: usize,
        range: voxscan_grid::GridRange,
        dims: (usize, usize, usize),
    },
}

#[derive(Clone, Debug)]
pub struct ChunkResult {
    pub chunk: Chunk,
    pub meshes: EntityMeshes,
    /// Cubes whose corners straddled the surface.
    pub surface_cubes: u64,
    pub t_ms: u32,
}

impl ChunkResult {
    pub fn vertex_count(&self) -> usize {
        self.meshes.values().map(|m| m.vertex_count()).sum()
    }
}

/// Extraction work for one chunk over a frozen grid.
#[derive(Clone, Debug)]
pub struct ExtractionTask {
    pub chunk: Chunk,
    pub grid: Arc<VoxelGrid>,
    pub isolevel: f32,
}

impl ExtractionTask {
    pub fn run(&self) -> Result<ChunkResult, ExtractError> {
        extract_chunk(&self.grid, &self.chunk, self.isolevel)
    }
}

/// Marching cubes over the cubes whose minimum corner lies in `chunk`.
///
/// Voxel centers are the cube corners; a corner is inside when its entity is
/// nonzero (field value 1) and outside otherwise (field value 0). Cells beyond
/// the grid read as outside, and chunks touching the low face of the grid also
/// own the cubes hanging off that face, so surfaces touching the grid boundary
/// close. Each cube's triangles go to the majority entity among its inside
/// corners, ties going to the lowest corner number.
pub fn extract_chunk(
    grid: &VoxelGrid,
    chunk: &Chunk,
    isolevel: f32,
) -> Result<ChunkResult, ExtractError> {
    if !(isolevel > 0.0 && isolevel < 1.0) {
        return Err(ExtractError::InvalidIsolevel(isolevel));
    }
    let r = chunk.range;
    if r.x1 > grid.sx || r.y1 > grid.sy || r.z1 > grid.sz {
        return Err(ExtractError::ChunkOutOfBounds {
            chunk: chunk.id,
            range: r,
            dims: grid.dims(),
        });
    }

    let t0 = Instant::now();
    let mut meshes = EntityMeshes::new();
    let mut surface_cubes = 0u64;
    if r.is_empty() {
        return Ok(ChunkResult {
            chunk: *chunk,
            meshes,
            surface_cubes,
            t_ms: 0,
        });
    }

    let lo = |v: usize| if v == 0 { -1i64 } else { v as i64 };
    for y in lo(r.y0)..r.y1 as i64 {
        for z in lo(r.z0)..r.z1 as i64 {
            for x in lo(r.x0)..r.x1 as i64 {
                let mut ids = [EntityId::EMPTY; 8];
                let mut case = 0u8;
                for (c, off) in CORNER_OFFSETS.iter().enumerate() {
                    let id = grid.sample(x + off[0], y + off[1], z + off[2]);
                    ids[c] = id;
                    if id.is_empty() {
                        case |= 1 << c;
                    }
                }
                if case == 0 || case == 0xFF {
                    continue;
                }
                surface_cubes += 1;
                let owner = representative(&ids);
                let mesh = meshes.entry(owner).or_default();
                let mut edge_vertex = [u32::MAX; 12];
                for tri in tables::triangles(case) {
                    let mut v = [0u32; 3];
                    for (k, &e) in tri.iter().enumerate() {
                        if edge_vertex[e] == u32::MAX {
                            let p = edge_point(grid, [x, y, z], e, &ids, isolevel);
                            edge_vertex[e] = mesh.push_vertex(p);
                        }
                        v[k] = edge_vertex[e];
                    }
                    mesh.push_triangle(v[0], v[1], v[2]);
                }
            }
        }
    }

    let t_ms = t0.elapsed().as_millis().min(u128::from(u32::MAX)) as u32;
    log::trace!(
        target: "extract",
        "chunk {} {:?}: {} surface cubes, {} entities, {} ms",
        chunk.id,
        r,
        surface_cubes,
        meshes.len(),
        t_ms
    );
    Ok(ChunkResult {
        chunk: *chunk,
        meshes,
        surface_cubes,
        t_ms,
    })
}

/// Convenience for whole-grid extraction on the calling thread.
pub fn extract_grid(grid: &VoxelGrid, isolevel: f32) -> Result<ChunkResult, ExtractError> {
    let chunk = Chunk {
        id: 0,
        range: grid.full_range(),
    };
    extract_chunk(grid, &chunk, isolevel)
}

fn representative(ids: &[EntityId; 8]) -> EntityId {
    let mut best = EntityId::EMPTY;
    let mut best_count = 0usize;
    for (c, &id) in ids.iter().enumerate() {
        if id.is_empty() || ids[..c].contains(&id) {
            continue;
        }
        let count = ids[c..].iter().filter(|&&o| o == id).count();
        if count > best_count {
            best = id;
            best_count = count;
        }
    }
    best
}

fn edge_point(
    grid: &VoxelGrid,
    cube: [i64; 3],
    edge: usize,
    ids: &[EntityId; 8],
    isolevel: f32,
) -> Vec3 {
    let [a, b] = EDGE_CORNERS[edge];
    let value = |c: usize| if ids[c].is_empty() { 0.0f32 } else { 1.0 };
    let (va, vb) = (value(a), value(b));
    let t = if va == vb {
        0.5
    } else {
        ((isolevel - va) / (vb - va)).clamp(0.0, 1.0)
    };
    let (oa, ob) = (CORNER_OFFSETS[a], CORNER_OFFSETS[b]);
    let axis = |d: usize| {
        let pa = (cube[d] + oa[d]) as f32;
        let pb = (cube[d] + ob[d]) as f32;
        pa + (pb - pa) * t
    };
    grid.sample_position(axis(0), axis(1), axis(2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn representative_prefers_majority() {
        let e = EntityId::EMPTY;
        let ids = [EntityId(4), EntityId(2), EntityId(2), e, e, e, e, e];
        assert_eq!(representative(&ids), EntityId(2));
    }

    #[test]
    fn representative_tie_goes_to_lowest_corner() {
        let e = EntityId::EMPTY;
        let ids = [e, EntityId(9), EntityId(3), EntityId(3), EntityId(9), e, e, e];
        assert_eq!(representative(&ids), EntityId(9));
    }

    #[test]
    fn representative_of_empty_cube_is_empty() {
        assert_eq!(representative(&[EntityId::EMPTY; 8]), EntityId::EMPTY);
    }

    #[test]
    fn edge_point_uses_isolevel() {
        let grid = VoxelGrid::create(2, 2, 2, 1.0, Vec3::ZERO, u64::MAX).unwrap();
        let mut ids = [EntityId::EMPTY; 8];
        ids[0] = EntityId(1);
        // Edge 0 joins corner 0 (inside) and corner 1 (outside) along +x
        let mid = edge_point(&grid, [0, 0, 0], 0, &ids, 0.5);
        assert_eq!(mid, Vec3::new(1.0, 0.5, 0.5));
        let near_outside = edge_point(&grid, [0, 0, 0], 0, &ids, 0.25);
        assert_eq!(near_outside, Vec3::new(1.25, 0.5, 0.5));
    }
}
