use voxscan_grid::GridRange;

pub const DEFAULT_CHUNK_EDGE: usize = 32;

/// One independently processed sub-volume of a grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Chunk {
    /// Position in partition order; merge order is keyed on this.
    pub id: usize,
    pub range: GridRange,
}

/// Tiles a grid into cubic chunks; the last chunk on each axis is clipped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkPartitioner {
    edge: usize,
}

impl Default for ChunkPartitioner {
    fn default() -> Self {
        Self {
            edge: DEFAULT_CHUNK_EDGE,
        }
    }
}

impl ChunkPartitioner {
    /// `edge` of 0 is treated as 1.
    pub fn new(edge: usize) -> Self {
        Self { edge: edge.max(1) }
    }

    #[inline]
    pub fn edge(&self) -> usize {
        self.edge
    }

    /// Chunks per axis for an `sx × sy × sz` grid.
    #[inline]
    pub fn chunk_counts(&self, sx: usize, sy: usize, sz: usize) -> (usize, usize, usize) {
        (
            sx.div_ceil(self.edge),
            sy.div_ceil(self.edge),
            sz.div_ceil(self.edge),
        )
    }

    /// Chunks covering every index of the grid exactly once, ordered y, then z,
    /// then x (matching grid storage order).
    pub fn partition(&self, sx: usize, sy: usize, sz: usize) -> Vec<Chunk> {
        let (nx, ny, nz) = self.chunk_counts(sx, sy, sz);
        let e = self.edge;
        let mut out = Vec::with_capacity(nx * ny * nz);
        for cy in 0..ny {
            for cz in 0..nz {
                for cx in 0..nx {
                    let range = GridRange::new(
                        cx * e,
                        ((cx + 1) * e).min(sx),
                        cy * e,
                        ((cy + 1) * e).min(sy),
                        cz * e,
                        ((cz + 1) * e).min(sz),
                    );
                    out.push(Chunk {
                        id: out.len(),
                        range,
                    });
                }
            }
        }
        out
    }
}
