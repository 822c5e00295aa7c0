use hashbrown::HashMap;
use voxscan_grid::EntityId;

use crate::extract::ChunkResult;
use crate::mesh_build::Mesh;

/// One merged mesh per entity.
#[derive(Clone, Debug, Default)]
pub struct AggregatedMeshSet {
    meshes: HashMap<EntityId, Mesh>,
}

impl AggregatedMeshSet {
    #[inline]
    pub fn get(&self, id: EntityId) -> Option<&Mesh> {
        self.meshes.get(&id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EntityId, &Mesh)> {
        self.meshes.iter()
    }

    /// Entity ids in ascending order.
    pub fn entity_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.meshes.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn total_vertices(&self) -> usize {
        self.meshes.values().map(Mesh::vertex_count).sum()
    }

    pub fn total_triangles(&self) -> usize {
        self.meshes.values().map(Mesh::triangle_count).sum()
    }

    pub fn into_inner(self) -> HashMap<EntityId, Mesh> {
        self.meshes
    }
}

/// Single-threaded merge of per-chunk results.
///
/// Results may be pushed in any order; `finish` combines them in chunk-id order
/// so the merged arrays do not depend on worker scheduling.
#[derive(Default)]
pub struct MeshAggregator {
    pending: Vec<ChunkResult>,
}

impl MeshAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(chunks: usize) -> Self {
        Self {
            pending: Vec::with_capacity(chunks),
        }
    }

    pub fn push(&mut self, result: ChunkResult) {
        self.pending.push(result);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn finish(mut self) -> AggregatedMeshSet {
        self.pending.sort_by_key(|r| r.chunk.id);
        let mut out = AggregatedMeshSet::default();
        for result in &self.pending {
            for (id, part) in &result.meshes {
                combine_into(out.meshes.entry(*id).or_default(), part);
            }
        }
        log::debug!(
            target: "extract",
            "aggregated {} chunk results into {} entity meshes ({} vertices)",
            self.pending.len(),
            out.len(),
            out.total_vertices()
        );
        out
    }
}

/// Appends `part` to `running`, offsetting its indices by `running`'s vertex
/// count before the append.
#[inline]
pub fn combine_into(running: &mut Mesh, part: &Mesh) {
    running.append(part);
}

/// Combination of two meshes; `b`'s indices shift by `a.vertex_count()`.
pub fn combine(a: &Mesh, b: &Mesh) -> Mesh {
    let mut out = Mesh {
        pos: Vec::with_capacity(a.pos.len() + b.pos.len()),
        idx: Vec::with_capacity(a.idx.len() + b.idx.len()),
    };
    out.append(a);
    out.append(b);
    out
}
