use voxscan_geom::{Aabb, Vec3};

/// Indexed triangle mesh: `idx` holds triangle corner triples into `pos`.
#[derive(Default, Clone, Debug, PartialEq)]
pub struct Mesh {
    pub pos: Vec<Vec3>,
    pub idx: Vec<u32>,
}

/// One chunk's contribution to an entity's mesh. Same layout as the merged mesh.
pub type PartialMesh = Mesh;

impl Mesh {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.pos.len()
    }

    #[inline]
    pub fn index_count(&self) -> usize {
        self.idx.len()
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.idx.len() / 3
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.idx.is_empty()
    }

    /// Appends a vertex and returns its index.
    #[inline]
    pub fn push_vertex(&mut self, p: Vec3) -> u32 {
        let i = self.pos.len() as u32;
        self.pos.push(p);
        i
    }

    #[inline]
    pub fn push_triangle(&mut self, a: u32, b: u32, c: u32) {
        self.idx.extend_from_slice(&[a, b, c]);
    }

    /// Appends `other`, offsetting its indices by this mesh's vertex count
    /// before the append. Shared positions are not welded.
    pub fn append(&mut self, other: &Mesh) {
        let base = self.pos.len() as u32;
        self.pos.extend_from_slice(&other.pos);
        self.idx.reserve(other.idx.len());
        self.idx.extend(other.idx.iter().map(|&i| i + base));
    }

    /// Iterates triangles as position triples.
    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        self.idx.chunks_exact(3).map(|t| {
            [
                self.pos[t[0] as usize],
                self.pos[t[1] as usize],
                self.pos[t[2] as usize],
            ]
        })
    }

    pub fn bounds(&self) -> Option<Aabb> {
        Aabb::from_points(self.pos.iter().copied())
    }

    pub fn surface_area(&self) -> f64 {
        self.triangles()
            .map(|[a, b, c]| f64::from((b - a).cross(c - a).length()) * 0.5)
            .sum()
    }

    /// Enclosed volume by the divergence theorem; positive for a closed surface
    /// with outward winding.
    pub fn signed_volume(&self) -> f64 {
        let Some(b) = self.bounds() else {
            return 0.0;
        };
        // Measure about the mesh center to keep the f32 products small.
        let o = b.center();
        self.triangles()
            .map(|[a, b, c]| {
                let (a, b, c) = (a - o, b - o, c - o);
                f64::from(a.dot(b.cross(c))) / 6.0
            })
            .sum()
    }
}
