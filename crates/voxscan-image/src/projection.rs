use std::collections::BTreeMap;

use fastnoise_lite::{FastNoiseLite, NoiseType};
use voxscan_grid::{EntityId, GridIndex, VoxelGrid};

use crate::{ExportError, RawBuffer};

/// Axis the projection looks along.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ProjectionAxis {
    X,
    Y,
    #[default]
    Z,
}

impl ProjectionAxis {
    pub fn name(self) -> &'static str {
        match self {
            ProjectionAxis::X => "x",
            ProjectionAxis::Y => "y",
            ProjectionAxis::Z => "z",
        }
    }
}

/// Deterministic background added to every pixel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoiseParams {
    pub seed: i32,
    pub frequency: f32,
    /// Peak added intensity.
    pub amplitude: f32,
}

/// Maximum-intensity projection of a voxel grid into a single-channel buffer.
///
/// Image x runs along the first remaining grid axis; image rows run top-down,
/// so world "up" (+y) appears at the top for the X and Z projections.
#[derive(Clone, Debug)]
pub struct ProjectionSampler {
    pub axis: ProjectionAxis,
    /// Intensity of entities without an override.
    pub default_intensity: f32,
    intensities: BTreeMap<EntityId, f32>,
    pub noise: Option<NoiseParams>,
}

impl Default for ProjectionSampler {
    fn default() -> Self {
        Self::new(ProjectionAxis::Z)
    }
}

impl ProjectionSampler {
    pub fn new(axis: ProjectionAxis) -> Self {
        Self {
            axis,
            default_intensity: 1.0,
            intensities: BTreeMap::new(),
            noise: None,
        }
    }

    pub fn with_intensity(mut self, entity: EntityId, intensity: f32) -> Self {
        self.intensities.insert(entity, intensity);
        self
    }

    pub fn with_noise(mut self, noise: NoiseParams) -> Self {
        self.noise = Some(noise);
        self
    }

    pub fn intensity(&self, entity: EntityId) -> f32 {
        if entity.is_empty() {
            return 0.0;
        }
        self.intensities
            .get(&entity)
            .copied()
            .unwrap_or(self.default_intensity)
    }

    /// Output `(width, height)` for `grid`.
    pub fn image_dims(&self, grid: &VoxelGrid) -> (usize, usize) {
        match self.axis {
            ProjectionAxis::X => (grid.sz, grid.sy),
            ProjectionAxis::Y => (grid.sx, grid.sz),
            ProjectionAxis::Z => (grid.sx, grid.sy),
        }
    }

    pub fn sample(&self, grid: &VoxelGrid) -> Result<RawBuffer, ExportError> {
        let (w, h) = self.image_dims(grid);
        let depth = match self.axis {
            ProjectionAxis::X => grid.sx,
            ProjectionAxis::Y => grid.sy,
            ProjectionAxis::Z => grid.sz,
        };
        let width = u32::try_from(w).map_err(|_| ExportError::DimensionOverflow(w))?;
        let height = u32::try_from(h).map_err(|_| ExportError::DimensionOverflow(h))?;
        let mut buf = RawBuffer::zeroed(width, height, 1)?;

        let noise = self.noise.map(|p| {
            let mut n = FastNoiseLite::with_seed(p.seed);
            n.set_noise_type(Some(NoiseType::OpenSimplex2));
            n.set_frequency(Some(p.frequency));
            (n, p.amplitude)
        });

        for v in 0..h {
            for u in 0..w {
                let mut peak = 0.0f32;
                for d in 0..depth {
                    let idx = match self.axis {
                        ProjectionAxis::X => GridIndex::new(d, h - 1 - v, u),
                        ProjectionAxis::Y => GridIndex::new(u, d, v),
                        ProjectionAxis::Z => GridIndex::new(u, h - 1 - v, d),
                    };
                    let e = grid.get_entity(idx).unwrap_or(EntityId::EMPTY);
                    peak = peak.max(self.intensity(e));
                }
                if let Some((n, amplitude)) = &noise {
                    let b = (n.get_noise_2d(u as f32, v as f32) + 1.0) * 0.5 * amplitude;
                    peak += b;
                }
                buf.set(u as u32, v as u32, 0, peak.clamp(0.0, 1.0));
            }
        }
        log::trace!(
            target: "export",
            "projected {:?} grid along {}: {}x{}",
            grid.dims(),
            self.axis.name(),
            width,
            height
        );
        Ok(buf)
    }
}
