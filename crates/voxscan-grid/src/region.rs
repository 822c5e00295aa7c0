use voxscan_geom::{Aabb, Vec3};

use crate::GridError;

/// Axis-aligned world-space volume to digitize.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScanRegion {
    pub point1: Vec3,
    pub point2: Vec3,
}

impl ScanRegion {
    /// `point1` must be component-wise `<=` `point2` and both finite.
    pub fn new(point1: Vec3, point2: Vec3) -> Result<Self, GridError> {
        if !point1.is_finite() || !point2.is_finite() || !point1.le_all(point2) {
            return Err(GridError::InvalidRegion { point1, point2 });
        }
        Ok(Self { point1, point2 })
    }

    #[inline]
    pub fn size(&self) -> Vec3 {
        self.point2 - self.point1
    }

    #[inline]
    pub fn bounds(&self) -> Aabb {
        Aabb::new(self.point1, self.point2)
    }

    /// Voxel counts per axis covering the region at `resolution` world units per voxel.
    ///
    /// Partial voxels at the far faces are rounded up; a flat axis yields an error.
    /// Fields are public, so corners are checked again here.
    pub fn voxel_counts(&self, resolution: f32) -> Result<(usize, usize, usize), GridError> {
        let (point1, point2) = (self.point1, self.point2);
        if !point1.is_finite() || !point2.is_finite() || !point1.le_all(point2) {
            return Err(GridError::InvalidRegion { point1, point2 });
        }
        if !resolution.is_finite() || resolution <= 0.0 {
            return Err(GridError::InvalidResolution(resolution));
        }
        let size = self.size();
        let axis = |len: f32| -> usize {
            // Tolerate float noise so 10.0 / 0.1 stays 100 instead of 101.
            let n = (len / resolution - 1e-4).ceil();
            if n <= 0.0 { 0 } else { n.min(usize::MAX as f32) as usize }
        };
        let (sx, sy, sz) = (axis(size.x), axis(size.y), axis(size.z));
        if sx == 0 || sy == 0 || sz == 0 {
            return Err(GridError::InvalidDimensions { sx, sy, sz });
        }
        Ok((sx, sy, sz))
    }
}
