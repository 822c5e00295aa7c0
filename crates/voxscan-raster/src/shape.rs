use thiserror::Error;
use voxscan_geom::{Aabb, Quat, Vec3};
use voxscan_grid::EntityId;

/// The fixed set of primitive volumes a compartment can be described with.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ShapeKind {
    Sphere {
        center: Vec3,
        radius: f32,
    },
    /// Truncated cone between two end caps; equal radii give a plain cylinder.
    Cylinder {
        end0: Vec3,
        end1: Vec3,
        end0_radius: f32,
        end1_radius: f32,
    },
    Box {
        center: Vec3,
        half_extents: Vec3,
        rotation: Quat,
    },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Shape {
    pub entity: EntityId,
    pub kind: ShapeKind,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ShapeError {
    #[error("shape {index}: entity id 0 is reserved for empty space")]
    EmptyEntity { index: usize },

    #[error("shape {index} ({entity}): non-finite parameter")]
    NonFinite { index: usize, entity: EntityId },

    #[error("shape {index} ({entity}): negative radius {radius}")]
    NegativeRadius {
        index: usize,
        entity: EntityId,
        radius: f32,
    },

    #[error("shape {index} ({entity}): cylinder end caps coincide")]
    DegenerateAxis { index: usize, entity: EntityId },

    #[error("shape {index} ({entity}): negative box half extent")]
    NegativeExtent { index: usize, entity: EntityId },

    #[error("shape {index} ({entity}): rotation quaternion has zero length")]
    DegenerateRotation { index: usize, entity: EntityId },
}

impl Shape {
    pub fn sphere(entity: u32, center: Vec3, radius: f32) -> Self {
        Self {
            entity: EntityId(entity),
            kind: ShapeKind::Sphere { center, radius },
        }
    }

    pub fn cylinder(
        entity: u32,
        end0: Vec3,
        end1: Vec3,
        end0_radius: f32,
        end1_radius: f32,
    ) -> Self {
        Self {
            entity: EntityId(entity),
            kind: ShapeKind::Cylinder {
                end0,
                end1,
                end0_radius,
                end1_radius,
            },
        }
    }

    pub fn cuboid(
        entity: u32,
        center: Vec3,
        half_extents: Vec3,
        rotation: Quat,
    ) -> Self {
        Self {
            entity: EntityId(entity),
            kind: ShapeKind::Box {
                center,
                half_extents,
                rotation,
            },
        }
    }

    /// Checks parameters and returns a copy ready for rasterization
    /// (box rotations normalized). `index` is the shape's position in the input list.
    pub fn validated(&self, index: usize) -> Result<Shape, ShapeError> {
        let entity = self.entity;
        if entity.is_empty() {
            return Err(ShapeError::EmptyEntity { index });
        }
        let non_finite = ShapeError::NonFinite { index, entity };
        let radius_check = |radius: f32| -> Result<(), ShapeError> {
            if !radius.is_finite() {
                return Err(ShapeError::NonFinite { index, entity });
            }
            if radius < 0.0 {
                return Err(ShapeError::NegativeRadius {
                    index,
                    entity,
                    radius,
                });
            }
            Ok(())
        };
        match self.kind {
            ShapeKind::Sphere { center, radius } => {
                if !center.is_finite() {
                    return Err(non_finite);
                }
                radius_check(radius)?;
                Ok(*self)
            }
            ShapeKind::Cylinder {
                end0,
                end1,
                end0_radius,
                end1_radius,
            } => {
                if !end0.is_finite() || !end1.is_finite() {
                    return Err(non_finite);
                }
                radius_check(end0_radius)?;
                radius_check(end1_radius)?;
                if (end1 - end0).length_squared() <= f32::EPSILON {
                    return Err(ShapeError::DegenerateAxis { index, entity });
                }
                Ok(*self)
            }
            ShapeKind::Box {
                center,
                half_extents,
                rotation,
            } => {
                if !center.is_finite() || !half_extents.is_finite() || !rotation.is_finite() {
                    return Err(non_finite);
                }
                if !Vec3::ZERO.le_all(half_extents) {
                    return Err(ShapeError::NegativeExtent { index, entity });
                }
                let rotation = rotation
                    .try_normalized()
                    .ok_or(ShapeError::DegenerateRotation { index, entity })?;
                Ok(Shape {
                    entity,
                    kind: ShapeKind::Box {
                        center,
                        half_extents,
                        rotation,
                    },
                })
            }
        }
    }

    /// World-space axis-aligned bounds.
    pub fn bounds(&self) -> Aabb {
        match self.kind {
            ShapeKind::Sphere { center, radius } => Aabb::around(center, radius),
            ShapeKind::Cylinder {
                end0,
                end1,
                end0_radius,
                end1_radius,
            } => Aabb::around(end0, end0_radius).union(Aabb::around(end1, end1_radius)),
            ShapeKind::Box {
                center,
                half_extents,
                rotation,
            } => {
                let h = half_extents;
                let corners = (0..8u8).map(|i| {
                    let sign = |bit: u8| if i & bit != 0 { 1.0 } else { -1.0 };
                    let local = Vec3::new(h.x * sign(1), h.y * sign(2), h.z * sign(4));
                    center + rotation.rotate(local)
                });
                Aabb::from_points(corners).unwrap_or(Aabb::new(center, center))
            }
        }
    }

    /// Exact membership test for a world-space point.
    pub fn contains(&self, p: Vec3) -> bool {
        match self.kind {
            ShapeKind::Sphere { center, radius } => {
                (p - center).length_squared() <= radius * radius
            }
            ShapeKind::Cylinder {
                end0,
                end1,
                end0_radius,
                end1_radius,
            } => {
                let axis = end1 - end0;
                let len2 = axis.length_squared();
                if len2 <= 0.0 {
                    return false;
                }
                let t = (p - end0).dot(axis) / len2;
                if !(0.0..=1.0).contains(&t) {
                    return false;
                }
                let r = end0_radius + (end1_radius - end0_radius) * t;
                let closest = end0 + axis * t;
                (p - closest).length_squared() <= r * r
            }
            ShapeKind::Box {
                center,
                half_extents,
                rotation,
            } => {
                let local = rotation.inverse_rotate(p - center).abs();
                local.le_all(half_extents)
            }
        }
    }

    /// Short name for logs.
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            ShapeKind::Sphere { .. } => "sphere",
            ShapeKind::Cylinder { .. } => "cylinder",
            ShapeKind::Box { .. } => "box",
        }
    }
}
