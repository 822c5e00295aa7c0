use voxscan_geom::{Quat, Vec3};
use voxscan_grid::{DEFAULT_MEMORY_CEILING, EntityId, GridIndex, VoxelGrid};
use voxscan_raster::{Shape, ShapeError, rasterize};

fn grid(n: usize, scale: f32) -> VoxelGrid {
    VoxelGrid::create(n, n, n, scale, Vec3::ZERO, DEFAULT_MEMORY_CEILING).unwrap()
}

#[test]
fn sphere_occupies_center_not_corner() {
    let mut g = grid(10, 1.0);
    let stats = rasterize(&mut g, &[Shape::sphere(42, Vec3::splat(5.0), 3.0)]).unwrap();
    let center = g.index_of(Vec3::splat(5.0)).unwrap();
    assert_eq!(g.get_entity(center), Some(EntityId(42)));
    assert_eq!(g.get_entity(GridIndex::new(0, 0, 0)), Some(EntityId::EMPTY));
    assert_eq!(stats.voxels_written as usize, g.count_entity(EntityId(42)));
    assert_eq!(stats.shapes_culled, 0);
    // Coarse cull keeps the tested set far below the whole grid
    assert!(stats.voxels_tested < g.len() as u64);
}

#[test]
fn cylinder_respects_axial_extent_and_taper() {
    let mut g = grid(20, 1.0);
    let shape = Shape::cylinder(
        5,
        Vec3::new(2.0, 10.0, 10.0),
        Vec3::new(18.0, 10.0, 10.0),
        4.0,
        1.0,
    );
    rasterize(&mut g, &[shape]).unwrap();
    let at = |x: f32, y: f32| g.get_entity(g.index_of(Vec3::new(x, y, 10.0)).unwrap());
    // Wide end reaches 3 voxels off axis, narrow end does not
    assert_eq!(at(3.0, 12.5), Some(EntityId(5)));
    assert_eq!(at(17.0, 12.5), Some(EntityId::EMPTY));
    // Beyond the end caps along the axis
    assert_eq!(at(0.5, 10.0), Some(EntityId::EMPTY));
    assert_eq!(at(19.5, 10.0), Some(EntityId::EMPTY));
    assert_eq!(at(10.0, 10.0), Some(EntityId(5)));
}

#[test]
fn rotated_box_uses_inverse_rotation() {
    let mut g = grid(20, 1.0);
    let rot = Quat::from_axis_angle(Vec3::new(0.0, 0.0, 1.0), std::f32::consts::FRAC_PI_2);
    // Long along local x; rotated a quarter turn it lies along world y
    let shape = Shape::cuboid(9, Vec3::splat(10.0), Vec3::new(8.0, 1.0, 1.0), rot);
    rasterize(&mut g, &[shape]).unwrap();
    let at = |p: Vec3| g.get_entity(g.index_of(p).unwrap());
    assert_eq!(at(Vec3::new(10.2, 16.5, 10.2)), Some(EntityId(9)));
    assert_eq!(at(Vec3::new(16.5, 10.2, 10.2)), Some(EntityId::EMPTY));
}

#[test]
fn later_shape_wins_overlap() {
    let mut g = grid(10, 1.0);
    let shapes = [
        Shape::sphere(1, Vec3::splat(5.0), 3.0),
        Shape::sphere(2, Vec3::splat(5.0), 1.5),
    ];
    let stats = rasterize(&mut g, &shapes).unwrap();
    let center = g.index_of(Vec3::splat(5.0)).unwrap();
    assert_eq!(g.get_entity(center), Some(EntityId(2)));
    assert!(stats.overwrites > 0);
    assert_eq!(stats.overwrites as usize, g.count_entity(EntityId(2)));

    // Reversed order: the big sphere swallows the small one
    let mut g2 = grid(10, 1.0);
    rasterize(&mut g2, &[shapes[1], shapes[0]]).unwrap();
    assert_eq!(g2.count_entity(EntityId(2)), 0);
}

#[test]
fn shapes_outside_grid_are_culled() {
    let mut g = grid(8, 1.0);
    let stats = rasterize(&mut g, &[Shape::sphere(3, Vec3::splat(100.0), 2.0)]).unwrap();
    assert_eq!(stats.shapes_culled, 1);
    assert_eq!(stats.voxels_tested, 0);
    assert!(!g.has_entities());
}

#[test]
fn shape_partially_outside_is_clipped() {
    let mut g = grid(8, 1.0);
    rasterize(&mut g, &[Shape::sphere(3, Vec3::ZERO, 3.0)]).unwrap();
    assert_eq!(g.get_entity(GridIndex::new(0, 0, 0)), Some(EntityId(3)));
    assert_eq!(g.get_entity(GridIndex::new(7, 7, 7)), Some(EntityId::EMPTY));
}

#[test]
fn invalid_shape_aborts_before_any_write() {
    let mut g = grid(10, 1.0);
    let shapes = [
        Shape::sphere(1, Vec3::splat(5.0), 3.0),
        Shape::sphere(2, Vec3::splat(5.0), -1.0),
        Shape::sphere(0, Vec3::splat(5.0), 1.0),
    ];
    let err = rasterize(&mut g, &shapes).unwrap_err();
    assert_eq!(
        err,
        ShapeError::NegativeRadius {
            index: 1,
            entity: EntityId(2),
            radius: -1.0
        }
    );
    assert!(!g.has_entities());
}

#[test]
fn malformed_shapes_are_classified() {
    let mut g = grid(4, 1.0);
    let cases = [
        (
            Shape::sphere(0, Vec3::ZERO, 1.0),
            ShapeError::EmptyEntity { index: 0 },
        ),
        (
            Shape::sphere(1, Vec3::new(f32::NAN, 0.0, 0.0), 1.0),
            ShapeError::NonFinite {
                index: 0,
                entity: EntityId(1),
            },
        ),
        (
            Shape::cylinder(1, Vec3::ONE, Vec3::ONE, 1.0, 1.0),
            ShapeError::DegenerateAxis {
                index: 0,
                entity: EntityId(1),
            },
        ),
        (
            Shape::cuboid(1, Vec3::ONE, Vec3::new(1.0, -1.0, 1.0), Quat::IDENTITY),
            ShapeError::NegativeExtent {
                index: 0,
                entity: EntityId(1),
            },
        ),
        (
            Shape::cuboid(1, Vec3::ONE, Vec3::ONE, Quat::new(0.0, 0.0, 0.0, 0.0)),
            ShapeError::DegenerateRotation {
                index: 0,
                entity: EntityId(1),
            },
        ),
    ];
    for (shape, want) in cases {
        assert_eq!(rasterize(&mut g, &[shape]).unwrap_err(), want);
    }
}

#[test]
fn unnormalized_rotation_is_normalized() {
    let mut a = grid(12, 1.0);
    let mut b = grid(12, 1.0);
    let q = Quat::from_axis_angle(Vec3::new(1.0, 1.0, 0.0), 0.7);
    let scaled = Quat::new(q.x * 3.0, q.y * 3.0, q.z * 3.0, q.w * 3.0);
    rasterize(&mut a, &[Shape::cuboid(4, Vec3::splat(6.0), Vec3::new(4.0, 2.0, 1.0), q)]).unwrap();
    rasterize(&mut b, &[Shape::cuboid(4, Vec3::splat(6.0), Vec3::new(4.0, 2.0, 1.0), scaled)])
        .unwrap();
    assert_eq!(a.voxels(), b.voxels());
}
