use proptest::prelude::*;
use voxscan_geom::Vec3;
use voxscan_grid::{DEFAULT_MEMORY_CEILING, EntityId, GridIndex, VoxelGrid};

fn dim() -> impl Strategy<Value = usize> {
    1usize..=8
}

fn scale() -> impl Strategy<Value = f32> {
    prop_oneof![Just(0.25f32), Just(0.5), Just(1.0), Just(2.0)]
}

fn make(sx: usize, sy: usize, sz: usize, s: f32, origin: Vec3) -> VoxelGrid {
    VoxelGrid::create(sx, sy, sz, s, origin, DEFAULT_MEMORY_CEILING).unwrap()
}

proptest! {
    // linear maps each in-bounds index to a unique in-range offset
    #[test]
    fn linear_is_unique_and_in_range(sx in dim(), sy in dim(), sz in dim()) {
        let grid = make(sx, sy, sz, 1.0, Vec3::ZERO);
        let expect = sx * sy * sz;
        prop_assert_eq!(grid.len(), expect);
        let mut seen = vec![false; expect];
        for i in grid.full_range().iter() {
            let l = grid.linear(i).unwrap();
            prop_assert!(l < expect);
            prop_assert!(!seen[l]);
            seen[l] = true;
        }
        prop_assert!(seen.into_iter().all(|b| b));
    }

    // Writes land at exactly one cell and read back through get_entity
    #[test]
    fn set_then_get(sx in dim(), sy in dim(), sz in dim(), x in 0usize..8, y in 0usize..8, z in 0usize..8, id in 1u32..1000) {
        let mut grid = make(sx, sy, sz, 1.0, Vec3::ZERO);
        let i = GridIndex::new(x, y, z);
        let landed = grid.set_entity(i, EntityId(id));
        if x < sx && y < sy && z < sz {
            prop_assert_eq!(landed, Some(EntityId::EMPTY));
            prop_assert_eq!(grid.get_entity(i), Some(EntityId(id)));
            prop_assert_eq!(grid.occupied_count(), 1);
        } else {
            // Clipped write: nothing changes
            prop_assert_eq!(landed, None);
            prop_assert_eq!(grid.get_entity(i), None);
            prop_assert_eq!(grid.occupied_count(), 0);
        }
    }

    // index_of(voxel_center(i)) == i for every cell, at any scale and origin
    #[test]
    fn index_of_inverts_voxel_center(sx in dim(), sy in dim(), sz in dim(), s in scale(),
                                     ox in -50i32..50, oy in -50i32..50, oz in -50i32..50) {
        let origin = Vec3::new(ox as f32, oy as f32, oz as f32);
        let grid = make(sx, sy, sz, s, origin);
        for i in grid.full_range().iter() {
            prop_assert_eq!(grid.index_of(grid.voxel_center(i)), Some(i));
        }
    }

    // Positions outside the grid's world bounds have no index
    #[test]
    fn index_of_rejects_outside(sx in dim(), sy in dim(), sz in dim(), s in scale()) {
        let grid = make(sx, sy, sz, s, Vec3::ZERO);
        let b = grid.world_bounds();
        prop_assert_eq!(grid.index_of(b.min - Vec3::splat(s * 0.5)), None);
        prop_assert_eq!(grid.index_of(b.max + Vec3::splat(s * 0.5)), None);
        prop_assert_eq!(grid.index_of(Vec3::new(b.max.x, b.min.y, b.min.z)), None);
    }

    // sample() reads empty everywhere outside the grid
    #[test]
    fn sample_outside_is_empty(sx in dim(), sy in dim(), sz in dim(), id in 1u32..10) {
        let mut grid = make(sx, sy, sz, 1.0, Vec3::ZERO);
        for i in grid.full_range().iter() {
            grid.set_entity(i, EntityId(id));
        }
        prop_assert_eq!(grid.sample(-1, 0, 0), EntityId::EMPTY);
        prop_assert_eq!(grid.sample(0, sy as i64, 0), EntityId::EMPTY);
        prop_assert_eq!(grid.sample(0, 0, sz as i64), EntityId::EMPTY);
        prop_assert_eq!(grid.sample(sx as i64 - 1, sy as i64 - 1, sz as i64 - 1), EntityId(id));
    }
}
