use proptest::prelude::*;
use voxscan_geom::Vec3;
use voxscan_mesh_cpu::{Mesh, combine};

fn arb_mesh() -> impl Strategy<Value = Mesh> {
    (1usize..12).prop_flat_map(|n| {
        (
            prop::collection::vec((-9.0f32..9.0, -9.0f32..9.0, -9.0f32..9.0), n),
            prop::collection::vec((0..n as u32, 0..n as u32, 0..n as u32), 0..8)
                .prop_map(|tris| tris.into_iter().flat_map(|(a, b, c)| [a, b, c]).collect::<Vec<u32>>()),
        )
            .prop_map(|(pos, idx)| Mesh {
                pos: pos.into_iter().map(|(x, y, z)| Vec3::new(x, y, z)).collect(),
                idx,
            })
    })
}

proptest! {
    // combine keeps a's arrays as a prefix and shifts b's indices by a's vertex count
    #[test]
    fn combine_offsets_second_operand(a in arb_mesh(), b in arb_mesh()) {
        let c = combine(&a, &b);
        prop_assert_eq!(c.vertex_count(), a.vertex_count() + b.vertex_count());
        prop_assert_eq!(c.index_count(), a.index_count() + b.index_count());
        prop_assert_eq!(&c.pos[..a.pos.len()], &a.pos[..]);
        prop_assert_eq!(&c.pos[a.pos.len()..], &b.pos[..]);
        prop_assert_eq!(&c.idx[..a.idx.len()], &a.idx[..]);
        let base = a.vertex_count() as u32;
        for (k, &i) in b.idx.iter().enumerate() {
            prop_assert_eq!(c.idx[a.idx.len() + k], i + base);
        }
        prop_assert!(c.idx.iter().all(|&i| (i as usize) < c.vertex_count()));
    }

    #[test]
    fn combine_with_empty_is_identity(a in arb_mesh()) {
        prop_assert_eq!(&combine(&a, &Mesh::new()), &a);
        prop_assert_eq!(&combine(&Mesh::new(), &a), &a);
    }
}
