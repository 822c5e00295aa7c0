use proptest::prelude::*;
use voxscan_geom::{Aabb, Quat, Vec3};

fn approx_abs_rel(a: f32, b: f32, atol: f32, rtol: f32) -> bool {
    let diff = (a - b).abs();
    let scale = a.abs().max(b.abs());
    diff <= atol + rtol * scale
}

fn vapprox_abs_rel(a: Vec3, b: Vec3, atol: f32, rtol: f32) -> bool {
    approx_abs_rel(a.x, b.x, atol, rtol)
        && approx_abs_rel(a.y, b.y, atol, rtol)
        && approx_abs_rel(a.z, b.z, atol, rtol)
}

fn coord() -> impl Strategy<Value = f32> {
    -1_000.0f32..1_000.0
}

fn arb_vec3() -> impl Strategy<Value = Vec3> {
    (coord(), coord(), coord()).prop_map(|(x, y, z)| Vec3::new(x, y, z))
}

fn arb_rotation() -> impl Strategy<Value = Quat> {
    (arb_vec3(), -10.0f32..10.0).prop_map(|(axis, angle)| Quat::from_axis_angle(axis, angle))
}

proptest! {
    // Rotation is an isometry
    #[test]
    fn rotation_preserves_length(q in arb_rotation(), v in arb_vec3()) {
        let r = q.rotate(v);
        prop_assert!(approx_abs_rel(r.length(), v.length(), 1e-3, 1e-4));
    }

    // inverse_rotate undoes rotate
    #[test]
    fn inverse_rotate_roundtrip(q in arb_rotation(), v in arb_vec3()) {
        let back = q.inverse_rotate(q.rotate(v));
        prop_assert!(vapprox_abs_rel(back, v, 1e-2, 1e-4));
    }

    // from_points produces an ordered box containing every input point
    #[test]
    fn from_points_contains_inputs(pts in proptest::collection::vec(arb_vec3(), 1..16)) {
        let b = Aabb::from_points(pts.iter().copied()).unwrap();
        prop_assert!(b.is_ordered());
        for p in pts {
            prop_assert!(b.contains(p));
        }
    }

    // Union contains both operands' corners
    #[test]
    fn union_contains_operands(a in arb_vec3(), b in arb_vec3(), r1 in 0.0f32..50.0, r2 in 0.0f32..50.0) {
        let x = Aabb::around(a, r1);
        let y = Aabb::around(b, r2);
        let u = x.union(y);
        prop_assert!(u.contains(x.min) && u.contains(x.max));
        prop_assert!(u.contains(y.min) && u.contains(y.max));
    }
}
