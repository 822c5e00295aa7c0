use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use voxscan_mesh_cpu::Mesh;

/// Writes `mesh` as a Wavefront OBJ object named `name`.
pub fn write_obj<W: Write>(w: &mut W, name: &str, mesh: &Mesh) -> io::Result<()> {
    writeln!(w, "o {name}")?;
    for p in &mesh.pos {
        writeln!(w, "v {} {} {}", p.x, p.y, p.z)?;
    }
    // OBJ indices are 1-based
    for t in mesh.idx.chunks_exact(3) {
        writeln!(w, "f {} {} {}", t[0] + 1, t[1] + 1, t[2] + 1)?;
    }
    Ok(())
}

pub fn save_obj(path: &Path, name: &str, mesh: &Mesh) -> io::Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    write_obj(&mut w, name, mesh)?;
    w.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxscan_geom::Vec3;

    #[test]
    fn writes_one_based_faces() {
        let mut m = Mesh::new();
        let a = m.push_vertex(Vec3::new(0.0, 0.0, 0.0));
        let b = m.push_vertex(Vec3::new(1.0, 0.0, 0.0));
        let c = m.push_vertex(Vec3::new(0.0, 1.5, 0.0));
        m.push_triangle(a, b, c);
        let mut out = Vec::new();
        write_obj(&mut out, "cell_1", &m).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "o cell_1\nv 0 0 0\nv 1 0 0\nv 0 1.5 0\nf 1 2 3\n");
    }
}
