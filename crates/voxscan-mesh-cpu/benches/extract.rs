use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

use criterion::{Criterion, criterion_group, criterion_main};
use voxscan_geom::{Quat, Vec3};
use voxscan_grid::{DEFAULT_MEMORY_CEILING, ScanRegion, VoxelGrid};
use voxscan_mesh_cpu::{
    ChunkPartitioner, DEFAULT_ISOLEVEL, ExtractionTask, MeshAggregator, extract_grid,
};
use voxscan_raster::{Shape, rasterize};

fn cell_grid(resolution: f32) -> VoxelGrid {
    let region = ScanRegion::new(Vec3::ZERO, Vec3::splat(32.0)).unwrap();
    let mut g = VoxelGrid::for_region(&region, resolution, DEFAULT_MEMORY_CEILING).unwrap();
    let shapes = [
        Shape::sphere(1, Vec3::splat(16.0), 6.0),
        Shape::cylinder(2, Vec3::new(16.0, 16.0, 16.0), Vec3::new(30.0, 20.0, 16.0), 2.0, 0.8),
        Shape::cylinder(3, Vec3::new(16.0, 16.0, 16.0), Vec3::new(2.0, 8.0, 12.0), 2.5, 1.0),
        Shape::cuboid(
            4,
            Vec3::new(8.0, 24.0, 20.0),
            Vec3::new(3.0, 1.0, 2.0),
            Quat::from_axis_angle(Vec3::new(1.0, 1.0, 0.0), 0.7),
        ),
    ];
    rasterize(&mut g, &shapes).unwrap();
    g
}

fn bench_extract_whole_grid(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract_whole_grid");
    group.measurement_time(Duration::from_secs(8));
    let g = cell_grid(0.5);
    group.bench_function("cell_64", |b| {
        b.iter(|| black_box(extract_grid(&g, DEFAULT_ISOLEVEL).unwrap()))
    });
    group.finish();
}

fn bench_extract_chunked(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract_chunked");
    group.measurement_time(Duration::from_secs(8));
    let g = Arc::new(cell_grid(0.5));
    for edge in [8usize, 16, 32] {
        let chunks = ChunkPartitioner::new(edge).partition(g.sx, g.sy, g.sz);
        group.bench_function(format!("cell_64_edge_{edge}"), |b| {
            b.iter(|| {
                let mut agg = MeshAggregator::with_capacity(chunks.len());
                for chunk in &chunks {
                    let task = ExtractionTask {
                        chunk: *chunk,
                        grid: g.clone(),
                        isolevel: DEFAULT_ISOLEVEL,
                    };
                    agg.push(task.run().unwrap());
                }
                black_box(agg.finish())
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_extract_whole_grid, bench_extract_chunked);
criterion_main!(benches);
