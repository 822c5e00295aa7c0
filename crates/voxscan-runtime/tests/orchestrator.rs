use std::time::{Duration, Instant};

use voxscan_geom::{Quat, Vec3};
use voxscan_grid::{EntityId, GridIndex, ScanRegion};
use voxscan_image::{ProjectionAxis, ProjectionSampler, RawBuffer};
use voxscan_raster::Shape;
use voxscan_runtime::{
    ErrorKind, JobState, PipelineConfig, RenderJobOrchestrator, RenderRequest, RequestError,
};

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn config() -> PipelineConfig {
    let mut cfg = PipelineConfig::default();
    cfg.extraction.workers = 2;
    cfg.extraction.chunk_edge = 8;
    cfg
}

fn region() -> ScanRegion {
    ScanRegion::new(Vec3::ZERO, Vec3::splat(10.0)).unwrap()
}

fn neuron() -> Vec<Shape> {
    vec![
        Shape::sphere(1, Vec3::splat(5.0), 2.0),
        Shape::cylinder(2, Vec3::new(6.5, 5.0, 5.0), Vec3::new(9.5, 7.0, 5.0), 0.8, 0.4),
        Shape::cuboid(3, Vec3::new(2.0, 8.0, 2.0), Vec3::new(1.0, 0.5, 0.5), Quat::IDENTITY),
    ]
}

#[test]
fn idle_poll_does_nothing() {
    init_logs();
    let mut orch = RenderJobOrchestrator::new(config()).unwrap();
    assert_eq!(orch.poll(), JobState::Idle);
    assert_eq!(orch.run_to_completion(), JobState::Idle);
    assert!(orch.output().is_none());
}

#[test]
fn job_runs_through_states_to_done() {
    init_logs();
    let mut orch = RenderJobOrchestrator::new(config()).unwrap();
    let req = RenderRequest::new(region(), 0.5, neuron())
        .with_projection(ProjectionSampler::new(ProjectionAxis::Z))
        .with_projection(ProjectionSampler::new(ProjectionAxis::X));
    orch.request_render(req).unwrap();
    assert_eq!(orch.state(), JobState::Requested);

    let state = orch.poll();
    assert!(matches!(state, JobState::InProgress | JobState::Done));
    let start = Instant::now();
    while !orch.poll().is_terminal() {
        assert!(start.elapsed() < Duration::from_secs(30));
        std::thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(orch.state(), JobState::Done);
    assert!(orch.last_error().is_none());

    let progress = orch.progress();
    assert_eq!(progress.chunks_done, progress.chunks_total);
    assert_eq!(progress.chunks_total, 27);
    assert_eq!(progress.images_done, 2);

    let out = orch.take_output().unwrap();
    assert_eq!(out.grid.dims(), (20, 20, 20));
    assert_eq!(
        out.grid.get_entity(out.grid.index_of(Vec3::splat(5.0)).unwrap()),
        Some(EntityId(1))
    );
    assert_eq!(out.grid.get_entity(GridIndex::new(0, 0, 0)), Some(EntityId::EMPTY));
    assert_eq!(
        out.meshes.entity_ids(),
        vec![EntityId(1), EntityId(2), EntityId(3)]
    );
    assert!(out.meshes.get(EntityId(1)).unwrap().signed_volume() > 0.0);
    assert_eq!(out.images.len(), 2);
    assert_eq!(out.images[0].label, "mip-z-0");
    assert_eq!(out.images[1].label, "mip-x-1");
    assert_eq!(out.stats.chunks, 27);
    assert_eq!(out.stats.entities, 3);
    assert_eq!(out.stats.raster.shapes, 3);
    // Output stays taken; state stays Done
    assert!(orch.take_output().is_none());
    assert_eq!(orch.poll(), JobState::Done);
}

#[test]
fn second_request_while_running_is_busy() {
    init_logs();
    let mut orch = RenderJobOrchestrator::new(config()).unwrap();
    let first = orch
        .request_render(RenderRequest::new(region(), 0.5, neuron()))
        .unwrap();
    let err = orch
        .request_render(RenderRequest::new(region(), 0.5, neuron()))
        .unwrap_err();
    assert_eq!(err, RequestError::Busy(JobState::Requested));
    assert_eq!(orch.run_to_completion(), JobState::Done);
    // Terminal jobs can be replaced
    let second = orch
        .request_render(RenderRequest::new(region(), 1.0, neuron()))
        .unwrap();
    assert!(second > first);
    assert!(orch.output().is_none());
    assert_eq!(orch.run_to_completion(), JobState::Done);
    assert_eq!(orch.output().unwrap().grid.dims(), (10, 10, 10));
}

#[test]
fn bad_resolution_is_configuration_error() {
    init_logs();
    let mut orch = RenderJobOrchestrator::new(config()).unwrap();
    orch.request_render(RenderRequest::new(region(), 0.0, neuron()))
        .unwrap();
    assert_eq!(orch.poll(), JobState::Error);
    assert_eq!(orch.last_error_kind(), Some(ErrorKind::Configuration));
    assert!(orch.output().is_none());
}

#[test]
fn non_finite_region_is_configuration_error() {
    init_logs();
    let mut orch = RenderJobOrchestrator::new(config()).unwrap();
    let region = ScanRegion {
        point1: Vec3::ZERO,
        point2: Vec3::new(10.0, f32::NAN, 10.0),
    };
    orch.request_render(RenderRequest::new(region, 0.5, neuron()))
        .unwrap();
    assert_eq!(orch.poll(), JobState::Error);
    assert_eq!(orch.last_error_kind(), Some(ErrorKind::Configuration));
}

#[test]
fn grid_over_ceiling_is_allocation_error() {
    init_logs();
    let mut cfg = config();
    cfg.grid.memory_ceiling_bytes = 1024;
    let mut orch = RenderJobOrchestrator::new(cfg).unwrap();
    orch.request_render(RenderRequest::new(region(), 0.5, neuron()))
        .unwrap();
    assert_eq!(orch.run_to_completion(), JobState::Error);
    assert_eq!(orch.last_error_kind(), Some(ErrorKind::Allocation));
}

#[test]
fn invalid_shape_is_shape_error() {
    init_logs();
    let mut orch = RenderJobOrchestrator::new(config()).unwrap();
    let mut shapes = neuron();
    shapes.push(Shape::sphere(9, Vec3::splat(5.0), -1.0));
    orch.request_render(RenderRequest::new(region(), 0.5, shapes))
        .unwrap();
    assert_eq!(orch.run_to_completion(), JobState::Error);
    assert_eq!(orch.last_error_kind(), Some(ErrorKind::Shape));
    assert_eq!(orch.progress().chunks_total, 0);
}

#[test]
fn export_over_budget_fails_whole_job() {
    init_logs();
    let mut cfg = config();
    cfg.export.memory_ceiling_bytes = 1_000;
    let mut orch = RenderJobOrchestrator::new(cfg).unwrap();
    // 20x20 projection costs 2000 bytes, more than the whole budget
    let req = RenderRequest::new(region(), 0.5, neuron())
        .with_projection(ProjectionSampler::new(ProjectionAxis::Y));
    orch.request_render(req).unwrap();
    assert_eq!(orch.run_to_completion(), JobState::Error);
    assert_eq!(orch.last_error_kind(), Some(ErrorKind::BudgetExceeded));
    // No partial meshes are exposed
    assert!(orch.output().is_none());
}

#[test]
fn malformed_external_buffer_is_worker_error() {
    init_logs();
    let mut orch = RenderJobOrchestrator::new(config()).unwrap();
    let bad = RawBuffer {
        width: 4,
        height: 4,
        channels: 1,
        samples: vec![0.5; 15],
    };
    let req = RenderRequest::new(region(), 1.0, neuron())
        .with_raw_buffer("camera", RawBuffer::zeroed(4, 4, 3).unwrap())
        .with_raw_buffer("broken", bad);
    orch.request_render(req).unwrap();
    assert_eq!(orch.run_to_completion(), JobState::Error);
    let err = orch.last_error().unwrap();
    assert_eq!(err.kind(), ErrorKind::Worker);
    assert!(err.to_string().contains("broken"), "{err}");
}

#[test]
fn external_buffers_export_in_request_order() {
    init_logs();
    let mut orch = RenderJobOrchestrator::new(config()).unwrap();
    let mut req = RenderRequest::new(region(), 1.0, neuron());
    for i in 0..6 {
        req = req.with_raw_buffer(format!("frame-{i}"), RawBuffer::zeroed(8, 8, 1).unwrap());
    }
    orch.request_render(req).unwrap();
    assert_eq!(orch.run_to_completion(), JobState::Done);
    let labels: Vec<_> = orch
        .output()
        .unwrap()
        .images
        .iter()
        .map(|i| i.label.clone())
        .collect();
    let want: Vec<_> = (0..6).map(|i| format!("frame-{i}")).collect();
    assert_eq!(labels, want);
}

#[test]
fn repeated_jobs_produce_identical_meshes() {
    init_logs();
    let mut orch = RenderJobOrchestrator::new(config()).unwrap();
    let mut runs = Vec::new();
    for _ in 0..2 {
        orch.request_render(RenderRequest::new(region(), 0.5, neuron()))
            .unwrap();
        assert_eq!(orch.run_to_completion(), JobState::Done);
        runs.push(orch.take_output().unwrap().meshes);
    }
    for id in runs[0].entity_ids() {
        assert_eq!(runs[0].get(id), runs[1].get(id));
    }
}

#[test]
fn empty_scene_finishes_with_no_meshes() {
    init_logs();
    let mut orch = RenderJobOrchestrator::new(config()).unwrap();
    orch.request_render(RenderRequest::new(region(), 1.0, Vec::<Shape>::new()))
        .unwrap();
    assert_eq!(orch.run_to_completion(), JobState::Done);
    let out = orch.output().unwrap();
    assert!(out.meshes.is_empty());
    assert_eq!(out.stats.occupied_voxels, 0);
}

#[test]
fn invalid_config_is_rejected_up_front() {
    let mut cfg = config();
    cfg.extraction.isolevel = 1.0;
    let err = RenderJobOrchestrator::new(cfg).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}
