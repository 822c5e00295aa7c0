mod config;
mod obj;
mod scene;

use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use simplelog::{ColorChoice, Config as LogConfig, LevelFilter, TermLogger, TerminalMode};
use voxscan_image::{NoiseParams, ProjectionAxis, ProjectionSampler, save_png};
use voxscan_runtime::{JobState, RenderJobOrchestrator, RenderRequest};

use crate::config::AppConfig;

#[derive(Copy, Clone, Debug, ValueEnum)]
enum AxisArg {
    X,
    Y,
    Z,
}

impl From<AxisArg> for ProjectionAxis {
    fn from(a: AxisArg) -> Self {
        match a {
            AxisArg::X => ProjectionAxis::X,
            AxisArg::Y => ProjectionAxis::Y,
            AxisArg::Z => ProjectionAxis::Z,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

/// Digitize a synthetic neuron population into per-cell meshes and
/// projection images.
#[derive(Parser, Debug)]
#[command(name = "voxscan", version)]
struct Args {
    /// TOML file with [grid], [extraction], [export] and [scene] sections
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output directory for OBJ meshes and PNG images
    #[arg(long, default_value = "voxscan-out")]
    out: PathBuf,

    /// Voxel edge length in microns
    #[arg(long, default_value_t = 0.5)]
    resolution: f32,

    /// Projection axes to export as images (comma separated)
    #[arg(long, value_enum, value_delimiter = ',', default_values_t = [AxisArg::Z])]
    images: Vec<AxisArg>,

    /// Skip image export
    #[arg(long)]
    no_images: bool,

    /// Seed for background noise in the projections; no noise when absent
    #[arg(long)]
    noise_seed: Option<i32>,

    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,
}

fn init_logging(level: LogLevel) {
    // RUST_LOG wins when set so library targets can be filtered individually.
    if std::env::var_os("RUST_LOG").is_some() {
        env_logger::init();
        return;
    }
    if TermLogger::init(
        level.into(),
        LogConfig::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
    .is_err()
    {
        eprintln!("voxscan: logger already initialized");
    }
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let cfg = match &args.config {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::default(),
    };
    let (region, shapes) = scene::neuron_population(&cfg.scene)?;
    log::info!(
        "scene: {} neurons, {} shapes, region {:?}..{:?}",
        cfg.scene.neurons,
        shapes.len(),
        region.point1,
        region.point2
    );

    let mut request = RenderRequest::new(region, args.resolution, shapes);
    if !args.no_images {
        for axis in &args.images {
            let mut sampler = ProjectionSampler::new((*axis).into());
            if let Some(seed) = args.noise_seed {
                sampler = sampler.with_noise(NoiseParams {
                    seed,
                    frequency: 0.05,
                    amplitude: 0.15,
                });
            }
            request = request.with_projection(sampler);
        }
    }

    let mut orch = RenderJobOrchestrator::new(cfg.pipeline)?;
    orch.request_render(request)?;
    if orch.run_to_completion() != JobState::Done {
        return Err(match orch.last_error() {
            Some(e) => e.clone().into(),
            None => "render job did not finish".into(),
        });
    }
    let Some(out) = orch.take_output() else {
        return Err("render job finished without output".into());
    };

    fs::create_dir_all(&args.out)?;
    for id in out.meshes.entity_ids() {
        let Some(mesh) = out.meshes.get(id) else {
            continue;
        };
        let name = format!("entity_{}", id.0);
        let path = args.out.join(format!("{name}.obj"));
        obj::save_obj(&path, &name, mesh)?;
        log::info!(
            "{}: {} vertices, {} triangles, volume {:.2}, area {:.2}",
            path.display(),
            mesh.vertex_count(),
            mesh.triangle_count(),
            mesh.signed_volume(),
            mesh.surface_area()
        );
    }
    for img in &out.images {
        let path = args.out.join(format!("{}.png", img.label));
        save_png(img, &path)?;
        log::info!("{}: {}x{}", path.display(), img.width, img.height);
    }

    let s = &out.stats;
    log::info!(
        "grid {:?} ({} occupied), {} chunks, {} meshes, {} images; alloc={}ms raster={}ms extract={}ms merge={}ms export={}ms total={}ms",
        s.grid_dims,
        s.occupied_voxels,
        s.chunks,
        s.entities,
        s.images,
        s.t_alloc_ms,
        s.t_raster_ms,
        s.t_extract_ms,
        s.t_merge_ms,
        s.t_export_ms,
        s.t_total_ms
    );
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.log_level);
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            eprintln!("voxscan: {e}");
            ExitCode::FAILURE
        }
    }
}
