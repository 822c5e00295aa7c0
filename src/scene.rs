use fastnoise_lite::{FastNoiseLite, NoiseType};
use serde::Deserialize;
use voxscan_geom::{Quat, Vec3};
use voxscan_grid::{GridError, ScanRegion};
use voxscan_raster::Shape;

/// Parameters of the procedural neuron population.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct SceneConfig {
    #[serde(default = "default_neurons")]
    pub neurons: u32,
    #[serde(default = "default_seed")]
    pub seed: i32,
    /// Edge length of the cubic scan region, in microns.
    #[serde(default = "default_extent")]
    pub extent: f32,
    #[serde(default = "default_dendrites")]
    pub dendrites: u32,
    #[serde(default = "default_segments")]
    pub segments: u32,
}
fn default_neurons() -> u32 {
    6
}
fn default_seed() -> i32 {
    1337
}
fn default_extent() -> f32 {
    40.0
}
fn default_dendrites() -> u32 {
    5
}
fn default_segments() -> u32 {
    3
}
impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            neurons: default_neurons(),
            seed: default_seed(),
            extent: default_extent(),
            dendrites: default_dendrites(),
            segments: default_segments(),
        }
    }
}

/// Deterministic stream of values in `[0, 1)` drawn from value noise.
struct Draws {
    noise: FastNoiseLite,
    n: u32,
}

impl Draws {
    fn new(seed: i32) -> Self {
        let mut noise = FastNoiseLite::with_seed(seed);
        noise.set_noise_type(Some(NoiseType::Value));
        noise.set_frequency(Some(1.0));
        Self { noise, n: 0 }
    }

    fn next(&mut self) -> f32 {
        self.n += 1;
        let v = self.noise.get_noise_2d(self.n as f32 * 1.618, self.n as f32 * 0.577);
        ((v + 1.0) * 0.5).clamp(0.0, 0.999_999)
    }

    fn range(&mut self, lo: f32, hi: f32) -> f32 {
        lo + (hi - lo) * self.next()
    }

    fn direction(&mut self) -> Vec3 {
        let z = self.range(-1.0, 1.0);
        let a = self.range(0.0, std::f32::consts::TAU);
        let r = (1.0 - z * z).max(0.0).sqrt();
        Vec3::new(r * a.cos(), r * a.sin(), z)
    }
}

/// Scan region plus the shapes of a small neuron population.
///
/// Each neuron is one entity: a spherical soma, a box-shaped axon hillock and
/// tapering dendrites built from chained cylinders.
pub fn neuron_population(cfg: &SceneConfig) -> Result<(ScanRegion, Vec<Shape>), GridError> {
    let extent = cfg.extent.max(1.0);
    let region = ScanRegion::new(Vec3::ZERO, Vec3::splat(extent))?;
    let mut draws = Draws::new(cfg.seed);
    let mut shapes = Vec::new();
    let soma_r = extent * 0.06;
    let seg_len = extent * 0.08;

    for neuron in 0..cfg.neurons {
        let entity = neuron + 1;
        let soma = Vec3::new(
            draws.range(0.2, 0.8) * extent,
            draws.range(0.2, 0.8) * extent,
            draws.range(0.2, 0.8) * extent,
        );
        shapes.push(Shape::sphere(entity, soma, soma_r));

        let axon_dir = draws.direction();
        let hillock = soma + axon_dir * (soma_r * 1.2);
        let rotation = Quat::from_axis_angle(
            axon_dir.cross(Vec3::new(0.0, 0.0, 1.0)),
            draws.range(0.0, 1.5),
        );
        shapes.push(Shape::cuboid(
            entity,
            hillock,
            Vec3::new(soma_r * 0.5, soma_r * 0.3, soma_r * 0.3),
            rotation,
        ));

        for _ in 0..cfg.dendrites {
            let mut dir = draws.direction();
            let mut start = soma + dir * (soma_r * 0.8);
            let mut radius = soma_r * 0.35;
            for _ in 0..cfg.segments {
                let end = start + dir * seg_len;
                let next_radius = radius * 0.7;
                shapes.push(Shape::cylinder(entity, start, end, radius, next_radius));
                dir = (dir + draws.direction() * 0.5).normalized();
                start = end;
                radius = next_radius;
            }
        }
    }
    Ok((region, shapes))
}
