use serde::Deserialize;
use std::error::Error;
use std::fs;
use std::path::Path;
use std::time::Duration;

use voxscan_grid::DEFAULT_MEMORY_CEILING;
use voxscan_mesh_cpu::{DEFAULT_CHUNK_EDGE, DEFAULT_ISOLEVEL};

use crate::RenderError;

/// Pipeline tuning, usually loaded from a TOML file. Every field has a default.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct PipelineConfig {
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct GridConfig {
    #[serde(default = "default_grid_ceiling")]
    pub memory_ceiling_bytes: u64,
}
fn default_grid_ceiling() -> u64 {
    DEFAULT_MEMORY_CEILING
}
impl Default for GridConfig {
    fn default() -> Self {
        Self {
            memory_ceiling_bytes: default_grid_ceiling(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ExtractionConfig {
    #[serde(default = "default_chunk_edge")]
    pub chunk_edge: usize,
    /// 0 selects the machine's available parallelism.
    #[serde(default)]
    pub workers: usize,
    #[serde(default = "default_isolevel")]
    pub isolevel: f32,
}
fn default_chunk_edge() -> usize {
    DEFAULT_CHUNK_EDGE
}
fn default_isolevel() -> f32 {
    DEFAULT_ISOLEVEL
}
impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            chunk_edge: default_chunk_edge(),
            workers: 0,
            isolevel: default_isolevel(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ExportConfig {
    #[serde(default = "default_export_workers")]
    pub workers: usize,
    #[serde(default = "default_export_ceiling")]
    pub memory_ceiling_bytes: u64,
    /// Absent means a submitter waits as long as it takes.
    #[serde(default)]
    pub admission_timeout_ms: Option<u64>,
}
fn default_export_workers() -> usize {
    2
}
fn default_export_ceiling() -> u64 {
    64 * 1024 * 1024
}
impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            workers: default_export_workers(),
            memory_ceiling_bytes: default_export_ceiling(),
            admission_timeout_ms: None,
        }
    }
}

impl ExportConfig {
    pub fn admission_timeout(&self) -> Option<Duration> {
        self.admission_timeout_ms.map(Duration::from_millis)
    }
}

impl PipelineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, Box<dyn Error>> {
        let cfg: PipelineConfig = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, Box<dyn Error>> {
        let s = fs::read_to_string(path)?;
        Self::from_toml_str(&s)
    }

    pub fn validate(&self) -> Result<(), RenderError> {
        let bad = |msg: String| Err(RenderError::Configuration(msg));
        if self.grid.memory_ceiling_bytes == 0 {
            return bad("grid.memory_ceiling_bytes must be > 0".into());
        }
        if self.extraction.chunk_edge == 0 {
            return bad("extraction.chunk_edge must be > 0".into());
        }
        let iso = self.extraction.isolevel;
        if !(iso > 0.0 && iso < 1.0) {
            return bad(format!(
                "extraction.isolevel {iso} must lie strictly between 0 and 1"
            ));
        }
        if self.export.workers == 0 {
            return bad("export.workers must be > 0".into());
        }
        if self.export.memory_ceiling_bytes == 0 {
            return bad("export.memory_ceiling_bytes must be > 0".into());
        }
        Ok(())
    }

    /// Extraction worker count with 0 resolved to available parallelism.
    pub fn resolved_extraction_workers(&self) -> usize {
        match self.extraction.workers {
            0 => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            n => n,
        }
    }
}
