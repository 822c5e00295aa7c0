use serde::Deserialize;
use std::error::Error;
use std::fs;
use std::path::Path;

use voxscan_runtime::PipelineConfig;

use crate::scene::SceneConfig;

/// Demo configuration: the pipeline sections plus a `[scene]` section.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(flatten)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub scene: SceneConfig,
}

impl AppConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, Box<dyn Error>> {
        let cfg: AppConfig = toml::from_str(s)?;
        cfg.pipeline.validate()?;
        Ok(cfg)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, Box<dyn Error>> {
        let s = fs::read_to_string(path)?;
        Self::from_toml_str(&s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scene_and_pipeline_sections_share_one_file() {
        let cfg = AppConfig::from_toml_str(
            r#"
            [extraction]
            chunk_edge = 24

            [scene]
            neurons = 2
            seed = 9
            "#,
        )
        .unwrap();
        assert_eq!(cfg.pipeline.extraction.chunk_edge, 24);
        assert_eq!(cfg.pipeline.export.workers, 2);
        assert_eq!(cfg.scene.neurons, 2);
        assert_eq!(cfg.scene.seed, 9);
        assert_eq!(cfg.scene.dendrites, 5);
    }

    #[test]
    fn pipeline_validation_applies() {
        assert!(AppConfig::from_toml_str("[extraction]\nisolevel = 2.0").is_err());
    }
}
