//! Configuration types for the multi-frame pipeline.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::processors::pairing::GroupOrder;

/// What to write to `ids.bin` alongside the clustered attributes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdsOutput {
    /// The original, unclustered ids (one value per single-frame sample).
    #[default]
    Passthrough,
    /// One id per clustered row, aligned with the clustered arrays.
    PerWindow,
}

/// Configuration for the single-frame to multi-frame reorganization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReorganizeConfig {
    /// Number of previous frames paired with each current frame
    #[serde(default = "default_history_depth")]
    pub history_depth: usize,

    /// Order in which track groups are emitted
    #[serde(default)]
    pub group_order: GroupOrder,

    /// Content of the ids output file
    #[serde(default)]
    pub ids_output: IdsOutput,

    /// Write a `data_structure.json` describing the output files
    #[serde(default = "default_true")]
    pub write_descriptor: bool,

    /// Write a `windows.csv` manifest of the source samples of each row
    #[serde(default = "default_true")]
    pub write_manifest: bool,
}

fn default_history_depth() -> usize {
    1
}

fn default_true() -> bool {
    true
}

impl Default for ReorganizeConfig {
    fn default() -> Self {
        Self {
            history_depth: default_history_depth(),
            group_order: GroupOrder::default(),
            ids_output: IdsOutput::default(),
            write_descriptor: true,
            write_manifest: true,
        }
    }
}

/// Configuration for label visualization figures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualizationConfig {
    /// Output pixels per image pixel
    #[serde(default = "default_pixel_scale")]
    pub pixel_scale: u32,

    /// Opacity of filled face patches (0.0 to 1.0)
    #[serde(default = "default_face_alpha")]
    pub face_alpha: f64,

    /// RGB outline color used when no face ratios are given
    #[serde(default = "default_outline_color")]
    pub outline_color: [u8; 3],

    /// Height in pixels of the caption band below the image
    #[serde(default = "default_caption_height")]
    pub caption_height: u32,
}

fn default_pixel_scale() -> u32 {
    8
}

fn default_face_alpha() -> f64 {
    0.3
}

fn default_outline_color() -> [u8; 3] {
    [128, 0, 128] // purple
}

fn default_caption_height() -> u32 {
    40
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            pixel_scale: default_pixel_scale(),
            face_alpha: default_face_alpha(),
            outline_color: default_outline_color(),
            caption_height: default_caption_height(),
        }
    }
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub reorganize: ReorganizeConfig,

    #[serde(default)]
    pub visualization: VisualizationConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_reorganize_config() {
        let config = ReorganizeConfig::default();
        assert_eq!(config.history_depth, 1);
        assert_eq!(config.group_order, GroupOrder::AscendingId);
        assert_eq!(config.ids_output, IdsOutput::Passthrough);
        assert!(config.write_descriptor);
        assert!(config.write_manifest);
    }

    #[test]
    fn test_default_pipeline_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.visualization.pixel_scale, 8);
        assert_eq!(config.visualization.outline_color, [128, 0, 128]);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "reorganize:\n  history_depth: 2\n  ids_output: per_window\n  group_order: first_appearance\n";
        let config: PipelineConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.reorganize.history_depth, 2);
        assert_eq!(config.reorganize.ids_output, IdsOutput::PerWindow);
        assert_eq!(config.reorganize.group_order, GroupOrder::FirstAppearance);
        assert!(config.reorganize.write_manifest);
        assert_eq!(config.visualization.caption_height, 40);
    }

    #[test]
    fn test_yaml_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pipeline.yaml");
        let mut config = PipelineConfig::default();
        config.reorganize.write_descriptor = false;
        config.visualization.face_alpha = 0.5;

        config.to_yaml(&path).unwrap();
        let loaded = PipelineConfig::from_yaml(&path).unwrap();

        assert!(!loaded.reorganize.write_descriptor);
        assert_eq!(loaded.visualization.face_alpha, 0.5);
    }
}
