use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use frame_scheduler::{AccumulationConfig, WorkloadConfig, WorkloadMode};
use render_protocol::UniformLimits;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub texture_width: u32,
    pub texture_height: u32,
    /// Outline thickness as a fraction of the view height.
    pub outline_thickness: f32,
    pub zoom_factor: f32,
    pub workload_mode: WorkloadMode,
    pub target_compute_ms: u64,
    pub max_samples_per_frame: u32,
    pub accumulation: AccumulationConfig,
    pub uniform_limits: UniformLimits,
    pub draw_overlay: bool,
    pub scene_path: PathBuf,
    pub screenshot_path: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            texture_width: 320,
            texture_height: 240,
            outline_thickness: 0.0075,
            zoom_factor: 1.2,
            workload_mode: WorkloadMode::Auto,
            target_compute_ms: 14,
            max_samples_per_frame: WorkloadConfig::default().max_samples_per_frame,
            accumulation: AccumulationConfig::default(),
            uniform_limits: UniformLimits::default(),
            draw_overlay: true,
            scene_path: PathBuf::from("scene.json"),
            screenshot_path: PathBuf::from("image.png"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("read config file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parse config file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid config: {field} {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

impl SessionConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self =
            serde_json::from_reader(BufReader::new(file)).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        log::info!("[config] loaded session config from '{}'", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, reason| Err(ConfigError::Invalid { field, reason });
        if self.texture_width == 0 || self.texture_height == 0 {
            return invalid("texture size", "must be positive");
        }
        if i32::try_from(self.texture_width).is_err() || i32::try_from(self.texture_height).is_err()
        {
            return invalid("texture size", "exceeds the viewport range");
        }
        if !self.outline_thickness.is_finite() || self.outline_thickness <= 0.0 {
            return invalid("outline_thickness", "must be positive");
        }
        if !self.zoom_factor.is_finite() || self.zoom_factor <= 1.0 {
            return invalid("zoom_factor", "must be greater than 1");
        }
        if self.target_compute_ms == 0 {
            return invalid("target_compute_ms", "must be positive");
        }
        if self.max_samples_per_frame == 0 {
            return invalid("max_samples_per_frame", "must be positive");
        }
        if self.accumulation.max_samples == 0 {
            return invalid("accumulation.max_samples", "must be positive");
        }
        if self.accumulation.initial_samples_per_frame == 0 {
            return invalid("accumulation.initial_samples_per_frame", "must be positive");
        }
        Ok(())
    }

    pub fn workload_config(&self) -> WorkloadConfig {
        WorkloadConfig {
            target_compute: Duration::from_millis(self.target_compute_ms),
            max_samples_per_frame: self.max_samples_per_frame,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        SessionConfig::default()
            .validate()
            .expect("default config must validate");
    }

    #[test]
    fn partial_config_file_keeps_defaults() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "zoom_factor": 1.5, "workload_mode": "fixed", "accumulation": { "max_samples": 64 } }"#,
        )
        .expect("write config");

        let config = SessionConfig::load(&path).expect("load config");
        assert_eq!(config.zoom_factor, 1.5);
        assert_eq!(config.workload_mode, WorkloadMode::Fixed);
        assert_eq!(config.accumulation.max_samples, 64);
        assert_eq!(config.accumulation.initial_samples_per_frame, 1);
        assert_eq!(config.texture_width, 320);
        assert!(config.draw_overlay);
    }

    #[test]
    fn rejects_zoom_factor_that_does_not_zoom() {
        let config = SessionConfig {
            zoom_factor: 1.0,
            ..SessionConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "zoom_factor",
                ..
            })
        ));
    }

    #[test]
    fn rejects_non_positive_sizes_and_thickness() {
        let zero_width = SessionConfig {
            texture_width: 0,
            ..SessionConfig::default()
        };
        assert!(zero_width.validate().is_err());

        let no_outline = SessionConfig {
            outline_thickness: 0.0,
            ..SessionConfig::default()
        };
        assert!(no_outline.validate().is_err());
    }

    #[test]
    fn load_reports_parse_errors_with_path() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ \"zoom_factor\": ").expect("write config");

        let error = SessionConfig::load(&path).expect_err("broken config must fail");
        assert!(error.to_string().contains("broken.json"));
    }
}
