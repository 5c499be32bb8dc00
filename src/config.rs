//! Run configuration.
//!
//! A [`RenderConfig`] holds every knob of a run. It can be read from YAML, any
//! field left out takes its default, and the command line overrides single
//! fields afterwards. Call [`RenderConfig::validate`] before touching the
//! rendering engine.

use crate::camera::Resolution;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO Error: {0}")]
    IOError(String),
    #[error("Failed to parse YAML: {0}")]
    YamlError(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IOError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::YamlError(err.to_string())
    }
}

/// What a run does once the scene is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    /// Hand the camera to the user.
    #[default]
    Interactive,
    /// One stereo pair from the initial pose.
    Frontal,
    /// One stereo pair per elevation/azimuth/zoom combination.
    Sweep,
}

impl FromStr for ViewMode {
    type Err = String;

    /// Accepts the mode name or its number: `0` interactive, `1` frontal, `2` sweep.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "0" | "interactive" => Ok(ViewMode::Interactive),
            "1" | "frontal" => Ok(ViewMode::Frontal),
            "2" | "sweep" => Ok(ViewMode::Sweep),
            other => Err(format!(
                "unknown view mode '{other}', expected 0/interactive, 1/frontal or 2/sweep"
            )),
        }
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ViewMode::Interactive => "interactive",
            ViewMode::Frontal => "frontal",
            ViewMode::Sweep => "sweep",
        };
        f.write_str(name)
    }
}

/// Camera distance value meaning "fit the object in view".
pub const AUTO_DISTANCE: f64 = -1.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// 0 info, 1 debug, 2 trace.
    pub debug_mode: u8,
    pub model: Option<PathBuf>,
    pub texture: Option<PathBuf>,
    /// Base name of the bounding-box files.
    pub bb_output: PathBuf,
    /// Width and height in pixels.
    pub image_size: [u32; 2],
    /// Vertical field of view in degrees.
    pub view_angle: f64,
    /// RGB in [0, 1].
    pub background: [f64; 3],
    /// Distance from the object center, or [`AUTO_DISTANCE`].
    pub camera_distance: f64,
    /// Base name of the camera distance file.
    pub dist_output: PathBuf,
    /// Object rotation about x, y and z in degrees.
    pub object_orientation: [f64; 3],
    pub view_mode: ViewMode,
    /// Base name of the calibration files.
    pub cam_mat_output: PathBuf,
    /// Base name of the images.
    pub cam_img_output: PathBuf,
    pub stereo_baseline: f64,
    pub elevation: Vec<f64>,
    pub azimuth: Vec<f64>,
    pub zoom: Vec<f64>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            debug_mode: 0,
            model: None,
            texture: None,
            bb_output: PathBuf::from("render_3d_object_bbox.dat"),
            image_size: [300, 300],
            view_angle: 40.0,
            background: [0.0, 0.0, 0.0],
            camera_distance: AUTO_DISTANCE,
            dist_output: PathBuf::from("render_3d_object_dist.dat"),
            object_orientation: [0.0, 90.0, 0.0],
            view_mode: ViewMode::Interactive,
            cam_mat_output: PathBuf::from("render_3d_object_cam_mat.dat"),
            cam_img_output: PathBuf::from("render_3d_object_cam_img.png"),
            stereo_baseline: 50.0,
            elevation: vec![-10.0, 0.0, 10.0],
            azimuth: vec![-10.0, 0.0, 10.0],
            zoom: vec![0.8, 1.0, 1.2],
        }
    }
}

impl RenderConfig {
    /// Load a configuration from a YAML file; missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// [`ConfigError::IOError`] if the file cannot be read and
    /// [`ConfigError::YamlError`] if it is not a valid configuration document.
    pub fn load_from_yaml(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| ConfigError::IOError(format!("{}: {e}", path.display())))?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        if contents.trim().is_empty() {
            return Ok(RenderConfig::default());
        }
        Ok(serde_yaml::from_str(contents)?)
    }

    pub fn save_to_yaml(&self, path: &Path) -> Result<(), ConfigError> {
        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)
            .map_err(|e| ConfigError::IOError(format!("{}: {e}", path.display())))?;
        Ok(())
    }

    pub fn resolution(&self) -> Resolution {
        Resolution {
            width: self.image_size[0],
            height: self.image_size[1],
        }
    }

    /// `None` when the distance is derived from the object size.
    pub fn fixed_camera_distance(&self) -> Option<f64> {
        if self.camera_distance == AUTO_DISTANCE {
            None
        } else {
            Some(self.camera_distance)
        }
    }

    /// Check the configuration before anything is rendered.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.is_none() {
            return Err(ConfigError::Invalid("no model given".to_string()));
        }
        if self.image_size.contains(&0) {
            return Err(ConfigError::Invalid(format!(
                "image size {}x{} has a zero dimension",
                self.image_size[0], self.image_size[1]
            )));
        }
        if !(self.view_angle > 0.0 && self.view_angle < 180.0) {
            return Err(ConfigError::Invalid(format!(
                "view angle {} must be in (0, 180) degrees",
                self.view_angle
            )));
        }
        if !self.stereo_baseline.is_finite() || self.stereo_baseline <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "stereo baseline {} must be finite and positive",
                self.stereo_baseline
            )));
        }
        if self.camera_distance != AUTO_DISTANCE
            && !(self.camera_distance.is_finite() && self.camera_distance > 0.0)
        {
            return Err(ConfigError::Invalid(format!(
                "camera distance {} must be -1 (auto) or positive",
                self.camera_distance
            )));
        }
        if let Some(zoom) = self
            .zoom
            .iter()
            .find(|z| !z.is_nan() && !(z.is_finite() && **z > 0.0))
        {
            return Err(ConfigError::Invalid(format!(
                "zoom {zoom} must be finite and positive"
            )));
        }
        if let Some(zoom) = self
            .zoom
            .iter()
            .find(|z| !z.is_nan() && self.view_angle / **z >= 180.0)
        {
            return Err(ConfigError::Invalid(format!(
                "zoom {zoom} widens the view angle {} to {} degrees, it must stay below 180",
                self.view_angle,
                self.view_angle / zoom
            )));
        }
        for (name, values) in [("elevation", &self.elevation), ("azimuth", &self.azimuth)] {
            if values.iter().any(|v| v.is_infinite()) {
                return Err(ConfigError::Invalid(format!("{name} values must be finite")));
            }
        }
        if self.background.iter().any(|c| !(0.0..=1.0).contains(c)) {
            return Err(ConfigError::Invalid(format!(
                "background {:?} must be RGB in [0, 1]",
                self.background
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> RenderConfig {
        RenderConfig {
            model: Some(PathBuf::from("bunny.obj")),
            ..RenderConfig::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = RenderConfig::default();
        assert_eq!(config.resolution(), Resolution { width: 300, height: 300 });
        assert_eq!(config.view_angle, 40.0);
        assert_eq!(config.stereo_baseline, 50.0);
        assert_eq!(config.fixed_camera_distance(), None);
        assert_eq!(config.object_orientation, [0.0, 90.0, 0.0]);
        assert_eq!(config.view_mode, ViewMode::Interactive);
        assert_eq!(config.zoom, vec![0.8, 1.0, 1.2]);
    }

    #[test]
    fn test_view_mode_from_str() {
        assert_eq!("0".parse::<ViewMode>(), Ok(ViewMode::Interactive));
        assert_eq!("1".parse::<ViewMode>(), Ok(ViewMode::Frontal));
        assert_eq!("Sweep".parse::<ViewMode>(), Ok(ViewMode::Sweep));
        assert!("3".parse::<ViewMode>().is_err());
        assert_eq!(ViewMode::Frontal.to_string(), "frontal");
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = "model: bunny.obj\nview_mode: sweep\nimage_size: [640, 480]\nzoom: [1.0]\n";
        let config = RenderConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.model, Some(PathBuf::from("bunny.obj")));
        assert_eq!(config.view_mode, ViewMode::Sweep);
        assert_eq!(config.resolution(), Resolution { width: 640, height: 480 });
        assert_eq!(config.zoom, vec![1.0]);
        assert_eq!(config.view_angle, 40.0);
        assert_eq!(config.cam_img_output, PathBuf::from("render_3d_object_cam_img.png"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bad_yaml() {
        assert!(matches!(
            RenderConfig::from_yaml_str("view_mode: [1, 2"),
            Err(ConfigError::YamlError(_))
        ));
        assert!(matches!(
            RenderConfig::from_yaml_str("view_mode: sideways"),
            Err(ConfigError::YamlError(_))
        ));
    }

    #[test]
    fn test_validate() {
        assert!(valid().validate().is_ok());

        let cases: Vec<RenderConfig> = vec![
            RenderConfig::default(),
            RenderConfig { image_size: [0, 300], ..valid() },
            RenderConfig { view_angle: 0.0, ..valid() },
            RenderConfig { view_angle: 180.0, ..valid() },
            RenderConfig { stereo_baseline: 0.0, ..valid() },
            RenderConfig { stereo_baseline: f64::INFINITY, ..valid() },
            RenderConfig { camera_distance: 0.0, ..valid() },
            RenderConfig { camera_distance: -2.0, ..valid() },
            RenderConfig { zoom: vec![1.0, 0.0], ..valid() },
            RenderConfig { zoom: vec![f64::INFINITY], ..valid() },
            RenderConfig { zoom: vec![0.2], ..valid() },
            RenderConfig { view_angle: 90.0, zoom: vec![0.5], ..valid() },
            RenderConfig { elevation: vec![f64::NEG_INFINITY], ..valid() },
            RenderConfig { background: [0.0, 2.0, 0.0], ..valid() },
        ];
        for config in cases {
            assert!(
                matches!(config.validate(), Err(ConfigError::Invalid(_))),
                "{config:?} should be rejected"
            );
        }

        let user_distance = RenderConfig { camera_distance: 250.0, ..valid() };
        assert!(user_distance.validate().is_ok());
        assert_eq!(user_distance.fixed_camera_distance(), Some(250.0));

        let narrow_enough = RenderConfig { view_angle: 90.0, zoom: vec![0.51], ..valid() };
        assert!(narrow_enough.validate().is_ok());

        let with_nan = RenderConfig { zoom: vec![1.0, f64::NAN], ..valid() };
        assert!(with_nan.validate().is_ok());
    }
}
