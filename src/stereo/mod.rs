//! Canonical stereo rig synthesis.
//!
//! A stereo pair is produced from a single camera pose by sliding the camera
//! half a baseline to the left and to the right along its own x-axis. Both
//! cameras keep the orientation and intrinsics of the original pose, so the
//! relative calibration is the canonical one: identity rotation, translation
//! along x only, no distortion (ref. Hartley & Zisserman, eq. 6.8).

use crate::camera::{CameraError, CameraPose, PinholeModel, Resolution};
use crate::config::ConfigError;
use crate::geometry::BoundingBox;
use crate::render::{RenderEngine, RenderError};
use crate::util::{self, UtilError};
use log::{debug, info};
use nalgebra::{Matrix3, Vector3, Vector4};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod calibration;

pub use calibration::{CameraCalibration, StereoCalibration};

#[derive(thiserror::Error, Debug)]
pub enum StereoError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Render error: {0}")]
    Render(#[from] RenderError),
    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),
    #[error(transparent)]
    Util(#[from] UtilError),
    #[error("IO Error: {0}")]
    IOError(String),
    #[error("Malformed calibration file: {0}")]
    Calibration(String),
    #[error("Camera pose not restored: {0}")]
    PoseNotRestored(String),
    #[error("Failed to write JSON: {0}")]
    Json(String),
}

impl From<std::io::Error> for StereoError {
    fn from(err: std::io::Error) -> Self {
        StereoError::IOError(err.to_string())
    }
}

impl From<serde_json::Error> for StereoError {
    fn from(err: serde_json::Error) -> Self {
        StereoError::Json(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StereoSide {
    Left,
    Right,
}

/// Calibration of one camera of a canonical stereo rig.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StereoIntrinsics {
    /// Intrinsic matrix.
    pub k: Matrix3<f64>,
    /// Rotation to the other camera, always identity.
    pub r: Matrix3<f64>,
    /// Position of the other camera in this camera's frame.
    pub t: Vector3<f64>,
    /// Lens distortion, always zero.
    pub distortion: Vector4<f64>,
}

impl StereoIntrinsics {
    /// `K`, `R`, `t` and `k` for one side of the rig.
    ///
    /// The left camera gets `t = [b/2, 0, 0]` and the right camera
    /// `t = [-b/2, 0, 0]`.
    pub fn canonical(
        resolution: &Resolution,
        view_angle_deg: f64,
        baseline: f64,
        side: StereoSide,
    ) -> Self {
        let half = baseline / 2.0;
        let tx = match side {
            StereoSide::Left => half,
            StereoSide::Right => -half,
        };
        StereoIntrinsics {
            k: PinholeModel::from_view_angle(*resolution, view_angle_deg).k_matrix(),
            r: Matrix3::identity(),
            t: Vector3::new(tx, 0.0, 0.0),
            distortion: Vector4::zeros(),
        }
    }
}

/// Base output paths of one stereo capture; the side suffixes are added here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StereoOutputs {
    pub image: PathBuf,
    pub calibration: PathBuf,
    pub bbox: PathBuf,
}

impl StereoOutputs {
    pub fn new(
        image: impl Into<PathBuf>,
        calibration: impl Into<PathBuf>,
        bbox: impl Into<PathBuf>,
    ) -> Self {
        StereoOutputs {
            image: image.into(),
            calibration: calibration.into(),
            bbox: bbox.into(),
        }
    }

    /// Same outputs with `suffix` inserted before every extension.
    pub fn with_suffix(&self, suffix: &str) -> Self {
        StereoOutputs {
            image: util::add_suffix_path(&self.image, suffix),
            calibration: util::add_suffix_path(&self.calibration, suffix),
            bbox: util::add_suffix_path(&self.bbox, suffix),
        }
    }

    pub fn image_file(&self, side: StereoSide) -> PathBuf {
        let suffix = match side {
            StereoSide::Left => "_left",
            StereoSide::Right => "_right",
        };
        util::add_suffix_path(&self.image, suffix)
    }

    pub fn calibration_file(&self) -> PathBuf {
        util::add_suffix_path(&self.calibration, "_CoViS_canonic")
    }

    pub fn left_bbox_file(&self) -> PathBuf {
        util::add_suffix_path(&self.bbox, "_vtk_left_camera_frame")
    }
}

/// Everything a stereo capture produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StereoCapture {
    pub left_image: PathBuf,
    pub right_image: PathBuf,
    pub calibration_file: PathBuf,
    pub left_bbox_file: PathBuf,
    pub calibration: StereoCalibration,
    /// Pose reached after moving back from the right camera; equal to the
    /// input pose up to rounding.
    pub restored_pose: CameraPose,
}

fn capture_side<E: RenderEngine + ?Sized>(
    engine: &mut E,
    pose: &CameraPose,
    resolution: &Resolution,
    path: &Path,
) -> Result<(), StereoError> {
    engine.reset_clipping_range(pose);
    let frame = engine.capture(pose, resolution)?;
    util::save_image(&frame, path)?;
    info!("Wrote {}", path.display());
    Ok(())
}

/// Render and store a stereo pair around `pose`.
///
/// The camera goes half a baseline to the left, is captured, then a full
/// baseline to the right, is captured, and finally half a baseline back. Only
/// the left view gets a camera-frame bounding-box file. `pose` itself is never
/// modified; the pose reached at the end is returned for verification.
pub fn capture_stereo_pair<E: RenderEngine + ?Sized>(
    engine: &mut E,
    pose: &CameraPose,
    resolution: &Resolution,
    baseline: f64,
    bbox: &BoundingBox,
    outputs: &StereoOutputs,
) -> Result<StereoCapture, StereoError> {
    let axis = pose.baseline_axis();
    debug!("Stereo baseline axis {:?}", axis);

    let left = pose.translate(&(-axis * baseline / 2.0));
    let left_image = outputs.image_file(StereoSide::Left);
    capture_side(engine, &left, resolution, &left_image)?;
    let left_intrinsics =
        StereoIntrinsics::canonical(resolution, left.view_angle, baseline, StereoSide::Left);

    let left_bbox_file = outputs.left_bbox_file();
    util::save_points(&left_bbox_file, &bbox.in_camera_frame(&left))?;
    info!("Wrote {}", left_bbox_file.display());

    let right = left.translate(&(axis * baseline));
    let right_image = outputs.image_file(StereoSide::Right);
    capture_side(engine, &right, resolution, &right_image)?;
    let right_intrinsics =
        StereoIntrinsics::canonical(resolution, right.view_angle, baseline, StereoSide::Right);

    let calibration = StereoCalibration {
        left: CameraCalibration {
            resolution: *resolution,
            intrinsics: left_intrinsics,
        },
        right: CameraCalibration {
            resolution: *resolution,
            intrinsics: right_intrinsics,
        },
    };
    let calibration_file = outputs.calibration_file();
    calibration.save(&calibration_file)?;
    info!("Wrote {}", calibration_file.display());

    let restored_pose = right.translate(&(-axis * baseline / 2.0));
    engine.reset_clipping_range(&restored_pose);

    Ok(StereoCapture {
        left_image,
        right_image,
        calibration_file,
        left_bbox_file,
        calibration,
        restored_pose,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_canonical_example() {
        let resolution = Resolution {
            width: 300,
            height: 300,
        };
        let left = StereoIntrinsics::canonical(&resolution, 40.0, 50.0, StereoSide::Left);
        let right = StereoIntrinsics::canonical(&resolution, 40.0, 50.0, StereoSide::Right);

        let f = 150.0 / 20f64.to_radians().tan();
        let expected_k = Matrix3::new(f, 0.0, 150.0, 0.0, f, 150.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(left.k, expected_k, epsilon = 1e-9);
        assert_relative_eq!(left.k[(0, 0)], 412.1, epsilon = 0.05);
        assert_eq!(left.t, Vector3::new(25.0, 0.0, 0.0));
        assert_eq!(right.t, Vector3::new(-25.0, 0.0, 0.0));
    }

    #[test]
    fn test_left_right_relationship() {
        let cases = [
            ((300, 300), 40.0, 50.0),
            ((640, 480), 60.0, 0.12),
            ((1, 999), 1.5, 1e6),
            ((1920, 1080), 120.0, 3.0),
        ];
        for ((width, height), fov, baseline) in cases {
            let resolution = Resolution { width, height };
            let left = StereoIntrinsics::canonical(&resolution, fov, baseline, StereoSide::Left);
            let right = StereoIntrinsics::canonical(&resolution, fov, baseline, StereoSide::Right);
            assert_eq!(left.k, right.k);
            assert_eq!(left.r, Matrix3::identity());
            assert_eq!(right.r, Matrix3::identity());
            assert_eq!(left.distortion, Vector4::zeros());
            assert_eq!(right.distortion, Vector4::zeros());
            assert_eq!(left.t, -right.t);
            assert_eq!(left.t.x.abs(), baseline / 2.0);
            assert_eq!(left.t.y, 0.0);
            assert_eq!(left.t.z, 0.0);
        }
    }

    #[test]
    fn test_outputs_naming() {
        let outputs = StereoOutputs::new("out/img.png", "out/cam.dat", "out/bbox.dat");
        assert_eq!(
            outputs.image_file(StereoSide::Left),
            PathBuf::from("out/img_left.png")
        );
        assert_eq!(
            outputs.image_file(StereoSide::Right),
            PathBuf::from("out/img_right.png")
        );
        assert_eq!(
            outputs.calibration_file(),
            PathBuf::from("out/cam_CoViS_canonic.dat")
        );
        assert_eq!(
            outputs.left_bbox_file(),
            PathBuf::from("out/bbox_vtk_left_camera_frame.dat")
        );

        let swept = outputs.with_suffix("_el_0.00_az_10.00_zo_1.00");
        assert_eq!(
            swept.image_file(StereoSide::Left),
            PathBuf::from("out/img_el_0.00_az_10.00_zo_1.00_left.png")
        );
    }
}
