//! Implements the Pinhole camera model.
//!
//! This module provides the [`PinholeModel`] struct used both to describe the
//! canonical intrinsics of a rendered view and to project points when the
//! built-in renderer splats a model into an image. It also exports full 3×4
//! camera matrices for a [`CameraPose`] in the supported image frames.

use crate::camera::{validation, CameraError, CameraModel, CameraPose, Intrinsics, Resolution};
use nalgebra::{Matrix3, Matrix3x4, Vector2, Vector3};
use serde::{Deserialize, Serialize};

/// Represents a Pinhole camera model.
///
/// This struct holds the intrinsic parameters (focal length, principal point)
/// and image resolution for a pinhole camera. It assumes no lens distortion.
///
/// # Examples
///
/// ```rust
/// use stereo_render_tools::camera::{PinholeModel, Resolution};
///
/// let model = PinholeModel::from_view_angle(Resolution { width: 300, height: 300 }, 40.0);
/// assert!((model.intrinsics.fx - 412.1216).abs() < 1e-3);
/// assert_eq!(model.intrinsics.cx, 150.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinholeModel {
    /// The intrinsic parameters of the camera, [`Intrinsics`] (fx, fy, cx, cy).
    pub intrinsics: Intrinsics,
    /// The resolution of the camera image, [`Resolution`] (width, height).
    pub resolution: Resolution,
}

impl PinholeModel {
    /// Canonical pinhole camera of a rendered view.
    ///
    /// The focal lengths in pixels are `(dim / 2) / tan(fov / 2)` for the width
    /// and the height alike, both computed from the same vertical view angle.
    /// The principal point is the image center and skew is zero. The result is
    /// only meaningful for view angles in (0, 180); check it with
    /// [`CameraModel::validate_params`].
    pub fn from_view_angle(resolution: Resolution, view_angle_deg: f64) -> Self {
        let half_tan = (view_angle_deg.to_radians() / 2.0).tan();
        let half_width = resolution.width as f64 / 2.0;
        let half_height = resolution.height as f64 / 2.0;
        PinholeModel {
            intrinsics: Intrinsics {
                fx: half_width / half_tan,
                fy: half_height / half_tan,
                cx: half_width,
                cy: half_height,
            },
            resolution,
        }
    }

    /// Upper-triangular calibration matrix `K` with zero skew.
    pub fn k_matrix(&self) -> Matrix3<f64> {
        let i = &self.intrinsics;
        Matrix3::new(i.fx, 0.0, i.cx, 0.0, i.fy, i.cy, 0.0, 0.0, 1.0)
    }
}

impl CameraModel for PinholeModel {
    /// Projects a point given in the optical frame (x right, y down, z forward).
    ///
    /// `u = fx * X / Z + cx`, `v = fy * Y / Z + cy`
    ///
    /// # Errors
    ///
    /// * [`CameraError::PointAtCameraCenter`]: If the Z-coordinate is too close to zero.
    /// * [`CameraError::ProjectionOutsideImage`]: If the pixel falls outside the resolution.
    fn project(&self, point_3d: &Vector3<f64>) -> Result<Vector2<f64>, CameraError> {
        // If z is very small, the point is at the camera center
        if point_3d.z < f64::EPSILON.sqrt() {
            return Err(CameraError::PointAtCameraCenter);
        }
        let u: f64 = self.intrinsics.fx * point_3d.x / point_3d.z + self.intrinsics.cx;
        let v: f64 = self.intrinsics.fy * point_3d.y / point_3d.z + self.intrinsics.cy;

        if u < 0.0
            || u >= self.resolution.width as f64
            || v < 0.0
            || v >= self.resolution.height as f64
        {
            return Err(CameraError::ProjectionOutsideImage);
        }

        Ok(Vector2::new(u, v))
    }

    fn validate_params(&self) -> Result<(), CameraError> {
        validation::validate_intrinsics(&self.intrinsics)?;
        Ok(())
    }
}

/// Image coordinate conventions a full camera matrix can be exported in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraFrame {
    /// Renderer display coordinates: origin at the bottom-left pixel, y up.
    Vtk,
    /// CoViS image coordinates: origin at the upper corner. Not supported yet.
    Covis,
}

/// 3×4 matrix mapping homogeneous world points to homogeneous pixels.
///
/// For [`CameraFrame::Vtk`] this is the renderer's perspective transform
/// composed with the full-viewport display transform, with the depth row
/// dropped:
///
/// ```text
/// [ h/2·c   0    -w/2  0 ]
/// [   0   h/2·c  -h/2  0 ] · [ R | -R·position ]
/// [   0     0     -1   0 ]
/// ```
///
/// where `c = cot(view_angle / 2)`.
///
/// # Errors
///
/// * [`CameraError::Unsupported`] for [`CameraFrame::Covis`].
pub fn camera_matrix(
    frame: CameraFrame,
    pose: &CameraPose,
    resolution: &Resolution,
) -> Result<Matrix3x4<f64>, CameraError> {
    match frame {
        CameraFrame::Vtk => {
            let width = resolution.width as f64;
            let height = resolution.height as f64;
            let cot = 1.0 / (pose.view_angle.to_radians() / 2.0).tan();
            let display = Matrix3x4::new(
                height / 2.0 * cot,
                0.0,
                -width / 2.0,
                0.0,
                0.0,
                height / 2.0 * cot,
                -height / 2.0,
                0.0,
                0.0,
                0.0,
                -1.0,
                0.0,
            );
            let view = pose.view_transform().to_homogeneous();
            Ok(display * view)
        }
        CameraFrame::Covis => Err(CameraError::Unsupported(
            "camera matrix in CoViS image coordinates is not implemented".to_string(),
        )),
    }
}
