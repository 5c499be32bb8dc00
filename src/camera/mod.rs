//! Camera state and pinhole geometry.
//!
//! [`CameraPose`] is an immutable description of a perspective camera in the
//! same terms a scene-graph camera uses: position, focal point, view-up vector
//! and full vertical view angle. Every manipulation (elevation, azimuth, roll,
//! zoom, translation) returns a new pose, so a caller that keeps its original
//! value can never observe a half-finished move.

use nalgebra::{
    IsometryMatrix3, Matrix3, Point3, Rotation3, Translation3, Unit, Vector2, Vector3,
};
use serde::{Deserialize, Serialize};

pub mod pinhole;

pub use pinhole::{camera_matrix, CameraFrame, PinholeModel};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

#[derive(thiserror::Error, Debug)]
pub enum CameraError {
    #[error("Projection is outside the image")]
    ProjectionOutsideImage,
    #[error("z is close to zero, point is at camera center")]
    PointAtCameraCenter,
    #[error("Focal length must be positive")]
    FocalLengthMustBePositive,
    #[error("Principal point must be finite")]
    PrincipalPointMustBeFinite,
    #[error("Invalid camera parameters: {0}")]
    InvalidParams(String),
    #[error("Unsupported camera frame: {0}")]
    Unsupported(String),
}

/// Trait defining the core functionality for camera models
pub trait CameraModel {
    /// Project a 3D point in the optical frame (z forward, y down) to pixels
    fn project(&self, point_3d: &Vector3<f64>) -> Result<Vector2<f64>, CameraError>;

    /// Validate camera parameters
    fn validate_params(&self) -> Result<(), CameraError>;
}

/// Common validation functions for camera parameters
pub mod validation {
    use super::*;

    pub fn validate_intrinsics(intrinsics: &Intrinsics) -> Result<(), CameraError> {
        if intrinsics.fx <= 0.0 || intrinsics.fy <= 0.0 {
            return Err(CameraError::FocalLengthMustBePositive);
        }
        if !intrinsics.cx.is_finite() || !intrinsics.cy.is_finite() {
            return Err(CameraError::PrincipalPointMustBeFinite);
        }
        Ok(())
    }
}

/// World-space direction of a camera's local x-axis.
///
/// This is the stereo baseline direction: `normalize(dop × up)`, which is the
/// first row of the world-to-view rotation.
pub fn local_x_axis(view_up: &Vector3<f64>, direction_of_projection: &Vector3<f64>) -> Vector3<f64> {
    direction_of_projection.cross(view_up).normalize()
}

/// A perspective camera pose.
///
/// The view frame follows the usual graphics convention: x to the right, y up,
/// and the camera looking down its negative z-axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
    pub position: Point3<f64>,
    pub focal_point: Point3<f64>,
    pub view_up: Vector3<f64>,
    /// Full vertical field of view in degrees.
    pub view_angle: f64,
}

impl CameraPose {
    pub fn new(
        position: Point3<f64>,
        focal_point: Point3<f64>,
        view_up: Vector3<f64>,
        view_angle: f64,
    ) -> Self {
        CameraPose {
            position,
            focal_point,
            view_up,
            view_angle,
        }
    }

    /// Camera on the negative z-axis at `distance` from `focal_point`, y up.
    pub fn on_negative_z(focal_point: Point3<f64>, distance: f64, view_angle: f64) -> Self {
        CameraPose {
            position: Point3::new(focal_point.x, focal_point.y, focal_point.z - distance),
            focal_point,
            view_up: Vector3::y(),
            view_angle,
        }
    }

    pub fn distance(&self) -> f64 {
        (self.focal_point - self.position).norm()
    }

    pub fn direction_of_projection(&self) -> Vector3<f64> {
        (self.focal_point - self.position).normalize()
    }

    pub fn view_plane_normal(&self) -> Vector3<f64> {
        (self.position - self.focal_point).normalize()
    }

    /// Direction along which the two cameras of a stereo rig are separated.
    pub fn baseline_axis(&self) -> Vector3<f64> {
        local_x_axis(&self.view_up, &self.direction_of_projection())
    }

    /// Rotation whose rows are the view frame axes expressed in world coordinates.
    pub fn view_rotation(&self) -> Rotation3<f64> {
        let normal = self.view_plane_normal();
        let sideways = self.view_up.cross(&normal).normalize();
        let ortho_up = normal.cross(&sideways);
        Rotation3::from_matrix_unchecked(Matrix3::from_rows(&[
            sideways.transpose(),
            ortho_up.transpose(),
            normal.transpose(),
        ]))
    }

    /// World-to-view rigid transform.
    pub fn view_transform(&self) -> IsometryMatrix3<f64> {
        let rotation = self.view_rotation();
        let translation = Translation3::from(-(rotation * self.position.coords));
        IsometryMatrix3::from_parts(translation, rotation)
    }

    pub fn world_to_view(&self, point: &Point3<f64>) -> Point3<f64> {
        self.view_transform().transform_point(point)
    }

    /// Rigidly moves position and focal point by `offset`; the view-up is unchanged.
    pub fn translate(&self, offset: &Vector3<f64>) -> Self {
        CameraPose {
            position: self.position + offset,
            focal_point: self.focal_point + offset,
            ..*self
        }
    }

    /// Rotates the position about the focal point around the negative view x-axis.
    ///
    /// The view-up vector is left as it was; call
    /// [`CameraPose::orthogonalize_view_up`] afterwards.
    pub fn elevation(&self, degrees: f64) -> Self {
        let axis = -self.view_rotation().matrix().row(0).transpose();
        self.orbit(&axis, degrees)
    }

    /// Rotates the position about the focal point around the view-up vector.
    pub fn azimuth(&self, degrees: f64) -> Self {
        self.orbit(&self.view_up, degrees)
    }

    /// Rotates the view-up vector about the direction of projection.
    pub fn roll(&self, degrees: f64) -> Self {
        let rotation = axis_rotation(&self.direction_of_projection(), degrees);
        CameraPose {
            view_up: rotation * self.view_up,
            ..*self
        }
    }

    /// Perspective zoom: divides the view angle by `factor`.
    ///
    /// The result is not range-checked; [`CameraPose::validate`] rejects
    /// angles outside (0, 180).
    pub fn zoom(&self, factor: f64) -> Self {
        CameraPose {
            view_angle: self.view_angle / factor,
            ..*self
        }
    }

    /// Replaces the view-up vector by its component orthogonal to the view direction.
    pub fn orthogonalize_view_up(&self) -> Self {
        let view_up = self.view_rotation().matrix().row(1).transpose();
        CameraPose { view_up, ..*self }
    }

    /// Takes position, focal point and view-up from `other`, keeping this view angle.
    pub fn with_placement_of(&self, other: &CameraPose) -> Self {
        CameraPose {
            position: other.position,
            focal_point: other.focal_point,
            view_up: other.view_up,
            view_angle: self.view_angle,
        }
    }

    pub fn approx_eq(&self, other: &CameraPose, epsilon: f64) -> bool {
        (self.position - other.position).amax() <= epsilon
            && (self.focal_point - other.focal_point).amax() <= epsilon
            && (self.view_up - other.view_up).amax() <= epsilon
            && (self.view_angle - other.view_angle).abs() <= epsilon
    }

    pub fn validate(&self) -> Result<(), CameraError> {
        if !(self.view_angle > 0.0 && self.view_angle < 180.0) {
            return Err(CameraError::InvalidParams(format!(
                "view angle must be in (0, 180) degrees, got {}",
                self.view_angle
            )));
        }
        if self.distance() <= f64::EPSILON {
            return Err(CameraError::InvalidParams(
                "position and focal point coincide".to_string(),
            ));
        }
        if self
            .view_up
            .cross(&self.direction_of_projection())
            .norm()
            <= f64::EPSILON.sqrt()
        {
            return Err(CameraError::InvalidParams(
                "view up is parallel to the view direction".to_string(),
            ));
        }
        Ok(())
    }

    fn orbit(&self, axis: &Vector3<f64>, degrees: f64) -> Self {
        let rotation = axis_rotation(axis, degrees);
        let offset = self.position - self.focal_point;
        CameraPose {
            position: self.focal_point + rotation * offset,
            ..*self
        }
    }
}

fn axis_rotation(axis: &Vector3<f64>, degrees: f64) -> Rotation3<f64> {
    Rotation3::from_axis_angle(&Unit::new_normalize(*axis), degrees.to_radians())
}
