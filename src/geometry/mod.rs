//! Object extent in world and camera frames.
//!
//! The rendering engine reports the axis-aligned [`Bounds`] of the centered and
//! oriented object. [`BoundingBox`] turns them into the eight corners that the
//! bounding-box files list positionally, and re-expresses those corners in the
//! view frame of any [`CameraPose`].

use crate::camera::CameraPose;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};

/// Margin applied to the bounding-box diagonal when choosing a camera distance.
pub const AUTO_DISTANCE_MARGIN: f64 = 1.1;

/// Axis-aligned extent of an object in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl Bounds {
    pub fn new(min: Point3<f64>, max: Point3<f64>) -> Self {
        Bounds { min, max }
    }

    /// Smallest bounds containing every point, `None` for an empty iterator.
    pub fn from_points<'a, I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Point3<f64>>,
    {
        let mut points = points.into_iter();
        let first = *points.next()?;
        Some(points.fold(Bounds::new(first, first), |bounds, p| Bounds {
            min: bounds.min.inf(p),
            max: bounds.max.sup(p),
        }))
    }

    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.min, &self.max)
    }

    pub fn diagonal(&self) -> f64 {
        (self.max - self.min).norm()
    }
}

/// The eight corners of an object's axis-aligned extent.
///
/// Corners are ordered (xmin,ymin,zmin), (xmax,ymin,zmin), (xmin,ymax,zmin),
/// (xmin,ymin,zmax), (xmax,ymax,zmin), (xmax,ymin,zmax), (xmin,ymax,zmax),
/// (xmax,ymax,zmax). Files written from a box carry no labels, so readers rely
/// on this order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    corners: [Point3<f64>; 8],
}

impl BoundingBox {
    pub fn from_extents(
        xmin: f64,
        xmax: f64,
        ymin: f64,
        ymax: f64,
        zmin: f64,
        zmax: f64,
    ) -> Self {
        BoundingBox {
            corners: [
                Point3::new(xmin, ymin, zmin),
                Point3::new(xmax, ymin, zmin),
                Point3::new(xmin, ymax, zmin),
                Point3::new(xmin, ymin, zmax),
                Point3::new(xmax, ymax, zmin),
                Point3::new(xmax, ymin, zmax),
                Point3::new(xmin, ymax, zmax),
                Point3::new(xmax, ymax, zmax),
            ],
        }
    }

    pub fn from_bounds(bounds: &Bounds) -> Self {
        BoundingBox::from_extents(
            bounds.min.x,
            bounds.max.x,
            bounds.min.y,
            bounds.max.y,
            bounds.min.z,
            bounds.max.z,
        )
    }

    pub fn corners(&self) -> &[Point3<f64>; 8] {
        &self.corners
    }

    /// Corners expressed in the view frame of `pose`, in the same order.
    pub fn in_camera_frame(&self, pose: &CameraPose) -> [Point3<f64>; 8] {
        let view = pose.view_transform();
        self.corners.map(|corner| view.transform_point(&corner))
    }
}

/// Camera distance that fits the bounds diagonal into the view angle with a 10% margin.
pub fn auto_camera_distance(bounds: &Bounds, view_angle_deg: f64) -> f64 {
    AUTO_DISTANCE_MARGIN * bounds.diagonal() / 2.0 / (view_angle_deg.to_radians() / 2.0).tan()
}
