//! The rendering collaborator.
//!
//! The stereo pipeline never rasterizes anything itself. It talks to a
//! [`RenderEngine`], which owns the loaded model and turns a [`CameraPose`]
//! into a still frame. [`PointCloudEngine`] is the headless engine shipped
//! with the crate: it reads the vertices of an OBJ model and splats them with
//! a depth test, which is enough to produce aligned, calibrated views.

use crate::camera::{CameraError, CameraModel, CameraPose, PinholeModel, Resolution};
use crate::geometry::Bounds;
use image::{Rgb, RgbImage};
use log::{debug, info, warn};
use nalgebra::{Point3, Rotation3, Vector3};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("IO Error: {0}")]
    IOError(String),
    #[error("Failed to load model: {0}")]
    Model(String),
    #[error("Failed to load texture: {0}")]
    Texture(String),
    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),
    #[error("No model loaded")]
    NoModel,
    #[error("Unsupported by this renderer: {0}")]
    Unsupported(String),
}

impl From<std::io::Error> for RenderError {
    fn from(err: std::io::Error) -> Self {
        RenderError::IOError(err.to_string())
    }
}

/// What to put in front of the camera.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneSource {
    /// Triangulated model (OBJ).
    pub model: PathBuf,
    /// Optional texture image.
    pub texture: Option<PathBuf>,
    /// Object orientation in degrees about its x, y and z axes.
    pub orientation: [f64; 3],
    /// Background colour, RGB in [0, 1].
    pub background: [f64; 3],
}

/// Interface of the rendering engine driven by the stereo pipeline.
pub trait RenderEngine {
    /// Load the model, orient it, center it on the origin and return its world bounds.
    fn load_scene(&mut self, scene: &SceneSource) -> Result<Bounds, RenderError>;

    /// Recompute near/far clipping planes for a new camera pose.
    fn reset_clipping_range(&mut self, pose: &CameraPose);

    /// Render the scene as seen from `pose` and capture it.
    fn capture(
        &mut self,
        pose: &CameraPose,
        resolution: &Resolution,
    ) -> Result<RgbImage, RenderError>;

    /// Show the scene in an interactive window until the user closes it.
    fn display(&mut self, _pose: &CameraPose, _resolution: &Resolution) -> Result<(), RenderError> {
        Err(RenderError::Unsupported(
            "interactive display needs a windowed renderer".to_string(),
        ))
    }
}

/// Rotation applied by an object orientation: about z first, then x, then y.
pub fn orientation_rotation(orientation_deg: &[f64; 3]) -> Rotation3<f64> {
    let [x, y, z] = (*orientation_deg).map(f64::to_radians);
    Rotation3::from_axis_angle(&Vector3::y_axis(), y)
        * Rotation3::from_axis_angle(&Vector3::x_axis(), x)
        * Rotation3::from_axis_angle(&Vector3::z_axis(), z)
}

/// Vertex positions (`v x y z` records) of an OBJ document.
pub fn parse_obj_vertices(contents: &str) -> Result<Vec<Point3<f64>>, RenderError> {
    let mut vertices = Vec::new();
    for (line_no, line) in contents.lines().enumerate() {
        let mut fields = line.split_whitespace();
        if fields.next() != Some("v") {
            continue;
        }
        let coords = fields
            .take(3)
            .map(str::parse::<f64>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| RenderError::Model(format!("line {}: {e}", line_no + 1)))?;
        match coords.as_slice() {
            [x, y, z] => vertices.push(Point3::new(*x, *y, *z)),
            _ => {
                return Err(RenderError::Model(format!(
                    "line {}: vertex needs three coordinates",
                    line_no + 1
                )))
            }
        }
    }
    if vertices.is_empty() {
        return Err(RenderError::Model("model has no vertices".to_string()));
    }
    Ok(vertices)
}

/// Headless depth-tested point splatting renderer.
#[derive(Debug, Clone)]
pub struct PointCloudEngine {
    vertices: Vec<Point3<f64>>,
    colour: Rgb<u8>,
    background: Rgb<u8>,
    clipping_range: (f64, f64),
}

impl Default for PointCloudEngine {
    fn default() -> Self {
        PointCloudEngine {
            vertices: Vec::new(),
            colour: Rgb([255, 255, 255]),
            background: Rgb([0, 0, 0]),
            clipping_range: (0.0, f64::INFINITY),
        }
    }
}

impl PointCloudEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine with an already placed point set, bypassing file loading.
    pub fn from_points(vertices: Vec<Point3<f64>>) -> Self {
        PointCloudEngine {
            vertices,
            ..Self::default()
        }
    }

    pub fn vertices(&self) -> &[Point3<f64>] {
        &self.vertices
    }

    pub fn clipping_range(&self) -> (f64, f64) {
        self.clipping_range
    }

    fn place(&mut self, orientation: &[f64; 3]) -> Result<Bounds, RenderError> {
        let rotation = orientation_rotation(orientation);
        for v in self.vertices.iter_mut() {
            *v = rotation * *v;
        }
        let center = Bounds::from_points(self.vertices.iter())
            .ok_or(RenderError::NoModel)?
            .center();
        for v in self.vertices.iter_mut() {
            *v -= center.coords;
        }
        Bounds::from_points(self.vertices.iter()).ok_or(RenderError::NoModel)
    }
}

fn to_rgb(colour: &[f64; 3]) -> Rgb<u8> {
    Rgb((*colour).map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8))
}

fn mean_colour(texture: &RgbImage) -> Rgb<u8> {
    let count = (texture.width() as u64 * texture.height() as u64).max(1);
    let mut sum = [0u64; 3];
    for pixel in texture.pixels() {
        for (s, c) in sum.iter_mut().zip(pixel.0.iter()) {
            *s += *c as u64;
        }
    }
    Rgb(sum.map(|s| (s / count) as u8))
}

impl RenderEngine for PointCloudEngine {
    fn load_scene(&mut self, scene: &SceneSource) -> Result<Bounds, RenderError> {
        let contents = fs::read_to_string(&scene.model).map_err(|e| {
            RenderError::Model(format!("{}: {e}", scene.model.display()))
        })?;
        self.vertices = parse_obj_vertices(&contents)?;
        info!(
            "Loaded {} vertices from {}",
            self.vertices.len(),
            scene.model.display()
        );

        self.colour = match &scene.texture {
            Some(path) => {
                let texture = image::open(path)
                    .map_err(|e| RenderError::Texture(format!("{}: {e}", path.display())))?
                    .to_rgb8();
                mean_colour(&texture)
            }
            None => {
                warn!("No texture given, rendering shape only");
                Rgb([255, 255, 255])
            }
        };
        self.background = to_rgb(&scene.background);

        let bounds = self.place(&scene.orientation)?;
        debug!("Object bounds after placement: {:?}", bounds);
        Ok(bounds)
    }

    fn reset_clipping_range(&mut self, pose: &CameraPose) {
        let dop = pose.direction_of_projection();
        let (near, far) = self
            .vertices
            .iter()
            .map(|v| (v - pose.position).dot(&dop))
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), d| {
                (lo.min(d), hi.max(d))
            });
        self.clipping_range = if far.is_finite() && far > 0.0 {
            ((near * 0.99).max(far * 1e-3), far * 1.01)
        } else {
            (0.0, f64::INFINITY)
        };
    }

    fn capture(
        &mut self,
        pose: &CameraPose,
        resolution: &Resolution,
    ) -> Result<RgbImage, RenderError> {
        if self.vertices.is_empty() {
            return Err(RenderError::NoModel);
        }
        let model = PinholeModel::from_view_angle(*resolution, pose.view_angle);
        model.validate_params()?;
        let view = pose.view_transform();
        let (near, far) = self.clipping_range;
        let span = (far - near).max(f64::EPSILON);

        let mut image = RgbImage::from_pixel(resolution.width, resolution.height, self.background);
        let mut depth_buffer =
            vec![f64::INFINITY; resolution.width as usize * resolution.height as usize];

        for vertex in &self.vertices {
            let p = view.transform_point(vertex);
            let depth = -p.z;
            if depth < near || depth > far {
                continue;
            }
            // View frame (y up, looking down -z) to optical frame (y down, z forward).
            let Ok(pixel) = model.project(&Vector3::new(p.x, -p.y, depth)) else {
                continue;
            };
            let (u, v) = (pixel.x as u32, pixel.y as u32);
            let index = v as usize * resolution.width as usize + u as usize;
            if depth < depth_buffer[index] {
                depth_buffer[index] = depth;
                let shade = if far.is_finite() {
                    1.0 - 0.5 * (depth - near) / span
                } else {
                    1.0
                };
                image.put_pixel(u, v, Rgb(self.colour.0.map(|c| (c as f64 * shade) as u8)));
            }
        }

        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const CUBE_OBJ: &str = "# cube\n\
        v -1 -1 -1\nv 1 -1 -1\nv -1 1 -1\nv 1 1 -1\n\
        v -1 -1 1\nv 1 -1 1\nv -1 1 1\nv 1 1 1\n\
        vt 0 0\nf 1 2 3\n";

    #[test]
    fn test_parse_obj_vertices() {
        let vertices = parse_obj_vertices(CUBE_OBJ).unwrap();
        assert_eq!(vertices.len(), 8);
        assert_eq!(vertices[7], Point3::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn test_parse_obj_errors() {
        assert!(matches!(
            parse_obj_vertices("f 1 2 3\n"),
            Err(RenderError::Model(_))
        ));
        assert!(matches!(
            parse_obj_vertices("v 1 2\n"),
            Err(RenderError::Model(_))
        ));
    }

    #[test]
    fn test_orientation_rotation_about_y() {
        let rotation = orientation_rotation(&[0.0, 90.0, 0.0]);
        let p = rotation * Point3::new(1.0, 0.0, 0.0);
        assert_relative_eq!(p, Point3::new(0.0, 0.0, -1.0), epsilon = 1e-12);
    }

    #[test]
    fn test_place_centers_object() {
        let mut engine = PointCloudEngine::from_points(vec![
            Point3::new(10.0, 20.0, 30.0),
            Point3::new(14.0, 22.0, 36.0),
        ]);
        let bounds = engine.place(&[0.0, 0.0, 0.0]).unwrap();
        assert_relative_eq!(bounds.center(), Point3::origin(), epsilon = 1e-12);
        assert_relative_eq!(bounds.max, Point3::new(2.0, 1.0, 3.0), epsilon = 1e-12);
    }

    #[test]
    fn test_capture_draws_object_at_center() {
        let mut engine = PointCloudEngine::from_points(vec![Point3::origin()]);
        let pose = CameraPose::on_negative_z(Point3::origin(), 10.0, 40.0);
        let resolution = Resolution {
            width: 31,
            height: 21,
        };
        engine.reset_clipping_range(&pose);
        let image = engine.capture(&pose, &resolution).unwrap();
        assert_eq!(image.dimensions(), (31, 21));
        assert_ne!(*image.get_pixel(15, 10), Rgb([0, 0, 0]));
        assert_eq!(*image.get_pixel(0, 0), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_capture_without_model_fails() {
        let mut engine = PointCloudEngine::new();
        let pose = CameraPose::on_negative_z(Point3::origin(), 10.0, 40.0);
        let resolution = Resolution {
            width: 8,
            height: 8,
        };
        assert!(matches!(
            engine.capture(&pose, &resolution),
            Err(RenderError::NoModel)
        ));
    }

    #[test]
    fn test_capture_rejects_view_angle_past_half_turn() {
        let mut engine = PointCloudEngine::from_points(vec![Point3::origin()]);
        let pose = CameraPose::on_negative_z(Point3::origin(), 10.0, 200.0);
        let resolution = Resolution {
            width: 8,
            height: 8,
        };
        assert!(matches!(
            engine.capture(&pose, &resolution),
            Err(RenderError::Camera(CameraError::FocalLengthMustBePositive))
        ));
    }

    #[test]
    fn test_display_is_unsupported() {
        let mut engine = PointCloudEngine::new();
        let pose = CameraPose::on_negative_z(Point3::origin(), 10.0, 40.0);
        let resolution = Resolution {
            width: 8,
            height: 8,
        };
        assert!(matches!(
            engine.display(&pose, &resolution),
            Err(RenderError::Unsupported(_))
        ));
    }
}
