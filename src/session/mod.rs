//! One run of the renderer, from configuration to files on disk.
//!
//! A session loads the scene, writes the world bounding box and the initial
//! camera distance, places the camera and then dispatches on the view mode.

use crate::camera::{CameraPose, Resolution};
use crate::config::{ConfigError, RenderConfig, ViewMode};
use crate::geometry::{auto_camera_distance, BoundingBox, Bounds};
use crate::render::{RenderEngine, SceneSource};
use crate::stereo::{capture_stereo_pair, StereoCapture, StereoError, StereoOutputs};
use crate::sweep::{SweepRecord, ViewpointGrid, ViewpointSweep};
use crate::util;
use log::{debug, info};
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Scene state shared by every mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreparedScene {
    pub bounds: Bounds,
    pub bbox: BoundingBox,
    pub pose: CameraPose,
    pub world_bbox_file: PathBuf,
    pub distance_file: PathBuf,
}

/// Record of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub view_mode: ViewMode,
    pub resolution: Resolution,
    pub baseline: f64,
    pub scene: PreparedScene,
    pub frontal: Option<StereoCapture>,
    pub sweep: Vec<SweepRecord>,
}

impl RunManifest {
    /// Every file the run wrote, in writing order.
    pub fn files(&self) -> Vec<PathBuf> {
        let mut files = vec![
            self.scene.world_bbox_file.clone(),
            self.scene.distance_file.clone(),
        ];
        let captures = self
            .frontal
            .iter()
            .chain(self.sweep.iter().map(|record| &record.capture));
        for capture in captures {
            files.push(capture.left_image.clone());
            files.push(capture.left_bbox_file.clone());
            files.push(capture.right_image.clone());
            files.push(capture.calibration_file.clone());
        }
        files
    }

    pub fn save(&self, path: &Path) -> Result<(), StereoError> {
        util::ensure_parent_dir(path)?;
        let file = File::create(path).map_err(|e| {
            StereoError::IOError(format!("Failed to create {}: {e}", path.display()))
        })?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        info!("Wrote run manifest {}", path.display());
        Ok(())
    }
}

pub struct RenderSession<'a, E: RenderEngine + ?Sized> {
    engine: &'a mut E,
    config: &'a RenderConfig,
}

impl<'a, E: RenderEngine + ?Sized> RenderSession<'a, E> {
    /// Validate `config` and bind it to `engine`. The engine is not touched
    /// when the configuration is rejected.
    pub fn new(engine: &'a mut E, config: &'a RenderConfig) -> Result<Self, StereoError> {
        config.validate()?;
        Ok(RenderSession { engine, config })
    }

    pub fn outputs(&self) -> StereoOutputs {
        StereoOutputs::new(
            &self.config.cam_img_output,
            &self.config.cam_mat_output,
            &self.config.bb_output,
        )
    }

    /// Load the scene, write the world bounding box and the distance file,
    /// and place the camera.
    pub fn prepare(&mut self) -> Result<PreparedScene, StereoError> {
        let config = self.config;
        let model = config
            .model
            .clone()
            .ok_or_else(|| ConfigError::Invalid("no model given".to_string()))?;
        let scene = SceneSource {
            model,
            texture: config.texture.clone(),
            orientation: config.object_orientation,
            background: config.background,
        };
        let bounds = self.engine.load_scene(&scene)?;
        let bbox = BoundingBox::from_bounds(&bounds);

        let world_bbox_file = util::add_suffix_path(&config.bb_output, "_vtk_world");
        util::save_points(&world_bbox_file, bbox.corners())?;
        info!("Wrote {}", world_bbox_file.display());

        let distance = match config.fixed_camera_distance() {
            Some(distance) => distance,
            None => {
                let distance = auto_camera_distance(&bounds, config.view_angle);
                info!("Automatic camera distance {distance}");
                distance
            }
        };
        let pose = CameraPose::on_negative_z(bounds.center(), distance, config.view_angle);
        pose.validate()?;
        self.engine.reset_clipping_range(&pose);
        debug!("Initial camera pose {:?}", pose);

        let distance_file = util::add_suffix_path(&config.dist_output, "_orig");
        util::save_points(
            &distance_file,
            &[pose.position, Point3::from(pose.view_plane_normal())],
        )?;
        info!("Wrote {}", distance_file.display());

        Ok(PreparedScene {
            bounds,
            bbox,
            pose,
            world_bbox_file,
            distance_file,
        })
    }

    /// Prepare the scene and run the configured view mode.
    pub fn run(&mut self) -> Result<RunManifest, StereoError> {
        let scene = self.prepare()?;
        let config = self.config;
        let resolution = config.resolution();
        let baseline = config.stereo_baseline;
        let outputs = self.outputs();
        info!("View mode: {}", config.view_mode);

        let mut manifest = RunManifest {
            view_mode: config.view_mode,
            resolution,
            baseline,
            scene,
            frontal: None,
            sweep: Vec::new(),
        };
        let scene = &manifest.scene;
        match config.view_mode {
            ViewMode::Interactive => {
                self.engine.display(&scene.pose, &resolution)?;
            }
            ViewMode::Frontal => {
                let capture = capture_stereo_pair(
                    &mut *self.engine,
                    &scene.pose,
                    &resolution,
                    baseline,
                    &scene.bbox,
                    &outputs,
                )?;
                manifest.frontal = Some(capture);
            }
            ViewMode::Sweep => {
                let grid = ViewpointGrid::new(&config.elevation, &config.azimuth, &config.zoom);
                let mut sweep = ViewpointSweep::new(grid);
                manifest.sweep = sweep.run(
                    &mut *self.engine,
                    &scene.pose,
                    &resolution,
                    baseline,
                    &scene.bbox,
                    &outputs,
                )?;
            }
        }
        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RenderError;
    use image::RgbImage;

    #[derive(Default)]
    struct CountingEngine {
        loads: usize,
        captures: usize,
    }

    impl RenderEngine for CountingEngine {
        fn load_scene(&mut self, _scene: &SceneSource) -> Result<Bounds, RenderError> {
            self.loads += 1;
            Ok(Bounds::new(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0)))
        }

        fn reset_clipping_range(&mut self, _pose: &CameraPose) {}

        fn capture(
            &mut self,
            _pose: &CameraPose,
            resolution: &Resolution,
        ) -> Result<RgbImage, RenderError> {
            self.captures += 1;
            Ok(RgbImage::new(resolution.width, resolution.height))
        }
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "stereo_render_session_{name}_{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    fn config_in(dir: &Path, view_mode: ViewMode) -> RenderConfig {
        RenderConfig {
            model: Some(PathBuf::from("cube.obj")),
            view_mode,
            image_size: [8, 6],
            bb_output: dir.join("bbox.dat"),
            dist_output: dir.join("dist.dat"),
            cam_mat_output: dir.join("cam.dat"),
            cam_img_output: dir.join("img.png"),
            ..RenderConfig::default()
        }
    }

    #[test]
    fn test_invalid_config_leaves_engine_untouched() {
        let mut engine = CountingEngine::default();
        let config = RenderConfig::default();
        assert!(matches!(
            RenderSession::new(&mut engine, &config),
            Err(StereoError::Config(_))
        ));
        assert_eq!(engine.loads, 0);
    }

    #[test]
    fn test_prepare_writes_world_bbox_and_distance() {
        let dir = scratch_dir("prepare");
        let config = config_in(&dir, ViewMode::Frontal);
        let mut engine = CountingEngine::default();
        let scene = RenderSession::new(&mut engine, &config)
            .unwrap()
            .prepare()
            .unwrap();

        assert_eq!(scene.world_bbox_file, dir.join("bbox_vtk_world.dat"));
        let corners =
            util::parse_points(&std::fs::read_to_string(&scene.world_bbox_file).unwrap()).unwrap();
        assert_eq!(corners.as_slice(), scene.bbox.corners());

        let distance =
            util::parse_points(&std::fs::read_to_string(&scene.distance_file).unwrap()).unwrap();
        assert_eq!(distance.len(), 2);
        assert_eq!(distance[0], scene.pose.position);
        assert_eq!(distance[1], Point3::new(0.0, 0.0, -1.0));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_user_distance_places_camera() {
        let dir = scratch_dir("distance");
        let config = RenderConfig {
            camera_distance: 120.0,
            ..config_in(&dir, ViewMode::Frontal)
        };
        let mut engine = CountingEngine::default();
        let scene = RenderSession::new(&mut engine, &config)
            .unwrap()
            .prepare()
            .unwrap();
        assert_eq!(scene.pose.position, Point3::new(0.0, 0.0, -120.0));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_interactive_mode_is_unsupported_headless() {
        let dir = scratch_dir("interactive");
        let config = config_in(&dir, ViewMode::Interactive);
        let mut engine = CountingEngine::default();
        let result = RenderSession::new(&mut engine, &config).unwrap().run();
        assert!(matches!(
            result,
            Err(StereoError::Render(RenderError::Unsupported(_)))
        ));
        assert_eq!(engine.captures, 0);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_frontal_manifest_lists_files() {
        let dir = scratch_dir("frontal");
        let config = config_in(&dir, ViewMode::Frontal);
        let mut engine = CountingEngine::default();
        let manifest = RenderSession::new(&mut engine, &config).unwrap().run().unwrap();

        assert_eq!(engine.captures, 2);
        let files = manifest.files();
        assert_eq!(files.len(), 6);
        for file in &files {
            assert!(file.exists(), "{} missing", file.display());
        }

        let manifest_file = dir.join("manifest.json");
        manifest.save(&manifest_file).unwrap();
        let reloaded: RunManifest =
            serde_json::from_str(&std::fs::read_to_string(&manifest_file).unwrap()).unwrap();
        assert_eq!(reloaded.files(), files);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
