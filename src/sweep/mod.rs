//! Viewpoint sweep over elevation, azimuth and zoom.
//!
//! Every combination of the three sequences yields one stereo capture. The
//! iteration order is zoom (outermost), elevation, azimuth (innermost), which
//! fixes the order in which files appear. Each capture starts from the pose
//! taken at the beginning of the sweep.

use crate::camera::{CameraPose, Resolution};
use crate::geometry::BoundingBox;
use crate::render::RenderEngine;
use crate::stereo::{capture_stereo_pair, StereoCapture, StereoError, StereoOutputs};
use log::{debug, info, trace, warn};
use serde::{Deserialize, Serialize};

/// Largest difference tolerated between the restored pose and the sweep's canonical pose.
pub const RESTORE_TOLERANCE: f64 = 1e-9;

/// The three value sequences of a sweep.
///
/// NaN entries are dropped on construction, so `[-10, 0, 10, NaN, NaN]`
/// sweeps three elevations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewpointGrid {
    elevations: Vec<f64>,
    azimuths: Vec<f64>,
    zooms: Vec<f64>,
}

fn present(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|v| !v.is_nan()).collect()
}

impl ViewpointGrid {
    pub fn new(elevations: &[f64], azimuths: &[f64], zooms: &[f64]) -> Self {
        ViewpointGrid {
            elevations: present(elevations),
            azimuths: present(azimuths),
            zooms: present(zooms),
        }
    }

    pub fn elevations(&self) -> &[f64] {
        &self.elevations
    }

    pub fn azimuths(&self) -> &[f64] {
        &self.azimuths
    }

    pub fn zooms(&self) -> &[f64] {
        &self.zooms
    }

    pub fn len(&self) -> usize {
        self.elevations.len() * self.azimuths.len() * self.zooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All viewpoints in capture order.
    pub fn viewpoints(&self) -> Vec<Viewpoint> {
        let mut viewpoints = Vec::with_capacity(self.len());
        for &zoom in &self.zooms {
            for &elevation in &self.elevations {
                for &azimuth in &self.azimuths {
                    viewpoints.push(Viewpoint {
                        elevation,
                        azimuth,
                        zoom,
                    });
                }
            }
        }
        viewpoints
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewpoint {
    pub elevation: f64,
    pub azimuth: f64,
    pub zoom: f64,
}

impl Viewpoint {
    /// File name suffix, e.g. `_el_-10.00_az_0.00_zo_1.00`.
    pub fn suffix(&self) -> String {
        format!(
            "_el_{:.2}_az_{:.2}_zo_{:.2}",
            self.elevation, self.azimuth, self.zoom
        )
    }

    /// `pose` moved to this viewpoint: elevation, then azimuth, then zoom,
    /// and finally the view-up is orthogonalized.
    pub fn apply(&self, pose: &CameraPose) -> CameraPose {
        pose.elevation(self.elevation)
            .azimuth(self.azimuth)
            .zoom(self.zoom)
            .orthogonalize_view_up()
    }

    /// Undo [`Viewpoint::apply`]: reciprocal zoom, then position, view-up and
    /// focal point back from `canonical`.
    pub fn restore(&self, pose: &CameraPose, canonical: &CameraPose) -> CameraPose {
        pose.zoom(1.0 / self.zoom)
            .with_placement_of(canonical)
            .orthogonalize_view_up()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SweepState {
    Idle,
    Perturbing,
    Capturing,
    Restoring,
}

/// One finished sweep iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepRecord {
    pub viewpoint: Viewpoint,
    pub pose: CameraPose,
    pub capture: StereoCapture,
}

#[derive(Debug)]
pub struct ViewpointSweep {
    grid: ViewpointGrid,
    state: SweepState,
}

impl ViewpointSweep {
    pub fn new(grid: ViewpointGrid) -> Self {
        ViewpointSweep {
            grid,
            state: SweepState::Idle,
        }
    }

    pub fn grid(&self) -> &ViewpointGrid {
        &self.grid
    }

    pub fn state(&self) -> SweepState {
        self.state
    }

    fn enter(&mut self, state: SweepState) {
        trace!("Sweep state {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    /// Capture a stereo pair for every viewpoint of the grid.
    ///
    /// The view-up of `canonical` is orthogonalized once before the first
    /// viewpoint; every restore returns to that pose. The first failure aborts
    /// the sweep and remaining viewpoints are not attempted. On success the
    /// returned records are in capture order.
    pub fn run<E: RenderEngine + ?Sized>(
        &mut self,
        engine: &mut E,
        canonical: &CameraPose,
        resolution: &Resolution,
        baseline: f64,
        bbox: &BoundingBox,
        outputs: &StereoOutputs,
    ) -> Result<Vec<SweepRecord>, StereoError> {
        info!(
            "Sweeping {} viewpoints ({} zoom x {} elevation x {} azimuth)",
            self.grid.len(),
            self.grid.zooms.len(),
            self.grid.elevations.len(),
            self.grid.azimuths.len()
        );
        for &zoom in &self.grid.zooms {
            if zoom != 1.0 {
                warn!("Zoom values other than 1.0 are not verified (zoom {zoom})");
            }
        }

        let canonical = canonical.orthogonalize_view_up();
        let mut records = Vec::with_capacity(self.grid.len());
        let mut pose = canonical;
        for viewpoint in self.grid.viewpoints() {
            let result = self.step(
                engine, &pose, &canonical, &viewpoint, resolution, baseline, bbox, outputs,
            );
            let (record, restored) = match result {
                Ok(done) => done,
                Err(e) => {
                    self.enter(SweepState::Idle);
                    return Err(e);
                }
            };
            pose = restored;
            records.push(record);
        }
        Ok(records)
    }

    #[allow(clippy::too_many_arguments)]
    fn step<E: RenderEngine + ?Sized>(
        &mut self,
        engine: &mut E,
        pose: &CameraPose,
        canonical: &CameraPose,
        viewpoint: &Viewpoint,
        resolution: &Resolution,
        baseline: f64,
        bbox: &BoundingBox,
        outputs: &StereoOutputs,
    ) -> Result<(SweepRecord, CameraPose), StereoError> {
        self.enter(SweepState::Perturbing);
        let perturbed = viewpoint.apply(pose);
        debug!("Viewpoint {:?} -> pose {:?}", viewpoint, perturbed);
        perturbed.validate()?;

        self.enter(SweepState::Capturing);
        let capture = capture_stereo_pair(
            engine,
            &perturbed,
            resolution,
            baseline,
            bbox,
            &outputs.with_suffix(&viewpoint.suffix()),
        )?;

        self.enter(SweepState::Restoring);
        let restored = viewpoint.restore(&capture.restored_pose, canonical);
        if !restored.approx_eq(canonical, RESTORE_TOLERANCE) {
            return Err(StereoError::PoseNotRestored(format!(
                "after viewpoint {viewpoint:?} the camera is at {restored:?}"
            )));
        }
        self.enter(SweepState::Idle);

        Ok((
            SweepRecord {
                viewpoint: *viewpoint,
                pose: perturbed,
                capture,
            },
            restored,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Point3, Vector3};

    #[test]
    fn test_nan_slots_are_skipped() {
        let nan = f64::NAN;
        let grid = ViewpointGrid::new(&[-10.0, 0.0, 10.0, nan, nan], &[5.0, nan], &[1.0]);
        assert_eq!(grid.elevations(), &[-10.0, 0.0, 10.0]);
        assert_eq!(grid.azimuths(), &[5.0]);
        assert_eq!(grid.len(), 3);
        assert_eq!(grid.viewpoints().len(), 3);
    }

    #[test]
    fn test_empty_sequence_yields_no_viewpoints() {
        let grid = ViewpointGrid::new(&[0.0], &[], &[1.0]);
        assert!(grid.is_empty());
        assert!(grid.viewpoints().is_empty());
    }

    #[test]
    fn test_iteration_order() {
        let grid = ViewpointGrid::new(&[1.0, 2.0], &[10.0, 20.0], &[0.5, 2.0]);
        let order: Vec<(f64, f64, f64)> = grid
            .viewpoints()
            .iter()
            .map(|v| (v.zoom, v.elevation, v.azimuth))
            .collect();
        assert_eq!(
            order,
            vec![
                (0.5, 1.0, 10.0),
                (0.5, 1.0, 20.0),
                (0.5, 2.0, 10.0),
                (0.5, 2.0, 20.0),
                (2.0, 1.0, 10.0),
                (2.0, 1.0, 20.0),
                (2.0, 2.0, 10.0),
                (2.0, 2.0, 20.0),
            ]
        );
    }

    #[test]
    fn test_suffix_format() {
        let viewpoint = Viewpoint {
            elevation: -10.0,
            azimuth: 2.5,
            zoom: 1.0,
        };
        assert_eq!(viewpoint.suffix(), "_el_-10.00_az_2.50_zo_1.00");
    }

    #[test]
    fn test_apply_and_restore() {
        let canonical = CameraPose::on_negative_z(Point3::origin(), 300.0, 40.0);
        for viewpoint in ViewpointGrid::new(&[-10.0, 0.0, 10.0], &[-10.0, 0.0, 10.0], &[0.8, 1.0, 1.2])
            .viewpoints()
        {
            let perturbed = viewpoint.apply(&canonical);
            assert_relative_eq!(perturbed.distance(), 300.0, epsilon = 1e-9);
            assert_relative_eq!(perturbed.view_angle, 40.0 / viewpoint.zoom, epsilon = 1e-12);
            assert_relative_eq!(
                perturbed.view_up.dot(&perturbed.direction_of_projection()),
                0.0,
                epsilon = 1e-12
            );
            let restored = viewpoint.restore(&perturbed, &canonical);
            assert!(restored.approx_eq(&canonical, RESTORE_TOLERANCE));
        }
    }

    #[test]
    fn test_restore_of_skewed_view_up_reaches_orthogonal_pose() {
        let skewed = CameraPose::new(
            Point3::new(0.0, 0.0, -300.0),
            Point3::origin(),
            Vector3::new(0.0, 1.0, 0.3),
            40.0,
        );
        assert!(skewed.validate().is_ok());
        let canonical = skewed.orthogonalize_view_up();
        let viewpoint = Viewpoint {
            elevation: 10.0,
            azimuth: -10.0,
            zoom: 1.0,
        };
        let restored = viewpoint.restore(&viewpoint.apply(&canonical), &canonical);
        assert!(restored.approx_eq(&canonical, RESTORE_TOLERANCE));
        assert!(!restored.approx_eq(&skewed, RESTORE_TOLERANCE));
    }

    #[test]
    fn test_wide_zoom_gives_invalid_pose() {
        let canonical = CameraPose::on_negative_z(Point3::origin(), 300.0, 40.0);
        let viewpoint = Viewpoint {
            elevation: 0.0,
            azimuth: 0.0,
            zoom: 0.2,
        };
        let perturbed = viewpoint.apply(&canonical);
        assert_relative_eq!(perturbed.view_angle, 200.0, epsilon = 1e-9);
        assert!(perturbed.validate().is_err());
    }

    #[test]
    fn test_non_unit_zoom_narrows_view() {
        let canonical = CameraPose::on_negative_z(Point3::origin(), 300.0, 40.0);
        let viewpoint = Viewpoint {
            elevation: 0.0,
            azimuth: 0.0,
            zoom: 2.0,
        };
        let perturbed = viewpoint.apply(&canonical);
        assert_relative_eq!(perturbed.view_angle, 20.0, epsilon = 1e-12);
        assert_relative_eq!(perturbed.position, canonical.position, epsilon = 1e-12);
    }
}
