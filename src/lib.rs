//! Stereo Render Tools Library
//!
//! Synthesizes calibrated stereo image pairs of a 3D object. A single virtual
//! camera is shifted along its own x-axis to form a canonical stereo rig; each
//! pair comes with the intrinsic/extrinsic calibration of both views and the
//! object's bounding box in the left camera frame. This library provides:
//! - Camera poses and the pinhole model (`camera`)
//! - Bounding boxes and automatic camera distance (`geometry`)
//! - The rendering engine interface and a headless engine (`render`)
//! - Stereo pair capture and calibration files (`stereo`)
//! - Viewpoint sweeps over elevation, azimuth and zoom (`sweep`)
//! - Run configuration and the session driving a whole run (`config`, `session`)

pub mod camera;
pub mod config;
pub mod geometry;
pub mod render;
pub mod session;
pub mod stereo;
pub mod sweep;
pub mod util;

// Re-export commonly used types
pub use camera::{
    camera_matrix, CameraError, CameraFrame, CameraModel, CameraPose, Intrinsics, PinholeModel,
    Resolution,
};
pub use config::{ConfigError, RenderConfig, ViewMode};
pub use geometry::{auto_camera_distance, BoundingBox, Bounds};
pub use render::{PointCloudEngine, RenderEngine, RenderError, SceneSource};
pub use session::{PreparedScene, RenderSession, RunManifest};
pub use stereo::{
    capture_stereo_pair, StereoCalibration, StereoCapture, StereoError, StereoIntrinsics,
    StereoOutputs, StereoSide,
};
pub use sweep::{Viewpoint, ViewpointGrid, ViewpointSweep};
