//! Render a 3D object as calibrated stereo pairs.
//!
//! Usage:
//! ```bash
//! render-stereo-pair --model bunny.obj --texture bunny.png --view-mode frontal
//! render-stereo-pair --config render.yaml --view-mode sweep --manifest run.json
//! ```

use clap::Parser;
use log::{error, info, LevelFilter};
use std::path::PathBuf;
use std::process::ExitCode;
use stereo_render_tools::config::{RenderConfig, ViewMode};
use stereo_render_tools::render::PointCloudEngine;
use stereo_render_tools::session::RenderSession;
use stereo_render_tools::stereo::StereoError;

/// Stereo pair renderer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// YAML configuration; command line values override it
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Log verbosity: 0 info, 1 debug, 2 trace
    #[arg(short = 'd', long)]
    debug_mode: Option<u8>,

    /// Object model (OBJ)
    #[arg(short = 'm', long)]
    model: Option<PathBuf>,

    /// Texture image
    #[arg(short = 't', long)]
    texture: Option<PathBuf>,

    /// Base name of the bounding box files
    #[arg(long)]
    bb_output: Option<PathBuf>,

    /// Image width in pixels
    #[arg(long)]
    width: Option<u32>,

    /// Image height in pixels
    #[arg(long)]
    height: Option<u32>,

    /// Vertical field of view in degrees
    #[arg(long)]
    view_angle: Option<f64>,

    /// Background colour as three values in [0, 1]
    #[arg(long, num_args = 3, value_names = ["R", "G", "B"])]
    background: Option<Vec<f64>>,

    /// Camera distance from the object center, -1 to fit the object in view
    #[arg(long, allow_hyphen_values = true)]
    camera_distance: Option<f64>,

    /// Base name of the camera distance file
    #[arg(long)]
    dist_output: Option<PathBuf>,

    /// Object rotation about x, y and z in degrees
    #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"], allow_hyphen_values = true)]
    object_orientation: Option<Vec<f64>>,

    /// 0/interactive, 1/frontal or 2/sweep
    #[arg(short = 'v', long)]
    view_mode: Option<ViewMode>,

    /// Base name of the calibration files
    #[arg(long)]
    cam_mat_output: Option<PathBuf>,

    /// Base name of the images
    #[arg(long)]
    cam_img_output: Option<PathBuf>,

    /// Distance between the two cameras
    #[arg(short = 'b', long)]
    stereo_baseline: Option<f64>,

    /// Sweep elevations in degrees
    #[arg(long, num_args = 1.., allow_hyphen_values = true)]
    elevation: Option<Vec<f64>>,

    /// Sweep azimuths in degrees
    #[arg(long, num_args = 1.., allow_hyphen_values = true)]
    azimuth: Option<Vec<f64>>,

    /// Sweep zoom factors
    #[arg(long, num_args = 1..)]
    zoom: Option<Vec<f64>>,

    /// Write a JSON list of everything the run produced
    #[arg(long)]
    manifest: Option<PathBuf>,
}

fn triple(values: Vec<f64>) -> [f64; 3] {
    [values[0], values[1], values[2]]
}

impl Cli {
    fn into_config(self) -> Result<(RenderConfig, Option<PathBuf>), StereoError> {
        let mut config = match &self.config {
            Some(path) => RenderConfig::load_from_yaml(path)?,
            None => RenderConfig::default(),
        };
        if let Some(v) = self.debug_mode {
            config.debug_mode = v;
        }
        if self.model.is_some() {
            config.model = self.model;
        }
        if self.texture.is_some() {
            config.texture = self.texture;
        }
        if let Some(v) = self.bb_output {
            config.bb_output = v;
        }
        if let Some(v) = self.width {
            config.image_size[0] = v;
        }
        if let Some(v) = self.height {
            config.image_size[1] = v;
        }
        if let Some(v) = self.view_angle {
            config.view_angle = v;
        }
        if let Some(v) = self.background {
            config.background = triple(v);
        }
        if let Some(v) = self.camera_distance {
            config.camera_distance = v;
        }
        if let Some(v) = self.dist_output {
            config.dist_output = v;
        }
        if let Some(v) = self.object_orientation {
            config.object_orientation = triple(v);
        }
        if let Some(v) = self.view_mode {
            config.view_mode = v;
        }
        if let Some(v) = self.cam_mat_output {
            config.cam_mat_output = v;
        }
        if let Some(v) = self.cam_img_output {
            config.cam_img_output = v;
        }
        if let Some(v) = self.stereo_baseline {
            config.stereo_baseline = v;
        }
        if let Some(v) = self.elevation {
            config.elevation = v;
        }
        if let Some(v) = self.azimuth {
            config.azimuth = v;
        }
        if let Some(v) = self.zoom {
            config.zoom = v;
        }
        Ok((config, self.manifest))
    }
}

fn init_logger(debug_mode: u8) {
    let level = match debug_mode {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn run(config: &RenderConfig, manifest: Option<PathBuf>) -> Result<(), StereoError> {
    let mut engine = PointCloudEngine::new();
    let mut session = RenderSession::new(&mut engine, config)?;
    let report = session.run()?;
    info!("Wrote {} files", report.files().len());
    if let Some(path) = manifest {
        report.save(&path)?;
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let (config, manifest) = match cli.into_config() {
        Ok(parsed) => parsed,
        Err(e) => {
            init_logger(0);
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    init_logger(config.debug_mode);

    match run(&config, manifest) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
