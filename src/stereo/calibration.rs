//! Two-camera calibration text files.
//!
//! Layout: the camera count (`2`), a blank line, then per camera the image
//! size, the three rows of `K`, the four distortion coefficients, the three
//! rows of `R` and the translation. A blank line separates the cameras.

use super::{StereoError, StereoIntrinsics};
use crate::camera::Resolution;
use crate::util;
use nalgebra::{Matrix3, Vector3, Vector4};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraCalibration {
    pub resolution: Resolution,
    pub intrinsics: StereoIntrinsics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StereoCalibration {
    pub left: CameraCalibration,
    pub right: CameraCalibration,
}

fn write_row<W: Write>(writer: &mut W, values: &[f64]) -> std::io::Result<()> {
    let line = values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    writeln!(writer, "{line}")
}

fn write_camera<W: Write>(writer: &mut W, camera: &CameraCalibration) -> std::io::Result<()> {
    let c = &camera.intrinsics;
    writeln!(
        writer,
        "{} {}",
        camera.resolution.width, camera.resolution.height
    )?;
    for row in c.k.row_iter() {
        write_row(writer, &[row[0], row[1], row[2]])?;
    }
    write_row(writer, c.distortion.as_slice())?;
    for row in c.r.row_iter() {
        write_row(writer, &[row[0], row[1], row[2]])?;
    }
    write_row(writer, c.t.as_slice())
}

impl StereoCalibration {
    pub fn write_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writeln!(writer, "2")?;
        writeln!(writer)?;
        write_camera(writer, &self.left)?;
        writeln!(writer)?;
        write_camera(writer, &self.right)
    }

    pub fn save(&self, path: &Path) -> Result<(), StereoError> {
        util::ensure_parent_dir(path)?;
        let file = File::create(path).map_err(|e| {
            StereoError::IOError(format!("Failed to create {}: {e}", path.display()))
        })?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, StereoError> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse the text written by [`StereoCalibration::write_to`].
    pub fn parse(contents: &str) -> Result<Self, StereoError> {
        let mut lines = contents.lines().filter(|l| !l.trim().is_empty());
        let count = lines
            .next()
            .ok_or_else(|| StereoError::Calibration("empty file".to_string()))?;
        if count.trim() != "2" {
            return Err(StereoError::Calibration(format!(
                "expected 2 cameras, found '{}'",
                count.trim()
            )));
        }
        let left = parse_camera(&mut lines)?;
        let right = parse_camera(&mut lines)?;
        Ok(StereoCalibration { left, right })
    }
}

fn parse_values<'a, I>(lines: &mut I, expected: usize) -> Result<Vec<f64>, StereoError>
where
    I: Iterator<Item = &'a str>,
{
    let line = lines
        .next()
        .ok_or_else(|| StereoError::Calibration("unexpected end of file".to_string()))?;
    let values = line
        .split_whitespace()
        .map(str::parse::<f64>)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| StereoError::Calibration(format!("'{line}': {e}")))?;
    if values.len() != expected {
        return Err(StereoError::Calibration(format!(
            "expected {expected} values in '{line}'"
        )));
    }
    Ok(values)
}

fn parse_matrix<'a, I>(lines: &mut I) -> Result<Matrix3<f64>, StereoError>
where
    I: Iterator<Item = &'a str>,
{
    let mut rows = Vec::with_capacity(9);
    for _ in 0..3 {
        rows.extend(parse_values(lines, 3)?);
    }
    Ok(Matrix3::from_row_slice(&rows))
}

fn parse_camera<'a, I>(lines: &mut I) -> Result<CameraCalibration, StereoError>
where
    I: Iterator<Item = &'a str>,
{
    let size = parse_values(lines, 2)?;
    if size
        .iter()
        .any(|v| *v < 0.0 || *v > u32::MAX as f64 || v.fract() != 0.0)
    {
        return Err(StereoError::Calibration(format!(
            "invalid image size {size:?}"
        )));
    }
    let resolution = Resolution {
        width: size[0] as u32,
        height: size[1] as u32,
    };
    let k = parse_matrix(lines)?;
    let distortion = Vector4::from_row_slice(&parse_values(lines, 4)?);
    let r = parse_matrix(lines)?;
    let t = Vector3::from_row_slice(&parse_values(lines, 3)?);
    Ok(CameraCalibration {
        resolution,
        intrinsics: StereoIntrinsics {
            k,
            r,
            t,
            distortion,
        },
    })
}
