use image::RgbImage;
use nalgebra::Point3;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum UtilError {
    #[error("IO Error: {0}")]
    IOError(String),
    #[error("Failed to write image {path}: {reason}")]
    ImageWrite { path: String, reason: String },
}

impl From<std::io::Error> for UtilError {
    fn from(err: std::io::Error) -> Self {
        UtilError::IOError(err.to_string())
    }
}

/// Insert `suffix` right before the extension of the file name, e.g.
/// `"foo.dat"` becomes `"foo_left.dat"`.
///
/// Without an extension the suffix is appended. Dots in directory names are
/// not taken for an extension.
pub fn add_suffix(filename: &str, suffix: &str) -> String {
    let name_start = filename.rfind(|c: char| c == '/' || c == '\\').map_or(0, |i| i + 1);
    let insert_at = filename[name_start..]
        .rfind('.')
        .map_or(filename.len(), |i| name_start + i);
    let mut result = String::with_capacity(filename.len() + suffix.len());
    result.push_str(&filename[..insert_at]);
    result.push_str(suffix);
    result.push_str(&filename[insert_at..]);
    result
}

/// [`add_suffix`] for paths.
pub fn add_suffix_path(path: &Path, suffix: &str) -> PathBuf {
    PathBuf::from(add_suffix(&path.to_string_lossy(), suffix))
}

/// Create the parent directory of `path` if it does not exist yet.
pub fn ensure_parent_dir(path: &Path) -> Result<(), UtilError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| {
                UtilError::IOError(format!(
                    "Failed to create directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
    }
    Ok(())
}

/// Write one `x y z` line per point.
pub fn write_points<W: Write>(writer: &mut W, points: &[Point3<f64>]) -> std::io::Result<()> {
    for p in points {
        writeln!(writer, "{} {} {}", p.x, p.y, p.z)?;
    }
    Ok(())
}

/// Save a point list file, see [`write_points`].
pub fn save_points(path: &Path, points: &[Point3<f64>]) -> Result<(), UtilError> {
    ensure_parent_dir(path)?;
    let file = File::create(path).map_err(|e| {
        UtilError::IOError(format!("Failed to create {}: {e}", path.display()))
    })?;
    let mut writer = BufWriter::new(file);
    write_points(&mut writer, points)?;
    writer.flush()?;
    Ok(())
}

/// Persist a captured frame; the format follows the file extension.
pub fn save_image(image: &RgbImage, path: &Path) -> Result<(), UtilError> {
    ensure_parent_dir(path)?;
    image.save(path).map_err(|e| UtilError::ImageWrite {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Parse `x y z` lines written by [`write_points`].
pub fn parse_points(contents: &str) -> Result<Vec<Point3<f64>>, UtilError> {
    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let values = line
                .split_whitespace()
                .map(str::parse::<f64>)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| UtilError::IOError(format!("Invalid point line '{line}': {e}")))?;
            match values.as_slice() {
                [x, y, z] => Ok(Point3::new(*x, *y, *z)),
                _ => Err(UtilError::IOError(format!(
                    "Expected three values per line, got '{line}'"
                ))),
            }
        })
        .collect()
}
