// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Input source handling.
//!
//! A [`Source`] names one or more still images on disk. Sources resolve to an
//! ordered list of paths; decoding happens later, per image, so that an
//! undecodable file becomes a rejection for that image only.

use std::path::{Path, PathBuf};

use crate::error::{PoseError, Result};

/// Image extensions accepted when scanning directories and globs.
pub const IMAGE_EXTENSIONS: [&str; 8] = ["png", "jpg", "jpeg", "bmp", "webp", "tiff", "tif", "gif"];

/// Represents different input sources for inference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Path to an image file.
    Image(PathBuf),
    /// List of image paths.
    ImageList(Vec<PathBuf>),
    /// Directory containing images.
    Directory(PathBuf),
    /// Glob pattern for images, e.g. `poses/*.jpg`.
    Glob(String),
}

impl Source {
    /// Check if this source is a single image.
    #[must_use]
    pub const fn is_image(&self) -> bool {
        matches!(self, Self::Image(_))
    }

    /// Check if this source is a directory, glob pattern or list.
    #[must_use]
    pub const fn is_batch(&self) -> bool {
        matches!(self, Self::Directory(_) | Self::Glob(_) | Self::ImageList(_))
    }

    /// Resolve the source into image paths, sorted for directories and globs.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory or glob base does not exist.
    pub fn image_paths(&self) -> Result<Vec<PathBuf>> {
        match self {
            Self::Image(path) => Ok(vec![path.clone()]),
            Self::ImageList(paths) => Ok(paths.clone()),
            Self::Directory(dir) => collect_images_from_dir(dir),
            Self::Glob(pattern) => collect_images_from_glob(pattern),
        }
    }
}

/// Convert from a string path to Source.
///
/// Commas separate a list of images; `*` marks a glob; existing directories
/// are scanned; anything else is a single image.
impl From<&str> for Source {
    fn from(s: &str) -> Self {
        if s.contains(',') {
            return Self::ImageList(
                s.split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(PathBuf::from)
                    .collect(),
            );
        }

        if s.contains('*') {
            return Self::Glob(s.to_string());
        }

        let path = PathBuf::from(s);
        if path.is_dir() {
            return Self::Directory(path);
        }

        Self::Image(path)
    }
}

impl From<String> for Source {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Self {
        if path.is_dir() {
            Self::Directory(path)
        } else {
            Self::Image(path)
        }
    }
}

impl From<Vec<PathBuf>> for Source {
    fn from(paths: Vec<PathBuf>) -> Self {
        Self::ImageList(paths)
    }
}

/// Check if a path is an image file based on extension.
#[must_use]
pub fn is_image_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| {
        let ext = ext.to_string_lossy().to_lowercase();
        IMAGE_EXTENSIONS.contains(&ext.as_str())
    })
}

/// Collect image paths from a directory.
fn collect_images_from_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(PoseError::IoError(format!(
            "Not a directory: {}",
            dir.display()
        )));
    }

    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| is_image_file(path))
        .collect();

    paths.sort();
    Ok(paths)
}

/// Collect image paths from a glob pattern.
///
/// Supports a single `*` in the file name, as in `dir/*.jpg` or `dir/warrior_*`.
fn collect_images_from_glob(pattern: &str) -> Result<Vec<PathBuf>> {
    let pattern_path = Path::new(pattern);
    let dir = match pattern_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let file_pattern = pattern_path
        .file_name()
        .map(|f| f.to_string_lossy().to_string())
        .unwrap_or_default();
    let (prefix, suffix) = file_pattern
        .split_once('*')
        .unwrap_or((file_pattern.as_str(), ""));

    if !dir.is_dir() {
        return Err(PoseError::IoError(format!(
            "Directory not found: {}",
            dir.display()
        )));
    }

    let (prefix, suffix) = (prefix.to_lowercase(), suffix.to_lowercase());
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            let name = path
                .file_name()
                .map(|f| f.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            name.starts_with(&prefix)
                && name.ends_with(&suffix)
                && name.len() >= prefix.len() + suffix.len()
                && is_image_file(path)
        })
        .collect();

    paths.sort();
    Ok(paths)
}
