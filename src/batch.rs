//! Batch assembly for the CLI: find input images, decode them into a
//! normalized batch, and write the round-tripped batch back out.
//!
//! Inputs may be files or directories. Directories are walked recursively and
//! every file with a supported extension is taken, sorted by path, so the
//! batch order is stable across runs. Output files are named
//! `NNN-<stem>.png`, `NNN` being the 1-based batch position; that keeps
//! same-named inputs from different directories apart.

use image::{ImageFormat, Rgb32FImage, RgbImage};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

/// Extensions the compiled-in decoders can read.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tif", "tiff", "webp"];

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to read {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("Failed to write {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("Walking {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("Input not found: {0}")]
    NotFound(PathBuf),
    #[error("No images found in the given inputs")]
    Empty,
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// Expand files and directories into an ordered list of image paths.
///
/// Explicit files are kept in the order given; each directory contributes
/// its images sorted by path, at the position the directory was named.
pub fn collect_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>, BatchError> {
    let mut found = Vec::new();

    for input in inputs {
        if input.is_file() {
            found.push(input.clone());
        } else if input.is_dir() {
            let mut images = Vec::new();
            for entry in WalkDir::new(input).follow_links(true) {
                let entry = entry.map_err(|source| BatchError::Walk {
                    path: input.clone(),
                    source,
                })?;
                let hidden = entry.file_name().to_string_lossy().starts_with('.');
                if entry.file_type().is_file() && !hidden && is_image(entry.path()) {
                    images.push(entry.into_path());
                }
            }
            images.sort();
            found.extend(images);
        } else {
            return Err(BatchError::NotFound(input.clone()));
        }
    }

    if found.is_empty() {
        return Err(BatchError::Empty);
    }
    Ok(found)
}

/// Decode every path into a normalized RGB float image.
pub fn load_batch(paths: &[PathBuf]) -> Result<Vec<Rgb32FImage>, BatchError> {
    paths
        .iter()
        .map(|path| {
            debug!(path = %path.display(), "loading input");
            image::open(path)
                .map(|img| img.to_rgb32f())
                .map_err(|source| BatchError::Decode {
                    path: path.clone(),
                    source,
                })
        })
        .collect()
}

/// Output file name for the image at 0-based `index` of the batch.
pub fn output_name(index: usize, source: &Path) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    format!("{:0>3}-{}.png", index + 1, stem)
}

/// Write each image as PNG into `out_dir`, returning the paths written.
///
/// `sources` supplies the stems and must be index-aligned with `images`.
pub fn write_batch(
    images: &[Rgb32FImage],
    sources: &[PathBuf],
    out_dir: &Path,
) -> Result<Vec<PathBuf>, BatchError> {
    std::fs::create_dir_all(out_dir)?;

    images
        .iter()
        .zip(sources)
        .enumerate()
        .map(|(index, (image, source))| {
            let path = out_dir.join(output_name(index, source));
            quantize(image)
                .save_with_format(&path, ImageFormat::Png)
                .map_err(|source| BatchError::Encode {
                    path: path.clone(),
                    source,
                })?;
            Ok(path)
        })
        .collect()
}

/// Round to the nearest 8-bit level; samples are already in [0,1].
fn quantize(image: &Rgb32FImage) -> RgbImage {
    let (width, height) = image.dimensions();
    RgbImage::from_fn(width, height, |x, y| {
        let p = image.get_pixel(x, y).0;
        image::Rgb(p.map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8))
    })
}
