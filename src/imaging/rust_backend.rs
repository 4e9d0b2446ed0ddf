//! Pure Rust image processing backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG) | `image` crate (pure Rust decoders) |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` filter |
//! | Encode → WebP | `image::codecs::webp::WebPEncoder` (lossless) |
//! | Encode → AVIF | `image::codecs::avif::AvifEncoder` (rav1e, speed 6) |
//!
//! Outputs are encoded to a sibling `.part` file and renamed into place, so a
//! failed encode never leaves a truncated variant that a later run would
//! treat as already generated.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::params::{OutputFormat, ResizeParams};
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Source extensions the variant stage processes.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Pure Rust backend using the `image` crate ecosystem.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Load and decode an image from disk.
fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    ImageReader::open(path)
        .map_err(BackendError::Io)?
        .with_guessed_format()
        .map_err(BackendError::Io)?
        .decode()
        .map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to decode {}: {}", path.display(), e))
        })
}

/// Normalise to 8-bit RGB(A), the layouts both encoders accept.
fn to_8bit(img: DynamicImage) -> DynamicImage {
    if img.color().has_alpha() {
        DynamicImage::ImageRgba8(img.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(img.to_rgb8())
    }
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}

fn encode(
    img: &DynamicImage,
    path: &Path,
    format: OutputFormat,
    quality: u32,
) -> Result<(), BackendError> {
    let file = std::fs::File::create(path)?;
    let writer = BufWriter::new(file);
    let result = match format {
        OutputFormat::WebP => {
            img.write_with_encoder(image::codecs::webp::WebPEncoder::new_lossless(writer))
        }
        OutputFormat::Avif => img.write_with_encoder(
            image::codecs::avif::AvifEncoder::new_with_speed_quality(writer, 6, quality as u8),
        ),
    };
    result.map_err(|e| {
        BackendError::ProcessingFailed(format!(
            "{} encode failed: {}",
            format.extension().to_uppercase(),
            e
        ))
    })
}

/// Resize an already decoded image and save it to the target.
fn resize_decoded(img: &DynamicImage, params: &ResizeParams) -> Result<(), BackendError> {
    let resized = to_8bit(img.resize_exact(params.width, params.height, FilterType::Lanczos3));
    save_image(&resized, &params.output, params.format, params.quality.value())
}

/// Encode `img` to `path` via a temporary file.
fn save_image(
    img: &DynamicImage,
    path: &Path,
    format: OutputFormat,
    quality: u32,
) -> Result<(), BackendError> {
    let part = part_path(path);
    match encode(img, &part, format, quality) {
        Ok(()) => {
            std::fs::rename(&part, path)?;
            Ok(())
        }
        Err(e) => {
            let _ = std::fs::remove_file(&part);
            Err(e)
        }
    }
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let (width, height) = image::image_dimensions(path).map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to read dimensions: {}", e))
        })?;
        Ok(Dimensions { width, height })
    }

    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError> {
        let img = load_image(&params.source)?;
        resize_decoded(&img, params)
    }

    fn resize_variants(
        &self,
        source: &Path,
        targets: &[ResizeParams],
    ) -> Vec<Result<(), BackendError>> {
        match load_image(source) {
            Ok(img) => targets
                .iter()
                .map(|params| resize_decoded(&img, params))
                .collect(),
            Err(e) => {
                let message = e.to_string();
                targets
                    .iter()
                    .map(|_| Err(BackendError::ProcessingFailed(message.clone())))
                    .collect()
            }
        }
    }
}
