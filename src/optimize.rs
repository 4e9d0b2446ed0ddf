//! Image variant generation.
//!
//! Stage 3 of the dist build. Walks the image roots of the output tree and,
//! for every JPEG/PNG at or above the size threshold, writes a WebP and an
//! AVIF copy at each configured width next to the source:
//!
//! ```text
//! dist/assets/images/
//! ├── hero.jpg
//! ├── hero-480.webp
//! ├── hero-480.avif
//! ├── hero-768.webp
//! ├── hero-768.avif
//! ├── hero-1200.webp
//! ├── hero-1200.avif
//! └── icon.png              # < 5 KiB, left alone
//! ```
//!
//! The stage is re-runnable: targets already on disk are never regenerated,
//! and a source whose targets all exist is not even decoded. A file that
//! fails to decode or encode is reported and the batch carries on.
//!
//! ## Parallel Processing
//!
//! Sources are independent, so they are processed on a
//! [rayon](https://docs.rs/rayon) pool sized by `processing.max_processes`.

use crate::config::{self, BuildConfig};
use crate::imaging::{
    ImageBackend, OutputFormat, Quality, ResizeParams, RustBackend, SUPPORTED_EXTENSIONS,
    variant_sizes,
};
use rayon::prelude::*;
use std::ops::Add;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Settings for one run of the variant stage.
#[derive(Debug, Clone)]
pub struct VariantConfig {
    pub widths: Vec<u32>,
    pub min_bytes: u64,
    pub quality: Quality,
    pub threads: usize,
}

impl VariantConfig {
    pub fn from_build_config(config: &BuildConfig) -> Self {
        Self {
            widths: config.images.widths.clone(),
            min_bytes: config.images.min_bytes,
            quality: Quality::new(config.images.avif_quality),
            threads: config::effective_threads(&config.processing),
        }
    }
}

impl Default for VariantConfig {
    fn default() -> Self {
        Self::from_build_config(&BuildConfig::default())
    }
}

/// Counts for the build summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageReport {
    /// Supported source images found.
    pub sources: usize,
    /// Sources under the size threshold.
    pub below_threshold: usize,
    pub created: usize,
    /// Targets skipped because they were already on disk.
    pub existing: usize,
    pub failed: usize,
}

impl Add for ImageReport {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            sources: self.sources + other.sources,
            below_threshold: self.below_threshold + other.below_threshold,
            created: self.created + other.created,
            existing: self.existing + other.existing,
            failed: self.failed + other.failed,
        }
    }
}

/// Whether a path has a processable raster extension (case-insensitive).
pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|s| s.eq_ignore_ascii_case(e))
        })
}

/// Target path of one variant: `<dir>/<stem>-<width>.<ext>`.
pub fn variant_path(source: &Path, width: u32, format: OutputFormat) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    source.with_file_name(format!("{}-{}.{}", stem, width, format.extension()))
}

/// Every (width × format) target of a source, without dimensions.
pub fn variant_targets(source: &Path, widths: &[u32]) -> Vec<(u32, OutputFormat, PathBuf)> {
    widths
        .iter()
        .flat_map(|&w| {
            OutputFormat::ALL
                .iter()
                .map(move |&f| (w, f, variant_path(source, w, f)))
        })
        .collect()
}

/// Plan the resize operations for a source of known dimensions.
pub fn plan_variants(
    source: &Path,
    dims: (u32, u32),
    config: &VariantConfig,
) -> Vec<ResizeParams> {
    variant_sizes(dims, &config.widths)
        .into_iter()
        .flat_map(|size| {
            OutputFormat::ALL.iter().map(move |&format| ResizeParams {
                source: source.to_path_buf(),
                output: variant_path(source, size.width, format),
                width: size.width,
                height: size.height,
                format,
                quality: config.quality,
            })
        })
        .collect()
}

/// Find supported source images under the given roots, sorted per root.
///
/// Missing roots are skipped with a warning.
pub fn collect_sources(roots: &[PathBuf]) -> Vec<PathBuf> {
    let mut sources = Vec::new();
    for root in roots {
        if !root.is_dir() {
            log::warn!("image directory {} not found, skipping", root.display());
            continue;
        }
        for entry in WalkDir::new(root).sort_by_file_name() {
            match entry {
                Ok(e) if e.file_type().is_file() && is_supported(e.path()) => {
                    sources.push(e.into_path())
                }
                Ok(_) => {}
                Err(err) => log::warn!("skipping unreadable entry: {err}"),
            }
        }
    }
    sources
}

/// Process one source image. Never fails: problems are logged and counted.
fn process_source(
    backend: &impl ImageBackend,
    source: &Path,
    config: &VariantConfig,
) -> ImageReport {
    let mut report = ImageReport {
        sources: 1,
        ..Default::default()
    };

    let size = match std::fs::metadata(source) {
        Ok(m) => m.len(),
        Err(e) => {
            log::warn!("cannot stat {}: {e}", source.display());
            report.failed += 1;
            return report;
        }
    };
    if size < config.min_bytes {
        log::debug!("{} below threshold ({size} bytes)", source.display());
        report.below_threshold = 1;
        return report;
    }

    let pending: Vec<PathBuf> = variant_targets(source, &config.widths)
        .into_iter()
        .map(|(_, _, path)| path)
        .filter(|path| !path.exists())
        .collect();
    report.existing = config.widths.len() * OutputFormat::ALL.len() - pending.len();
    if pending.is_empty() {
        return report;
    }

    let dims = match backend.identify(source) {
        Ok(d) => (d.width, d.height),
        Err(e) => {
            log::warn!("cannot read {}: {e}", source.display());
            report.failed += pending.len();
            return report;
        }
    };

    let targets: Vec<ResizeParams> = plan_variants(source, dims, config)
        .into_iter()
        .filter(|params| pending.contains(&params.output))
        .collect();
    let results = backend.resize_variants(source, &targets);
    for (params, result) in targets.iter().zip(results) {
        match result {
            Ok(()) => {
                log::info!("Created {}", params.output.display());
                report.created += 1;
            }
            Err(e) => {
                log::warn!(
                    "{} failed for {}: {e}",
                    params.format.extension().to_uppercase(),
                    source.display()
                );
                report.failed += 1;
            }
        }
    }
    report
}

/// Generate variants under `roots` with the production backend.
pub fn optimize_images(
    roots: &[PathBuf],
    config: &VariantConfig,
) -> Result<ImageReport, ImageError> {
    optimize_images_with_backend(&RustBackend::new(), roots, config)
}

/// Generate variants using a specific backend (allows testing with mock).
pub fn optimize_images_with_backend(
    backend: &impl ImageBackend,
    roots: &[PathBuf],
    config: &VariantConfig,
) -> Result<ImageReport, ImageError> {
    let sources = collect_sources(roots);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads.max(1))
        .build()?;

    let report = pool.install(|| {
        sources
            .par_iter()
            .map(|source| process_source(backend, source, config))
            .reduce(ImageReport::default, |a, b| a + b)
    });
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use std::fs;
    use tempfile::TempDir;

    fn config() -> VariantConfig {
        VariantConfig {
            threads: 2,
            ..VariantConfig::default()
        }
    }

    fn write_bytes(path: &Path, len: usize) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, vec![0u8; len]).unwrap();
    }

    // =========================================================================
    // Naming and planning
    // =========================================================================

    #[test]
    fn supported_extensions_case_insensitive() {
        assert!(is_supported(Path::new("a.jpg")));
        assert!(is_supported(Path::new("a.JPEG")));
        assert!(is_supported(Path::new("a.Png")));
        assert!(!is_supported(Path::new("a.webp")));
        assert!(!is_supported(Path::new("a.svg")));
        assert!(!is_supported(Path::new("jpg")));
    }

    #[test]
    fn variant_path_appends_width_and_format() {
        assert_eq!(
            variant_path(Path::new("/img/hero.jpg"), 480, OutputFormat::Avif),
            PathBuf::from("/img/hero-480.avif")
        );
    }

    #[test]
    fn plan_covers_every_width_and_format() {
        let plan = plan_variants(Path::new("/img/p.png"), (2400, 1200), &config());

        assert_eq!(plan.len(), 6);
        let webp_768 = plan
            .iter()
            .find(|p| p.width == 768 && p.format == OutputFormat::WebP)
            .unwrap();
        assert_eq!(webp_768.height, 384);
        assert_eq!(webp_768.output, PathBuf::from("/img/p-768.webp"));
        assert!(plan.iter().all(|p| p.quality == Quality::new(50)));
    }

    // =========================================================================
    // Stage behavior with mock backend
    // =========================================================================

    #[test]
    fn generates_all_variants_for_large_image() {
        let tmp = TempDir::new().unwrap();
        write_bytes(&tmp.path().join("photos/big.jpg"), 6000);
        let backend = MockBackend::with_dimensions(1600, 1200);

        let report =
            optimize_images_with_backend(&backend, &[tmp.path().to_path_buf()], &config())
                .unwrap();

        assert_eq!(report.sources, 1);
        assert_eq!(report.created, 6);
        assert_eq!(report.failed, 0);
        for w in [480, 768, 1200] {
            assert!(tmp.path().join(format!("photos/big-{w}.webp")).exists());
            assert!(tmp.path().join(format!("photos/big-{w}.avif")).exists());
        }
    }

    #[test]
    fn small_images_never_processed() {
        let tmp = TempDir::new().unwrap();
        write_bytes(&tmp.path().join("icon.png"), 5 * 1024 - 1);
        let backend = MockBackend::with_dimensions(64, 64);

        let report =
            optimize_images_with_backend(&backend, &[tmp.path().to_path_buf()], &config())
                .unwrap();

        assert_eq!(report.below_threshold, 1);
        assert_eq!(report.created, 0);
        assert!(backend.get_operations().is_empty());
    }

    #[test]
    fn threshold_is_inclusive() {
        let tmp = TempDir::new().unwrap();
        write_bytes(&tmp.path().join("edge.png"), 5 * 1024);
        let backend = MockBackend::with_dimensions(100, 100);

        let report =
            optimize_images_with_backend(&backend, &[tmp.path().to_path_buf()], &config())
                .unwrap();

        assert_eq!(report.below_threshold, 0);
        assert_eq!(report.created, 6);
    }

    #[test]
    fn existing_targets_never_regenerated() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("hero.jpg");
        write_bytes(&source, 8000);
        fs::write(tmp.path().join("hero-480.webp"), b"keep me").unwrap();
        let backend = MockBackend::with_dimensions(1000, 500);

        let report =
            optimize_images_with_backend(&backend, &[tmp.path().to_path_buf()], &config())
                .unwrap();

        assert_eq!(report.existing, 1);
        assert_eq!(report.created, 5);
        assert_eq!(
            fs::read(tmp.path().join("hero-480.webp")).unwrap(),
            b"keep me"
        );
        let outputs: Vec<String> = backend
            .get_operations()
            .into_iter()
            .filter_map(|op| match op {
                RecordedOp::Resize { output, .. } => Some(output),
                _ => None,
            })
            .collect();
        assert!(!outputs.iter().any(|o| o.ends_with("hero-480.webp")));
    }

    #[test]
    fn second_run_is_a_no_op() {
        let tmp = TempDir::new().unwrap();
        write_bytes(&tmp.path().join("a.jpg"), 6000);
        write_bytes(&tmp.path().join("nested/b.png"), 6000);
        let roots = [tmp.path().to_path_buf()];

        let first = MockBackend::with_dimensions(800, 600);
        let report = optimize_images_with_backend(&first, &roots, &config()).unwrap();
        assert_eq!(report.created, 12);

        let second = MockBackend::with_dimensions(800, 600);
        let report = optimize_images_with_backend(&second, &roots, &config()).unwrap();
        assert_eq!(report.created, 0);
        assert_eq!(report.existing, 12);
        // Nothing decoded either
        assert!(second.get_operations().is_empty());
    }

    #[test]
    fn encode_failures_do_not_abort_batch() {
        let tmp = TempDir::new().unwrap();
        write_bytes(&tmp.path().join("a.jpg"), 6000);
        write_bytes(&tmp.path().join("b.jpg"), 6000);
        let backend = MockBackend::with_dimensions(800, 600).failing(OutputFormat::Avif);

        let report =
            optimize_images_with_backend(&backend, &[tmp.path().to_path_buf()], &config())
                .unwrap();

        assert_eq!(report.failed, 6);
        assert_eq!(report.created, 6);
        assert!(tmp.path().join("b-1200.webp").exists());
        assert!(!tmp.path().join("b-1200.avif").exists());
    }

    #[test]
    fn each_source_decoded_once_for_all_targets() {
        let tmp = TempDir::new().unwrap();
        write_bytes(&tmp.path().join("a.jpg"), 6000);
        write_bytes(&tmp.path().join("b.png"), 6000);
        let backend = MockBackend::with_dimensions(1600, 900);

        let report =
            optimize_images_with_backend(&backend, &[tmp.path().to_path_buf()], &config())
                .unwrap();

        assert_eq!(report.created, 12);
        assert_eq!(backend.decode_count(), 2);
        assert_eq!(backend.resize_count(), 12);
    }

    #[test]
    fn identify_failure_counts_all_pending_targets() {
        let tmp = TempDir::new().unwrap();
        write_bytes(&tmp.path().join("a.jpg"), 6000);
        let backend = MockBackend::new();

        let report =
            optimize_images_with_backend(&backend, &[tmp.path().to_path_buf()], &config())
                .unwrap();

        assert_eq!(report.failed, 6);
        assert_eq!(backend.resize_count(), 0);
    }

    #[test]
    fn generated_variants_are_not_sources() {
        let tmp = TempDir::new().unwrap();
        write_bytes(&tmp.path().join("a-480.webp"), 9000);
        write_bytes(&tmp.path().join("a-480.avif"), 9000);
        write_bytes(&tmp.path().join("logo.svg"), 9000);

        let sources = collect_sources(&[tmp.path().to_path_buf()]);
        assert!(sources.is_empty());
    }

    #[test]
    fn missing_root_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let backend = MockBackend::with_dimensions(10, 10);

        let report = optimize_images_with_backend(
            &backend,
            &[tmp.path().join("does-not-exist")],
            &config(),
        )
        .unwrap();

        assert_eq!(report, ImageReport::default());
    }
}
